use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type SubmissionId = String;

/// Date format used by the booking form for pickup and drop-off dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Branches a customer can collect a vehicle from.
pub const BRANCHES: [&str; 2] = ["Sulaimaniyya Jeddah", "Garnatha Jeddah"];

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    #[error("pickup date must be today or later")]
    PickupTooEarly,
    #[error("pickup date must be within 3 days from today")]
    PickupTooLate,
    #[error("drop-off date must be at least one day after the pickup date")]
    DropOffBeforePickup,
    #[error("a branch must be selected for branch collection")]
    MissingBranch,
    #[error("the selected branch does not exist")]
    UnknownBranch,
    #[error("the selected vehicle does not exist")]
    UnknownVehicle,
}

impl ValidationError {
    /// Stable machine-readable code returned to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::PickupTooEarly => "too-early",
            ValidationError::PickupTooLate => "too-late",
            ValidationError::DropOffBeforePickup => "before-pickup",
            ValidationError::MissingBranch => "missing-branch",
            ValidationError::UnknownBranch => "unknown-branch",
            ValidationError::UnknownVehicle => "unknown-vehicle",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMethod {
    Branch,
    Delivery,
}

/// Per-vehicle pricing. Unit prices are VAT-inclusive with the discount
/// already applied; `discount` is informational only.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    pub id: u32,
    pub name: String,
    pub year: u16,
    #[serde(with = "rust_decimal::serde::float")]
    pub daily: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub weekly: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub monthly: Decimal,
    pub discount: u8,
}

impl RateCard {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        year: u16,
        daily: u32,
        weekly: u32,
        monthly: u32,
        discount: u8,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            year,
            daily: Decimal::from(daily),
            weekly: Decimal::from(weekly),
            monthly: Decimal::from(monthly),
            discount,
        }
    }
}

/// Immutable rate card catalog, loaded once at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Fleet {
    cards: Vec<RateCard>,
}

impl Fleet {
    pub fn new(cards: Vec<RateCard>) -> Self {
        Self { cards }
    }

    /// The catalog offered on the website, prices in SAR.
    pub fn standard() -> Self {
        Self::new(vec![
            RateCard::new(1, "KIA K3", 2025, 140, 910, 2850, 10),
            RateCard::new(2, "Suzuki Dzire", 2024, 95, 560, 2110, 10),
            RateCard::new(3, "Toyota Corolla", 2025, 172, 1050, 3800, 10),
            RateCard::new(4, "Hyundai Accent", 2024, 110, 630, 2550, 10),
            RateCard::new(5, "Nissan Sunny", 2024, 95, 560, 2100, 10),
            RateCard::new(6, "KIA Pegas", 2025, 95, 560, 2100, 10),
            RateCard::new(7, "Toyota Yaris", 2024, 110, 630, 2550, 10),
            RateCard::new(8, "Hyundai Grand i10", 2024, 95, 560, 2100, 10),
            RateCard::new(9, "Hyundai Elantra", 2023, 150, 945, 3600, 10),
            RateCard::new(10, "Suzuki Baleno", 2024, 100, 630, 2250, 10),
        ])
    }

    pub fn cards(&self) -> &[RateCard] {
        &self.cards
    }

    pub fn by_id(&self, id: u32) -> Option<&RateCard> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn by_name_and_year(&self, name: &str, year: u16) -> Option<&RateCard> {
        self.cards
            .iter()
            .find(|card| card.name == name && card.year == year)
    }
}

/// A booking as sent by the form. The vehicle is a name/year snapshot, not a
/// reference into the fleet, so later rate changes do not touch it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub full_name: String,
    pub phone: String,
    pub country_code: String,
    #[serde(default)]
    pub email: Option<String>,
    pub car_name: String,
    pub car_year: u16,
    pub pickup_date: String,
    pub drop_off_date: String,
    pub collection_method: CollectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_branch: Option<String>,
    pub total: u64,
}

impl BookingRequest {
    pub fn pickup(&self) -> Option<NaiveDate> {
        parse_date(&self.pickup_date)
    }

    pub fn drop_off(&self) -> Option<NaiveDate> {
        parse_date(&self.drop_off_date)
    }

    /// Email address, if one was actually entered.
    pub fn contact_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.trim().is_empty())
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// A recorded booking. Never updated or deleted once written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    #[serde(flatten)]
    pub request: BookingRequest,
    pub submitted_at: DateTime<Utc>,
}
