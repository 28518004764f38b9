use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{BookingRequest, CollectionMethod, Fleet, RateCard, Submission, ValidationError};
use crate::notification::Outbox;
use crate::pricing;
use crate::store::{StoreError, SubmissionStore};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Clone)]
pub struct Application {
    fleet: Arc<Fleet>,
    store: SubmissionStore,
    outbox: Outbox,
}

impl Application {
    pub fn new(fleet: Fleet, store: SubmissionStore, outbox: Outbox) -> Self {
        Self {
            fleet: Arc::new(fleet),
            store,
            outbox,
        }
    }

    pub fn cars(&self) -> &[RateCard] {
        self.fleet.cards()
    }

    /// Records a booking and queues its notification. Storage and
    /// notification problems are logged by their owners and never reach
    /// the caller.
    pub async fn submit(&self, request: BookingRequest) -> Submission {
        // The submitted total stays authoritative; a disagreement is only logged.
        let expected = self.expected_total(&request);
        if expected != request.total {
            warn!(
                car = %request.car_name,
                submitted = request.total,
                expected,
                "submitted total does not match the rate card"
            );
        }

        let submission = self.store.append(request).await;
        self.outbox.publish(&submission);
        submission
    }

    pub async fn submissions(&self) -> Result<Vec<Submission>, Error> {
        Ok(self.store.list().await?)
    }

    pub fn quote(&self, command: QuoteRequest, today: NaiveDate) -> Result<Quote, Error> {
        let rate_card = self
            .fleet
            .by_id(command.car_id)
            .ok_or(ValidationError::UnknownVehicle)?;
        pricing::validate_pickup_date(command.pickup_date, today)?;
        pricing::validate_drop_off_date(command.drop_off_date, command.pickup_date)?;
        pricing::validate_collection(
            command.collection_method,
            command.selected_branch.as_deref(),
        )?;

        Ok(Quote {
            duration_days: pricing::duration_days(command.pickup_date, command.drop_off_date),
            total: pricing::compute_total(
                rate_card,
                command.pickup_date,
                command.drop_off_date,
                command.collection_method,
            ),
        })
    }

    /// The total the booking form would show for `request`, or 0 when it
    /// cannot be priced.
    fn expected_total(&self, request: &BookingRequest) -> u64 {
        pricing::total_or_zero(
            self.fleet
                .by_name_and_year(&request.car_name, request.car_year),
            request.pickup(),
            request.drop_off(),
            request.collection_method,
        )
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    car_id: u32,
    pickup_date: NaiveDate,
    drop_off_date: NaiveDate,
    collection_method: CollectionMethod,
    #[serde(default)]
    selected_branch: Option<String>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub duration_days: u64,
    pub total: u64,
}
