//! Best-effort booking notifications.
//!
//! Submissions are published to an in-process outbox and delivered by a
//! detached worker. Delivery failures end up in the log and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::SmtpConfig;
use crate::domain::{CollectionMethod, Submission};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("delivery did not finish within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, submission: &Submission) -> Result<(), NotificationError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    /// `None` when no SMTP credentials are configured. Fails when the sender
    /// or recipient is not a usable address.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, NotificationError> {
        let Some((user, password)) = config.credentials() else {
            return Ok(None);
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(user.to_owned(), password.to_owned()))
            .timeout(Some(config.timeout()))
            .build();
        let from: Mailbox = config.sender().unwrap_or(user).parse()?;
        let to = match config.recipient() {
            Some(recipient) => recipient.parse()?,
            None => from.clone(),
        };

        Ok(Some(Self { transport, from, to }))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(submission))
            .header(ContentType::TEXT_HTML)
            .body(html_body(submission))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

pub fn subject(submission: &Submission) -> String {
    format!("New Booking Request - {}", submission.request.car_name)
}

pub fn html_body(submission: &Submission) -> String {
    let request = &submission.request;
    let collection = match request.collection_method {
        CollectionMethod::Branch => format!(
            "Branch: {}",
            escape(request.selected_branch.as_deref().unwrap_or_default())
        ),
        CollectionMethod::Delivery => "Delivery".to_owned(),
    };
    let email = request
        .contact_email()
        .map(|email| format!("<p><strong>Email:</strong> {}</p>\n", escape(email)))
        .unwrap_or_default();

    format!(
        "<h2>New Booking Request</h2>\n\
         <p><strong>Name:</strong> {name}</p>\n\
         <p><strong>Phone:</strong> {code} {phone}</p>\n\
         {email}\
         <p><strong>Vehicle:</strong> {car} ({year})</p>\n\
         <p><strong>Pickup Date:</strong> {pickup}</p>\n\
         <p><strong>Drop-off Date:</strong> {drop_off}</p>\n\
         <p><strong>Collection Method:</strong> {collection}</p>\n\
         <p><strong>Total Amount:</strong> {total} SAR</p>\n\
         <p><strong>Submitted:</strong> {submitted}</p>\n",
        name = escape(&request.full_name),
        code = escape(&request.country_code),
        phone = escape(&request.phone),
        car = escape(&request.car_name),
        year = request.car_year,
        pickup = escape(&request.pickup_date),
        drop_off = escape(&request.drop_off_date),
        total = request.total,
        submitted = submission.submitted_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Sending half of the notification queue. Publishing never blocks or fails.
#[derive(Clone, Debug, Default)]
pub struct Outbox {
    sender: Option<mpsc::Sender<Submission>>,
}

impl Outbox {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Submission>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn publish(&self, submission: &Submission) {
        let Some(sender) = &self.sender else {
            debug!(id = %submission.id, "notifications disabled");
            return;
        };

        match sender.try_send(submission.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(submission)) => {
                warn!(id = %submission.id, "notification outbox full, dropping notification")
            }
            Err(TrySendError::Closed(submission)) => {
                warn!(id = %submission.id, "notification worker stopped, dropping notification")
            }
        }
    }
}

/// Drains the outbox until every [`Outbox`] handle is dropped.
pub async fn deliver(
    mut outbox: mpsc::Receiver<Submission>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
) {
    while let Some(submission) = outbox.recv().await {
        let outcome = match tokio::time::timeout(timeout, notifier.notify(&submission)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(NotificationError::Timeout(timeout)),
        };
        match outcome {
            Ok(()) => info!(id = %submission.id, "booking notification sent"),
            Err(error) => error!(id = %submission.id, %error, "booking notification failed"),
        }
    }
    debug!("notification outbox closed");
}
