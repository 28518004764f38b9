mod application;
mod config;
mod domain;
mod notification;
mod pricing;
mod store;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    error,
    get,
    http::StatusCode,
    middleware::Logger,
    post,
    web::{self, Data, Json},
    App, HttpRequest, HttpResponse, HttpServer,
};
use application::Application;
use chrono::Local;
use config::ServerConfig;
use domain::{BookingRequest, Fleet, RateCard, Submission};
use notification::{Outbox, SmtpNotifier};
use serde::Serialize;
use store::SubmissionStore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::{Quote, QuoteRequest};

/// How long pending notifications may keep the process alive after shutdown.
const NOTIFICATION_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    telemetry::init(&config.logging)?;

    let store = SubmissionStore::new(config.storage.submissions_path());
    info!(path = %store.path().display(), "submission store ready");

    let (outbox, notifications) = notifications(&config);
    let application = Application::new(Fleet::standard(), store, outbox);

    http_server(application, &config).await?;

    if let Some(worker) = notifications {
        if tokio::time::timeout(NOTIFICATION_DRAIN_GRACE, worker).await.is_err() {
            warn!("pending notifications abandoned at shutdown");
        }
    }
    Ok(())
}

/// Starts the detached notification worker when SMTP is configured and
/// usable. Bad notification settings only disable notifications.
fn notifications(config: &ServerConfig) -> (Outbox, Option<JoinHandle<()>>) {
    let notifier = match SmtpNotifier::from_config(&config.smtp) {
        Ok(Some(notifier)) => notifier,
        Ok(None) => {
            info!("SMTP not configured, booking notifications disabled");
            return (Outbox::disabled(), None);
        }
        Err(error) => {
            warn!(%error, "unusable SMTP settings, booking notifications disabled");
            return (Outbox::disabled(), None);
        }
    };

    let (outbox, receiver) = Outbox::channel(config.smtp.outbox_capacity);
    let worker = tokio::spawn(notification::deliver(
        receiver,
        Arc::new(notifier),
        config.smtp.timeout(),
    ));
    (outbox, Some(worker))
}

async fn http_server(app: Application, config: &ServerConfig) -> anyhow::Result<()> {
    info!(host = %config.host, port = config.port, "starting http server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(routes(app.clone()))
    })
    .bind(config.socket_addr())?
    .run()
    .await?;

    Ok(())
}

fn routes(app: Application) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(Data::new(app))
            .service(
                web::resource("/submit")
                    .app_data(web::JsonConfig::default().error_handler(submit_payload_error))
                    .route(web::post().to(submit)),
            )
            .service(list_submissions)
            .service(list_cars)
            .service(quote);
    }
}

#[derive(Serialize, Debug)]
struct SubmitResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn submit(app: Data<Application>, data: Json<BookingRequest>) -> HttpResponse {
    let submission = app.submit(data.into_inner()).await;
    HttpResponse::Ok().json(SubmitResponse {
        success: true,
        id: Some(submission.id),
        error: None,
    })
}

// An unreadable booking body is the one case where submit reports failure.
fn submit_payload_error(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    warn!(error = %err, "rejected unreadable submission");
    let response = HttpResponse::InternalServerError().json(SubmitResponse {
        success: false,
        id: None,
        error: Some("Failed to save submission"),
    });
    error::InternalError::from_response(err, response).into()
}

#[get("/submissions")]
async fn list_submissions(
    app: Data<Application>,
) -> Result<Json<Vec<Submission>>, application::Error> {
    Ok(Json(app.submissions().await?))
}

#[get("/cars")]
async fn list_cars(app: Data<Application>) -> Json<Vec<RateCard>> {
    Json(app.cars().to_vec())
}

#[post("/quote")]
async fn quote(
    app: Data<Application>,
    data: Json<QuoteRequest>,
) -> Result<Json<Quote>, application::Error> {
    let today = Local::now().date_naive();
    Ok(Json(app.quote(data.into_inner(), today)?))
}

impl error::ResponseError for application::Error {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            application::Error::Validation(error) => ErrorResponse {
                error: error.reason(),
                message: Some(error.to_string()),
            },
            application::Error::Store(error) => {
                tracing::error!(%error, "failed to load submissions");
                ErrorResponse {
                    error: "Failed to load submissions",
                    message: None,
                }
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            application::Error::Validation(_) => StatusCode::BAD_REQUEST,
            application::Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
