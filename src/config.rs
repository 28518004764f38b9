//! Server configuration, read from CLI arguments, the environment and `.env`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, ValueEnum};

use crate::store::SUBMISSIONS_FILE;

#[derive(Debug, Parser)]
#[command(name = "car-booking", about = "Car rental booking service", long_about = None)]
pub struct ServerConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    #[command(flatten)]
    pub logging: LoggingConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub smtp: SmtpConfig,
}

impl ServerConfig {
    pub fn load() -> Result<Self, clap::Error> {
        // a missing .env is fine
        dotenv::dotenv().ok();

        Self::try_parse()
    }

    pub fn socket_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Debug, Args)]
pub struct StorageConfig {
    /// Directory holding the submissions file
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Keep submissions in the system temp directory, e.g. on serverless hosts
    #[arg(long, env = "EPHEMERAL_STORAGE", default_value_t = false)]
    pub ephemeral: bool,
}

impl StorageConfig {
    pub fn submissions_path(&self) -> PathBuf {
        let dir = if self.ephemeral {
            std::env::temp_dir()
        } else {
            self.data_dir.clone()
        };
        dir.join(SUBMISSIONS_FILE)
    }
}

#[derive(Debug, Args)]
pub struct SmtpConfig {
    /// SMTP relay host
    #[arg(
        id = "smtp_host",
        long = "smtp-host",
        env = "SMTP_HOST",
        default_value = "smtp.gmail.com"
    )]
    pub host: String,

    /// SMTP submission port (STARTTLS)
    #[arg(id = "smtp_port", long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,

    /// SMTP login
    #[arg(id = "smtp_user", long = "smtp-user", env = "SMTP_USER")]
    pub user: Option<String>,

    /// SMTP password
    #[arg(
        id = "smtp_pass",
        long = "smtp-pass",
        env = "SMTP_PASS",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Sender address, defaults to the SMTP login
    #[arg(id = "smtp_from", long = "smtp-from", env = "SMTP_FROM")]
    pub from: Option<String>,

    /// Recipient of booking notifications, defaults to the SMTP user
    #[arg(long, env = "NOTIFICATION_EMAIL")]
    pub notification_email: Option<String>,

    /// Upper bound for one delivery attempt, in seconds
    #[arg(long, env = "NOTIFICATION_TIMEOUT_SECONDS", default_value_t = 10)]
    pub notification_timeout_seconds: u64,

    /// Notifications queued beyond this are dropped
    #[arg(long, env = "NOTIFICATION_OUTBOX_CAPACITY", default_value_t = 64)]
    pub outbox_capacity: usize,
}

impl SmtpConfig {
    /// User and password, when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.user.as_deref().filter(|user| !user.is_empty())?;
        let password = self.password.as_deref().filter(|pass| !pass.is_empty())?;
        Some((user, password))
    }

    /// Explicit sender, falling back to the login.
    pub fn sender(&self) -> Option<&str> {
        self.from
            .as_deref()
            .filter(|from| !from.is_empty())
            .or_else(|| self.user.as_deref())
    }

    pub fn recipient(&self) -> Option<&str> {
        self.notification_email
            .as_deref()
            .filter(|email| !email.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_seconds)
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".into(),
            port: 587,
            user: None,
            password: None,
            from: None,
            notification_email: None,
            notification_timeout_seconds: 10,
            outbox_capacity: 64,
        }
    }
}
