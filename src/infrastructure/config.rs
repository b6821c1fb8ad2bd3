use std::env;
use std::time::Duration;

use url::Url;

pub const DEFAULT_PUSH_API_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Outbound SMTP settings; email is disabled when `SMTP_HOST` is unset.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub cors_allowed_origins: Vec<String>,
    /// Base URL of the sibling service that charges saved cards
    pub payment_service_url: Option<Url>,
    pub payment_timeout: Duration,
    pub push_api_url: Url,
    pub push_access_token: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub bootstrap_dispatcher: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "secret".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        let payment_service_url = env::var("PAYMENT_SERVICE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match Url::parse(s.trim()) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::error!("Ignoring invalid PAYMENT_SERVICE_URL '{}': {}", s, e);
                    None
                }
            });

        let push_api_url = env::var("PUSH_API_URL")
            .ok()
            .and_then(|s| Url::parse(&s).ok())
            .unwrap_or_else(|| {
                Url::parse(DEFAULT_PUSH_API_URL).expect("default push URL is valid")
            });

        let smtp = env::var("SMTP_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|host| SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "dispatch@localhost".to_string()),
            });

        let bootstrap_dispatcher = match (
            env::var("BOOTSTRAP_DISPATCHER_EMAIL"),
            env::var("BOOTSTRAP_DISPATCHER_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://dispatch.db?mode=rwc".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            jwt_secret,
            cors_allowed_origins: parse_list(env::var("CORS_ALLOWED_ORIGINS").ok()),
            payment_service_url,
            payment_timeout: Duration::from_secs(
                env::var("PAYMENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8),
            ),
            push_api_url,
            push_access_token: env::var("PUSH_ACCESS_TOKEN").ok(),
            smtp,
            bootstrap_dispatcher,
        }
    }

    /// Configuration for tests and embedded use: in-memory database, no outbound services.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            cors_allowed_origins: Vec::new(),
            payment_service_url: None,
            payment_timeout: Duration::from_secs(8),
            push_api_url: Url::parse(DEFAULT_PUSH_API_URL).expect("default push URL is valid"),
            push_access_token: None,
            smtp: None,
            bootstrap_dispatcher: None,
        }
    }
}

fn parse_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
