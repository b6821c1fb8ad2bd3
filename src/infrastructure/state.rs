//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{ProfileRepository, TripRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::{SeaOrmProfileRepository, SeaOrmTripRepository};
use crate::modules::integrations::{HttpPaymentGateway, Mailer, PaymentGateway, PushClient};
use crate::services::notification_service::Notifier;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    /// Trip repository
    pub trip_repo: Arc<dyn TripRepository>,
    /// Profile repository
    pub profile_repo: Arc<dyn ProfileRepository>,
    /// Sibling service charging saved cards
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Notifier,
}

impl AppState {
    /// Create a new AppState with all repositories and outbound clients initialized
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let http = reqwest::Client::new();

        let payments = Arc::new(HttpPaymentGateway::new(
            http.clone(),
            config.payment_service_url.clone(),
            config.payment_timeout,
        ));

        let mailer = config.smtp.as_ref().and_then(|smtp| match Mailer::from_config(smtp) {
            Ok(mailer) => Some(mailer),
            Err(e) => {
                tracing::error!("Email disabled: {}", e);
                None
            }
        });
        let push = PushClient::new(
            http,
            config.push_api_url.clone(),
            config.push_access_token.clone(),
        );

        Self {
            trip_repo: Arc::new(SeaOrmTripRepository::new(db.clone())),
            profile_repo: Arc::new(SeaOrmProfileRepository::new(db.clone())),
            payments,
            notifier: Notifier::new(push, mailer),
            config: Arc::new(config),
            db,
        }
    }

    /// Swap the payment gateway (used by tests and alternative deployments)
    pub fn with_payment_gateway(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl AsRef<DatabaseConnection> for AppState {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
