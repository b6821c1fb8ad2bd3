//! Client for the sibling service that charges a rider's saved card.
//!
//! The charge is best-effort: every failure mode (service not configured,
//! transport error, non-2xx status, timeout) is folded into
//! [`ChargeOutcome::Failed`] so the approval flow can fall back instead of erroring.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub trip_id: i32,
    pub user_id: i32,
    pub payment_method_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Charged { payment_intent_id: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "paymentIntentId")]
    payment_intent_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> ChargeOutcome;
}

/// HTTP implementation posting to `<base>/api/stripe/charge-payment`.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Option<Url>,
    timeout: Duration,
}

impl HttpPaymentGateway {
    pub fn new(client: reqwest::Client, base_url: Option<Url>, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    fn charge_url(&self) -> Result<Url, String> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| "payment service is not configured".to_string())?;
        // Join relative to the base so a path prefix on the service URL is kept.
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join("api/stripe/charge-payment")
            .map_err(|e| format!("invalid payment service URL: {}", e))
    }

    async fn post_charge(&self, url: Url, request: &ChargeRequest) -> ChargeOutcome {
        let response = match self.client.post(url).json(request).send().await {
            Ok(res) => res,
            Err(e) => {
                return ChargeOutcome::Failed {
                    reason: format!("payment service unreachable: {}", e),
                };
            }
        };

        let status = response.status();
        let body = response.json::<ChargeResponse>().await.ok();

        if !status.is_success() {
            let detail = body
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("status {}", status));
            return ChargeOutcome::Failed { reason: detail };
        }

        match body {
            Some(ChargeResponse {
                success: Some(false),
                error,
                ..
            }) => ChargeOutcome::Failed {
                reason: error.unwrap_or_else(|| "charge declined".to_string()),
            },
            Some(b) => ChargeOutcome::Charged {
                payment_intent_id: b.payment_intent_id,
            },
            None => ChargeOutcome::Charged {
                payment_intent_id: None,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> ChargeOutcome {
        let url = match self.charge_url() {
            Ok(url) => url,
            Err(reason) => return ChargeOutcome::Failed { reason },
        };

        tracing::info!(
            "Charging trip {} (user {}) amount {:.2}",
            request.trip_id,
            request.user_id,
            request.amount
        );

        match tokio::time::timeout(self.timeout, self.post_charge(url, request)).await {
            Ok(outcome) => outcome,
            Err(_) => ChargeOutcome::Failed {
                reason: format!(
                    "payment service timed out after {}s",
                    self.timeout.as_secs_f32()
                ),
            },
        }
    }
}
