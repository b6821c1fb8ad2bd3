//! Push notifications through the Expo push HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub sound: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    #[serde(default)]
    data: Vec<PushTicket>,
}

#[derive(Debug, Deserialize)]
struct PushTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

#[derive(Clone)]
pub struct PushClient {
    client: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PushClient {
    pub fn new(client: reqwest::Client, endpoint: Url, access_token: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            access_token,
        }
    }

    /// Sends one message per token. Returns the tokens the provider reports as
    /// no longer registered so the caller can forget them.
    pub async fn send(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: Option<Value>,
    ) -> Result<Vec<String>, reqwest::Error> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|token| PushMessage {
                to: token.clone(),
                title: title.to_string(),
                body: body.to_string(),
                sound: "default",
                data: data.clone(),
            })
            .collect();

        let mut request = self.client.post(self.endpoint.clone()).json(&messages);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response: PushResponse = request.send().await?.error_for_status()?.json().await?;

        let mut stale = Vec::new();
        for (token, ticket) in tokens.iter().zip(response.data.iter()) {
            if ticket.status == "ok" {
                continue;
            }
            let unregistered = ticket
                .details
                .as_ref()
                .and_then(|d| d.get("error"))
                .and_then(|e| e.as_str())
                == Some("DeviceNotRegistered");
            if unregistered {
                stale.push(token.clone());
            } else {
                tracing::warn!(
                    "Push ticket error for token {}: {}",
                    token,
                    ticket.message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Ok(stale)
    }
}
