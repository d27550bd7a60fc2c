//! Outbound SMS transport.
//!
//! The engine only needs `send(to, body) -> provider message id`. The
//! HTTP implementation posts JSON to the provider with a bearer token;
//! provider-specific payload shapes beyond that are external glue.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::TransportError;

/// Provider acknowledgement for one accepted send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub provider_message_id: String,
}

/// Send capability consumed by the sweep scheduler.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    /// Dispatch one message. `to` must already be E.164.
    async fn send(&self, to: &str, body: &str) -> Result<SendReceipt, TransportError>;
}

/// JSON response shape from the provider's send endpoint.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    message_id: String,
}

/// HTTP SMS provider client.
pub struct HttpSmsTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: SecretString,
    from_number: String,
    timeout: Duration,
}

impl HttpSmsTransport {
    pub fn new(provider: ProviderConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: provider.base_url,
            auth_token: provider.auth_token,
            from_number: provider.from_number,
            timeout,
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    async fn send(&self, to: &str, body: &str) -> Result<SendReceipt, TransportError> {
        let payload = serde_json::json!({
            "from": self.from_number,
            "to": to,
            "body": body,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(self.auth_token.expose_secret())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        to: to.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed {
                to: to.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let ack: ProviderResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Http(format!("Unexpected provider response: {e}")))?;

        debug!(to = %to, provider_message_id = %ack.message_id, "SMS accepted by provider");

        Ok(SendReceipt {
            provider_message_id: ack.message_id,
        })
    }
}
