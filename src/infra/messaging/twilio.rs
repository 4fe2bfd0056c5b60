use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Messenger, OutboundMessage, SendReceipt, TransportError};

const PROVIDER: &str = "twilio";

/// Twilio's WhatsApp channel. Free text only; templates are a WhatsApp
/// Business API feature.
#[derive(Clone)]
pub struct TwilioClient {
    http: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioClient {
    pub fn new(
        http: Client,
        base_url: String,
        account_sid: String,
        auth_token: String,
        from_number: &str,
    ) -> Self {
        let digits: String = from_number.chars().filter(char::is_ascii_digit).collect();
        Self {
            http,
            base_url,
            account_sid,
            auth_token,
            from: format!("whatsapp:+{}", digits),
        }
    }
}

#[async_trait]
impl Messenger for TwilioClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(
        &self,
        phone: &str,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, TransportError> {
        let body = match message {
            OutboundMessage::Text { body } => body,
            OutboundMessage::Template { .. } => {
                return Err(TransportError::Unsupported(
                    "template messages are only supported by the WhatsApp Business provider",
                ))
            }
        };

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let to = format!("whatsapp:+{}", phone);
        let form = [("From", self.from.as_str()), ("To", to.as_str()), ("Body", body.as_str())];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            warn!(status = %status, "twilio rejected message");
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with status {}", status));
            return Err(TransportError::Api {
                provider: PROVIDER,
                message,
            });
        }

        let message_id = payload.get("sid").and_then(Value::as_str).map(str::to_string);
        debug!(message_id = ?message_id, "twilio message accepted");

        Ok(SendReceipt { message_id })
    }
}
