use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Messenger, OutboundMessage, SendReceipt, TransportError};

const PROVIDER: &str = "whatsapp-business";

/// Client for the WhatsApp Business Cloud API (`/{phone_number_id}/messages`).
#[derive(Clone)]
pub struct WhatsAppBusinessClient {
    http: Client,
    base_url: String,
    token: String,
    phone_number_id: String,
}

impl WhatsAppBusinessClient {
    pub fn new(http: Client, base_url: String, token: String, phone_number_id: String) -> Self {
        Self {
            http,
            base_url,
            token,
            phone_number_id,
        }
    }

    fn payload(phone: &str, message: &OutboundMessage) -> Value {
        match message {
            OutboundMessage::Text { body } => json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": phone,
                "type": "text",
                "text": { "preview_url": false, "body": body },
            }),
            OutboundMessage::Template {
                name,
                language,
                params,
            } => {
                let parameters: Vec<Value> = params
                    .iter()
                    .map(|param| json!({ "type": "text", "text": param }))
                    .collect();
                json!({
                    "messaging_product": "whatsapp",
                    "to": phone,
                    "type": "template",
                    "template": {
                        "name": name,
                        "language": { "code": language },
                        "components": [
                            { "type": "body", "parameters": parameters }
                        ],
                    },
                })
            }
        }
    }
}

#[async_trait]
impl Messenger for WhatsAppBusinessClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(
        &self,
        phone: &str,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, TransportError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let payload = Self::payload(phone, message);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if let Some(error) = body.get("error") {
            warn!(status = %status, error = %error, "whatsapp business api rejected message");
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(TransportError::Api {
                provider: PROVIDER,
                message,
            });
        }

        if !status.is_success() {
            return Err(TransportError::Api {
                provider: PROVIDER,
                message: format!("request failed with status {}", status),
            });
        }

        let message_id = body["messages"][0]["id"].as_str().map(str::to_string);
        debug!(message_id = ?message_id, "whatsapp business message accepted");

        Ok(SendReceipt { message_id })
    }
}
