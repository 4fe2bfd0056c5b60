//! WhatsApp transports.
//!
//! Every provider implements [`Messenger`]. The concrete client is picked once
//! from [`MessagingConfig`] at startup and handed to the services as a trait
//! object, so nothing downstream inspects which provider it is talking to.

mod twilio;
mod whatsapp_business;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::MessagingConfig;

pub use twilio::TwilioClient;
pub use whatsapp_business::WhatsAppBusinessClient;

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;
const REQUEST_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    Template {
        name: String,
        language: String,
        params: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("{0}")]
    Unsupported(&'static str),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Sends one message. `phone` must already be normalized with
    /// [`normalize_phone`].
    async fn send(
        &self,
        phone: &str,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, TransportError>;
}

pub fn build_messenger(config: &MessagingConfig) -> Result<Arc<dyn Messenger>, TransportError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
        .build()?;

    let messenger: Arc<dyn Messenger> = match config {
        MessagingConfig::Twilio {
            account_sid,
            auth_token,
            from_number,
            base_url,
        } => Arc::new(TwilioClient::new(
            http,
            base_url.clone(),
            account_sid.clone(),
            auth_token.clone(),
            from_number,
        )),
        MessagingConfig::WhatsAppBusiness {
            token,
            phone_number_id,
            base_url,
        } => Arc::new(WhatsAppBusinessClient::new(
            http,
            base_url.clone(),
            token.clone(),
            phone_number_id.clone(),
        )),
    };

    Ok(messenger)
}

/// Strips everything but digits. The result must hold a country code plus
/// subscriber number, i.e. between 10 and 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, TransportError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(TransportError::InvalidPhone(raw.to_string()));
    }
    Ok(digits)
}
