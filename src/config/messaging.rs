use anyhow::{anyhow, Result};
use url::Url;

pub const DEFAULT_WHATSAPP_API_BASE_URL: &str = "https://graph.facebook.com/v21.0";
pub const DEFAULT_TWILIO_API_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Credentials for the WhatsApp transport selected at startup.
#[derive(Clone)]
pub enum MessagingConfig {
    Twilio {
        account_sid: String,
        auth_token: String,
        from_number: String,
        base_url: String,
    },
    WhatsAppBusiness {
        token: String,
        phone_number_id: String,
        base_url: String,
    },
}

impl std::fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Twilio {
                account_sid,
                from_number,
                base_url,
                ..
            } => f
                .debug_struct("Twilio")
                .field("account_sid", account_sid)
                .field("from_number", from_number)
                .field("base_url", base_url)
                .finish_non_exhaustive(),
            Self::WhatsAppBusiness {
                phone_number_id,
                base_url,
                ..
            } => f
                .debug_struct("WhatsAppBusiness")
                .field("phone_number_id", phone_number_id)
                .field("base_url", base_url)
                .finish_non_exhaustive(),
        }
    }
}

impl MessagingConfig {
    /// Twilio wins when both providers are fully configured. A partially
    /// configured provider is ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (Some(account_sid), Some(auth_token), Some(from_number)) = (
            lookup("TWILIO_ACCOUNT_SID"),
            lookup("TWILIO_AUTH_TOKEN"),
            lookup("TWILIO_WHATSAPP_NUMBER"),
        ) {
            let base_url = lookup("TWILIO_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE_URL.to_string());
            return Ok(Some(Self::Twilio {
                account_sid,
                auth_token,
                from_number,
                base_url: validate_base_url("TWILIO_API_BASE_URL", base_url)?,
            }));
        }

        if let (Some(token), Some(phone_number_id)) = (
            lookup("WHATSAPP_BUSINESS_TOKEN"),
            lookup("WHATSAPP_BUSINESS_PHONE_NUMBER_ID"),
        ) {
            let base_url = lookup("WHATSAPP_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_API_BASE_URL.to_string());
            return Ok(Some(Self::WhatsAppBusiness {
                token,
                phone_number_id,
                base_url: validate_base_url("WHATSAPP_API_BASE_URL", base_url)?,
            }));
        }

        Ok(None)
    }
}

fn validate_base_url(key: &str, value: String) -> Result<String> {
    let parsed = Url::parse(&value).map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!("invalid {}: unsupported scheme {}", key, parsed.scheme()));
    }
    Ok(value.trim_end_matches('/').to_string())
}
