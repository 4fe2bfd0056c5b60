pub mod messaging;

use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use time::UtcOffset;

pub use messaging::MessagingConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub admin_token: Option<String>,
    /// `None` when no WhatsApp provider credentials are present. The API still
    /// starts so read-only routes keep working; sending fails fast.
    pub messaging: Option<MessagingConfig>,
    pub reminders: ReminderConfig,
    pub user_deletion_grace_days: i64,
}

/// How reminders are delivered to the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Pre-approved template with positional parameters.
    Template,
    /// Free text with `{userName}` substituted per recipient.
    Text,
}

impl FromStr for DeliveryMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(Self::Template),
            "text" => Ok(Self::Text),
            other => Err(anyhow!("unknown delivery mode: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemplateNames {
    pub one_day: String,
    pub expired: String,
    pub early: String,
    pub language: String,
}

#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub delivery_mode: DeliveryMode,
    /// When set, only `sent` records suppress a reminder and failures are
    /// attempted again on the next scan.
    pub retry_failed: bool,
    /// Re-enables the 5 and 3 day reminders.
    pub early_milestones: bool,
    pub max_concurrency: usize,
    pub utc_offset: UtcOffset,
    pub interval_seconds: u64,
    pub templates: TemplateNames,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Template,
            retry_failed: false,
            early_milestones: false,
            max_concurrency: 8,
            utc_offset: UtcOffset::UTC,
            interval_seconds: 3600,
            templates: TemplateNames {
                one_day: "recordatorio_vencimiento".to_string(),
                expired: "cuenta_vencida".to_string(),
                early: "recordatorio_renovacion".to_string(),
                language: "es".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so it can be resolved
    /// from something other than the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let http_addr = env.or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env.or("APP_MODE", "api");

        let offset_minutes: i32 = env.or_parse("BUSINESS_UTC_OFFSET_MINUTES", "0")?;
        let offset_seconds = offset_minutes
            .checked_mul(60)
            .ok_or_else(|| anyhow!("invalid BUSINESS_UTC_OFFSET_MINUTES: out of range"))?;
        let utc_offset = UtcOffset::from_whole_seconds(offset_seconds)
            .map_err(|err| anyhow!("invalid BUSINESS_UTC_OFFSET_MINUTES: {}", err))?;

        let max_concurrency: usize = env.or_parse("REMINDER_MAX_CONCURRENCY", "8")?;
        if max_concurrency == 0 {
            return Err(anyhow!("invalid REMINDER_MAX_CONCURRENCY: must be at least 1"));
        }

        let interval_seconds: u64 = env.or_parse("REMINDER_INTERVAL_SECONDS", "3600")?;
        if interval_seconds == 0 {
            return Err(anyhow!("invalid REMINDER_INTERVAL_SECONDS: must be at least 1"));
        }

        let messaging = MessagingConfig::from_lookup(|key| env.get(key))?;

        // Twilio only carries free text, so it changes the default mode and
        // cannot be combined with templates.
        let twilio = matches!(messaging, Some(MessagingConfig::Twilio { .. }));
        let default_mode = if twilio { "text" } else { "template" };
        let delivery_mode: DeliveryMode = env.or_parse("REMINDER_DELIVERY_MODE", default_mode)?;
        if twilio && delivery_mode == DeliveryMode::Template {
            return Err(anyhow!(
                "invalid REMINDER_DELIVERY_MODE: template delivery needs the WhatsApp Business provider, \
                 Twilio only supports text"
            ));
        }

        let defaults = ReminderConfig::default();
        let reminders = ReminderConfig {
            delivery_mode,
            retry_failed: env.or_parse("REMINDER_RETRY_FAILED", "false")?,
            early_milestones: env.or_parse("REMINDER_EARLY_MILESTONES", "false")?,
            max_concurrency,
            utc_offset,
            interval_seconds,
            templates: TemplateNames {
                one_day: env.or("WHATSAPP_TEMPLATE_ONE_DAY", &defaults.templates.one_day),
                expired: env.or("WHATSAPP_TEMPLATE_EXPIRED", &defaults.templates.expired),
                early: env.or("WHATSAPP_TEMPLATE_EARLY", &defaults.templates.early),
                language: env.or("WHATSAPP_TEMPLATE_LANGUAGE", &defaults.templates.language),
            },
        };

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env.or_err("DATABASE_URL")?,
            db_max_connections: env.or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env.or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env.or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env.or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            admin_token: env.get("ADMIN_TOKEN"),
            messaging,
            reminders,
            user_deletion_grace_days: env.or_parse("USER_DELETION_GRACE_DAYS", "7")?,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn or_err(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow!("missing required env var: {}", key))
    }

    fn or_parse<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.or(key, default)
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {}: {}", key, err))
    }
}
