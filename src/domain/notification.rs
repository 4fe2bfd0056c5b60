use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Reminder milestone. Wire and database names are `5_days`, `3_days`,
/// `1_day` and `expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "5_days")]
    FiveDays,
    #[serde(rename = "3_days")]
    ThreeDays,
    #[serde(rename = "1_day")]
    OneDay,
    #[serde(rename = "expired")]
    Expired,
}

impl NotificationType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "5_days" => Some(Self::FiveDays),
            "3_days" => Some(Self::ThreeDays),
            "1_day" => Some(Self::OneDay),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::FiveDays => "5_days",
            Self::ThreeDays => "3_days",
            Self::OneDay => "1_day",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// The part of a logged record the dedup filter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationKey {
    pub account_id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotificationRecord {
    pub account_id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHistoryEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub service_name: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

/// An account that is due a reminder in the current scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCandidate {
    pub account_id: Uuid,
    pub service_name: String,
    #[serde(with = "super::iso_date")]
    pub expiration_date: Date,
    pub days_left: i64,
    pub notification_type: NotificationType,
    #[serde(rename = "users")]
    pub recipients: Vec<Recipient>,
    /// Text with the service already filled in and `{userName}` left for
    /// each recipient.
    pub message: String,
}

/// Outcome of one send to one account user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub account_id: Uuid,
    pub user_name: String,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    /// Number of per-user send attempts.
    pub total_processed: usize,
    pub accounts_processed: usize,
    pub results: Vec<DeliveryResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_type_serializes_with_db_names() {
        assert_eq!(serde_json::to_value(NotificationType::OneDay).unwrap(), "1_day");
        assert_eq!(serde_json::to_value(NotificationType::Expired).unwrap(), "expired");
        assert_eq!(NotificationType::from_db("3_days"), Some(NotificationType::ThreeDays));
        assert_eq!(NotificationType::from_db("2_days"), None);
    }

    #[test]
    fn delivery_result_omits_empty_fields() {
        let result = DeliveryResult {
            account_id: Uuid::nil(),
            user_name: "Ana".to_string(),
            status: NotificationStatus::Sent,
            message_id: None,
            error: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["userName"], "Ana");
        assert_eq!(value["status"], "sent");
        assert!(value.get("error").is_none());
        assert!(value.get("messageId").is_none());
    }
}
