use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Expired,
    Cancelled,
}

impl AccountStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    PendingDeletion,
}

impl UserStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "pending_deletion" => Some(Self::PendingDeletion),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::PendingDeletion => "pending_deletion",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUser {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub status: UserStatus,
}

impl AccountUser {
    /// Active users with a non-blank phone are the only reminder targets.
    pub fn is_notifiable(&self) -> bool {
        self.status == UserStatus::Active
            && self
                .phone
                .as_deref()
                .is_some_and(|phone| !phone.trim().is_empty())
    }
}

/// An account as loaded for a reminder scan, with its service name and users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanAccount {
    pub id: Uuid,
    #[serde(with = "super::iso_date")]
    pub expiration_date: Date,
    pub status: AccountStatus,
    pub service_name: Option<String>,
    pub users: Vec<AccountUser>,
}

/// A user that left the `active` state, as shown by the cleanup screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLifecycleEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_name: String,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_deletion_at: Option<OffsetDateTime>,
}
