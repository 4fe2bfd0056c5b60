use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use time::Date;
use tracing::{error, info};

use crate::domain::account::UserLifecycleEntry;
use crate::infra::store::LifecycleStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub marked_for_deletion: u64,
    pub deleted: u64,
}

/// Account expiry and account-user removal once their account is gone.
#[derive(Clone)]
pub struct UserLifecycleService {
    store: Arc<dyn LifecycleStore>,
    grace_days: i32,
}

impl UserLifecycleService {
    pub fn new(store: Arc<dyn LifecycleStore>, grace_days: i32) -> Self {
        Self { store, grace_days }
    }

    pub async fn expire_overdue_accounts(&self, today: Date) -> Result<u64> {
        let expired = self.store.expire_overdue_accounts(today).await?;
        if expired > 0 {
            info!(expired, "accounts marked expired");
        }
        Ok(expired)
    }

    /// Schedules users of dead accounts for deletion, then deletes the ones
    /// whose grace period is over. A failure to schedule does not stop the
    /// deletion of users scheduled earlier.
    pub async fn cleanup(&self) -> Result<CleanupSummary> {
        let marked_for_deletion = match self.store.mark_users_pending_deletion(self.grace_days).await {
            Ok(count) => count,
            Err(err) => {
                error!(error = ?err, "failed to mark users pending deletion");
                0
            }
        };

        let deleted = self.store.delete_scheduled_users().await?;

        info!(marked_for_deletion, deleted, "user cleanup finished");
        Ok(CleanupSummary {
            marked_for_deletion,
            deleted,
        })
    }

    pub async fn list(&self) -> Result<Vec<UserLifecycleEntry>> {
        self.store.list_user_lifecycle().await
    }
}
