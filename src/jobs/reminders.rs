use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::app::notifications::{NotificationService, NotifyError};
use crate::app::users::{CleanupSummary, UserLifecycleService};
use crate::domain::notification::SendReport;

const ERROR_BACKOFF_SECONDS: u64 = 60;

#[derive(Debug, Default)]
pub struct PassSummary {
    pub accounts_expired: u64,
    pub report: SendReport,
    pub cleanup: CleanupSummary,
}

/// One scheduled pass: flip overdue accounts to expired, send what is due,
/// then clean up users of dead accounts.
///
/// Only a missing messenger or a failed scan aborts the pass; expiry and
/// cleanup problems are logged and skipped.
pub async fn run_once(
    notifications: &NotificationService,
    lifecycle: &UserLifecycleService,
) -> Result<PassSummary, NotifyError> {
    let today = notifications.today();

    let accounts_expired = match lifecycle.expire_overdue_accounts(today).await {
        Ok(count) => count,
        Err(err) => {
            warn!(error = ?err, "failed to expire overdue accounts");
            0
        }
    };

    let report = notifications.send_pending(today).await?;

    let cleanup = match lifecycle.cleanup().await {
        Ok(summary) => summary,
        Err(err) => {
            warn!(error = ?err, "user cleanup failed");
            CleanupSummary::default()
        }
    };

    info!(
        %today,
        accounts_expired,
        reminders = report.total_processed,
        users_deleted = cleanup.deleted,
        "reminder pass finished"
    );

    Ok(PassSummary {
        accounts_expired,
        report,
        cleanup,
    })
}

/// Runs a pass every `interval_seconds` until the task is dropped.
pub async fn run(
    notifications: NotificationService,
    lifecycle: UserLifecycleService,
    interval_seconds: u64,
) -> Result<()> {
    info!(interval_seconds, "reminder worker started");
    loop {
        let wait = match run_once(&notifications, &lifecycle).await {
            Ok(_) => interval_seconds,
            Err(NotifyError::NotConfigured) => {
                return Err(NotifyError::NotConfigured.into());
            }
            Err(err) => {
                error!(error = ?err, "reminder pass failed, backing off");
                ERROR_BACKOFF_SECONDS.min(interval_seconds)
            }
        };
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }
}
