use tracing::{info, warn};

use crate::app::dispatcher::AccountDispatch;
use crate::domain::notification::NewNotificationRecord;
use crate::infra::store::{NotificationStore, RecordOutcome};

/// Logs the outcome of one dispatched candidate. A failed write is only
/// logged: the messages are already out, and with no record the next scan
/// simply picks the account up again.
pub async fn record_outcome(
    store: &dyn NotificationStore,
    dispatch: &AccountDispatch,
) -> Option<RecordOutcome> {
    let record = NewNotificationRecord {
        account_id: dispatch.account_id,
        notification_type: dispatch.notification_type,
        status: dispatch.status,
        error_message: dispatch.error_message.clone(),
    };

    match store.insert_notification_record(&record).await {
        Ok(RecordOutcome::Inserted) => Some(RecordOutcome::Inserted),
        Ok(RecordOutcome::Duplicate) => {
            info!(
                account_id = %dispatch.account_id,
                notification_type = dispatch.notification_type.as_db(),
                "reminder already logged as sent by another run"
            );
            Some(RecordOutcome::Duplicate)
        }
        Err(err) => {
            warn!(
                error = ?err,
                account_id = %dispatch.account_id,
                notification_type = dispatch.notification_type.as_db(),
                "failed to log reminder outcome"
            );
            None
        }
    }
}
