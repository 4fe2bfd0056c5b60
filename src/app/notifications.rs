use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::app::dedup::{self, RetryPolicy};
use crate::app::dispatcher::{AccountDispatch, Dispatcher};
use crate::app::recorder::record_outcome;
use crate::app::scanner::{self, Milestones};
use crate::config::ReminderConfig;
use crate::domain::notification::{NotificationCandidate, NotificationHistoryEntry, SendReport};
use crate::infra::messaging::{normalize_phone, Messenger, OutboundMessage, SendReceipt, TransportError};
use crate::infra::store::NotificationStore;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(
        "no WhatsApp provider configured; set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and \
         TWILIO_WHATSAPP_NUMBER or WHATSAPP_BUSINESS_TOKEN and WHATSAPP_BUSINESS_PHONE_NUMBER_ID"
    )]
    NotConfigured,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Runs the reminder pipeline: scan, drop already-logged milestones,
/// dispatch, log the outcome.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    messenger: Option<Arc<dyn Messenger>>,
    settings: ReminderConfig,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        messenger: Option<Arc<dyn Messenger>>,
        settings: ReminderConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            settings,
        }
    }

    /// Today's date in the business time zone.
    pub fn today(&self) -> Date {
        scanner::today_at(self.settings.utc_offset)
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.store.ping().await
    }

    fn retry_policy(&self) -> RetryPolicy {
        if self.settings.retry_failed {
            RetryPolicy::Failed
        } else {
            RetryPolicy::Never
        }
    }

    /// Candidates that would be sent right now. Read-only.
    pub async fn check_pending(&self, today: Date) -> anyhow::Result<Vec<NotificationCandidate>> {
        let accounts = self.store.list_accounts_needing_scan().await?;
        let milestones = Milestones {
            early: self.settings.early_milestones,
        };
        let candidates = scanner::scan(&accounts, today, milestones);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let account_ids = dedup::lookup_ids(&candidates);
        let records = self.store.list_notification_records(&account_ids).await?;

        Ok(dedup::filter_already_notified(
            candidates,
            &records,
            self.retry_policy(),
        ))
    }

    /// Sends every pending reminder and logs one record per account.
    ///
    /// Fails before touching the store when no messenger is configured.
    pub async fn send_pending(&self, today: Date) -> Result<SendReport, NotifyError> {
        let messenger = self.messenger.clone().ok_or(NotifyError::NotConfigured)?;
        let dispatcher = Dispatcher::new(
            messenger,
            self.settings.delivery_mode,
            self.settings.templates.clone(),
        );

        let candidates = self.check_pending(today).await?;
        if candidates.is_empty() {
            info!("no reminders pending");
            return Ok(SendReport::default());
        }

        let dispatches: Vec<AccountDispatch> = stream::iter(candidates)
            .map(|candidate| {
                let store = Arc::clone(&self.store);
                let dispatcher = dispatcher.clone();
                async move {
                    let dispatch = dispatcher.dispatch(&candidate).await;
                    record_outcome(store.as_ref(), &dispatch).await;
                    dispatch
                }
            })
            .buffered(self.settings.max_concurrency)
            .collect()
            .await;

        let accounts_processed = dispatches.len();
        let results: Vec<_> = dispatches
            .into_iter()
            .flat_map(|dispatch| dispatch.results)
            .collect();
        let failed = results
            .iter()
            .filter(|result| result.error.is_some())
            .count();

        info!(
            accounts = accounts_processed,
            sends = results.len(),
            failed,
            "reminder run finished"
        );

        Ok(SendReport {
            total_processed: results.len(),
            accounts_processed,
            results,
        })
    }

    pub async fn history(&self, account_id: Option<Uuid>) -> anyhow::Result<Vec<NotificationHistoryEntry>> {
        self.store.list_notification_history(account_id).await
    }

    /// One-off message outside the reminder pipeline, nothing is logged.
    pub async fn send_manual(
        &self,
        phone: &str,
        message: OutboundMessage,
    ) -> Result<SendReceipt, NotifyError> {
        let messenger = self.messenger.as_ref().ok_or(NotifyError::NotConfigured)?;
        let phone = normalize_phone(phone)?;
        Ok(messenger.send(&phone, &message).await?)
    }
}
