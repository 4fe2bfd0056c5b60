use std::sync::Arc;

use futures::future::join_all;
use time::macros::format_description;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::template;
use crate::config::{DeliveryMode, TemplateNames};
use crate::domain::notification::{
    DeliveryResult, NotificationCandidate, NotificationStatus, NotificationType, Recipient,
};
use crate::infra::messaging::{normalize_phone, Messenger, OutboundMessage};

/// Per-account result of one dispatch: every per-user outcome plus the
/// rolled-up status that gets logged.
#[derive(Debug, Clone)]
pub struct AccountDispatch {
    pub account_id: Uuid,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub results: Vec<DeliveryResult>,
}

#[derive(Clone)]
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    mode: DeliveryMode,
    templates: TemplateNames,
}

impl Dispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, mode: DeliveryMode, templates: TemplateNames) -> Self {
        Self {
            messenger,
            mode,
            templates,
        }
    }

    /// Sends to every recipient concurrently and waits for all of them. One
    /// failed send never prevents the others.
    pub async fn dispatch(&self, candidate: &NotificationCandidate) -> AccountDispatch {
        let sends = candidate
            .recipients
            .iter()
            .map(|recipient| self.send_one(candidate, recipient));
        let results = join_all(sends).await;

        rollup(candidate.account_id, candidate.notification_type, results)
    }

    pub fn outbound_for(&self, candidate: &NotificationCandidate, recipient: &Recipient) -> OutboundMessage {
        match self.mode {
            DeliveryMode::Text => OutboundMessage::Text {
                body: template::personalize(&candidate.message, &recipient.name),
            },
            DeliveryMode::Template => {
                let expiration = candidate
                    .expiration_date
                    .format(format_description!("[day]/[month]/[year]"))
                    .unwrap_or_else(|_| candidate.expiration_date.to_string());
                OutboundMessage::Template {
                    name: self.template_name(candidate.notification_type).to_string(),
                    language: self.templates.language.clone(),
                    params: vec![recipient.name.clone(), candidate.service_name.clone(), expiration],
                }
            }
        }
    }

    fn template_name(&self, notification_type: NotificationType) -> &str {
        match notification_type {
            NotificationType::OneDay => &self.templates.one_day,
            NotificationType::Expired => &self.templates.expired,
            NotificationType::FiveDays | NotificationType::ThreeDays => &self.templates.early,
        }
    }

    async fn send_one(&self, candidate: &NotificationCandidate, recipient: &Recipient) -> DeliveryResult {
        let outcome = match normalize_phone(&recipient.phone) {
            Ok(phone) => {
                let message = self.outbound_for(candidate, recipient);
                self.messenger.send(&phone, &message).await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(receipt) => {
                debug!(
                    account_id = %candidate.account_id,
                    user = %recipient.name,
                    message_id = ?receipt.message_id,
                    "reminder sent"
                );
                DeliveryResult {
                    account_id: candidate.account_id,
                    user_name: recipient.name.clone(),
                    status: NotificationStatus::Sent,
                    message_id: receipt.message_id,
                    error: None,
                }
            }
            Err(err) => {
                warn!(
                    account_id = %candidate.account_id,
                    user = %recipient.name,
                    error = %err,
                    "reminder send failed"
                );
                DeliveryResult {
                    account_id: candidate.account_id,
                    user_name: recipient.name.clone(),
                    status: NotificationStatus::Failed,
                    message_id: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// The account counts as `sent` only when every user send succeeded.
pub fn rollup(
    account_id: Uuid,
    notification_type: NotificationType,
    results: Vec<DeliveryResult>,
) -> AccountDispatch {
    let failures: Vec<&DeliveryResult> = results
        .iter()
        .filter(|result| result.status == NotificationStatus::Failed)
        .collect();

    let (status, error_message) = if failures.is_empty() {
        (NotificationStatus::Sent, None)
    } else if results.len() == 1 {
        (NotificationStatus::Failed, failures[0].error.clone())
    } else {
        let details: Vec<String> = failures
            .iter()
            .map(|result| {
                format!(
                    "{}: {}",
                    result.user_name,
                    result.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        (
            NotificationStatus::Failed,
            Some(format!(
                "{} of {} sends failed: {}",
                failures.len(),
                results.len(),
                details.join("; ")
            )),
        )
    };

    AccountDispatch {
        account_id,
        notification_type,
        status,
        error_message,
        results,
    }
}
