//! Decides which accounts are due a reminder today.

use time::{Date, OffsetDateTime, UtcOffset};

use crate::app::template;
use crate::domain::account::{AccountStatus, ScanAccount};
use crate::domain::notification::{NotificationCandidate, NotificationType, Recipient};

const FALLBACK_SERVICE_NAME: &str = "Servicio";

/// Which milestones the scanner may emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Milestones {
    /// Also emit the 5 and 3 day reminders.
    pub early: bool,
}

/// The calendar date "now" falls on at the given offset.
pub fn today_at(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

/// Whole calendar days from `today` to `expiration`. Negative once expired.
pub fn days_until_expiration(expiration: Date, today: Date) -> i64 {
    (expiration - today).whole_days()
}

/// Maps an account to at most one milestone, most urgent first.
pub fn classify(days_left: i64, status: AccountStatus, milestones: Milestones) -> Option<NotificationType> {
    if days_left <= 0 && status == AccountStatus::Expired {
        return Some(NotificationType::Expired);
    }
    match days_left {
        1 => Some(NotificationType::OneDay),
        3 if milestones.early => Some(NotificationType::ThreeDays),
        5 if milestones.early => Some(NotificationType::FiveDays),
        _ => None,
    }
}

/// Builds one candidate per account that has a due milestone and at least one
/// notifiable user. Cancelled accounts never produce a candidate.
pub fn scan(accounts: &[ScanAccount], today: Date, milestones: Milestones) -> Vec<NotificationCandidate> {
    accounts
        .iter()
        .filter(|account| account.status != AccountStatus::Cancelled)
        .filter_map(|account| candidate_for(account, today, milestones))
        .collect()
}

fn candidate_for(account: &ScanAccount, today: Date, milestones: Milestones) -> Option<NotificationCandidate> {
    let days_left = days_until_expiration(account.expiration_date, today);
    let notification_type = classify(days_left, account.status, milestones)?;

    let recipients: Vec<Recipient> = account
        .users
        .iter()
        .filter(|user| user.is_notifiable())
        .filter_map(|user| {
            user.phone.as_ref().map(|phone| Recipient {
                name: user.name.clone(),
                phone: phone.trim().to_string(),
            })
        })
        .collect();
    if recipients.is_empty() {
        return None;
    }

    let service_name = account
        .service_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SERVICE_NAME.to_string());
    let message = template::account_message(notification_type, &service_name, days_left);

    Some(NotificationCandidate {
        account_id: account.id,
        service_name,
        expiration_date: account.expiration_date,
        days_left,
        notification_type,
        recipients,
        message,
    })
}
