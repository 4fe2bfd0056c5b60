use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::notification::{
    NotificationCandidate, NotificationKey, NotificationStatus, NotificationType,
};

/// Which logged outcomes suppress another attempt at the same milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Any logged record, sent or failed, suppresses the milestone.
    #[default]
    Never,
    /// Only a `sent` record suppresses it; failures are retried next scan.
    Failed,
}

/// Account ids to look up, in candidate order and without repeats.
pub fn lookup_ids(candidates: &[NotificationCandidate]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|candidate| candidate.account_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Drops candidates whose (account, milestone) pair already has a
/// suppressing record.
pub fn filter_already_notified(
    candidates: Vec<NotificationCandidate>,
    records: &[NotificationKey],
    policy: RetryPolicy,
) -> Vec<NotificationCandidate> {
    let suppressed: HashSet<(Uuid, NotificationType)> = records
        .iter()
        .filter(|record| match policy {
            RetryPolicy::Never => true,
            RetryPolicy::Failed => record.status == NotificationStatus::Sent,
        })
        .map(|record| (record.account_id, record.notification_type))
        .collect();

    candidates
        .into_iter()
        .filter(|candidate| !suppressed.contains(&(candidate.account_id, candidate.notification_type)))
        .collect()
}
