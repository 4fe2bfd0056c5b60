//! Storage seams for the reminder pipeline and the user cleanup job.
//!
//! Services only see [`NotificationStore`] and [`LifecycleStore`]; [`PgStore`]
//! is the Postgres implementation used in production.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::Date;
use uuid::Uuid;

use crate::domain::account::{AccountStatus, AccountUser, ScanAccount, UserLifecycleEntry, UserStatus};
use crate::domain::notification::{
    NewNotificationRecord, NotificationHistoryEntry, NotificationKey, NotificationStatus,
    NotificationType,
};
use crate::infra::db::Db;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// A `sent` record for the same account and milestone already exists.
    Duplicate,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Accounts in `active` or `expired` status with their users.
    async fn list_accounts_needing_scan(&self) -> Result<Vec<ScanAccount>>;

    async fn list_notification_records(&self, account_ids: &[Uuid]) -> Result<Vec<NotificationKey>>;

    async fn insert_notification_record(&self, record: &NewNotificationRecord)
        -> Result<RecordOutcome>;

    /// Newest first.
    async fn list_notification_history(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<Vec<NotificationHistoryEntry>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Flips `active` accounts whose expiration date is before `today` to
    /// `expired`.
    async fn expire_overdue_accounts(&self, today: Date) -> Result<u64>;

    /// Schedules active users of expired or cancelled accounts for deletion
    /// `grace_days` from now.
    async fn mark_users_pending_deletion(&self, grace_days: i32) -> Result<u64>;

    async fn delete_scheduled_users(&self) -> Result<u64>;

    async fn list_user_lifecycle(&self) -> Result<Vec<UserLifecycleEntry>>;
}

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    async fn list_accounts_needing_scan(&self) -> Result<Vec<ScanAccount>> {
        let account_rows = sqlx::query(
            "SELECT a.id, a.expiration_date, a.status, s.name AS service_name \
             FROM accounts a \
             LEFT JOIN streaming_services s ON s.id = a.service_id \
             WHERE a.status IN ('active', 'expired') \
             ORDER BY a.expiration_date, a.id",
        )
        .fetch_all(self.db.pool())
        .await?;

        let account_ids: Vec<Uuid> = account_rows.iter().map(|row| row.get("id")).collect();
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let user_rows = sqlx::query(
            "SELECT id, account_id, user_name, user_phone, status \
             FROM account_users \
             WHERE account_id = ANY($1) \
             ORDER BY created_at, id",
        )
        .bind(account_ids.as_slice())
        .fetch_all(self.db.pool())
        .await?;

        let mut users_by_account: HashMap<Uuid, Vec<AccountUser>> = HashMap::new();
        for row in user_rows {
            let status: String = row.get("status");
            let user = AccountUser {
                id: row.get("id"),
                name: row.get("user_name"),
                phone: row.get("user_phone"),
                status: UserStatus::from_db(&status)
                    .ok_or_else(|| anyhow!("unknown user status: {}", status))?,
            };
            users_by_account
                .entry(row.get("account_id"))
                .or_default()
                .push(user);
        }

        let mut accounts = Vec::with_capacity(account_rows.len());
        for row in account_rows {
            let id: Uuid = row.get("id");
            let status: String = row.get("status");
            accounts.push(ScanAccount {
                id,
                expiration_date: row.get("expiration_date"),
                status: AccountStatus::from_db(&status)
                    .ok_or_else(|| anyhow!("unknown account status: {}", status))?,
                service_name: row.get("service_name"),
                users: users_by_account.remove(&id).unwrap_or_default(),
            });
        }

        Ok(accounts)
    }

    async fn list_notification_records(&self, account_ids: &[Uuid]) -> Result<Vec<NotificationKey>> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT account_id, notification_type, status \
             FROM notifications \
             WHERE account_id = ANY($1)",
        )
        .bind(account_ids)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let (notification_type, status) = decode_type_and_status(&row)?;
                Ok(NotificationKey {
                    account_id: row.get("account_id"),
                    notification_type,
                    status,
                })
            })
            .collect()
    }

    async fn insert_notification_record(
        &self,
        record: &NewNotificationRecord,
    ) -> Result<RecordOutcome> {
        let result = sqlx::query(
            "INSERT INTO notifications (account_id, notification_type, status, error_message) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(record.account_id)
        .bind(record.notification_type.as_db())
        .bind(record.status.as_db())
        .bind(record.error_message.as_deref())
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(RecordOutcome::Inserted),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Ok(RecordOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_notification_history(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<Vec<NotificationHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT n.id, n.account_id, n.notification_type, n.status, n.error_message, n.sent_at, \
                    s.name AS service_name, c.name AS customer_name, c.phone AS customer_phone \
             FROM notifications n \
             JOIN accounts a ON a.id = n.account_id \
             LEFT JOIN streaming_services s ON s.id = a.service_id \
             LEFT JOIN customers c ON c.id = a.customer_id \
             WHERE ($1::uuid IS NULL OR n.account_id = $1) \
             ORDER BY n.sent_at DESC, n.id DESC",
        )
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let (notification_type, status) = decode_type_and_status(&row)?;
                Ok(NotificationHistoryEntry {
                    id: row.get("id"),
                    account_id: row.get("account_id"),
                    notification_type,
                    status,
                    error_message: row.get("error_message"),
                    sent_at: row.get("sent_at"),
                    service_name: row.get("service_name"),
                    customer_name: row.get("customer_name"),
                    customer_phone: row.get("customer_phone"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl LifecycleStore for PgStore {
    async fn expire_overdue_accounts(&self, today: Date) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE accounts \
             SET status = 'expired', updated_at = now() \
             WHERE status = 'active' AND expiration_date < $1",
        )
        .bind(today)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_users_pending_deletion(&self, grace_days: i32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE account_users u \
             SET status = 'pending_deletion', \
                 scheduled_deletion_at = now() + make_interval(days => $1) \
             FROM accounts a \
             WHERE u.account_id = a.id \
               AND u.status = 'active' \
               AND a.status IN ('expired', 'cancelled')",
        )
        .bind(grace_days)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_scheduled_users(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM account_users \
             WHERE status = 'pending_deletion' AND scheduled_deletion_at <= now()",
        )
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_user_lifecycle(&self) -> Result<Vec<UserLifecycleEntry>> {
        let rows = sqlx::query(
            "SELECT id, account_id, user_name, status, scheduled_deletion_at \
             FROM account_users \
             WHERE status <> 'active' \
             ORDER BY scheduled_deletion_at NULLS LAST, user_name",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(UserLifecycleEntry {
                    id: row.get("id"),
                    account_id: row.get("account_id"),
                    user_name: row.get("user_name"),
                    status: UserStatus::from_db(&status)
                        .ok_or_else(|| anyhow!("unknown user status: {}", status))?,
                    scheduled_deletion_at: row.get("scheduled_deletion_at"),
                })
            })
            .collect()
    }
}

fn decode_type_and_status(row: &PgRow) -> Result<(NotificationType, NotificationStatus)> {
    let notification_type: String = row.get("notification_type");
    let status: String = row.get("status");
    Ok((
        NotificationType::from_db(&notification_type)
            .ok_or_else(|| anyhow!("unknown notification type: {}", notification_type))?,
        NotificationStatus::from_db(&status)
            .ok_or_else(|| anyhow!("unknown notification status: {}", status))?,
    ))
}
