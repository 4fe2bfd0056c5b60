#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tower::ServiceExt;
use uuid::Uuid;

use renewals::app::notifications::NotificationService;
use renewals::app::scanner;
use renewals::app::users::UserLifecycleService;
use renewals::config::{DeliveryMode, ReminderConfig};
use renewals::domain::account::{
    AccountStatus, AccountUser, ScanAccount, UserLifecycleEntry, UserStatus,
};
use renewals::domain::notification::{
    NewNotificationRecord, NotificationHistoryEntry, NotificationKey, NotificationStatus,
    NotificationType,
};
use renewals::infra::messaging::{Messenger, OutboundMessage, SendReceipt, TransportError};
use renewals::infra::store::{LifecycleStore, NotificationStore, RecordOutcome};
use renewals::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token-12345";

pub fn today() -> Date {
    scanner::today_at(UtcOffset::UTC)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: AccountUser,
    pub scheduled_deletion_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub id: Uuid,
    pub expiration_date: Date,
    pub status: AccountStatus,
    pub service_name: Option<String>,
    pub users: Vec<StoredUser>,
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: Uuid,
    pub record: NewNotificationRecord,
    pub sent_at: OffsetDateTime,
}

#[derive(Default)]
struct StoreState {
    accounts: Vec<StoredAccount>,
    records: Vec<StoredRecord>,
    fail_scan: bool,
    fail_inserts: bool,
    record_lookups: usize,
}

/// Behaves like the Postgres store, including the one-`sent`-per-milestone
/// rule.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn add_account(
        &self,
        days_left: i64,
        status: AccountStatus,
        users: &[(&str, Option<&str>, UserStatus)],
    ) -> Uuid {
        let id = Uuid::new_v4();
        let account = StoredAccount {
            id,
            expiration_date: today() + Duration::days(days_left),
            status,
            service_name: Some("Netflix".to_string()),
            users: users
                .iter()
                .map(|(name, phone, status)| StoredUser {
                    user: AccountUser {
                        id: Uuid::new_v4(),
                        name: name.to_string(),
                        phone: phone.map(str::to_string),
                        status: *status,
                    },
                    scheduled_deletion_at: None,
                })
                .collect(),
        };
        self.state.lock().unwrap().accounts.push(account);
        id
    }

    pub fn add_record(&self, account_id: Uuid, notification_type: NotificationType, status: NotificationStatus) {
        self.state.lock().unwrap().records.push(StoredRecord {
            id: Uuid::new_v4(),
            record: NewNotificationRecord {
                account_id,
                notification_type,
                status,
                error_message: None,
            },
            sent_at: OffsetDateTime::now_utc(),
        });
    }

    pub fn records(&self) -> Vec<NewNotificationRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }

    pub fn account(&self, id: Uuid) -> StoredAccount {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|account| account.id == id)
            .cloned()
            .expect("account exists")
    }

    pub fn record_lookups(&self) -> usize {
        self.state.lock().unwrap().record_lookups
    }

    pub fn fail_scan(&self) {
        self.state.lock().unwrap().fail_scan = true;
    }

    pub fn fail_inserts(&self) {
        self.state.lock().unwrap().fail_inserts = true;
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_accounts_needing_scan(&self) -> Result<Vec<ScanAccount>> {
        let state = self.state.lock().unwrap();
        if state.fail_scan {
            return Err(anyhow!("connection refused"));
        }
        Ok(state
            .accounts
            .iter()
            .filter(|account| matches!(account.status, AccountStatus::Active | AccountStatus::Expired))
            .map(|account| ScanAccount {
                id: account.id,
                expiration_date: account.expiration_date,
                status: account.status,
                service_name: account.service_name.clone(),
                users: account.users.iter().map(|stored| stored.user.clone()).collect(),
            })
            .collect())
    }

    async fn list_notification_records(&self, account_ids: &[Uuid]) -> Result<Vec<NotificationKey>> {
        let mut state = self.state.lock().unwrap();
        state.record_lookups += 1;
        Ok(state
            .records
            .iter()
            .filter(|stored| account_ids.contains(&stored.record.account_id))
            .map(|stored| NotificationKey {
                account_id: stored.record.account_id,
                notification_type: stored.record.notification_type,
                status: stored.record.status,
            })
            .collect())
    }

    async fn insert_notification_record(&self, record: &NewNotificationRecord) -> Result<RecordOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts {
            return Err(anyhow!("insert failed"));
        }
        let already_sent = state.records.iter().any(|stored| {
            stored.record.account_id == record.account_id
                && stored.record.notification_type == record.notification_type
                && stored.record.status == NotificationStatus::Sent
        });
        if already_sent && record.status == NotificationStatus::Sent {
            return Ok(RecordOutcome::Duplicate);
        }
        state.records.push(StoredRecord {
            id: Uuid::new_v4(),
            record: record.clone(),
            sent_at: OffsetDateTime::now_utc(),
        });
        Ok(RecordOutcome::Inserted)
    }

    async fn list_notification_history(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<Vec<NotificationHistoryEntry>> {
        let state = self.state.lock().unwrap();
        let mut history: Vec<NotificationHistoryEntry> = state
            .records
            .iter()
            .filter(|stored| account_id.map_or(true, |id| stored.record.account_id == id))
            .map(|stored| {
                let service_name = state
                    .accounts
                    .iter()
                    .find(|account| account.id == stored.record.account_id)
                    .and_then(|account| account.service_name.clone());
                NotificationHistoryEntry {
                    id: stored.id,
                    account_id: stored.record.account_id,
                    notification_type: stored.record.notification_type,
                    status: stored.record.status,
                    error_message: stored.record.error_message.clone(),
                    sent_at: stored.sent_at,
                    service_name,
                    customer_name: None,
                    customer_phone: None,
                }
            })
            .collect();
        history.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(history)
    }
}

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn expire_overdue_accounts(&self, today: Date) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for account in state.accounts.iter_mut() {
            if account.status == AccountStatus::Active && account.expiration_date < today {
                account.status = AccountStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn mark_users_pending_deletion(&self, grace_days: i32) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        let scheduled = OffsetDateTime::now_utc() + Duration::days(i64::from(grace_days));
        for account in state.accounts.iter_mut() {
            if !matches!(account.status, AccountStatus::Expired | AccountStatus::Cancelled) {
                continue;
            }
            for stored in account.users.iter_mut() {
                if stored.user.status == UserStatus::Active {
                    stored.user.status = UserStatus::PendingDeletion;
                    stored.scheduled_deletion_at = Some(scheduled);
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn delete_scheduled_users(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        let mut count = 0;
        for account in state.accounts.iter_mut() {
            let before = account.users.len();
            account.users.retain(|stored| {
                !(stored.user.status == UserStatus::PendingDeletion
                    && stored.scheduled_deletion_at.is_some_and(|at| at <= now))
            });
            count += (before - account.users.len()) as u64;
        }
        Ok(count)
    }

    async fn list_user_lifecycle(&self) -> Result<Vec<UserLifecycleEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .flat_map(|account| {
                account
                    .users
                    .iter()
                    .filter(|stored| stored.user.status != UserStatus::Active)
                    .map(|stored| UserLifecycleEntry {
                        id: stored.user.id,
                        account_id: account.id,
                        user_name: stored.user.name.clone(),
                        status: stored.user.status,
                        scheduled_deletion_at: stored.scheduled_deletion_at,
                    })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fake messenger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone: String,
    pub message: OutboundMessage,
}

#[derive(Default)]
struct MessengerState {
    sent: Vec<SentMessage>,
    failing: HashMap<String, String>,
}

/// Records every send. Phones registered with `fail_for` get a network error.
#[derive(Clone, Default)]
pub struct FakeMessenger {
    state: Arc<Mutex<MessengerState>>,
}

impl FakeMessenger {
    pub fn fail_for(&self, phone: &str, error: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(phone.to_string(), error.to_string());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn provider(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, phone: &str, message: &OutboundMessage) -> Result<SendReceipt, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(SentMessage {
            phone: phone.to_string(),
            message: message.clone(),
        });
        if let Some(error) = state.failing.get(phone) {
            return Err(TransportError::Api {
                provider: "fake",
                message: error.clone(),
            });
        }
        Ok(SendReceipt {
            message_id: Some(format!("wamid.{}", state.sent.len())),
        })
    }
}

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub store: MemoryStore,
    pub messenger: FakeMessenger,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestAppBuilder {
    settings: ReminderConfig,
    with_messenger: bool,
    admin_token: Option<String>,
}

impl TestAppBuilder {
    pub fn retry_failed(mut self) -> Self {
        self.settings.retry_failed = true;
        self
    }

    pub fn template_mode(mut self) -> Self {
        self.settings.delivery_mode = DeliveryMode::Template;
        self
    }

    pub fn without_messenger(mut self) -> Self {
        self.with_messenger = false;
        self
    }

    pub fn without_admin_token(mut self) -> Self {
        self.admin_token = None;
        self
    }

    pub fn build(self) -> TestApp {
        let store = MemoryStore::default();
        let messenger = FakeMessenger::default();
        let messenger_handle: Option<Arc<dyn Messenger>> = if self.with_messenger {
            Some(Arc::new(messenger.clone()))
        } else {
            None
        };

        let state = AppState {
            notifications: NotificationService::new(
                Arc::new(store.clone()),
                messenger_handle,
                self.settings,
            ),
            lifecycle: UserLifecycleService::new(Arc::new(store.clone()), 7),
            admin_token: self.admin_token,
        };

        TestApp {
            router: renewals::http::router(state.clone()),
            store,
            messenger,
            state,
        }
    }
}

impl TestApp {
    /// Text delivery, failures not retried, messenger and admin token set.
    pub fn builder() -> TestAppBuilder {
        let mut settings = ReminderConfig::default();
        settings.delivery_mode = DeliveryMode::Text;
        settings.utc_offset = UtcOffset::UTC;
        TestAppBuilder {
            settings,
            with_messenger: true,
            admin_token: Some(ADMIN_TOKEN.to_string()),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get_admin(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[("x-admin-token", ADMIN_TOKEN)])
            .await
    }

    pub async fn post_admin(&self, path: &str, body: Option<Value>) -> TestResponse {
        self.request(Method::POST, path, body, &[("x-admin-token", ADMIN_TOKEN)])
            .await
    }
}
