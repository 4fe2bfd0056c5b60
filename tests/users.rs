mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, ADMIN_TOKEN};
use renewals::domain::account::{AccountStatus, UserStatus};

#[tokio::test]
async fn cleanup_marks_users_of_dead_accounts() {
    let app = TestApp::new();
    let expired = app.store.add_account(
        -3,
        AccountStatus::Expired,
        &[("Ana", Some("56912345678"), UserStatus::Active)],
    );
    let cancelled = app.store.add_account(
        20,
        AccountStatus::Cancelled,
        &[("Beto", Some("56987654321"), UserStatus::Active)],
    );
    let active = app.store.add_account(
        20,
        AccountStatus::Active,
        &[("Carla", Some("56911112222"), UserStatus::Active)],
    );

    let res = app.post_admin("/users/cleanup", None).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["markedForDeletion"], 2);
    assert_eq!(body["deleted"], 0);
    assert_eq!(
        body["message"],
        "Marked 2 users as pending deletion, deleted 0 users"
    );

    let user_status = |id| app.store.account(id).users[0].user.status;
    assert_eq!(user_status(expired), UserStatus::PendingDeletion);
    assert_eq!(user_status(cancelled), UserStatus::PendingDeletion);
    assert_eq!(user_status(active), UserStatus::Active);

    // Marking is idempotent and the grace period has not elapsed yet.
    let again = app.post_admin("/users/cleanup", None).await.json();
    assert_eq!(again["markedForDeletion"], 0);
    assert_eq!(again["deleted"], 0);
}

#[tokio::test]
async fn lifecycle_lists_users_awaiting_deletion() {
    let app = TestApp::new();
    let account_id = app.store.add_account(
        -3,
        AccountStatus::Expired,
        &[("Ana", Some("56912345678"), UserStatus::Active)],
    );
    app.store.add_account(
        20,
        AccountStatus::Active,
        &[("Carla", Some("56911112222"), UserStatus::Active)],
    );
    app.post_admin("/users/cleanup", None).await;

    let res = app.get_admin("/users/cleanup").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["count"], 1);
    let user = &body["users"][0];
    assert_eq!(user["accountId"], account_id.to_string());
    assert_eq!(user["userName"], "Ana");
    assert_eq!(user["status"], "pending_deletion");
    assert!(user["scheduledDeletionAt"].is_string());
}

#[tokio::test]
async fn cleanup_requires_admin_token() {
    let app = TestApp::new();

    let res = app
        .request(Method::POST, "/users/cleanup", None, &[])
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .request(
            Method::GET,
            "/users/cleanup",
            None,
            &[("x-admin-token", ADMIN_TOKEN)],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}
