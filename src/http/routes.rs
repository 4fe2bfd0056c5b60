use axum::{routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications/check", get(handlers::check_notifications))
        .route("/notifications/send", post(handlers::send_notifications))
        .route("/notifications/history", get(handlers::notification_history))
}

pub fn whatsapp() -> Router<AppState> {
    Router::new()
        .route("/whatsapp/test", post(handlers::send_test_message))
        .route("/whatsapp/send-template", post(handlers::send_template_message))
}

pub fn users() -> Router<AppState> {
    Router::new().route(
        "/users/cleanup",
        get(handlers::user_lifecycle).post(handlers::cleanup_users),
    )
}
