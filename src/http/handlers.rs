use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::app::users::CleanupSummary;
use crate::domain::account::UserLifecycleEntry;
use crate::domain::notification::{DeliveryResult, NotificationCandidate, NotificationHistoryEntry};
use crate::http::{AdminToken, AppError};
use crate::infra::messaging::OutboundMessage;
use crate::AppState;

const DEFAULT_TEMPLATE_LANGUAGE: &str = "es";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.notifications.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

#[derive(Serialize)]
pub struct CheckResponse {
    success: bool,
    count: usize,
    notifications: Vec<NotificationCandidate>,
}

pub async fn check_notifications(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<CheckResponse>, AppError> {
    let service = &state.notifications;
    let notifications = service
        .check_pending(service.today())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check notifications");
            AppError::internal("failed to check notifications")
        })?;

    Ok(Json(CheckResponse {
        success: true,
        count: notifications.len(),
        notifications,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    success: bool,
    total_processed: usize,
    accounts_processed: usize,
    results: Vec<DeliveryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

pub async fn send_notifications(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<SendResponse>, AppError> {
    let service = &state.notifications;
    let report = service
        .send_pending(service.today())
        .await
        .map_err(|err| AppError::from_notify(err, "failed to send notifications"))?;

    let message = report
        .results
        .is_empty()
        .then_some("No notifications to send");

    Ok(Json(SendResponse {
        success: true,
        total_processed: report.total_processed,
        accounts_processed: report.accounts_processed,
        results: report.results,
        message,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub account_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    success: bool,
    count: usize,
    history: Vec<NotificationHistoryEntry>,
}

pub async fn notification_history(
    _admin: AdminToken,
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(query) =
        query.map_err(|err| AppError::bad_request(format!("invalid query: {}", err.body_text())))?;

    let history = state
        .notifications
        .history(query.account_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, account_id = ?query.account_id, "failed to fetch notification history");
            AppError::internal("failed to fetch notification history")
        })?;

    Ok(Json(HistoryResponse {
        success: true,
        count: history.len(),
        history,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSendResponse {
    success: bool,
    message_id: Option<String>,
    message: &'static str,
}

#[derive(Deserialize)]
pub struct TestMessageRequest {
    pub phone: Option<String>,
    pub message: Option<String>,
}

pub async fn send_test_message(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<TestMessageRequest>,
) -> Result<Json<ManualSendResponse>, AppError> {
    let (phone, body) = match (payload.phone, payload.message) {
        (Some(phone), Some(body)) if !phone.trim().is_empty() && !body.trim().is_empty() => {
            (phone, body)
        }
        _ => return Err(AppError::bad_request("phone and message are required")),
    };

    let receipt = state
        .notifications
        .send_manual(&phone, OutboundMessage::Text { body })
        .await
        .map_err(|err| AppError::from_notify(err, "failed to send test message"))?;

    tracing::info!(message_id = ?receipt.message_id, "test message sent");
    Ok(Json(ManualSendResponse {
        success: true,
        message_id: receipt.message_id,
        message: "Test message sent successfully",
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMessageRequest {
    pub phone: Option<String>,
    pub template_name: Option<String>,
    pub params: Option<Vec<Value>>,
    pub language: Option<String>,
}

pub async fn send_template_message(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<TemplateMessageRequest>,
) -> Result<Json<ManualSendResponse>, AppError> {
    let (phone, name, params) = match (payload.phone, payload.template_name, payload.params) {
        (Some(phone), Some(name), Some(params)) if !phone.trim().is_empty() && !name.trim().is_empty() => {
            (phone, name, params)
        }
        _ => {
            return Err(AppError::bad_request(
                "phone, templateName, and params are required",
            ))
        }
    };

    // Numbers are accepted as parameters and sent as their text form.
    let params = params
        .into_iter()
        .map(|param| match param {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            _ => Err(AppError::bad_request("params must be strings or numbers")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let message = OutboundMessage::Template {
        name,
        language: payload
            .language
            .unwrap_or_else(|| DEFAULT_TEMPLATE_LANGUAGE.to_string()),
        params,
    };

    let receipt = state
        .notifications
        .send_manual(&phone, message)
        .await
        .map_err(|err| AppError::from_notify(err, "failed to send template message"))?;

    Ok(Json(ManualSendResponse {
        success: true,
        message_id: receipt.message_id,
        message: "Template message sent successfully",
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    success: bool,
    #[serde(flatten)]
    summary: CleanupSummary,
    message: String,
}

pub async fn cleanup_users(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let summary = state.lifecycle.cleanup().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to delete scheduled users");
        AppError::internal("failed to delete scheduled users")
    })?;

    Ok(Json(CleanupResponse {
        success: true,
        message: format!(
            "Marked {} users as pending deletion, deleted {} users",
            summary.marked_for_deletion, summary.deleted
        ),
        summary,
    }))
}

#[derive(Serialize)]
pub struct LifecycleResponse {
    success: bool,
    count: usize,
    users: Vec<UserLifecycleEntry>,
}

pub async fn user_lifecycle(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let users = state.lifecycle.list().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to fetch user lifecycle status");
        AppError::internal("failed to fetch user lifecycle status")
    })?;

    Ok(Json(LifecycleResponse {
        success: true,
        count: users.len(),
        users,
    }))
}
