//! HTTP surface: the gateway webhook plus a few read and cancellation routes.
//!
//! The webhook answers 200 for every business outcome, including skipped and
//! unresolved transfers, so the gateway does not keep redelivering them. Only
//! malformed payloads and internal failures produce non-2xx responses.

use crate::application::cancellation::{CancelBookingRequest, CancellationService};
use crate::application::engine::{SettlementEngine, WebhookOutcome};
use crate::domain::notification::GatewayNotification;
use crate::domain::ports::SettlementStoreRef;
use crate::domain::revenue::RevenueShare;
use crate::domain::transaction::SettlementTransaction;
use crate::error::SettlementError;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub cancellations: Arc<CancellationService>,
    pub store: SettlementStoreRef,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&WebhookOutcome> for WebhookResponse {
    fn from(outcome: &WebhookOutcome) -> Self {
        let receipt = outcome.receipt();
        Self {
            success: outcome.is_success(),
            message: outcome.message(),
            transaction_id: receipt.map(|r| r.transaction_id),
            booking_id: receipt.and_then(|r| r.booking_id),
            order_id: receipt.and_then(|r| r.order_id),
            processed_at: receipt.map(|r| r.processed_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub transaction: SettlementTransaction,
    pub revenue_shares: Vec<RevenueShare>,
}

/// Body of `POST /bookings/{id}/cancel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingBody {
    pub requested_by: Uuid,
    pub reason: String,
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub bank_account_number: String,
    #[serde(default)]
    pub account_holder: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub require_refund: bool,
}

impl CancelBookingBody {
    fn into_request(self, booking_id: Uuid) -> CancelBookingRequest {
        CancelBookingRequest {
            booking_id,
            requested_by: self.requested_by,
            reason: self.reason,
            bank_name: self.bank_name,
            bank_account_number: self.bank_account_number,
            account_holder: self.account_holder,
            notes: self.notes,
            require_refund: self.require_refund,
        }
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = match &self {
            SettlementError::MalformedNotification(_) | SettlementError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            SettlementError::BookingNotFound(_) | SettlementError::OrderNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            SettlementError::AlreadyCancelled(_)
            | SettlementError::InvalidBookingState { .. }
            | SettlementError::Conflict(_) => StatusCode::CONFLICT,
            SettlementError::RefundNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => {
                error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/gateway", post(gateway_webhook))
        .route("/transactions/{reference}", get(get_transaction))
        .route("/bookings/{id}/refund-quote", get(refund_quote))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn gateway_webhook(
    State(state): State<AppState>,
    Json(notification): Json<GatewayNotification>,
) -> Result<Json<WebhookResponse>, SettlementError> {
    let outcome = state.engine.process_notification(notification).await?;
    Ok(Json(WebhookResponse::from(&outcome)))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Response, SettlementError> {
    let reference = reference.trim().to_uppercase();
    let Some(transaction) = state.store.transaction_by_reference(&reference).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("no transaction for reference {}", reference),
            })),
        )
            .into_response());
    };
    let revenue_shares = state.store.revenue_shares(transaction.id).await?;
    Ok(Json(TransactionView {
        transaction,
        revenue_shares,
    })
    .into_response())
}

async fn refund_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let quote = state.cancellations.preview_refund(id, Utc::now()).await?;
    Ok(Json(quote))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBookingBody>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state
        .cancellations
        .cancel_booking(body.into_request(id), Utc::now())
        .await?;
    Ok(Json(outcome))
}
