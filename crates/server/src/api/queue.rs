//! Queue-level handlers: snapshot, call-next, preview and reset.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use frontdesk_core::{
    CallOutcome, Patient, QueueSnapshot, ResetReport, Ticket, TicketClass, TicketStatus,
    WaitingCounts,
};

use super::error::ApiResult;
use crate::state::AppState;

/// Queue as shown to desks and the public panel.
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub current: Option<Ticket>,
    pub patient: Option<Patient>,
    /// Waiting tickets in dispatch order.
    pub waiting: Vec<Ticket>,
    pub waiting_counts: WaitingCounts,
    pub in_service: Vec<Ticket>,
    pub tickets: Vec<Ticket>,
    pub refreshed_at: DateTime<Utc>,
}

impl From<&QueueSnapshot> for QueueResponse {
    fn from(snapshot: &QueueSnapshot) -> Self {
        Self {
            current: snapshot.current.clone(),
            patient: snapshot.patient.clone(),
            waiting: snapshot.waiting().into_iter().cloned().collect(),
            waiting_counts: snapshot.waiting_counts(),
            in_service: snapshot
                .tickets
                .iter()
                .filter(|t| t.status == TicketStatus::InService)
                .cloned()
                .collect(),
            tickets: snapshot.tickets.clone(),
            refreshed_at: snapshot.refreshed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub next: Option<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct NumberHintResponse {
    pub normal: u64,
    pub priority: u64,
}

/// Current queue, re-read on demand. Panels are not notified.
pub async fn get_queue(State(state): State<Arc<AppState>>) -> ApiResult<Json<QueueResponse>> {
    let snapshot = state.view().read().await?;
    Ok(Json(QueueResponse::from(&snapshot)))
}

/// Call the next ticket.
pub async fn call_next(State(state): State<Arc<AppState>>) -> ApiResult<Json<CallOutcome>> {
    let outcome = state.engine().call_next().await?;
    Ok(Json(outcome))
}

/// The ticket call-next would select, without calling it.
pub async fn preview_next(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PreviewResponse>> {
    let next = state.engine().preview_next().await?;
    Ok(Json(PreviewResponse { next }))
}

/// Close all open tickets and restart numbering.
pub async fn reset_queue(State(state): State<Arc<AppState>>) -> ApiResult<Json<ResetReport>> {
    let report = state.engine().reset_counters().await?;
    info!(
        "Queue reset via API ({} tickets closed)",
        report.tickets_closed
    );
    Ok(Json(report))
}

/// Next numbers per class, as a display hint.
pub async fn number_hint(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<NumberHintResponse>> {
    let engine = state.engine();
    Ok(Json(NumberHintResponse {
        normal: engine.next_number_hint(TicketClass::Normal).await?,
        priority: engine.next_number_hint(TicketClass::Priority).await?,
    }))
}
