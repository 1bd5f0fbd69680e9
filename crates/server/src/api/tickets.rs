//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use frontdesk_core::{NewPatient, Patient, Ticket, TicketClass, TicketFilter, TicketStatus};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for issuing a ticket
#[derive(Debug, Deserialize)]
pub struct IssueTicketBody {
    pub class: TicketClass,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by status
    pub status: Option<TicketStatus>,
    /// Filter by class
    pub class: Option<TicketClass>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: usize,
}

/// Request body for registering a patient. All fields are free text.
#[derive(Debug, Deserialize)]
pub struct RegisterPatientBody {
    #[serde(default)]
    pub registration: String,
    pub name: String,
    #[serde(default)]
    pub government_id: String,
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub phone: String,
}

impl From<RegisterPatientBody> for NewPatient {
    fn from(body: RegisterPatientBody) -> Self {
        NewPatient {
            registration: body.registration,
            name: body.name,
            government_id: body.government_id,
            birth_date: body.birth_date,
            phone: body.phone,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a new ticket
pub async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IssueTicketBody>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.engine().issue_ticket(body.class).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    state
        .engine()
        .store()
        .get_ticket(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ticket not found: {}", id)))
}

/// List tickets with optional filters, oldest first
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> ApiResult<Json<ListTicketsResponse>> {
    let mut filter = TicketFilter::new();
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    if let Some(class) = params.class {
        filter = filter.with_class(class);
    }

    let tickets = state.engine().store().list_tickets(&filter).await?;
    Ok(Json(ListTicketsResponse {
        total: tickets.len(),
        tickets,
    }))
}

/// Finish service for an in-service ticket
pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.engine().complete_service(&id).await?))
}

/// Complete a ticket from any open status
pub async fn force_complete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.engine().force_complete(&id).await?))
}

/// Attach the patient record to a called ticket
pub async fn register_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RegisterPatientBody>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = state.engine().register_patient(&id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// Get the patient registered for a ticket
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    state
        .engine()
        .store()
        .get_patient_by_ticket(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No patient registered for ticket {}", id)))
}
