//! Queue storage trait and error taxonomy.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::ticket::{
    ChangeEvent, NewPatient, NewTicket, Patient, Ticket, TicketClass, TicketStatus, TicketUpdate,
};

/// Error type for queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Referenced ticket or patient does not exist. Refresh and retry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent mutation detected. Re-read state and recompute.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient storage failure. Retry with backoff; the write may or may not have happened.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Status change not reachable from the current status.
    #[error("Cannot move ticket {ticket_id} from {from} to {to}")]
    InvalidTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },
}

impl QueueError {
    /// Whether the caller should re-read and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueueError::Conflict(_) | QueueError::StoreUnavailable(_)
        )
    }
}

/// Filter for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Only tickets with this status.
    pub status: Option<TicketStatus>,
    /// Exclude tickets with this status.
    pub exclude_status: Option<TicketStatus>,
    /// Only tickets of this class.
    pub class: Option<TicketClass>,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn excluding_status(mut self, status: TicketStatus) -> Self {
        self.exclude_status = Some(status);
        self
    }

    pub fn with_class(mut self, class: TicketClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Whether a ticket passes this filter.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|s| ticket.status == s)
            && self.exclude_status.is_none_or(|s| ticket.status != s)
            && self.class.is_none_or(|c| ticket.class == c)
    }
}

/// Durable store of tickets and patient records.
///
/// Implementations must guarantee:
/// - `list_tickets` orders by `created_at` then `seq`, ascending.
/// - `update_ticket` fails with `Conflict` when `expected_status` does not
///   match, or when it would leave more than one ticket `called`.
/// - `called_at` / `completed_at` are only written while still null.
/// - At most one patient record per ticket.
/// - A `ChangeEvent` is broadcast after every committed write.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new ticket in `waiting`.
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, QueueError>;

    /// Get a ticket by ID.
    async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError>;

    /// Apply a partial update and return the stored result.
    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> Result<Ticket, QueueError>;

    /// List tickets matching the filter in dispatch order.
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, QueueError>;

    /// Get the patient record registered for a ticket.
    async fn get_patient_by_ticket(&self, ticket_id: &str)
        -> Result<Option<Patient>, QueueError>;

    /// Insert the patient record for a ticket.
    async fn insert_patient(
        &self,
        ticket_id: &str,
        patient: NewPatient,
    ) -> Result<Patient, QueueError>;

    /// Subscribe to change notifications (at-least-once, may lag).
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket(class: TicketClass, status: TicketStatus) -> Ticket {
        Ticket {
            id: "t-1".to_string(),
            seq: 1,
            number: 1,
            epoch: 0,
            class,
            status,
            created_at: Utc::now(),
            called_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_filter_matches() {
        let waiting = ticket(TicketClass::Normal, TicketStatus::Waiting);
        let done = ticket(TicketClass::Priority, TicketStatus::Completed);

        assert!(TicketFilter::new().matches(&waiting));
        assert!(TicketFilter::new()
            .with_status(TicketStatus::Waiting)
            .matches(&waiting));
        assert!(!TicketFilter::new()
            .excluding_status(TicketStatus::Completed)
            .matches(&done));
        assert!(!TicketFilter::new()
            .with_class(TicketClass::Priority)
            .matches(&waiting));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(QueueError::Conflict("x".into()).is_retryable());
        assert!(QueueError::StoreUnavailable("x".into()).is_retryable());
        assert!(!QueueError::NotFound("x".into()).is_retryable());
        assert!(!QueueError::InvalidTransition {
            ticket_id: "t".into(),
            from: TicketStatus::Completed,
            to: TicketStatus::Completed,
        }
        .is_retryable());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = QueueError::InvalidTransition {
            ticket_id: "t-9".into(),
            from: TicketStatus::Waiting,
            to: TicketStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move ticket t-9 from waiting to completed"
        );
    }
}
