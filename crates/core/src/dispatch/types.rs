use serde::Serialize;

use crate::ticket::Ticket;

/// Result of a call-next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    /// `ticket` is now `called`; `previous` is the ticket moved to `in_service`.
    Called {
        ticket: Ticket,
        previous: Option<Ticket>,
    },
    /// Nothing was waiting. No state changed.
    QueueEmpty,
}

impl CallOutcome {
    /// The newly called ticket, if any.
    pub fn called(&self) -> Option<&Ticket> {
        match self {
            CallOutcome::Called { ticket, .. } => Some(ticket),
            CallOutcome::QueueEmpty => None,
        }
    }
}

/// Result of an administrative reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Tickets this run moved to `completed`.
    pub tickets_closed: usize,
    /// Counter epoch after the reset.
    pub epoch: u64,
}
