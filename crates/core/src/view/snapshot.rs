use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dispatch::dispatch_order;
use crate::ticket::{Patient, Ticket, TicketClass, TicketStatus};

/// Waiting tickets per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WaitingCounts {
    pub normal: usize,
    pub priority: usize,
}

impl WaitingCounts {
    pub fn total(&self) -> usize {
        self.normal + self.priority
    }
}

/// Everything a viewer needs to render the queue at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    /// All tickets, ordered by `(created_at, seq)`.
    pub tickets: Vec<Ticket>,
    /// The ticket currently called, if any.
    pub current: Option<Ticket>,
    /// Patient registered for `current`, if any.
    pub patient: Option<Patient>,
    pub refreshed_at: DateTime<Utc>,
}

impl QueueSnapshot {
    /// Snapshot with no tickets, used before the first refresh.
    pub fn empty() -> Self {
        Self {
            tickets: Vec::new(),
            current: None,
            patient: None,
            refreshed_at: Utc::now(),
        }
    }

    /// Choose the ticket shown as "now calling".
    ///
    /// The store guarantees at most one; if it ever reports more, the most
    /// recently called wins.
    pub fn pick_current(tickets: &[Ticket]) -> Option<&Ticket> {
        tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Called)
            .max_by_key(|t| (t.called_at, t.seq))
    }

    /// Waiting tickets in the order call-next would take them.
    pub fn waiting(&self) -> Vec<&Ticket> {
        dispatch_order(&self.tickets)
    }

    pub fn waiting_counts(&self) -> WaitingCounts {
        let mut counts = WaitingCounts::default();
        for ticket in &self.tickets {
            if ticket.status != TicketStatus::Waiting {
                continue;
            }
            match ticket.class {
                TicketClass::Normal => counts.normal += 1,
                TicketClass::Priority => counts.priority += 1,
            }
        }
        counts
    }

    /// Tickets in a given status.
    pub fn count_status(&self, status: TicketStatus) -> usize {
        self.tickets.iter().filter(|t| t.status == status).count()
    }
}
