//! Ticket and patient record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket class. Priority tickets are always served before normal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketClass {
    Normal,
    Priority,
}

impl TicketClass {
    pub const ALL: [TicketClass; 2] = [TicketClass::Normal, TicketClass::Priority];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketClass::Normal => "normal",
            TicketClass::Priority => "priority",
        }
    }
}

impl fmt::Display for TicketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(TicketClass::Normal),
            "priority" => Ok(TicketClass::Priority),
            other => Err(format!("unknown ticket class: {}", other)),
        }
    }
}

/// Ticket status.
///
/// `waiting -> called -> in_service -> completed`. `completed` is terminal and
/// only the administrative path may jump straight to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Waiting,
    Called,
    InService,
    Completed,
}

impl TicketStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed)
    }

    /// Returns true if `next` is the single step that follows this status.
    pub fn can_advance_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Waiting, TicketStatus::Called)
                | (TicketStatus::Called, TicketStatus::InService)
                | (TicketStatus::InService, TicketStatus::Completed)
        )
    }

    /// Returns true if the administrative path may force this status to `completed`.
    pub fn can_force_complete(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Called => "called",
            TicketStatus::InService => "in_service",
            TicketStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TicketStatus::Waiting),
            "called" => Ok(TicketStatus::Called),
            "in_service" => Ok(TicketStatus::InService),
            "completed" => Ok(TicketStatus::Completed),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

/// A queue position issued to a walk-in visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier.
    pub id: String,
    /// Store-assigned creation sequence, the stable tie-break for `created_at`.
    pub seq: i64,
    /// Number within the class for the current counter epoch.
    pub number: u64,
    /// Counter epoch the number was issued in.
    pub epoch: u64,
    pub class: TicketClass,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Label shown on the panel, e.g. "P3" or "N12".
    pub fn label(&self) -> String {
        let prefix = match self.class {
            TicketClass::Normal => 'N',
            TicketClass::Priority => 'P',
        };
        format!("{}{}", prefix, self.number)
    }

    /// Dispatch ordering key: creation time, then creation sequence.
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.seq)
    }
}

/// Data needed to insert a new ticket. Tickets always start in `waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTicket {
    pub number: u64,
    pub class: TicketClass,
    pub epoch: u64,
}

/// Partial update applied to a ticket.
///
/// `expected_status` turns the update into a compare-and-swap. Timestamps are
/// only written when the stored value is still null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    pub expected_status: Option<TicketStatus>,
    pub status: Option<TicketStatus>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TicketUpdate {
    /// Compare-and-swap `from -> to`, stamping the matching timestamp.
    pub fn transition(from: TicketStatus, to: TicketStatus, at: DateTime<Utc>) -> Self {
        let mut update = Self {
            expected_status: Some(from),
            status: Some(to),
            ..Default::default()
        };
        match to {
            TicketStatus::Called => update.called_at = Some(at),
            TicketStatus::Completed => update.completed_at = Some(at),
            TicketStatus::Waiting | TicketStatus::InService => {}
        }
        update
    }
}

/// Patient record attached to a called ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub ticket_id: String,
    pub registration: String,
    pub name: String,
    pub government_id: String,
    pub birth_date: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Patient fields supplied by the attendant. Opaque to the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub registration: String,
    pub name: String,
    pub government_id: String,
    pub birth_date: String,
    pub phone: String,
}

/// Which table a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Tickets,
    Patients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// Change notification emitted after a committed write.
///
/// Only a signal: observers re-read the store instead of applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    pub row_id: String,
}
