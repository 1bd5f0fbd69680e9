//! Tickets, patient records and the store they live in.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteQueueStore;
pub use store::{QueueError, QueueStore, TicketFilter};
pub use types::{
    ChangeEvent, ChangeKind, ChangeTable, NewPatient, NewTicket, Patient, Ticket, TicketClass,
    TicketStatus, TicketUpdate,
};
