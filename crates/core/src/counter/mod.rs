//! Durable per-class ticket numbering.

mod sqlite;
mod store;
mod ticket_counter;

pub use sqlite::SqliteCounterStore;
pub use store::CounterStore;
pub use ticket_counter::TicketCounter;
