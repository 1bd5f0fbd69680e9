//! Dispatch engine: ticket issuance, call-next and status transitions.

mod engine;
mod select;
mod types;

pub use engine::DispatchEngine;
pub use select::{dispatch_order, select_next};
pub use types::{CallOutcome, ResetReport};
