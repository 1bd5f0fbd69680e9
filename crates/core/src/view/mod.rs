//! Read projection of the queue for desks and the public panel.

mod snapshot;
mod projection;

pub use snapshot::{QueueSnapshot, WaitingCounts};
pub use projection::QueueView;
