//! Announcement outbox: the dispatch engine emits events, a writer task renders
//! them and hands them to a sink (speaker, panel broadcast, log).

mod events;
mod handle;
mod locale;
mod sink;
mod writer;

pub use events::*;
pub use handle::*;
pub use locale::*;
pub use sink::*;
pub use writer::*;
