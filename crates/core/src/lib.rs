pub mod announce;
pub mod config;
pub mod counter;
pub mod dispatch;
pub mod metrics;
pub mod testing;
pub mod ticket;
pub mod view;

pub use announce::{
    create_announcement_system, AnnouncementEnvelope, AnnouncementError, AnnouncementEvent,
    AnnouncementHandle, AnnouncementSink, AnnouncementWriter, Locale,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AnnouncementConfig, Config, ConfigError,
    DatabaseConfig, DispatchConfig, ServerConfig, ViewConfig,
};
pub use counter::{CounterStore, SqliteCounterStore, TicketCounter};
pub use dispatch::{CallOutcome, DispatchEngine, ResetReport};
pub use ticket::{
    ChangeEvent, ChangeKind, ChangeTable, NewPatient, NewTicket, Patient, QueueError, QueueStore,
    SqliteQueueStore, Ticket, TicketClass, TicketFilter, TicketStatus, TicketUpdate,
};
pub use view::{QueueSnapshot, QueueView, WaitingCounts};
