//! Testing utilities and mock implementations.
//!
//! In-memory stand-ins for the queue store, counter storage and announcement
//! sink, with hooks to inject failures and interleave concurrent writers.
//!
//! # Example
//!
//! ```rust,ignore
//! use frontdesk_core::testing::{MockCounterStore, MockQueueStore, RecordingSink};
//!
//! let store = Arc::new(MockQueueStore::new());
//! store.fail_updates_after(2); // third update fails with StoreUnavailable
//! ```

mod mock_counter_store;
mod mock_queue_store;
mod recording_sink;

pub use mock_counter_store::MockCounterStore;
pub use mock_queue_store::MockQueueStore;
pub use recording_sink::RecordingSink;
