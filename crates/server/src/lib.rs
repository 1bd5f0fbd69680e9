pub mod api;
pub mod metrics;
pub mod panel;
pub mod state;
