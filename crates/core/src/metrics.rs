//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket issuance and dispatch
//! - Announcement delivery
//! - Queue view reconciliation
//!
//! Metrics are registered by the server with its registry via [`register`].

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Tickets issued by class.
pub static TICKETS_ISSUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontdesk_tickets_issued_total", "Total tickets issued"),
        &["class"],
    )
    .unwrap()
});

/// Tickets called by class.
pub static TICKETS_CALLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontdesk_tickets_called_total", "Total tickets called"),
        &["class"],
    )
    .unwrap()
});

/// Call-next requests that found no waiting ticket.
pub static CALL_NEXT_EMPTY: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "frontdesk_call_next_empty_total",
        "Call-next requests on an empty queue",
    )
    .unwrap()
});

/// Compare-and-swap conflicts seen while dispatching.
pub static DISPATCH_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "frontdesk_dispatch_conflicts_total",
        "Concurrent mutation conflicts detected during dispatch",
    )
    .unwrap()
});

// =============================================================================
// Announcement / View Metrics
// =============================================================================

/// Announcements by delivery result.
pub static ANNOUNCEMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontdesk_announcements_total", "Announcements handed to the sink"),
        &["result"], // "delivered", "failed"
    )
    .unwrap()
});

/// Queue view refreshes by result.
pub static VIEW_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frontdesk_view_refreshes_total", "Queue view reconciliations"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Register all core metrics with a registry.
pub fn register(registry: &Registry) {
    let _ = registry.register(Box::new(TICKETS_ISSUED.clone()));
    let _ = registry.register(Box::new(TICKETS_CALLED.clone()));
    let _ = registry.register(Box::new(CALL_NEXT_EMPTY.clone()));
    let _ = registry.register(Box::new(DISPATCH_CONFLICTS.clone()));
    let _ = registry.register(Box::new(ANNOUNCEMENTS.clone()));
    let _ = registry.register(Box::new(VIEW_REFRESHES.clone()));
}
