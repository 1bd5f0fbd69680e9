use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, queue, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Queue
        .route("/queue", get(queue::get_queue))
        .route("/queue/call-next", post(queue::call_next))
        .route("/queue/next", get(queue::preview_next))
        .route("/queue/reset", post(queue::reset_queue))
        .route("/counters/hint", get(queue::number_hint))
        // Tickets
        .route(
            "/tickets",
            post(tickets::issue_ticket).get(tickets::list_tickets),
        )
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/complete", post(tickets::complete_ticket))
        .route(
            "/tickets/{id}/force-complete",
            post(tickets::force_complete_ticket),
        )
        .route(
            "/tickets/{id}/patient",
            post(tickets::register_patient).get(tickets::get_patient),
        )
        // Realtime feed
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
