use std::sync::Arc;

use frontdesk_core::{Config, DispatchEngine, QueueView};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<DispatchEngine>,
    view: Arc<QueueView>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<DispatchEngine>,
        view: Arc<QueueView>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            engine,
            view,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &DispatchEngine {
        self.engine.as_ref()
    }

    pub fn view(&self) -> &QueueView {
        self.view.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
