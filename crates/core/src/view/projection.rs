use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::QueueSnapshot;
use crate::metrics::VIEW_REFRESHES;
use crate::ticket::{QueueError, QueueStore, TicketFilter};

/// Keeps a [`QueueSnapshot`] fresh and publishes it to observers.
///
/// Change notifications are only a signal: every refresh re-reads the whole
/// queue from the store. A timer refresh catches writes made by other
/// processes and notifications lost to lag.
pub struct QueueView {
    store: Arc<dyn QueueStore>,
    tx: watch::Sender<Arc<QueueSnapshot>>,
    refresh_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl QueueView {
    pub fn new(store: Arc<dyn QueueStore>, refresh_interval: Duration) -> Self {
        let (tx, _) = watch::channel(Arc::new(QueueSnapshot::empty()));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            tx,
            refresh_interval,
            shutdown_tx,
        }
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueueSnapshot>> {
        self.tx.subscribe()
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<QueueSnapshot> {
        self.tx.borrow().clone()
    }

    /// Re-read the queue and publish a new snapshot.
    ///
    /// On failure the previous snapshot stays published.
    pub async fn refresh(&self) -> Result<Arc<QueueSnapshot>, QueueError> {
        match self.load().await {
            Ok(snapshot) => {
                VIEW_REFRESHES.with_label_values(&["ok"]).inc();
                let snapshot = Arc::new(snapshot);
                self.tx.send_replace(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                VIEW_REFRESHES.with_label_values(&["error"]).inc();
                warn!("Queue view refresh failed, keeping previous snapshot: {}", e);
                Err(e)
            }
        }
    }

    /// Re-read the queue without publishing the result to subscribers.
    pub async fn read(&self) -> Result<QueueSnapshot, QueueError> {
        self.load().await
    }

    async fn load(&self) -> Result<QueueSnapshot, QueueError> {
        let tickets = self.store.list_tickets(&TicketFilter::new()).await?;
        let current = QueueSnapshot::pick_current(&tickets).cloned();
        let patient = match current {
            Some(ref ticket) => self.store.get_patient_by_ticket(&ticket.id).await?,
            None => None,
        };

        Ok(QueueSnapshot {
            tickets,
            current,
            patient,
            refreshed_at: Utc::now(),
        })
    }

    /// Spawn the refresh loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let view = Arc::clone(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { view.run(shutdown_rx).await })
    }

    /// Stop the refresh loop started with [`QueueView::start`].
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        // Subscribe before the first read so no change slips in between.
        let mut changes = self.store.subscribe();
        let mut changes_open = true;

        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "Queue view started (refresh every {:?})",
            self.refresh_interval
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Queue view received shutdown signal");
                    break;
                }
                event = changes.recv(), if changes_open => {
                    match event {
                        Ok(event) => {
                            debug!("Change on {:?} {}", event.table, event.row_id);
                            // Coalesce a burst into one re-read
                            while changes.try_recv().is_ok() {}
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Queue view lagged by {} notifications", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Change feed closed, falling back to timer refresh");
                            changes_open = false;
                            continue;
                        }
                    }
                    let _ = self.refresh().await;
                }
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
            }
        }
    }
}
