//! Dispatch engine implementation.
//!
//! Every mutating operation re-reads the store before deciding and runs
//! under a single-writer lock. Writes are compare-and-swaps on the expected
//! prior status, so engines in other processes sharing the same store surface
//! as `Conflict` instead of corrupting the state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::select::select_next;
use super::types::{CallOutcome, ResetReport};
use crate::announce::{AnnouncementEvent, AnnouncementHandle};
use crate::config::DispatchConfig;
use crate::counter::TicketCounter;
use crate::metrics::{CALL_NEXT_EMPTY, DISPATCH_CONFLICTS, TICKETS_CALLED, TICKETS_ISSUED};
use crate::ticket::{
    NewPatient, NewTicket, Patient, QueueError, QueueStore, Ticket, TicketClass, TicketFilter,
    TicketStatus, TicketUpdate,
};

/// Decides which ticket is called next and enforces status transitions.
pub struct DispatchEngine {
    config: DispatchConfig,
    store: Arc<dyn QueueStore>,
    counter: TicketCounter,
    announcements: Option<AnnouncementHandle>,
    write_lock: Mutex<()>,
}

impl DispatchEngine {
    /// Create a new engine without announcements.
    pub fn new(config: DispatchConfig, store: Arc<dyn QueueStore>, counter: TicketCounter) -> Self {
        Self {
            config,
            store,
            counter,
            announcements: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Emit announcement events through `handle`.
    pub fn with_announcements(mut self, handle: AnnouncementHandle) -> Self {
        self.announcements = Some(handle);
        self
    }

    /// The store this engine writes to.
    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Issue a new ticket of `class` in `waiting`.
    pub async fn issue_ticket(&self, class: TicketClass) -> Result<Ticket, QueueError> {
        let _guard = self.write_lock.lock().await;

        let mut attempt = 0;
        let ticket = loop {
            attempt += 1;
            let (epoch, number) = self.counter.claim(class).await?;
            match self
                .store
                .insert_ticket(NewTicket {
                    number,
                    class,
                    epoch,
                })
                .await
            {
                Err(QueueError::Conflict(msg)) if attempt <= self.config.max_conflict_retries => {
                    DISPATCH_CONFLICTS.inc();
                    warn!("Issue conflict (attempt {}), claiming again: {}", attempt, msg);
                }
                other => break other?,
            }
        };
        let number = ticket.number;

        TICKETS_ISSUED.with_label_values(&[class.as_str()]).inc();
        info!("Issued {} ticket {} ({})", class, number, ticket.id);
        Ok(ticket)
    }

    /// Call the next waiting ticket.
    ///
    /// The ticket currently `called` (if any) moves to `in_service` first. On
    /// an empty queue nothing changes. Conflicts with concurrent writers are
    /// retried from a fresh read up to `max_conflict_retries` times.
    pub async fn call_next(&self) -> Result<CallOutcome, QueueError> {
        let _guard = self.write_lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_call_next().await {
                Err(QueueError::Conflict(msg)) => {
                    DISPATCH_CONFLICTS.inc();
                    if attempt > self.config.max_conflict_retries {
                        warn!("Call-next gave up after {} attempts: {}", attempt, msg);
                        return Err(QueueError::Conflict(msg));
                    }
                    warn!("Call-next conflict (attempt {}), re-reading: {}", attempt, msg);
                }
                other => return other,
            }
        }
    }

    async fn try_call_next(&self) -> Result<CallOutcome, QueueError> {
        let tickets = self
            .store
            .list_tickets(&TicketFilter::new().excluding_status(TicketStatus::Completed))
            .await?;

        let Some(next) = select_next(&tickets).cloned() else {
            CALL_NEXT_EMPTY.inc();
            info!("Call-next: queue empty");
            return Ok(CallOutcome::QueueEmpty);
        };

        let now = Utc::now();

        let mut previous = None;
        for current in tickets.iter().filter(|t| t.status == TicketStatus::Called) {
            let advanced = self
                .store
                .update_ticket(
                    &current.id,
                    TicketUpdate::transition(TicketStatus::Called, TicketStatus::InService, now),
                )
                .await?;
            debug!("Ticket {} moved to in_service", advanced.label());
            previous = Some(advanced);
        }

        let called = self
            .store
            .update_ticket(
                &next.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, now),
            )
            .await?;

        TICKETS_CALLED
            .with_label_values(&[called.class.as_str()])
            .inc();
        info!("Called {} ticket {} ({})", called.class, called.number, called.id);

        let patient_name = match self.store.get_patient_by_ticket(&called.id).await {
            Ok(patient) => patient.map(|p| p.name),
            Err(e) => {
                warn!("Could not look up patient for {}: {}", called.id, e);
                None
            }
        };
        self.announce(AnnouncementEvent::ticket_called(&called, patient_name));

        Ok(CallOutcome::Called {
            ticket: called,
            previous,
        })
    }

    /// Attach the patient record to a ticket that has already been called.
    ///
    /// Fails with `NotFound` for unknown tickets, `InvalidTransition` while the
    /// ticket is still waiting and `Conflict` if a record already exists.
    pub async fn register_patient(
        &self,
        ticket_id: &str,
        fields: NewPatient,
    ) -> Result<Patient, QueueError> {
        let _guard = self.write_lock.lock().await;

        let ticket = self.get_existing(ticket_id).await?;
        if ticket.status == TicketStatus::Waiting {
            warn!("Rejected patient registration for waiting ticket {}", ticket_id);
            return Err(QueueError::InvalidTransition {
                ticket_id: ticket_id.to_string(),
                from: TicketStatus::Waiting,
                to: TicketStatus::Called,
            });
        }

        let patient = self.store.insert_patient(ticket_id, fields).await?;
        info!("Registered patient for ticket {}", ticket.label());

        if ticket.status == TicketStatus::Called {
            self.announce(AnnouncementEvent::patient_ready(&ticket, &patient.name));
        }
        Ok(patient)
    }

    /// Finish service for a ticket: `in_service -> completed`.
    pub async fn complete_service(&self, ticket_id: &str) -> Result<Ticket, QueueError> {
        let _guard = self.write_lock.lock().await;

        let ticket = self.get_existing(ticket_id).await?;
        if !ticket.status.can_advance_to(TicketStatus::Completed) {
            return Err(self.reject(&ticket, TicketStatus::Completed));
        }

        let done = self
            .store
            .update_ticket(
                ticket_id,
                TicketUpdate::transition(ticket.status, TicketStatus::Completed, Utc::now()),
            )
            .await?;
        info!("Completed ticket {}", done.label());
        Ok(done)
    }

    /// Administrative completion from any non-terminal status.
    pub async fn force_complete(&self, ticket_id: &str) -> Result<Ticket, QueueError> {
        let _guard = self.write_lock.lock().await;

        let ticket = self.get_existing(ticket_id).await?;
        if !ticket.status.can_force_complete() {
            return Err(self.reject(&ticket, TicketStatus::Completed));
        }

        let done = self
            .store
            .update_ticket(
                ticket_id,
                TicketUpdate::transition(ticket.status, TicketStatus::Completed, Utc::now()),
            )
            .await?;
        info!("Force-completed ticket {} (was {})", done.label(), ticket.status);
        Ok(done)
    }

    /// Close every open ticket, then restart numbering.
    ///
    /// The two steps are independent and idempotent: after a partial failure
    /// the caller simply runs the reset again.
    pub async fn reset_counters(&self) -> Result<ResetReport, QueueError> {
        let _guard = self.write_lock.lock().await;

        let open = self
            .store
            .list_tickets(&TicketFilter::new().excluding_status(TicketStatus::Completed))
            .await?;

        let now = Utc::now();
        let mut tickets_closed = 0;
        for ticket in &open {
            if self.close_ticket(ticket, now).await? {
                tickets_closed += 1;
            }
        }

        let epoch = self.counter.reset().await?;
        info!("Reset queue: {} tickets closed, epoch {}", tickets_closed, epoch);
        Ok(ResetReport {
            tickets_closed,
            epoch,
        })
    }

    /// The ticket call-next would select right now.
    pub async fn preview_next(&self) -> Result<Option<Ticket>, QueueError> {
        let tickets = self
            .store
            .list_tickets(&TicketFilter::new().with_status(TicketStatus::Waiting))
            .await?;
        Ok(select_next(&tickets).cloned())
    }

    /// Display hint for the next number of `class`. Not a reservation.
    pub async fn next_number_hint(&self, class: TicketClass) -> Result<u64, QueueError> {
        self.counter.peek(class).await
    }

    /// Force one ticket to `completed`, following concurrent status changes.
    /// Returns false if it was already completed.
    async fn close_ticket(&self, ticket: &Ticket, now: DateTime<Utc>) -> Result<bool, QueueError> {
        let mut status = ticket.status;
        for _ in 0..=self.config.max_conflict_retries {
            if status.is_terminal() {
                return Ok(false);
            }
            match self
                .store
                .update_ticket(
                    &ticket.id,
                    TicketUpdate::transition(status, TicketStatus::Completed, now),
                )
                .await
            {
                Ok(_) => return Ok(true),
                Err(QueueError::Conflict(msg)) => {
                    DISPATCH_CONFLICTS.inc();
                    debug!("Conflict closing {}: {}", ticket.id, msg);
                    status = self.get_existing(&ticket.id).await?.status;
                }
                Err(e) => return Err(e),
            }
        }
        Err(QueueError::Conflict(format!(
            "ticket {} kept changing while closing",
            ticket.id
        )))
    }

    async fn get_existing(&self, ticket_id: &str) -> Result<Ticket, QueueError> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {}", ticket_id)))
    }

    fn reject(&self, ticket: &Ticket, to: TicketStatus) -> QueueError {
        warn!(
            "Rejected transition of ticket {} from {} to {}",
            ticket.id, ticket.status, to
        );
        QueueError::InvalidTransition {
            ticket_id: ticket.id.clone(),
            from: ticket.status,
            to,
        }
    }

    fn announce(&self, event: AnnouncementEvent) {
        if let Some(ref handle) = self.announcements {
            handle.try_emit(event);
        }
    }
}
