//! In-memory queue store with failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::ticket::{
    ChangeEvent, ChangeKind, ChangeTable, NewPatient, NewTicket, Patient, QueueError, QueueStore,
    Ticket, TicketFilter, TicketStatus, TicketUpdate,
};

type UpdateHook = Box<dyn FnOnce(&mut Vec<Ticket>) + Send>;

#[derive(Default)]
struct Inner {
    tickets: Vec<Ticket>,
    patients: Vec<Patient>,
    next_seq: i64,
}

/// In-memory `QueueStore` with the same guarantees as the SQLite store.
///
/// Extra knobs for tests:
/// - `set_unavailable` fails every operation with `StoreUnavailable`.
/// - `fail_updates_after(n)` lets `n` more updates through, then fails them.
/// - `before_next_update` runs a closure against the raw ticket list right
///   before the next update is applied, simulating another desk writing in
///   between a read and a write.
pub struct MockQueueStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<ChangeEvent>,
    unavailable: AtomicBool,
    updates_allowed: Mutex<Option<usize>>,
    update_hook: Mutex<Option<UpdateHook>>,
    list_calls: AtomicUsize,
}

impl Default for MockQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQueueStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
            unavailable: AtomicBool::new(false),
            updates_allowed: Mutex::new(None),
            update_hook: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Make every operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Allow `n` more updates, then fail updates with `StoreUnavailable`.
    pub fn fail_updates_after(&self, n: usize) {
        *self.updates_allowed.lock().unwrap() = Some(n);
    }

    /// Stop failing updates.
    pub fn heal_updates(&self) {
        *self.updates_allowed.lock().unwrap() = None;
    }

    /// Run `hook` against the stored tickets right before the next update.
    pub fn before_next_update(&self, hook: impl FnOnce(&mut Vec<Ticket>) + Send + 'static) {
        *self.update_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Number of `list_tickets` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// All tickets as currently stored.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.inner.lock().unwrap().tickets.clone()
    }

    /// Number of patient rows stored for a ticket.
    pub fn patient_count(&self, ticket_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .patients
            .iter()
            .filter(|p| p.ticket_id == ticket_id)
            .count()
    }

    /// Insert a ticket with an explicit creation time.
    pub fn insert_ticket_at(&self, ticket: NewTicket, created_at: DateTime<Utc>) -> Ticket {
        let inserted = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_seq += 1;
            let ticket = Ticket {
                id: uuid::Uuid::new_v4().to_string(),
                seq: inner.next_seq,
                number: ticket.number,
                epoch: ticket.epoch,
                class: ticket.class,
                status: TicketStatus::Waiting,
                created_at,
                called_at: None,
                completed_at: None,
            };
            inner.tickets.push(ticket.clone());
            ticket
        };
        self.notify(ChangeTable::Tickets, ChangeKind::Insert, &inserted.id);
        inserted
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::StoreUnavailable("mock store offline".to_string()));
        }
        Ok(())
    }

    fn take_update_permit(&self) -> Result<(), QueueError> {
        let mut allowed = self.updates_allowed.lock().unwrap();
        match allowed.as_mut() {
            Some(0) => Err(QueueError::StoreUnavailable(
                "mock store rejected update".to_string(),
            )),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind, row_id: &str) {
        let _ = self.changes.send(ChangeEvent {
            table,
            kind,
            row_id: row_id.to_string(),
        });
    }
}

#[async_trait]
impl QueueStore for MockQueueStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, QueueError> {
        self.check_available()?;
        {
            let inner = self.inner.lock().unwrap();
            if inner.tickets.iter().any(|t| {
                t.epoch == ticket.epoch && t.class == ticket.class && t.number == ticket.number
            }) {
                return Err(QueueError::Conflict(format!(
                    "{} ticket {} already issued in epoch {}",
                    ticket.class, ticket.number, ticket.epoch
                )));
            }
        }
        Ok(self.insert_ticket_at(ticket, Utc::now()))
    }

    async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> Result<Ticket, QueueError> {
        self.check_available()?;
        self.take_update_permit()?;

        let updated = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(hook) = self.update_hook.lock().unwrap().take() {
                hook(&mut inner.tickets);
            }

            let another_called = update.status == Some(TicketStatus::Called)
                && inner
                    .tickets
                    .iter()
                    .any(|t| t.id != id && t.status == TicketStatus::Called);

            let ticket = inner
                .tickets
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| QueueError::NotFound(format!("ticket {}", id)))?;

            if let Some(expected) = update.expected_status {
                if ticket.status != expected {
                    return Err(QueueError::Conflict(format!(
                        "ticket {} is {}, expected {}",
                        id, ticket.status, expected
                    )));
                }
            }
            if another_called {
                return Err(QueueError::Conflict(
                    "another ticket is already called".to_string(),
                ));
            }

            if let Some(status) = update.status {
                ticket.status = status;
            }
            if ticket.called_at.is_none() {
                ticket.called_at = update.called_at;
            }
            if ticket.completed_at.is_none() {
                ticket.completed_at = update.completed_at;
            }
            ticket.clone()
        };

        self.notify(ChangeTable::Tickets, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, QueueError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let mut tickets: Vec<Ticket> = inner
            .tickets
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.order_key());
        Ok(tickets)
    }

    async fn get_patient_by_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Option<Patient>, QueueError> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .patients
            .iter()
            .find(|p| p.ticket_id == ticket_id)
            .cloned())
    }

    async fn insert_patient(
        &self,
        ticket_id: &str,
        patient: NewPatient,
    ) -> Result<Patient, QueueError> {
        self.check_available()?;
        let inserted = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.tickets.iter().any(|t| t.id == ticket_id) {
                return Err(QueueError::NotFound(format!("ticket {}", ticket_id)));
            }
            if inner.patients.iter().any(|p| p.ticket_id == ticket_id) {
                return Err(QueueError::Conflict(format!(
                    "patient already registered for ticket {}",
                    ticket_id
                )));
            }
            let record = Patient {
                id: uuid::Uuid::new_v4().to_string(),
                ticket_id: ticket_id.to_string(),
                registration: patient.registration,
                name: patient.name,
                government_id: patient.government_id,
                birth_date: patient.birth_date,
                phone: patient.phone,
                created_at: Utc::now(),
            };
            inner.patients.push(record.clone());
            record
        };

        self.notify(ChangeTable::Patients, ChangeKind::Insert, &inserted.id);
        Ok(inserted)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
