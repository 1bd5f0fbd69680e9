//! SQLite-backed queue store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tokio::sync::broadcast;

use super::{
    ChangeEvent, ChangeKind, ChangeTable, NewPatient, NewTicket, Patient, QueueError, QueueStore,
    Ticket, TicketFilter, TicketStatus, TicketUpdate,
};

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

const TICKET_COLUMNS: &str =
    "seq, id, number, epoch, class, status, created_at, called_at, completed_at";

const PATIENT_COLUMNS: &str =
    "id, ticket_id, registration, name, government_id, birth_date, phone, created_at";

/// SQLite-backed queue store.
///
/// "At most one called ticket" is enforced by a partial unique index, so it
/// holds even across processes sharing the database file.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteQueueStore {
    /// Create a new SQLite queue store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite queue store (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, QueueError> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(store_err)?;
        Self::initialize_schema(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                number INTEGER NOT NULL,
                epoch INTEGER NOT NULL DEFAULT 0,
                class TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                called_at TEXT,
                completed_at TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_number
                ON tickets(epoch, class, number);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_single_called
                ON tickets(status) WHERE status = 'called';
            CREATE INDEX IF NOT EXISTS idx_tickets_order ON tickets(created_at, seq);

            CREATE TABLE IF NOT EXISTS patients (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL UNIQUE REFERENCES tickets(id),
                registration TEXT NOT NULL,
                name TEXT NOT NULL,
                government_id TEXT NOT NULL,
                birth_date TEXT NOT NULL,
                phone TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(store_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::StoreUnavailable("connection lock poisoned".to_string()))
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind, row_id: &str) {
        // No receivers is fine
        let _ = self.changes.send(ChangeEvent {
            table,
            kind,
            row_id: row_id.to_string(),
        });
    }

    fn select_ticket(conn: &Connection, id: &str) -> Result<Option<Ticket>, QueueError> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(store_err)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let number: i64 = row.get(2)?;
        let epoch: i64 = row.get(3)?;
        let class: String = row.get(4)?;
        let status: String = row.get(5)?;
        let created_at: String = row.get(6)?;
        let called_at: Option<String> = row.get(7)?;
        let completed_at: Option<String> = row.get(8)?;

        Ok(Ticket {
            seq: row.get(0)?,
            id: row.get(1)?,
            number: number as u64,
            epoch: epoch as u64,
            class: class.parse().map_err(|e: String| conversion_err(4, e))?,
            status: status.parse().map_err(|e: String| conversion_err(5, e))?,
            created_at: parse_ts(6, &created_at)?,
            called_at: called_at.map(|s| parse_ts(7, &s)).transpose()?,
            completed_at: completed_at.map(|s| parse_ts(8, &s)).transpose()?,
        })
    }

    fn row_to_patient(row: &rusqlite::Row) -> rusqlite::Result<Patient> {
        let created_at: String = row.get(7)?;
        Ok(Patient {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            registration: row.get(2)?,
            name: row.get(3)?,
            government_id: row.get(4)?,
            birth_date: row.get(5)?,
            phone: row.get(6)?,
            created_at: parse_ts(7, &created_at)?,
        })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, QueueError> {
        let inserted = {
            let conn = self.lock()?;
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            let status = TicketStatus::Waiting;

            conn.execute(
                "INSERT INTO tickets (id, number, epoch, class, status, created_at) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    ticket.number as i64,
                    ticket.epoch as i64,
                    ticket.class.as_str(),
                    status.as_str(),
                    fmt_ts(&now),
                ],
            )
            .map_err(|e| {
                write_err(
                    e,
                    format!(
                        "{} ticket {} already issued in epoch {}",
                        ticket.class, ticket.number, ticket.epoch
                    ),
                )
            })?;

            Ticket {
                id,
                seq: conn.last_insert_rowid(),
                number: ticket.number,
                epoch: ticket.epoch,
                class: ticket.class,
                status,
                created_at: now,
                called_at: None,
                completed_at: None,
            }
        };

        self.notify(ChangeTable::Tickets, ChangeKind::Insert, &inserted.id);
        Ok(inserted)
    }

    async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError> {
        let conn = self.lock()?;
        Self::select_ticket(&conn, id)
    }

    async fn update_ticket(&self, id: &str, update: TicketUpdate) -> Result<Ticket, QueueError> {
        let updated = {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(store_err)?;

            let current = Self::select_ticket(&tx, id)?
                .ok_or_else(|| QueueError::NotFound(format!("ticket {}", id)))?;

            if let Some(expected) = update.expected_status {
                if current.status != expected {
                    return Err(QueueError::Conflict(format!(
                        "ticket {} is {}, expected {}",
                        id, current.status, expected
                    )));
                }
            }

            tx.execute(
                "UPDATE tickets SET status = COALESCE(?1, status), called_at = COALESCE(called_at, ?2), completed_at = COALESCE(completed_at, ?3) WHERE id = ?4",
                params![
                    update.status.map(|s| s.as_str()),
                    update.called_at.as_ref().map(fmt_ts),
                    update.completed_at.as_ref().map(fmt_ts),
                    id,
                ],
            )
            .map_err(|e| write_err(e, "another ticket is already called".to_string()))?;

            let updated = Self::select_ticket(&tx, id)?
                .ok_or_else(|| QueueError::NotFound(format!("ticket {}", id)))?;
            tx.commit().map_err(store_err)?;
            updated
        };

        self.notify(ChangeTable::Tickets, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, QueueError> {
        let conn = self.lock()?;

        let mut conditions = Vec::new();
        let mut values: Vec<&str> = Vec::new();
        if let Some(ref status) = filter.status {
            conditions.push("status = ?");
            values.push(status.as_str());
        }
        if let Some(ref status) = filter.exclude_status {
            conditions.push("status != ?");
            values.push(status.as_str());
        }
        if let Some(ref class) = filter.class {
            conditions.push("class = ?");
            values.push(class.as_str());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at ASC, seq ASC",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), Self::row_to_ticket)
            .map_err(store_err)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result.map_err(store_err)?);
        }
        Ok(tickets)
    }

    async fn get_patient_by_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Option<Patient>, QueueError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM patients WHERE ticket_id = ?", PATIENT_COLUMNS),
            params![ticket_id],
            Self::row_to_patient,
        )
        .optional()
        .map_err(store_err)
    }

    async fn insert_patient(
        &self,
        ticket_id: &str,
        patient: NewPatient,
    ) -> Result<Patient, QueueError> {
        let inserted = {
            let conn = self.lock()?;

            if Self::select_ticket(&conn, ticket_id)?.is_none() {
                return Err(QueueError::NotFound(format!("ticket {}", ticket_id)));
            }

            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO patients (id, ticket_id, registration, name, government_id, birth_date, phone, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    ticket_id,
                    patient.registration,
                    patient.name,
                    patient.government_id,
                    patient.birth_date,
                    patient.phone,
                    fmt_ts(&now),
                ],
            )
            .map_err(|e| {
                write_err(
                    e,
                    format!("patient already registered for ticket {}", ticket_id),
                )
            })?;

            Patient {
                id,
                ticket_id: ticket_id.to_string(),
                registration: patient.registration,
                name: patient.name,
                government_id: patient.government_id,
                birth_date: patient.birth_date,
                phone: patient.phone,
                created_at: now,
            }
        };

        self.notify(ChangeTable::Patients, ChangeKind::Insert, &inserted.id);
        Ok(inserted)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn store_err(e: rusqlite::Error) -> QueueError {
    QueueError::StoreUnavailable(e.to_string())
}

/// Constraint violations on writes are concurrent-mutation conflicts.
fn write_err(e: rusqlite::Error, conflict: String) -> QueueError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => QueueError::Conflict(conflict),
        _ => store_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketClass;

    fn create_test_store() -> SqliteQueueStore {
        SqliteQueueStore::in_memory().unwrap()
    }

    fn new_ticket(class: TicketClass, number: u64) -> NewTicket {
        NewTicket {
            number,
            class,
            epoch: 0,
        }
    }

    fn test_patient(name: &str) -> NewPatient {
        NewPatient {
            registration: "REG-001".to_string(),
            name: name.to_string(),
            government_id: "123.456.789-00".to_string(),
            birth_date: "1980-04-12".to_string(),
            phone: "(11) 98765-4321".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_ticket() {
        let store = create_test_store();
        let ticket = store
            .insert_ticket(new_ticket(TicketClass::Priority, 1))
            .await
            .unwrap();

        assert!(!ticket.id.is_empty());
        assert_eq!(ticket.number, 1);
        assert_eq!(ticket.class, TicketClass::Priority);
        assert_eq!(ticket.status, TicketStatus::Waiting);
        assert!(ticket.called_at.is_none());
        assert!(ticket.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_get_ticket_roundtrips_timestamps() {
        let store = create_test_store();
        let created = store
            .insert_ticket(new_ticket(TicketClass::Normal, 7))
            .await
            .unwrap();

        let fetched = store.get_ticket(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.seq, created.seq);
        assert_eq!(
            fetched.created_at.timestamp_micros(),
            created.created_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent_ticket() {
        let store = create_test_store();
        assert!(store.get_ticket("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_number_in_epoch_conflicts() {
        let store = create_test_store();
        store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();

        let dup = store.insert_ticket(new_ticket(TicketClass::Normal, 1)).await;
        assert!(matches!(dup, Err(QueueError::Conflict(_))));

        // Same number, other class or epoch is fine
        store
            .insert_ticket(new_ticket(TicketClass::Priority, 1))
            .await
            .unwrap();
        store
            .insert_ticket(NewTicket {
                number: 1,
                class: TicketClass::Normal,
                epoch: 1,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_orders_by_creation() {
        let store = create_test_store();
        let a = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();
        let b = store
            .insert_ticket(new_ticket(TicketClass::Priority, 1))
            .await
            .unwrap();
        let c = store
            .insert_ticket(new_ticket(TicketClass::Normal, 2))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_tickets(&TicketFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let store = create_test_store();
        let a = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();
        store
            .insert_ticket(new_ticket(TicketClass::Priority, 1))
            .await
            .unwrap();
        store
            .update_ticket(
                &a.id,
                TicketUpdate {
                    status: Some(TicketStatus::Completed),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let open = store
            .list_tickets(&TicketFilter::new().excluding_status(TicketStatus::Completed))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].class, TicketClass::Priority);

        let normal = store
            .list_tickets(&TicketFilter::new().with_class(TicketClass::Normal))
            .await
            .unwrap();
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].status, TicketStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_compare_and_swap() {
        let store = create_test_store();
        let ticket = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();

        let now = Utc::now();
        let called = store
            .update_ticket(
                &ticket.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, now),
            )
            .await
            .unwrap();
        assert_eq!(called.status, TicketStatus::Called);
        assert!(called.called_at.is_some());

        // Stale expectation
        let again = store
            .update_ticket(
                &ticket.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, now),
            )
            .await;
        assert!(matches!(again, Err(QueueError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_nonexistent_ticket() {
        let store = create_test_store();
        let result = store
            .update_ticket("nonexistent-id", TicketUpdate::default())
            .await;
        assert!(matches!(result, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_timestamps_are_never_overwritten() {
        let store = create_test_store();
        let ticket = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();

        let first = Utc::now();
        let done = store
            .update_ticket(
                &ticket.id,
                TicketUpdate {
                    status: Some(TicketStatus::Completed),
                    completed_at: Some(first),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let later = first + chrono::Duration::seconds(60);
        let again = store
            .update_ticket(
                &ticket.id,
                TicketUpdate {
                    completed_at: Some(later),
                    called_at: Some(later),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(again.completed_at, done.completed_at);
        // called_at was null, so it may be set once
        assert_eq!(
            again.called_at.map(|t| t.timestamp_micros()),
            Some(later.timestamp_micros())
        );
    }

    #[tokio::test]
    async fn test_single_called_constraint() {
        let store = create_test_store();
        let a = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();
        let b = store
            .insert_ticket(new_ticket(TicketClass::Normal, 2))
            .await
            .unwrap();

        let now = Utc::now();
        store
            .update_ticket(
                &a.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, now),
            )
            .await
            .unwrap();

        let second = store
            .update_ticket(
                &b.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, now),
            )
            .await;
        assert!(matches!(second, Err(QueueError::Conflict(_))));

        // Rejected update leaves the ticket untouched
        let b_now = store.get_ticket(&b.id).await.unwrap().unwrap();
        assert_eq!(b_now.status, TicketStatus::Waiting);
        assert!(b_now.called_at.is_none());
    }

    #[tokio::test]
    async fn test_patient_roundtrip_and_uniqueness() {
        let store = create_test_store();
        let ticket = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();

        assert!(store
            .get_patient_by_ticket(&ticket.id)
            .await
            .unwrap()
            .is_none());

        let patient = store
            .insert_patient(&ticket.id, test_patient("Maria Souza"))
            .await
            .unwrap();
        assert_eq!(patient.ticket_id, ticket.id);

        let fetched = store
            .get_patient_by_ticket(&ticket.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Maria Souza");
        assert_eq!(fetched.government_id, "123.456.789-00");

        let dup = store
            .insert_patient(&ticket.id, test_patient("Someone Else"))
            .await;
        assert!(matches!(dup, Err(QueueError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_patient_for_missing_ticket() {
        let store = create_test_store();
        let result = store
            .insert_patient("missing", test_patient("Maria Souza"))
            .await;
        assert!(matches!(result, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let store = create_test_store();
        let mut rx = store.subscribe();

        let ticket = store
            .insert_ticket(new_ticket(TicketClass::Normal, 1))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, ChangeTable::Tickets);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.row_id, ticket.id);

        store
            .update_ticket(
                &ticket.id,
                TicketUpdate::transition(TicketStatus::Waiting, TicketStatus::Called, Utc::now()),
            )
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);

        store
            .insert_patient(&ticket.id, test_patient("Maria Souza"))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, ChangeTable::Patients);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_notify() {
        let store = create_test_store();
        let mut rx = store.subscribe();

        let _ = store
            .update_ticket("missing", TicketUpdate::default())
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("queue.db");

        let ticket = {
            let store = SqliteQueueStore::new(&db_path).unwrap();
            store
                .insert_ticket(new_ticket(TicketClass::Priority, 4))
                .await
                .unwrap()
        };

        assert!(db_path.exists());

        // Reopen: tickets survive restarts
        let store = SqliteQueueStore::new(&db_path).unwrap();
        let fetched = store.get_ticket(&ticket.id).await.unwrap().unwrap();
        assert_eq!(fetched.number, 4);
        assert_eq!(fetched.class, TicketClass::Priority);
    }
}
