use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::info;

use crate::event::EventRecord;
use crate::reading::NormalizedReading;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Durable sink for ingested records. One method per record type.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn save_reading(&self, reading: &NormalizedReading) -> Result<(), StoreError>;
    async fn save_event(&self, event: &EventRecord) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS solar_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    battery_voltage REAL NOT NULL,
    battery_current REAL NOT NULL,
    panel_voltage REAL NOT NULL,
    panel_power INTEGER NOT NULL,
    load_current REAL NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS solar_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    event TEXT NOT NULL
);
";

/// SQLite-backed repository. Writes are serialized on one connection.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn reading_count(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM solar_readings").await
    }

    pub async fn event_count(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM solar_events").await
    }

    /// Stored `event` column values, oldest first.
    pub async fn event_texts(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT event FROM solar_events ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<Result<Vec<String>, _>>()?)
        })
        .await
    }

    async fn count(&self, sql: &'static str) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

#[async_trait]
impl TelemetryRepository for SqliteRepository {
    async fn save_reading(&self, reading: &NormalizedReading) -> Result<(), StoreError> {
        let recorded_at = reading
            .recorded_at_utc()
            .ok_or(StoreError::TimestampOutOfRange(reading.recorded_at))?
            .to_rfc3339();
        let reading = reading.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO solar_readings (battery_voltage, battery_current, panel_voltage, panel_power, load_current, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    reading.battery_voltage,
                    reading.battery_current,
                    reading.panel_voltage,
                    reading.panel_power,
                    reading.load_current,
                    recorded_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        let timestamp = DateTime::<Utc>::from_timestamp(event.timestamp, 0)
            .ok_or(StoreError::TimestampOutOfRange(event.timestamp))?
            .to_rfc3339();
        let text = event.text.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO solar_events (timestamp, event) VALUES (?1, ?2)",
                params![timestamp, text],
            )?;
            Ok(())
        })
        .await
    }
}

/// In-memory repository for tests and dry runs.
///
/// `fail_after(n)` makes every reading save after the first `n` fail.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    readings: Mutex<Vec<NormalizedReading>>,
    events: Mutex<Vec<EventRecord>>,
    fail_readings_after: Option<usize>,
    fail_events: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_after(mut self, saved: usize) -> Self {
        self.fail_readings_after = Some(saved);
        self
    }

    pub fn fail_events(mut self) -> Self {
        self.fail_events = true;
        self
    }

    pub fn readings(&self) -> Vec<NormalizedReading> {
        self.readings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TelemetryRepository for MemoryRepository {
    async fn save_reading(&self, reading: &NormalizedReading) -> Result<(), StoreError> {
        let mut readings = self.readings.lock().map_err(|_| StoreError::Poisoned)?;
        if self
            .fail_readings_after
            .is_some_and(|limit| readings.len() >= limit)
        {
            return Err(StoreError::Other("injected reading failure".to_string()));
        }
        readings.push(reading.clone());
        Ok(())
    }

    async fn save_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        if self.fail_events {
            return Err(StoreError::Other("injected event failure".to_string()));
        }
        let mut events = self.events.lock().map_err(|_| StoreError::Poisoned)?;
        events.push(event.clone());
        Ok(())
    }
}
