//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use hygrobot_types::{AlertState, AlertType, HumidityState, Reading, Recipient, RecipientId};

use crate::error::{Error, Result};
use crate::schema;

/// SQLite-based store for hygrobot data.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // === Recipient operations ===

    /// Insert a new recipient.
    pub fn create_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.conn.execute(
            "INSERT INTO recipients (id, humidity_min, humidity_max, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                recipient.id.get(),
                recipient.humidity_min,
                recipient.humidity_max,
                fmt_ts(recipient.created_at)?,
                fmt_ts(recipient.updated_at)?,
            ],
        )?;
        debug!(recipient = %recipient.id, "created recipient");
        Ok(())
    }

    /// Update an existing recipient's thresholds.
    pub fn update_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.conn.execute(
            "UPDATE recipients SET humidity_min = ?2, humidity_max = ?3, updated_at = ?4
             WHERE id = ?1",
            rusqlite::params![
                recipient.id.get(),
                recipient.humidity_min,
                recipient.humidity_max,
                fmt_ts(recipient.updated_at)?,
            ],
        )?;
        Ok(())
    }

    /// Get a recipient by id.
    pub fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, humidity_min, humidity_max, created_at, updated_at
             FROM recipients WHERE id = ?",
        )?;

        stmt.query_row([id.get()], row_to_recipient_raw)
            .optional()?
            .map(raw_to_recipient)
            .transpose()
    }

    /// All recipients ordered by id.
    pub fn list_recipients(&self) -> Result<Vec<Recipient>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, humidity_min, humidity_max, created_at, updated_at
             FROM recipients ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], row_to_recipient_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(raw_to_recipient).collect()
    }

    /// Delete a recipient; its alert state goes with it via the cascade.
    /// Deleting an unknown id is not an error.
    pub fn delete_recipient(&self, id: RecipientId) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM recipients WHERE id = ?", [id.get()])?;
        if deleted > 0 {
            info!(recipient = %id, "deleted recipient");
        }
        Ok(())
    }

    // === Alert state operations ===

    /// Get the alert state for a recipient.
    pub fn get_alert_state(&self, id: RecipientId) -> Result<Option<AlertState>> {
        let mut stmt = self.conn.prepare(
            "SELECT recipient_id, current_state, last_alert_time, last_alert_type
             FROM alert_states WHERE recipient_id = ?",
        )?;

        let raw = stmt
            .query_row([id.get()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .optional()?;

        let Some((raw_id, state, time, alert_type)) = raw else {
            return Ok(None);
        };
        Ok(Some(AlertState {
            recipient_id: RecipientId::new(raw_id)?,
            current_state: HumidityState::parse(&state)?,
            last_alert_time: time.as_deref().map(parse_ts).transpose()?,
            last_alert_type: alert_type
                .as_deref()
                .map(AlertType::parse)
                .transpose()?,
        }))
    }

    /// Insert or replace the alert state for its recipient.
    pub fn set_alert_state(&self, state: &AlertState) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO alert_states
                 (recipient_id, current_state, last_alert_time, last_alert_type)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                state.recipient_id.get(),
                state.current_state.as_str(),
                state.last_alert_time.map(fmt_ts).transpose()?,
                state.last_alert_type.map(AlertType::as_str),
            ],
        )?;
        Ok(())
    }

    // === Reading history operations ===

    /// Append a reading to history.
    pub fn insert_reading(&self, reading: &Reading) -> Result<()> {
        self.conn.execute(
            "INSERT INTO readings
                 (recorded_at, humidity, dht_temperature, lm35_temperature,
                  thermistor_temperature)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                fmt_ts(reading.timestamp)?,
                reading.humidity,
                reading.dht_temperature,
                reading.lm35_temperature,
                reading.thermistor_temperature,
            ],
        )?;
        Ok(())
    }

    /// Most recently recorded reading.
    pub fn latest_reading(&self) -> Result<Option<Reading>> {
        let mut stmt = self.conn.prepare(
            "SELECT recorded_at, humidity, dht_temperature, lm35_temperature,
                    thermistor_temperature
             FROM readings ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )?;

        stmt.query_row([], row_to_reading_raw)
            .optional()?
            .map(raw_to_reading)
            .transpose()
    }

    /// Readings from the last `minutes`, newest first, capped at `limit`.
    pub fn recent_readings(&self, minutes: u32, limit: u32) -> Result<Vec<Reading>> {
        let cutoff = OffsetDateTime::now_utc() - Duration::minutes(i64::from(minutes));
        let mut stmt = self.conn.prepare(
            "SELECT recorded_at, humidity, dht_temperature, lm35_temperature,
                    thermistor_temperature
             FROM readings WHERE recorded_at >= ?1
             ORDER BY recorded_at DESC, id DESC LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![fmt_ts(cutoff)?, limit], row_to_reading_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(raw_to_reading).collect()
    }

    /// Delete readings older than `days`; returns how many were removed.
    pub fn purge_readings_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(i64::from(days));
        let deleted = self.conn.execute(
            "DELETE FROM readings WHERE recorded_at < ?",
            [fmt_ts(cutoff)?],
        )?;
        if deleted > 0 {
            info!(deleted, days, "purged old readings");
        }
        Ok(deleted as u64)
    }
}

type RecipientRaw = (i64, f64, f64, String, String);
type ReadingRaw = (String, f64, f64, f64, f64);

fn row_to_recipient_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipientRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn raw_to_recipient((id, min, max, created, updated): RecipientRaw) -> Result<Recipient> {
    Ok(Recipient::new(
        RecipientId::new(id)?,
        min,
        max,
        parse_ts(&created)?,
        parse_ts(&updated)?,
    )?)
}

fn row_to_reading_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingRaw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn raw_to_reading((recorded_at, humidity, dht, lm35, thermistor): ReadingRaw) -> Result<Reading> {
    Ok(Reading::new(
        humidity,
        dht,
        lm35,
        thermistor,
        parse_ts(&recorded_at)?,
    )?)
}

/// Timestamps are stored as RFC 3339 UTC truncated to whole seconds so the
/// text ordering matches the chronological one.
fn fmt_ts(timestamp: OffsetDateTime) -> Result<String> {
    timestamp
        .to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))?
        .format(&Rfc3339)
        .map_err(|e| Error::InvalidTimestamp(e.to_string()))
}

fn parse_ts(text: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339).map_err(|_| Error::InvalidTimestamp(text.to_string()))
}
