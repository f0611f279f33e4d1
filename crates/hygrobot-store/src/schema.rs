//! Database schema and migrations.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Timestamps are RFC 3339 UTC text truncated to whole seconds, so
/// lexicographic comparison matches chronological order.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Registered chat recipients and their thresholds
        CREATE TABLE IF NOT EXISTS recipients (
            id INTEGER PRIMARY KEY,
            humidity_min REAL NOT NULL CHECK (humidity_min >= 0 AND humidity_min <= 100),
            humidity_max REAL NOT NULL CHECK (humidity_max >= 0 AND humidity_max <= 100),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (humidity_min < humidity_max)
        );

        -- One alert state per recipient
        CREATE TABLE IF NOT EXISTS alert_states (
            recipient_id INTEGER PRIMARY KEY
                REFERENCES recipients(id) ON DELETE CASCADE,
            current_state TEXT NOT NULL
                CHECK (current_state IN ('normal', 'high_humidity', 'low_humidity')),
            last_alert_time TEXT,
            last_alert_type TEXT
                CHECK (last_alert_type IS NULL OR last_alert_type IN ('high', 'low'))
        );

        -- Append-only reading history
        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recorded_at TEXT NOT NULL,
            humidity REAL NOT NULL,
            dht_temperature REAL NOT NULL,
            lm35_temperature REAL NOT NULL,
            thermistor_temperature REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_readings_recorded_at
            ON readings(recorded_at);
        "#,
    )?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    // Add future migrations here
    // if old_version < 2 { migrate_to_v2(conn)?; }

    let _ = old_version;
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"recipients".to_string()));
        assert!(tables.contains(&"alert_states".to_string()));
        assert!(tables.contains(&"readings".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn threshold_checks_are_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO recipients (id, humidity_min, humidity_max, created_at, updated_at)
             VALUES (1, 70.0, 60.0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO recipients (id, humidity_min, humidity_max, created_at, updated_at)
             VALUES (1, 40.0, 120.0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
