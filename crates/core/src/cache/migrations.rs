//! Schema migrations for the cache store.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration runs
//! in its own transaction together with its bookkeeping row, so a failure
//! leaves the store at the last fully applied version.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::{Error, format_timestamp};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "ocr_cache", sql: include_str!("../../migrations/001_ocr_cache.sql") },
    Migration { version: 2, name: "snapshots", sql: include_str!("../../migrations/002_snapshots.sql") },
];

/// Highest version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

/// Bring the store up to [`latest_version`].
///
/// A store written by a newer build is left untouched.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = applied_version(conn)?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            tracing::info!(version = migration.version, name = migration.name, "applying cache migration");

            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, format_timestamp(chrono::Utc::now())],
            )?;
            tx.commit()?;
        }

        if current > latest_version() {
            tracing::warn!(current, known = latest_version(), "cache store is newer than this build");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, name: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                [name],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        assert!(table_exists(&conn, "ocr_cache").await);
        assert!(table_exists(&conn, "snapshots").await);

        let rows: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_resumes_from_recorded_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| -> Result<(), Error> {
            applied_version(conn)?;
            conn.execute_batch(MIGRATIONS[0].sql)?;
            conn.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (1, 'ocr_cache', '2024-01-01T00:00:00.000000Z')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
        assert!(!table_exists(&conn, "snapshots").await);

        run(&conn).await.unwrap();

        assert!(table_exists(&conn, "snapshots").await);
        let version = conn.call(|conn| applied_version(conn)).await.unwrap();
        assert_eq!(version, latest_version());
    }

    #[tokio::test]
    async fn test_newer_store_left_alone() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        conn.call(|conn| {
            conn.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (99, 'future', '2030-01-01T00:00:00.000000Z')",
                [],
            )
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();
        let version = conn.call(|conn| applied_version(conn)).await.unwrap();
        assert_eq!(version, 99);
    }
}
