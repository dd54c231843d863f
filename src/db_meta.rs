use log::{info, trace, warn};
use rusqlite::{Connection, OptionalExtension};

use crate::schema;
use crate::{Error, Result};

/// Brings the database up to the current model version. Fresh databases get
/// the full model; databases at the current version are left alone; older
/// models are wiped and recreated (the baseline migration); newer models
/// abort initialization.
pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    trace!("trying to get database model version");

    conn.execute_batch(schema::SETTINGS_SCHEMA)?;

    let version: Option<u32> = conn
        .query_row("SELECT db_model_version FROM Settings", [], |row| {
            row.get(0)
        })
        .optional()?;

    match version {
        None => {
            info!(
                "creating database model version {}",
                schema::DB_MODEL_VERSION
            );
            create_model(conn, false)?;
        }
        Some(v) if v == schema::DB_MODEL_VERSION => {
            trace!("database model up to date");
        }
        Some(v) if v < schema::DB_MODEL_VERSION => {
            warn!(
                "database model version {} is too old, wiping and recreating",
                v
            );
            create_model(conn, true)?;
        }
        Some(v) => {
            return Err(Error::SchemaMigration(format!(
                "database model version {} is newer than supported version {}",
                v,
                schema::DB_MODEL_VERSION
            )));
        }
    }

    Ok(())
}

fn create_model(conn: &mut Connection, wipe: bool) -> Result<()> {
    let tx = conn.transaction().map_err(Error::Database)?;
    if wipe {
        tx.execute_batch(schema::WIPE_SCHEMA)?;
        tx.execute_batch(schema::SETTINGS_SCHEMA)?;
    }
    tx.execute_batch(schema::MODEL_SCHEMA)?;
    tx.execute_batch(schema::DEFAULT_ARTISTS)?;
    tx.execute_batch(schema::TRIGGER_SCHEMA)?;
    tx.execute_batch(schema::FTS_SCHEMA)?;
    tx.execute(
        "INSERT INTO Settings (db_model_version) VALUES (?)",
        [schema::DB_MODEL_VERSION],
    )?;
    tx.commit().map_err(Error::Database)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn creates_fresh_model() {
        let mut conn = open();
        ensure_schema(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT db_model_version FROM Settings", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(schema::DB_MODEL_VERSION, version);

        // Sentinel artists are part of the baseline model
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(artist_id) FROM Artist WHERE artist_id IN (1, 2)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(2, count);
    }

    #[test]
    fn idempotent() {
        let mut conn = open();
        ensure_schema(&mut conn).unwrap();
        ensure_schema(&mut conn).unwrap();
    }

    #[test]
    fn wipes_old_model() {
        let mut conn = open();
        conn.execute_batch(
            "CREATE TABLE Settings (db_model_version INTEGER NOT NULL);
            CREATE TABLE Media (media_id INTEGER PRIMARY KEY, legacy_column TEXT);
            INSERT INTO Settings (db_model_version) VALUES (3);
            INSERT INTO Media (legacy_column) VALUES ('old');",
        )
        .unwrap();

        ensure_schema(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT db_model_version FROM Settings", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(schema::DB_MODEL_VERSION, version);

        let count: i64 = conn
            .query_row("SELECT COUNT(media_id) FROM Media", [], |row| row.get(0))
            .unwrap();
        assert_eq!(0, count);
    }

    #[test]
    fn rejects_newer_model() {
        let mut conn = open();
        conn.execute_batch(
            "CREATE TABLE Settings (db_model_version INTEGER NOT NULL);
            INSERT INTO Settings (db_model_version) VALUES (99);",
        )
        .unwrap();

        let res = ensure_schema(&mut conn);
        assert!(matches!(res, Err(Error::SchemaMigration(_))));
    }
}
