use std::thread;
use std::time::Duration;

use log::{error, warn};
use rusqlite::hooks::Action;
use rusqlite::Connection;

use crate::index::Index;
use crate::{Error, Result};

/// How many times a write is retried when the database is locked by
/// another connection.
pub(crate) const LOCK_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookReason {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookTable {
    Device,
    Folder,
    File,
    Media,
    Album,
    AlbumTrack,
    Artist,
    Genre,
    Playlist,
    Show,
    Movie,
}

impl HookTable {
    fn from_name(name: &str) -> Option<HookTable> {
        match name {
            "Device" => Some(HookTable::Device),
            "Folder" => Some(HookTable::Folder),
            "File" => Some(HookTable::File),
            "Media" => Some(HookTable::Media),
            "Album" => Some(HookTable::Album),
            "AlbumTrack" => Some(HookTable::AlbumTrack),
            "Artist" => Some(HookTable::Artist),
            "Genre" => Some(HookTable::Genre),
            "Playlist" => Some(HookTable::Playlist),
            "Show" => Some(HookTable::Show),
            "Movie" => Some(HookTable::Movie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RowChange {
    pub table: HookTable,
    pub reason: HookReason,
    pub rowid: i64,
}

/// Installs the sqlite update hook feeding the connection's pending-change
/// buffer. Changes are buffered until the outermost transaction commits and
/// are dropped on rollback, so downstream consumers only ever observe
/// committed rows.
pub(crate) fn install_update_hook(
    conn: &Connection,
    pending: std::sync::Arc<std::sync::Mutex<Vec<RowChange>>>,
) {
    conn.update_hook(Some(
        move |action: Action, _db: &str, table: &str, rowid: i64| {
            let reason = match action {
                Action::SQLITE_INSERT => HookReason::Insert,
                Action::SQLITE_UPDATE => HookReason::Update,
                Action::SQLITE_DELETE => HookReason::Delete,
                _ => return,
            };
            if let Some(table) = HookTable::from_name(table) {
                pending
                    .lock()
                    .unwrap()
                    .push(RowChange { table, reason, rowid });
            }
        },
    ));
}

/// Scoped transaction. Rolls back unless `commit` is called; nested begins
/// join the outermost transaction.
pub(crate) struct Transaction<'a> {
    index: &'a Index,
    outer: bool,
    done: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(index: &'a Index) -> Result<Transaction<'a>> {
        let outer = index.tx_depth.get() == 0;
        if outer {
            index.connection().execute_batch("BEGIN")?;
        }
        index.tx_depth.set(index.tx_depth.get() + 1);
        Ok(Transaction {
            index,
            outer,
            done: false,
        })
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        self.done = true;
        self.index.tx_depth.set(self.index.tx_depth.get() - 1);
        if self.outer {
            self.index.connection().execute_batch("COMMIT")?;
            self.index.flush_changes()?;
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.index.tx_depth.set(self.index.tx_depth.get() - 1);
        if self.outer {
            if let Err(e) = self.index.connection().execute_batch("ROLLBACK") {
                error!("rollback failed: {}", e);
            }
            self.index.discard_changes();
        }
    }
}

/// Runs `f`, retrying up to `attempts` times when the database reports
/// busy/locked. Any other error propagates immediately.
pub(crate) fn with_retries<T>(
    attempts: u32,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        let res = f();
        match &res {
            Err(Error::Database(rusqlite::Error::SqliteFailure(e, _)))
                if attempt < attempts
                    && (e.code == rusqlite::ErrorCode::DatabaseBusy
                        || e.code == rusqlite::ErrorCode::DatabaseLocked) =>
            {
                attempt += 1;
                warn!("database locked, retrying ({}/{})", attempt, attempts);
                thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
            }
            _ => return res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_on_lock() {
        let mut calls = 0;
        let res: Result<()> = with_retries(3, || {
            calls += 1;
            Err(Error::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                None,
            )))
        });
        assert!(res.is_err());
        assert_eq!(4, calls);

        calls = 0;
        let res: Result<()> = with_retries(3, || {
            calls += 1;
            Err(Error::ConstraintViolation("nope".into()))
        });
        assert!(res.is_err());
        assert_eq!(1, calls);
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let res = with_retries(3, || {
            calls += 1;
            if calls < 3 {
                Err(Error::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    None,
                )))
            } else {
                Ok(42)
            }
        });
        assert_eq!(42, res.unwrap());
    }
}
