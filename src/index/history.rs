use chrono::Utc;
use log::trace;
use rusqlite::Row;

use super::Index;
use crate::Result;

/// One playback of an externally-streamed MRL. The table is capped by a
/// trigger; local media history is derived from `Media.last_played_date`.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub history_id: i64,
    pub mrl: String,
    pub insertion_date: i64,
}

fn _get_history(row: &Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        history_id: row.get(0)?,
        mrl: row.get(1)?,
        insertion_date: row.get(2)?,
    })
}

impl Index {
    pub fn add_to_history(&self, mrl: &str) -> Result<()> {
        trace!("add history mrl='{}'", mrl);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("INSERT INTO History (mrl, insertion_date) VALUES (?, ?)")?
            .execute(rusqlite::params![mrl, Utc::now().timestamp()])?;
        t.commit()?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        trace!("list history");

        let mut st = self.connection().prepare_cached(
            "SELECT history_id, mrl, insertion_date FROM History
            ORDER BY insertion_date DESC",
        )?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            result.push(_get_history(row)?);
        }

        Ok(result)
    }

    pub fn clear_history(&self) -> Result<()> {
        trace!("clear history");

        let t = self.begin()?;
        self.connection()
            .prepare_cached("DELETE FROM History")?
            .execute([])?;
        t.commit()?;
        Ok(())
    }
}
