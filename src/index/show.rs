use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

#[derive(Debug)]
pub struct Show {
    id: i64,
    state: Mutex<ShowState>,
}

#[derive(Debug, Clone)]
pub(crate) struct ShowState {
    pub name: Option<String>,
    pub release_date: Option<i64>,
    pub short_summary: Option<String>,
    pub artwork_mrl: Option<String>,
    pub tvdb_id: Option<String>,
}

impl Show {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    pub fn release_date(&self) -> Option<i64> {
        self.state.lock().unwrap().release_date
    }

    pub fn short_summary(&self) -> Option<String> {
        self.state.lock().unwrap().short_summary.clone()
    }

    pub fn artwork_mrl(&self) -> Option<String> {
        self.state.lock().unwrap().artwork_mrl.clone()
    }

    pub fn tvdb_id(&self) -> Option<String> {
        self.state.lock().unwrap().tvdb_id.clone()
    }
}

/// One episode row per media with the ShowEpisode subtype. Not identity
/// cached; it is plain data hanging off its media.
#[derive(Debug, Clone)]
pub struct ShowEpisode {
    pub episode_id: i64,
    pub media_id: i64,
    pub show_id: i64,
    pub episode_number: Option<i64>,
    pub season_number: Option<i64>,
    pub title: Option<String>,
}

fn _get_show(row: &Row) -> rusqlite::Result<Show> {
    Ok(Show {
        id: row.get(0)?,
        state: Mutex::new(ShowState {
            name: row.get(1)?,
            release_date: row.get(2)?,
            short_summary: row.get(3)?,
            artwork_mrl: row.get(4)?,
            tvdb_id: row.get(5)?,
        }),
    })
}

fn _get_episode(row: &Row) -> rusqlite::Result<ShowEpisode> {
    Ok(ShowEpisode {
        episode_id: row.get(0)?,
        media_id: row.get(1)?,
        show_id: row.get(2)?,
        episode_number: row.get(3)?,
        season_number: row.get(4)?,
        title: row.get(5)?,
    })
}

const SHOW_COLS: &str =
    "show_id, name, release_date, short_summary, artwork_mrl, tvdb_id";
const EPISODE_COLS: &str =
    "episode_id, media_id, show_id, episode_number, season_number, title";

impl Index {
    pub fn show(&self, show_id: i64) -> Result<Option<Arc<Show>>> {
        trace!("get show show_id={}", show_id);

        self.caches().show.fetch(show_id, || self.load_show(show_id))
    }

    fn load_show(&self, show_id: i64) -> Result<Option<Show>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Show WHERE show_id = ?",
            SHOW_COLS
        ))?;

        let mut rows = st.query([show_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_show(row)?)),
            None => Ok(None),
        }
    }

    pub fn show_by_name(&self, name: &str) -> Result<Option<Arc<Show>>> {
        trace!("get show name='{}'", name);

        let mut st = self
            .connection()
            .prepare_cached("SELECT show_id FROM Show WHERE name = ?")?;

        let mut rows = st.query([name])?;

        match rows.next()? {
            Some(row) => self.show(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_show(&self, name: &str) -> Result<Arc<Show>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Show (name) VALUES (?)")?
            .execute([name])?;

        let show_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.show(show_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn shows(&self) -> Result<Vec<Arc<Show>>> {
        trace!("list shows");

        let mut st = self
            .connection()
            .prepare_cached(&format!("SELECT {} FROM Show ORDER BY name", SHOW_COLS))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let show = _get_show(row)?;
            let id = show.id;
            result.push(self.caches().show.resolve(id, || show));
        }

        Ok(result)
    }

    pub fn create_show_episode(
        &self,
        media_id: i64,
        show_id: i64,
        episode_number: Option<i64>,
        season_number: Option<i64>,
        title: Option<&str>,
    ) -> Result<ShowEpisode> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO ShowEpisode
                    (media_id, show_id, episode_number, season_number, title)
                VALUES (?, ?, ?, ?, ?)",
            )?
            .execute(params![media_id, show_id, episode_number, season_number, title])?;

        let episode_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.show_episode(episode_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn show_episode(&self, episode_id: i64) -> Result<Option<ShowEpisode>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM ShowEpisode WHERE episode_id = ?",
            EPISODE_COLS
        ))?;

        let mut rows = st.query([episode_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_episode(row)?)),
            None => Ok(None),
        }
    }

    pub fn episodes_of_show(&self, show_id: i64) -> Result<Vec<ShowEpisode>> {
        trace!("list episodes by show_id={}", show_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM ShowEpisode WHERE show_id = ?
            ORDER BY season_number, episode_number",
            EPISODE_COLS
        ))?;

        let mut rows = st.query([show_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            result.push(_get_episode(row)?);
        }

        Ok(result)
    }
}
