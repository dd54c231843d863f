use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::Row;

use super::{fts_pattern, Index};
use crate::Result;

#[derive(Debug)]
pub struct Genre {
    id: i64,
    state: Mutex<GenreState>,
}

#[derive(Debug, Clone)]
pub(crate) struct GenreState {
    pub name: String,
}

impl Genre {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.lock().unwrap().name.clone()
    }
}

fn _get_genre(row: &Row) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get(0)?,
        state: Mutex::new(GenreState { name: row.get(1)? }),
    })
}

impl Index {
    pub fn genre(&self, genre_id: i64) -> Result<Option<Arc<Genre>>> {
        trace!("get genre genre_id={}", genre_id);

        self.caches()
            .genre
            .fetch(genre_id, || self.load_genre(genre_id))
    }

    fn load_genre(&self, genre_id: i64) -> Result<Option<Genre>> {
        let mut st = self
            .connection()
            .prepare_cached("SELECT genre_id, name FROM Genre WHERE genre_id = ?")?;

        let mut rows = st.query([genre_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_genre(row)?)),
            None => Ok(None),
        }
    }

    /// Case-insensitive through the column collation.
    pub fn genre_by_name(&self, name: &str) -> Result<Option<Arc<Genre>>> {
        trace!("get genre name='{}'", name);

        let mut st = self
            .connection()
            .prepare_cached("SELECT genre_id FROM Genre WHERE name = ?")?;

        let mut rows = st.query([name])?;

        match rows.next()? {
            Some(row) => self.genre(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_genre(&self, name: &str) -> Result<Arc<Genre>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Genre (name) VALUES (?)")?
            .execute([name])?;

        let genre_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.genre(genre_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn genres(&self) -> Result<Vec<Arc<Genre>>> {
        trace!("list genres");

        let mut st = self
            .connection()
            .prepare_cached("SELECT genre_id, name FROM Genre ORDER BY name")?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let genre = _get_genre(row)?;
            let id = genre.id;
            result.push(self.caches().genre.resolve(id, || genre));
        }

        Ok(result)
    }

    pub fn search_genres(&self, pattern: &str) -> Result<Vec<Arc<Genre>>> {
        trace!("search genres pattern='{}'", pattern);

        let mut st = self.connection().prepare_cached(
            "SELECT genre_id, name FROM Genre WHERE genre_id IN
                (SELECT rowid FROM GenreFts WHERE GenreFts MATCH ?)",
        )?;

        let mut rows = st.query([fts_pattern(pattern)])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let genre = _get_genre(row)?;
            let id = genre.id;
            result.push(self.caches().genre.resolve(id, || genre));
        }

        Ok(result)
    }
}
