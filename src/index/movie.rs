use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

#[derive(Debug)]
pub struct Movie {
    id: i64,
    media_id: i64,
    state: Mutex<MovieState>,
}

#[derive(Debug, Clone)]
pub(crate) struct MovieState {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub artwork_mrl: Option<String>,
    pub imdb_id: Option<String>,
}

impl Movie {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn media_id(&self) -> i64 {
        self.media_id
    }

    pub fn title(&self) -> Option<String> {
        self.state.lock().unwrap().title.clone()
    }

    pub fn summary(&self) -> Option<String> {
        self.state.lock().unwrap().summary.clone()
    }

    pub fn artwork_mrl(&self) -> Option<String> {
        self.state.lock().unwrap().artwork_mrl.clone()
    }

    pub fn imdb_id(&self) -> Option<String> {
        self.state.lock().unwrap().imdb_id.clone()
    }
}

fn _get_movie(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        media_id: row.get(1)?,
        state: Mutex::new(MovieState {
            title: row.get(2)?,
            summary: row.get(3)?,
            artwork_mrl: row.get(4)?,
            imdb_id: row.get(5)?,
        }),
    })
}

const MOVIE_COLS: &str = "movie_id, media_id, title, summary, artwork_mrl, imdb_id";

impl Index {
    pub fn movie(&self, movie_id: i64) -> Result<Option<Arc<Movie>>> {
        trace!("get movie movie_id={}", movie_id);

        self.caches()
            .movie
            .fetch(movie_id, || self.load_movie(movie_id))
    }

    fn load_movie(&self, movie_id: i64) -> Result<Option<Movie>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Movie WHERE movie_id = ?",
            MOVIE_COLS
        ))?;

        let mut rows = st.query([movie_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_movie(row)?)),
            None => Ok(None),
        }
    }

    pub fn movie_of_media(&self, media_id: i64) -> Result<Option<Arc<Movie>>> {
        trace!("get movie media_id={}", media_id);

        let mut st = self
            .connection()
            .prepare_cached("SELECT movie_id FROM Movie WHERE media_id = ?")?;

        let mut rows = st.query([media_id])?;

        match rows.next()? {
            Some(row) => self.movie(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_movie(&self, media_id: i64, title: &str) -> Result<Arc<Movie>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Movie (media_id, title) VALUES (?, ?)")?
            .execute(params![media_id, title])?;

        let movie_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.movie(movie_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn movies(&self) -> Result<Vec<Arc<Movie>>> {
        trace!("list movies");

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Movie ORDER BY title",
            MOVIE_COLS
        ))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let movie = _get_movie(row)?;
            let id = movie.id;
            result.push(self.caches().movie.resolve(id, || movie));
        }

        Ok(result)
    }
}
