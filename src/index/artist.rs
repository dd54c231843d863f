use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::{fts_pattern, Index};
use crate::Result;

/// Sentinel artist owning tracks without any artist tag.
pub const UNKNOWN_ARTIST_ID: i64 = 1;
/// Sentinel artist fronting albums whose tracks disagree on their artist.
pub const VARIOUS_ARTISTS_ID: i64 = 2;

#[derive(Debug)]
pub struct Artist {
    id: i64,
    state: Mutex<ArtistState>,
}

#[derive(Debug, Clone)]
pub(crate) struct ArtistState {
    pub name: Option<String>,
    pub short_bio: Option<String>,
    pub artwork_mrl: Option<String>,
    pub nb_albums: i64,
    pub is_present: bool,
}

impl Artist {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// None for the two sentinel rows.
    pub fn name(&self) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    pub fn short_bio(&self) -> Option<String> {
        self.state.lock().unwrap().short_bio.clone()
    }

    pub fn artwork_mrl(&self) -> Option<String> {
        self.state.lock().unwrap().artwork_mrl.clone()
    }

    pub fn nb_albums(&self) -> i64 {
        self.state.lock().unwrap().nb_albums
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: ArtistState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_artist(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        state: Mutex::new(ArtistState {
            name: row.get(1)?,
            short_bio: row.get(2)?,
            artwork_mrl: row.get(3)?,
            nb_albums: row.get(4)?,
            is_present: row.get(5)?,
        }),
    })
}

const ARTIST_COLS: &str =
    "artist_id, name, short_bio, artwork_mrl, nb_albums, is_present";

impl Index {
    pub fn artist(&self, artist_id: i64) -> Result<Option<Arc<Artist>>> {
        trace!("get artist artist_id={}", artist_id);

        self.caches()
            .artist
            .fetch(artist_id, || self.load_artist(artist_id))
    }

    fn load_artist(&self, artist_id: i64) -> Result<Option<Artist>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Artist WHERE artist_id = ?",
            ARTIST_COLS
        ))?;

        let mut rows = st.query([artist_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_artist(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_artist_state(
        &self,
        artist_id: i64,
    ) -> Result<Option<ArtistState>> {
        Ok(self
            .load_artist(artist_id)?
            .map(|a| a.state.into_inner().unwrap()))
    }

    pub fn artist_by_name(&self, name: &str) -> Result<Option<Arc<Artist>>> {
        trace!("get artist name='{}'", name);

        let mut st = self
            .connection()
            .prepare_cached("SELECT artist_id FROM Artist WHERE name = ?")?;

        let mut rows = st.query([name])?;

        match rows.next()? {
            Some(row) => self.artist(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_artist(&self, name: &str) -> Result<Arc<Artist>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Artist (name) VALUES (?)")?
            .execute([name])?;

        let artist_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.artist(artist_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    /// All artists with at least one album; the sentinels join in when
    /// `include_sentinels` is set.
    pub fn artists(&self, include_sentinels: bool) -> Result<Vec<Arc<Artist>>> {
        trace!("list artists");

        let sql = if include_sentinels {
            format!(
                "SELECT {} FROM Artist WHERE is_present = 1 ORDER BY name",
                ARTIST_COLS
            )
        } else {
            format!(
                "SELECT {} FROM Artist
                WHERE is_present = 1 AND name IS NOT NULL ORDER BY name",
                ARTIST_COLS
            )
        };

        let mut st = self.connection().prepare_cached(&sql)?;
        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let artist = _get_artist(row)?;
            let id = artist.id;
            result.push(self.caches().artist.resolve(id, || artist));
        }

        Ok(result)
    }

    pub fn search_artists(&self, pattern: &str) -> Result<Vec<Arc<Artist>>> {
        trace!("search artists pattern='{}'", pattern);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Artist WHERE artist_id IN
                (SELECT rowid FROM ArtistFts WHERE ArtistFts MATCH ?)",
            ARTIST_COLS
        ))?;

        let mut rows = st.query([fts_pattern(pattern)])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let artist = _get_artist(row)?;
            let id = artist.id;
            result.push(self.caches().artist.resolve(id, || artist));
        }

        Ok(result)
    }

    pub fn set_artist_short_bio(&self, artist_id: i64, bio: &str) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Artist SET short_bio = ? WHERE artist_id = ?")?
            .execute(params![bio, artist_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_artist_artwork_mrl(&self, artist_id: i64, mrl: &str) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Artist SET artwork_mrl = ? WHERE artist_id = ?")?
            .execute(params![mrl, artist_id])?;
        t.commit()?;
        Ok(())
    }

    pub(crate) fn update_artist_nb_albums(
        &self,
        artist_id: i64,
        increment: i64,
    ) -> Result<()> {
        trace!(
            "update artist artist_id={} nb_albums{:+}",
            artist_id,
            increment
        );

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "UPDATE Artist SET nb_albums = nb_albums + ? WHERE artist_id = ?",
            )?
            .execute(params![increment, artist_id])?;
        t.commit()?;
        Ok(())
    }

    /// Links a media to the artists credited on it.
    pub fn add_media_artist(&self, media_id: i64, artist_id: i64) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "INSERT OR IGNORE INTO MediaArtistRelation (media_id, artist_id)
                VALUES (?, ?)",
            )?
            .execute(params![media_id, artist_id])?;
        t.commit()?;
        Ok(())
    }
}
