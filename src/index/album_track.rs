use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

/// The album membership of one media. Each media has at most one track row.
#[derive(Debug)]
pub struct AlbumTrack {
    id: i64,
    media_id: i64,
    album_id: i64,
    state: Mutex<AlbumTrackState>,
}

#[derive(Debug, Clone)]
pub(crate) struct AlbumTrackState {
    pub artist_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub is_present: bool,
}

impl AlbumTrack {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn media_id(&self) -> i64 {
        self.media_id
    }

    pub fn album_id(&self) -> i64 {
        self.album_id
    }

    pub fn artist_id(&self) -> Option<i64> {
        self.state.lock().unwrap().artist_id
    }

    pub fn genre_id(&self) -> Option<i64> {
        self.state.lock().unwrap().genre_id
    }

    pub fn track_number(&self) -> Option<i64> {
        self.state.lock().unwrap().track_number
    }

    pub fn disc_number(&self) -> Option<i64> {
        self.state.lock().unwrap().disc_number
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: AlbumTrackState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_album_track(row: &Row) -> rusqlite::Result<AlbumTrack> {
    Ok(AlbumTrack {
        id: row.get(0)?,
        media_id: row.get(1)?,
        album_id: row.get(2)?,
        state: Mutex::new(AlbumTrackState {
            artist_id: row.get(3)?,
            genre_id: row.get(4)?,
            track_number: row.get(5)?,
            disc_number: row.get(6)?,
            is_present: row.get(7)?,
        }),
    })
}

const TRACK_COLS: &str = "track_id, media_id, album_id, artist_id, genre_id, \
    track_number, disc_number, is_present";

impl Index {
    pub fn album_track(&self, track_id: i64) -> Result<Option<Arc<AlbumTrack>>> {
        trace!("get album track track_id={}", track_id);

        self.caches()
            .album_track
            .fetch(track_id, || self.load_album_track(track_id))
    }

    fn load_album_track(&self, track_id: i64) -> Result<Option<AlbumTrack>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM AlbumTrack WHERE track_id = ?",
            TRACK_COLS
        ))?;

        let mut rows = st.query([track_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_album_track(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_album_track_state(
        &self,
        track_id: i64,
    ) -> Result<Option<AlbumTrackState>> {
        Ok(self
            .load_album_track(track_id)?
            .map(|t| t.state.into_inner().unwrap()))
    }

    pub fn album_track_of_media(
        &self,
        media_id: i64,
    ) -> Result<Option<Arc<AlbumTrack>>> {
        trace!("get album track media_id={}", media_id);

        let mut st = self
            .connection()
            .prepare_cached("SELECT track_id FROM AlbumTrack WHERE media_id = ?")?;

        let mut rows = st.query([media_id])?;

        match rows.next()? {
            Some(row) => self.album_track(row.get(0)?),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_album_track(
        &self,
        media_id: i64,
        album_id: i64,
        artist_id: Option<i64>,
        genre_id: Option<i64>,
        track_number: Option<i64>,
        disc_number: Option<i64>,
    ) -> Result<Arc<AlbumTrack>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO AlbumTrack
                    (media_id, album_id, artist_id, genre_id, track_number, disc_number)
                VALUES (?, ?, ?, ?, ?, ?)",
            )?
            .execute(params![
                media_id,
                album_id,
                artist_id,
                genre_id,
                track_number,
                disc_number,
            ])?;

        let track_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.album_track(track_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn tracks_of_genre(&self, genre_id: i64) -> Result<Vec<Arc<AlbumTrack>>> {
        trace!("list tracks by genre_id={}", genre_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM AlbumTrack WHERE genre_id = ? AND is_present = 1",
            TRACK_COLS
        ))?;

        let mut rows = st.query([genre_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let track = _get_album_track(row)?;
            let id = track.id;
            result.push(self.caches().album_track.resolve(id, || track));
        }

        Ok(result)
    }

    pub fn set_album_track_genre(&self, track_id: i64, genre_id: i64) -> Result<()> {
        trace!("set album track track_id={} genre_id={}", track_id, genre_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE AlbumTrack SET genre_id = ? WHERE track_id = ?")?
            .execute(params![genre_id, track_id])?;
        t.commit()?;
        Ok(())
    }
}
