use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::media::{Media, _list_media_rows};
use super::{fts_pattern, Index, SortingCriteria};
use crate::Result;

/// Albums are derived entities: they only exist because a parsed media
/// carried an album tag. A NULL title marks the per-artist "unknown album"
/// singleton.
#[derive(Debug)]
pub struct Album {
    id: i64,
    state: Mutex<AlbumState>,
}

#[derive(Debug, Clone)]
pub(crate) struct AlbumState {
    pub title: Option<String>,
    pub artist_id: Option<i64>,
    pub release_year: Option<i64>,
    pub short_summary: Option<String>,
    pub artwork_mrl: Option<String>,
    pub nb_tracks: i64,
    pub is_present: bool,
}

impl Album {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn title(&self) -> Option<String> {
        self.state.lock().unwrap().title.clone()
    }

    pub fn artist_id(&self) -> Option<i64> {
        self.state.lock().unwrap().artist_id
    }

    /// 0 while unknown.
    pub fn release_year(&self) -> i64 {
        self.state.lock().unwrap().release_year.unwrap_or(0)
    }

    pub fn short_summary(&self) -> Option<String> {
        self.state.lock().unwrap().short_summary.clone()
    }

    pub fn artwork_mrl(&self) -> Option<String> {
        self.state.lock().unwrap().artwork_mrl.clone()
    }

    pub fn nb_tracks(&self) -> i64 {
        self.state.lock().unwrap().nb_tracks
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: AlbumState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_album(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        state: Mutex::new(AlbumState {
            title: row.get(1)?,
            artist_id: row.get(2)?,
            release_year: row.get(3)?,
            short_summary: row.get(4)?,
            artwork_mrl: row.get(5)?,
            nb_tracks: row.get(6)?,
            is_present: row.get(7)?,
        }),
    })
}

const ALBUM_COLS: &str = "album_id, title, artist_id, release_year, \
    short_summary, artwork_mrl, nb_tracks, is_present";

fn album_order(sort: SortingCriteria, desc: bool) -> String {
    let col = match sort {
        SortingCriteria::ReleaseDate => "release_year",
        SortingCriteria::Artist => "artist_id",
        _ => "title",
    };
    format!("{} {}", col, if desc { "DESC" } else { "ASC" })
}

impl Index {
    pub fn album(&self, album_id: i64) -> Result<Option<Arc<Album>>> {
        trace!("get album album_id={}", album_id);

        self.caches()
            .album
            .fetch(album_id, || self.load_album(album_id))
    }

    fn load_album(&self, album_id: i64) -> Result<Option<Album>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Album WHERE album_id = ?",
            ALBUM_COLS
        ))?;

        let mut rows = st.query([album_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_album(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_album_state(
        &self,
        album_id: i64,
    ) -> Result<Option<AlbumState>> {
        Ok(self.load_album(album_id)?.map(|a| a.state.into_inner().unwrap()))
    }

    /// Exact title match (case-insensitive through the column collation),
    /// optionally pinned to an album artist.
    pub fn album_by_title(
        &self,
        title: &str,
        artist_id: Option<i64>,
    ) -> Result<Option<Arc<Album>>> {
        trace!("get album title='{}' artist_id={:?}", title, artist_id);

        let mut st = self.connection().prepare_cached(match artist_id {
            Some(_) => "SELECT album_id FROM Album WHERE title = ? AND artist_id = ?",
            None => "SELECT album_id FROM Album WHERE title = ?",
        })?;

        let mut rows = match artist_id {
            Some(id) => st.query(params![title, id])?,
            None => st.query(params![title])?,
        };

        match rows.next()? {
            Some(row) => self.album(row.get(0)?),
            None => Ok(None),
        }
    }

    /// The artist's title-less album, holding their tracks that carry an
    /// artist tag but no album tag.
    pub fn unknown_album_of_artist(
        &self,
        artist_id: i64,
    ) -> Result<Option<Arc<Album>>> {
        trace!("get unknown album artist_id={}", artist_id);

        let mut st = self.connection().prepare_cached(
            "SELECT album_id FROM Album WHERE artist_id = ? AND title IS NULL",
        )?;

        let mut rows = st.query([artist_id])?;

        match rows.next()? {
            Some(row) => self.album(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_album(
        &self,
        title: Option<&str>,
        artist_id: Option<i64>,
    ) -> Result<Arc<Album>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Album (title, artist_id) VALUES (?, ?)")?
            .execute(params![title, artist_id])?;

        let album_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.album(album_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn albums(
        &self,
        sort: SortingCriteria,
        desc: bool,
    ) -> Result<Vec<Arc<Album>>> {
        trace!("list albums");

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Album WHERE is_present = 1 AND title IS NOT NULL ORDER BY {}",
            ALBUM_COLS,
            album_order(sort, desc)
        ))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let album = _get_album(row)?;
            let id = album.id;
            result.push(self.caches().album.resolve(id, || album));
        }

        Ok(result)
    }

    pub fn albums_of_artist(&self, artist_id: i64) -> Result<Vec<Arc<Album>>> {
        trace!("list albums by artist_id={}", artist_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Album WHERE artist_id = ?
            ORDER BY release_year, title",
            ALBUM_COLS
        ))?;

        let mut rows = st.query([artist_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let album = _get_album(row)?;
            let id = album.id;
            result.push(self.caches().album.resolve(id, || album));
        }

        Ok(result)
    }

    /// Present tracks of the album, in disc then track order.
    pub fn tracks_of_album(&self, album_id: i64) -> Result<Vec<Arc<Media>>> {
        trace!("list tracks by album_id={}", album_id);

        let mut st = self.connection().prepare_cached(
            "SELECT med.media_id, med.type, med.subtype, med.title, med.filename,
                med.duration, med.play_count, med.last_played_date, med.rating,
                med.progress, med.insertion_date, med.release_date, med.thumbnail,
                med.is_parsed, med.is_present
            FROM Media med
            INNER JOIN AlbumTrack att ON att.media_id = med.media_id
            WHERE att.album_id = ? AND med.is_present = 1
            ORDER BY att.disc_number, att.track_number",
        )?;

        let rows = st.query([album_id])?;
        _list_media_rows(self, rows)
    }

    pub fn search_albums(&self, pattern: &str) -> Result<Vec<Arc<Album>>> {
        trace!("search albums pattern='{}'", pattern);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Album WHERE album_id IN
                (SELECT rowid FROM AlbumFts WHERE AlbumFts MATCH ?)",
            ALBUM_COLS
        ))?;

        let mut rows = st.query([fts_pattern(pattern)])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let album = _get_album(row)?;
            let id = album.id;
            result.push(self.caches().album.resolve(id, || album));
        }

        Ok(result)
    }

    /// First write wins; a second write with a different year resets the
    /// year to 0 until a forced write settles it.
    pub fn set_album_release_year(
        &self,
        album: &Album,
        year: i64,
        force: bool,
    ) -> Result<()> {
        let current = album.state.lock().unwrap().release_year;
        let year = match (current, force) {
            (_, true) => year,
            (None, false) => year,
            (Some(current), false) if current == year => return Ok(()),
            (Some(0), false) => return Ok(()),
            (Some(_), false) => 0,
        };

        trace!("set album album_id={} release_year={}", album.id(), year);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Album SET release_year = ? WHERE album_id = ?")?
            .execute(params![year, album.id()])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_album_short_summary(&self, album_id: i64, summary: &str) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Album SET short_summary = ? WHERE album_id = ?")?
            .execute(params![summary, album_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_album_artwork_mrl(&self, album_id: i64, mrl: &str) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Album SET artwork_mrl = ? WHERE album_id = ?")?
            .execute(params![mrl, album_id])?;
        t.commit()?;
        Ok(())
    }

    /// Re-parents the album, keeping the artists' album counters straight.
    pub fn set_album_artist(&self, album: &Album, artist_id: i64) -> Result<()> {
        let previous = album.artist_id();
        if previous == Some(artist_id) {
            return Ok(());
        }

        trace!("set album album_id={} artist_id={}", album.id(), artist_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Album SET artist_id = ? WHERE album_id = ?")?
            .execute(params![artist_id, album.id()])?;
        if let Some(previous) = previous {
            self.update_artist_nb_albums(previous, -1)?;
        }
        self.update_artist_nb_albums(artist_id, 1)?;
        t.commit()?;
        Ok(())
    }
}
