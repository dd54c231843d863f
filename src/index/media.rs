use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, trace};
use rusqlite::{params, Row};

use super::{fts_pattern, Index, SortingCriteria};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Unknown = 0,
    Audio = 1,
    Video = 2,
    External = 3,
    Stream = 4,
}

impl MediaType {
    pub fn from_i64(v: i64) -> MediaType {
        match v {
            1 => MediaType::Audio,
            2 => MediaType::Video,
            3 => MediaType::External,
            4 => MediaType::Stream,
            _ => MediaType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSubtype {
    Unknown = 0,
    AlbumTrack = 1,
    Movie = 2,
    ShowEpisode = 3,
}

impl MediaSubtype {
    pub fn from_i64(v: i64) -> MediaSubtype {
        match v {
            1 => MediaSubtype::AlbumTrack,
            2 => MediaSubtype::Movie,
            3 => MediaSubtype::ShowEpisode,
            _ => MediaSubtype::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct Media {
    id: i64,
    insertion_date: i64,
    state: Mutex<MediaState>,
}

#[derive(Debug, Clone)]
pub(crate) struct MediaState {
    pub media_type: MediaType,
    pub subtype: MediaSubtype,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub duration: i64,
    pub play_count: i64,
    pub last_played_date: Option<i64>,
    pub rating: i64,
    pub progress: f64,
    pub release_date: Option<i64>,
    pub thumbnail: Option<String>,
    pub is_parsed: bool,
    pub is_present: bool,
}

impl Media {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn insertion_date(&self) -> i64 {
        self.insertion_date
    }

    pub fn media_type(&self) -> MediaType {
        self.state.lock().unwrap().media_type
    }

    pub fn subtype(&self) -> MediaSubtype {
        self.state.lock().unwrap().subtype
    }

    pub fn title(&self) -> Option<String> {
        self.state.lock().unwrap().title.clone()
    }

    pub fn filename(&self) -> Option<String> {
        self.state.lock().unwrap().filename.clone()
    }

    /// Duration in milliseconds, -1 while unknown.
    pub fn duration(&self) -> i64 {
        self.state.lock().unwrap().duration
    }

    pub fn play_count(&self) -> i64 {
        self.state.lock().unwrap().play_count
    }

    pub fn last_played_date(&self) -> Option<i64> {
        self.state.lock().unwrap().last_played_date
    }

    pub fn rating(&self) -> i64 {
        self.state.lock().unwrap().rating
    }

    pub fn progress(&self) -> f64 {
        self.state.lock().unwrap().progress
    }

    pub fn release_date(&self) -> Option<i64> {
        self.state.lock().unwrap().release_date
    }

    pub fn thumbnail(&self) -> Option<String> {
        self.state.lock().unwrap().thumbnail.clone()
    }

    pub fn is_parsed(&self) -> bool {
        self.state.lock().unwrap().is_parsed
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: MediaState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_media(row: &Row) -> rusqlite::Result<Media> {
    let media_type: i64 = row.get(1)?;
    let subtype: i64 = row.get(2)?;
    Ok(Media {
        id: row.get(0)?,
        insertion_date: row.get(10)?,
        state: Mutex::new(MediaState {
            media_type: MediaType::from_i64(media_type),
            subtype: MediaSubtype::from_i64(subtype),
            title: row.get(3)?,
            filename: row.get(4)?,
            duration: row.get(5)?,
            play_count: row.get(6)?,
            last_played_date: row.get(7)?,
            rating: row.get(8)?,
            progress: row.get(9)?,
            release_date: row.get(11)?,
            thumbnail: row.get(12)?,
            is_parsed: row.get(13)?,
            is_present: row.get(14)?,
        }),
    })
}

const MEDIA_COLS: &str = "media_id, type, subtype, title, filename, duration, \
    play_count, last_played_date, rating, progress, insertion_date, \
    release_date, thumbnail, is_parsed, is_present";

/// Drains a query over `MEDIA_COLS`-shaped rows through the identity cache.
pub(crate) fn _list_media_rows(
    index: &Index,
    mut rows: rusqlite::Rows,
) -> Result<Vec<Arc<Media>>> {
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let media = _get_media(row)?;
        let id = media.id;
        result.push(index.caches().media.resolve(id, || media));
    }
    Ok(result)
}

fn media_order(sort: SortingCriteria, desc: bool) -> String {
    let col = match sort {
        SortingCriteria::Duration => "duration",
        SortingCriteria::InsertionDate => "insertion_date",
        SortingCriteria::ReleaseDate => "release_date",
        SortingCriteria::PlayCount => "play_count",
        SortingCriteria::Filename => "filename",
        SortingCriteria::LastModificationDate => {
            "(SELECT last_modification_date FROM File f
                WHERE f.media_id = Media.media_id LIMIT 1)"
        }
        SortingCriteria::FileSize => {
            "(SELECT size FROM File f WHERE f.media_id = Media.media_id LIMIT 1)"
        }
        _ => "title",
    };
    format!("{} {}", col, if desc { "DESC" } else { "ASC" })
}

impl Index {
    pub fn media(&self, media_id: i64) -> Result<Option<Arc<Media>>> {
        trace!("get media media_id={}", media_id);

        self.caches()
            .media
            .fetch(media_id, || self.load_media(media_id))
    }

    fn load_media(&self, media_id: i64) -> Result<Option<Media>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Media WHERE media_id = ?",
            MEDIA_COLS
        ))?;

        let mut rows = st.query([media_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_media(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_media_state(
        &self,
        media_id: i64,
    ) -> Result<Option<MediaState>> {
        Ok(self.load_media(media_id)?.map(|m| m.state.into_inner().unwrap()))
    }

    pub fn create_media(
        &self,
        media_type: MediaType,
        title: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Arc<Media>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO Media (type, title, filename, insertion_date)
                VALUES (?, ?, ?, ?)",
            )?
            .execute(params![
                media_type as i64,
                title,
                filename,
                Utc::now().timestamp(),
            ])?;

        let media_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.media(media_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    /// Garbage-collects media left without any file, e.g. after a folder
    /// cascade.
    pub fn delete_fileless_media(&self) -> Result<usize> {
        trace!("delete fileless media");

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached(
                "DELETE FROM Media WHERE type != ? AND media_id NOT IN
                    (SELECT media_id FROM File)",
            )?
            .execute([MediaType::Stream as i64])?;
        t.commit()?;
        Ok(deleted)
    }

    pub fn delete_media(&self, media_id: i64) -> Result<bool> {
        trace!("delete media media_id={}", media_id);

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached("DELETE FROM Media WHERE media_id = ?")?
            .execute([media_id])?;
        t.commit()?;
        Ok(deleted > 0)
    }

    pub fn media_listing(
        &self,
        media_type: Option<MediaType>,
        sort: SortingCriteria,
        desc: bool,
    ) -> Result<Vec<Arc<Media>>> {
        trace!("list media type={:?}", media_type);

        let sql = match media_type {
            Some(_) => format!(
                "SELECT {} FROM Media WHERE type = ? AND is_present = 1 ORDER BY {}",
                MEDIA_COLS,
                media_order(sort, desc)
            ),
            None => format!(
                "SELECT {} FROM Media WHERE is_present = 1 ORDER BY {}",
                MEDIA_COLS,
                media_order(sort, desc)
            ),
        };

        let mut st = self.connection().prepare_cached(&sql)?;
        let mut rows = match media_type {
            Some(t) => st.query([t as i64])?,
            None => st.query([])?,
        };

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let media = _get_media(row)?;
            let id = media.id;
            result.push(self.caches().media.resolve(id, || media));
        }

        Ok(result)
    }

    pub fn search_media(&self, pattern: &str) -> Result<Vec<Arc<Media>>> {
        trace!("search media pattern='{}'", pattern);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Media WHERE media_id IN
                (SELECT rowid FROM MediaFts WHERE MediaFts MATCH ?)
            AND is_present = 1",
            MEDIA_COLS
        ))?;

        let mut rows = st.query([fts_pattern(pattern)])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let media = _get_media(row)?;
            let id = media.id;
            result.push(self.caches().media.resolve(id, || media));
        }

        Ok(result)
    }

    pub fn set_media_title(&self, media_id: i64, title: &str) -> Result<()> {
        trace!("set media media_id={} title='{}'", media_id, title);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET title = ? WHERE media_id = ?")?
            .execute(params![title, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_type(&self, media_id: i64, media_type: MediaType) -> Result<()> {
        trace!("set media media_id={} type={:?}", media_id, media_type);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET type = ? WHERE media_id = ?")?
            .execute(params![media_type as i64, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_subtype(
        &self,
        media_id: i64,
        subtype: MediaSubtype,
    ) -> Result<()> {
        trace!("set media media_id={} subtype={:?}", media_id, subtype);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET subtype = ? WHERE media_id = ?")?
            .execute(params![subtype as i64, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_duration(&self, media_id: i64, duration: i64) -> Result<()> {
        trace!("set media media_id={} duration={}", media_id, duration);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET duration = ? WHERE media_id = ?")?
            .execute(params![duration, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_release_date(&self, media_id: i64, date: i64) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET release_date = ? WHERE media_id = ?")?
            .execute(params![date, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_thumbnail(&self, media_id: i64, thumbnail: &str) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET thumbnail = ? WHERE media_id = ?")?
            .execute(params![thumbnail, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_parsed(&self, media_id: i64, parsed: bool) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET is_parsed = ? WHERE media_id = ?")?
            .execute(params![parsed, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_progress(&self, media_id: i64, progress: f64) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET progress = ? WHERE media_id = ?")?
            .execute(params![progress.clamp(0.0, 1.0), media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_media_rating(&self, media_id: i64, rating: i64) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Media SET rating = ? WHERE media_id = ?")?
            .execute(params![rating, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn increase_media_play_count(&self, media_id: i64) -> Result<()> {
        trace!("increase play count media_id={}", media_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "UPDATE Media SET play_count = play_count + 1, last_played_date = ?
                WHERE media_id = ?",
            )?
            .execute(params![Utc::now().timestamp(), media_id])?;
        t.commit()?;
        Ok(())
    }
}
