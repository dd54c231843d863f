use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, trace};
use rusqlite::{params, Row};

use super::media::{Media, _list_media_rows};
use super::{fts_pattern, Index};
use crate::Result;

#[derive(Debug)]
pub struct Playlist {
    id: i64,
    creation_date: i64,
    state: Mutex<PlaylistState>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlaylistState {
    pub name: String,
}

impl Playlist {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.lock().unwrap().name.clone()
    }

    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    pub(crate) fn replace_state(&self, state: PlaylistState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_playlist(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        creation_date: row.get(2)?,
        state: Mutex::new(PlaylistState { name: row.get(1)? }),
    })
}

const PLAYLIST_COLS: &str = "playlist_id, name, creation_date";

impl Index {
    pub fn playlist(&self, playlist_id: i64) -> Result<Option<Arc<Playlist>>> {
        trace!("get playlist playlist_id={}", playlist_id);

        self.caches()
            .playlist
            .fetch(playlist_id, || self.load_playlist(playlist_id))
    }

    fn load_playlist(&self, playlist_id: i64) -> Result<Option<Playlist>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Playlist WHERE playlist_id = ?",
            PLAYLIST_COLS
        ))?;

        let mut rows = st.query([playlist_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_playlist(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_playlist_state(
        &self,
        playlist_id: i64,
    ) -> Result<Option<PlaylistState>> {
        Ok(self
            .load_playlist(playlist_id)?
            .map(|p| p.state.into_inner().unwrap()))
    }

    pub fn create_playlist(&self, name: &str) -> Result<Arc<Playlist>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Playlist (name, creation_date) VALUES (?, ?)")?
            .execute(params![name, Utc::now().timestamp()])?;

        let playlist_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.playlist(playlist_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    /// Membership rows cascade with the playlist.
    pub fn delete_playlist(&self, playlist_id: i64) -> Result<bool> {
        trace!("delete playlist playlist_id={}", playlist_id);

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached("DELETE FROM Playlist WHERE playlist_id = ?")?
            .execute([playlist_id])?;
        t.commit()?;
        Ok(deleted > 0)
    }

    pub fn set_playlist_name(&self, playlist_id: i64, name: &str) -> Result<()> {
        trace!("set playlist playlist_id={} name='{}'", playlist_id, name);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Playlist SET name = ? WHERE playlist_id = ?")?
            .execute(params![name, playlist_id])?;
        // Playlist FTS rows are only maintained on insert/delete
        self.connection()
            .prepare_cached("DELETE FROM PlaylistFts WHERE rowid = ?")?
            .execute([playlist_id])?;
        self.connection()
            .prepare_cached("INSERT INTO PlaylistFts(rowid, name) VALUES (?, ?)")?
            .execute(params![playlist_id, name])?;
        t.commit()?;
        Ok(())
    }

    pub fn playlists(&self) -> Result<Vec<Arc<Playlist>>> {
        trace!("list playlists");

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Playlist ORDER BY name",
            PLAYLIST_COLS
        ))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let playlist = _get_playlist(row)?;
            let id = playlist.id;
            result.push(self.caches().playlist.resolve(id, || playlist));
        }

        Ok(result)
    }

    pub fn search_playlists(&self, pattern: &str) -> Result<Vec<Arc<Playlist>>> {
        trace!("search playlists pattern='{}'", pattern);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Playlist WHERE playlist_id IN
                (SELECT rowid FROM PlaylistFts WHERE PlaylistFts MATCH ?)",
            PLAYLIST_COLS
        ))?;

        let mut rows = st.query([fts_pattern(pattern)])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let playlist = _get_playlist(row)?;
            let id = playlist.id;
            result.push(self.caches().playlist.resolve(id, || playlist));
        }

        Ok(result)
    }

    /// Appends at the end of the playlist.
    pub fn playlist_append(&self, playlist_id: i64, media_id: i64) -> Result<()> {
        trace!(
            "append playlist playlist_id={} media_id={}",
            playlist_id,
            media_id
        );

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "INSERT INTO PlaylistMediaRelation (playlist_id, media_id, position)
                VALUES (?, ?, (SELECT IFNULL(MAX(position), 0) + 1
                    FROM PlaylistMediaRelation WHERE playlist_id = ?))",
            )?
            .execute(params![playlist_id, media_id, playlist_id])?;
        t.commit()?;
        Ok(())
    }

    /// Inserts at `position` (1-based), shifting what follows.
    pub fn playlist_add(
        &self,
        playlist_id: i64,
        media_id: i64,
        position: i64,
    ) -> Result<()> {
        trace!(
            "add playlist playlist_id={} media_id={} position={}",
            playlist_id,
            media_id,
            position
        );

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "UPDATE PlaylistMediaRelation SET position = position + 1
                WHERE playlist_id = ? AND position >= ?",
            )?
            .execute(params![playlist_id, position])?;
        self.connection()
            .prepare_cached(
                "INSERT INTO PlaylistMediaRelation (playlist_id, media_id, position)
                VALUES (?, ?, ?)",
            )?
            .execute(params![playlist_id, media_id, position])?;
        t.commit()?;
        Ok(())
    }

    pub fn playlist_move(
        &self,
        playlist_id: i64,
        media_id: i64,
        position: i64,
    ) -> Result<()> {
        trace!(
            "move playlist playlist_id={} media_id={} position={}",
            playlist_id,
            media_id,
            position
        );

        let t = self.begin()?;
        self.playlist_remove(playlist_id, media_id)?;
        self.playlist_add(playlist_id, media_id, position)?;
        t.commit()?;
        Ok(())
    }

    pub fn playlist_remove(&self, playlist_id: i64, media_id: i64) -> Result<()> {
        trace!(
            "remove playlist playlist_id={} media_id={}",
            playlist_id,
            media_id
        );

        let t = self.begin()?;
        let mut st = self.connection().prepare_cached(
            "SELECT position FROM PlaylistMediaRelation
            WHERE playlist_id = ? AND media_id = ?",
        )?;
        let position: Option<i64> = {
            let mut rows = st.query(params![playlist_id, media_id])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        drop(st);

        if let Some(position) = position {
            self.connection()
                .prepare_cached(
                    "DELETE FROM PlaylistMediaRelation
                    WHERE playlist_id = ? AND media_id = ?",
                )?
                .execute(params![playlist_id, media_id])?;
            self.connection()
                .prepare_cached(
                    "UPDATE PlaylistMediaRelation SET position = position - 1
                    WHERE playlist_id = ? AND position > ?",
                )?
                .execute(params![playlist_id, position])?;
        }
        t.commit()?;
        Ok(())
    }

    pub fn media_of_playlist(&self, playlist_id: i64) -> Result<Vec<Arc<Media>>> {
        trace!("list media by playlist_id={}", playlist_id);

        let mut st = self.connection().prepare_cached(
            "SELECT med.media_id, med.type, med.subtype, med.title, med.filename,
                med.duration, med.play_count, med.last_played_date, med.rating,
                med.progress, med.insertion_date, med.release_date, med.thumbnail,
                med.is_parsed, med.is_present
            FROM Media med
            INNER JOIN PlaylistMediaRelation pmr ON pmr.media_id = med.media_id
            WHERE pmr.playlist_id = ? AND med.is_present = 1
            ORDER BY pmr.position",
        )?;

        let rows = st.query([playlist_id])?;
        _list_media_rows(self, rows)
    }
}
