pub(crate) mod album;
pub(crate) mod album_track;
pub(crate) mod artist;
pub(crate) mod device;
pub(crate) mod file;
pub(crate) mod folder;
pub(crate) mod genre;
pub(crate) mod history;
pub(crate) mod label;
pub(crate) mod media;
pub(crate) mod media_track;
pub(crate) mod movie;
pub(crate) mod playlist;
pub(crate) mod show;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{error, info};
use rusqlite::Connection;

use crate::cache::Caches;
use crate::db_meta;
use crate::notifier::ModificationNotifier;
use crate::sqlite::{self, HookReason, HookTable, RowChange, Transaction};
use crate::Result;

/// Sort orders accepted by the listing queries. Criteria that don't apply
/// to an entity fall back to its default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortingCriteria {
    #[default]
    Default,
    Alpha,
    Duration,
    InsertionDate,
    LastModificationDate,
    ReleaseDate,
    FileSize,
    Artist,
    PlayCount,
    Album,
    Filename,
}

/// Opens per-thread database handles. Every worker thread (discoverer,
/// parser workers, host callers through the facade) gets its own `Index`
/// with the row-change hook installed; the identity caches and the
/// notifier are shared across all of them.
pub(crate) struct IndexSource {
    db_path: PathBuf,
    caches: Arc<Caches>,
    notifier: Arc<ModificationNotifier>,
}

impl IndexSource {
    pub fn create(
        db_path: &Path,
        caches: Arc<Caches>,
        notifier: Arc<ModificationNotifier>,
    ) -> Result<IndexSource> {
        info!("using '{}'", db_path.to_string_lossy());

        let source = IndexSource {
            db_path: db_path.to_path_buf(),
            caches,
            notifier,
        };

        let mut index = source.get()?;
        db_meta::ensure_schema(index.connection_mut())?;
        // Schema creation is not an observable change
        index.discard_changes();

        Ok(source)
    }

    pub fn get(&self) -> Result<Index> {
        let conn = match Connection::open(&self.db_path) {
            Ok(c) => c,
            Err(e) => {
                error!(
                    "can't open sqlite database '{}': {}",
                    self.db_path.to_string_lossy(),
                    e
                );
                return Err(e.into());
            }
        };

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;",
        )?;
        conn.busy_timeout(std::time::Duration::from_millis(500))?;
        conn.set_prepared_statement_cache_capacity(128);

        let pending = Arc::new(Mutex::new(Vec::new()));
        sqlite::install_update_hook(&conn, pending.clone());

        Ok(Index {
            conn,
            caches: self.caches.clone(),
            notifier: self.notifier.clone(),
            pending,
            tx_depth: Cell::new(0),
        })
    }
}

pub(crate) struct Index {
    conn: Connection,
    caches: Arc<Caches>,
    notifier: Arc<ModificationNotifier>,
    pending: Arc<Mutex<Vec<RowChange>>>,
    pub(crate) tx_depth: Cell<u32>,
}

impl Index {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn begin(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    pub(crate) fn discard_changes(&self) {
        self.pending.lock().unwrap().clear();
    }

    /// Dispatches the row changes buffered during the transaction that just
    /// committed: cache maintenance first, then change notifications.
    pub(crate) fn flush_changes(&self) -> Result<()> {
        let changes: Vec<RowChange> =
            std::mem::take(&mut *self.pending.lock().unwrap());
        for change in changes {
            if let Err(e) = self.dispatch_change(&change) {
                error!("failed to dispatch row change {:?}: {}", change, e);
            }
        }
        Ok(())
    }

    fn dispatch_change(&self, change: &RowChange) -> Result<()> {
        let id = change.rowid;
        match (change.table, change.reason) {
            (HookTable::Device, HookReason::Update) => {
                if let Some(d) = self.caches.device.peek(id) {
                    if let Some(state) = self.load_device_state(id)? {
                        d.replace_state(state);
                    }
                }
            }
            (HookTable::Device, _) => {}

            (HookTable::Folder, HookReason::Update) => {
                if let Some(f) = self.caches.folder.peek(id) {
                    if let Some(state) = self.load_folder_state(id)? {
                        f.replace_state(state);
                    }
                }
            }
            (HookTable::Folder, HookReason::Delete) => self.caches.folder.evict(id),
            (HookTable::Folder, HookReason::Insert) => {}

            (HookTable::File, HookReason::Update) => {
                if let Some(f) = self.caches.file.peek(id) {
                    if let Some(state) = self.load_file_state(id)? {
                        f.replace_state(state);
                    }
                }
            }
            (HookTable::File, HookReason::Delete) => self.caches.file.evict(id),
            (HookTable::File, HookReason::Insert) => {}

            (HookTable::Media, HookReason::Insert) => {
                if let Some(m) = self.media(id)? {
                    self.notifier.notify_media_creation(m);
                }
            }
            (HookTable::Media, HookReason::Update) => {
                if let Some(m) = self.caches.media.peek(id) {
                    if let Some(state) = self.load_media_state(id)? {
                        m.replace_state(state);
                    }
                }
                if let Some(m) = self.media(id)? {
                    self.notifier.notify_media_modification(m);
                }
            }
            (HookTable::Media, HookReason::Delete) => {
                self.caches.media.evict(id);
                self.notifier.notify_media_removal(id);
            }

            (HookTable::Album, HookReason::Insert) => {
                if let Some(a) = self.album(id)? {
                    self.notifier.notify_album_creation(a);
                }
            }
            (HookTable::Album, HookReason::Update) => {
                if let Some(a) = self.caches.album.peek(id) {
                    if let Some(state) = self.load_album_state(id)? {
                        a.replace_state(state);
                    }
                }
                if let Some(a) = self.album(id)? {
                    self.notifier.notify_album_modification(a);
                }
            }
            (HookTable::Album, HookReason::Delete) => {
                self.caches.album.evict(id);
                self.notifier.notify_album_removal(id);
            }

            (HookTable::AlbumTrack, HookReason::Insert) => {
                if let Some(t) = self.album_track(id)? {
                    self.notifier.notify_album_track_creation(t);
                }
            }
            (HookTable::AlbumTrack, HookReason::Update) => {
                if let Some(t) = self.caches.album_track.peek(id) {
                    if let Some(state) = self.load_album_track_state(id)? {
                        t.replace_state(state);
                    }
                }
                if let Some(t) = self.album_track(id)? {
                    self.notifier.notify_album_track_modification(t);
                }
            }
            (HookTable::AlbumTrack, HookReason::Delete) => {
                self.caches.album_track.evict(id);
                self.notifier.notify_album_track_removal(id);
            }

            (HookTable::Artist, HookReason::Insert) => {
                if let Some(a) = self.artist(id)? {
                    self.notifier.notify_artist_creation(a);
                }
            }
            (HookTable::Artist, HookReason::Update) => {
                if let Some(a) = self.caches.artist.peek(id) {
                    if let Some(state) = self.load_artist_state(id)? {
                        a.replace_state(state);
                    }
                }
                if let Some(a) = self.artist(id)? {
                    self.notifier.notify_artist_modification(a);
                }
            }
            (HookTable::Artist, HookReason::Delete) => {
                self.caches.artist.evict(id);
                self.notifier.notify_artist_removal(id);
            }

            (HookTable::Genre, HookReason::Insert) => {
                if let Some(g) = self.genre(id)? {
                    self.notifier.notify_genre_creation(g);
                }
            }
            (HookTable::Genre, HookReason::Update) => {
                if let Some(g) = self.genre(id)? {
                    self.notifier.notify_genre_modification(g);
                }
            }
            (HookTable::Genre, HookReason::Delete) => {
                self.caches.genre.evict(id);
                self.notifier.notify_genre_removal(id);
            }

            (HookTable::Playlist, HookReason::Insert) => {
                if let Some(p) = self.playlist(id)? {
                    self.notifier.notify_playlist_creation(p);
                }
            }
            (HookTable::Playlist, HookReason::Update) => {
                if let Some(p) = self.caches.playlist.peek(id) {
                    if let Some(state) = self.load_playlist_state(id)? {
                        p.replace_state(state);
                    }
                }
                if let Some(p) = self.playlist(id)? {
                    self.notifier.notify_playlist_modification(p);
                }
            }
            (HookTable::Playlist, HookReason::Delete) => {
                self.caches.playlist.evict(id);
                self.notifier.notify_playlist_removal(id);
            }

            (HookTable::Show, HookReason::Delete) => self.caches.show.evict(id),
            (HookTable::Show, _) => {}

            (HookTable::Movie, HookReason::Delete) => self.caches.movie.evict(id),
            (HookTable::Movie, _) => {}
        }
        Ok(())
    }
}

/// Builds a `"tokena* tokenb*"` prefix-match expression for the FTS
/// virtual tables. Quotes strip to keep the expression well-formed.
pub(crate) fn fts_pattern(pattern: &str) -> String {
    pattern
        .split_whitespace()
        .map(|token| format!("\"{}\"*", token.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::media::MediaType;
    use super::*;

    #[test]
    fn fts_patterns() {
        assert_eq!("\"tra\"*", fts_pattern("tra"));
        assert_eq!("\"track\"* \"1\"*", fts_pattern("track 1"));
        assert_eq!("\"o\"*", fts_pattern("\"o\""));
    }

    fn open() -> (tempfile::TempDir, IndexSource) {
        let dir = tempfile::tempdir().unwrap();
        let source = IndexSource::create(
            &dir.path().join("test.db"),
            Arc::new(Caches::new()),
            Arc::new(ModificationNotifier::new()),
        )
        .unwrap();
        (dir, source)
    }

    #[test]
    fn sentinel_artists_exist() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        let unknown = index.artist(1).unwrap().unwrap();
        let various = index.artist(2).unwrap().unwrap();
        assert_eq!(None, unknown.name());
        assert_eq!(None, various.name());
    }

    #[test]
    fn entity_identity() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        let device = index.create_device("uuid-1", "file://", false).unwrap();
        let again = index.device(device.id()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&device, &again));

        // Identity holds across connections of the same library handle
        let other = source.get().unwrap();
        let third = other.device(device.id()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&device, &third));
    }

    #[test]
    fn presence_cascade() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        let device = index.create_device("usb-1", "file://", true).unwrap();
        let folder = index
            .create_folder("music/", None, device.id(), true)
            .unwrap();
        let media = index
            .create_media(MediaType::Audio, Some("song"), Some("song.mp3"))
            .unwrap();
        let file = index
            .create_file(
                media.id(),
                "music/song.mp3",
                super::file::FileType::Main,
                Some(folder.id()),
                0,
                0,
                true,
                false,
            )
            .unwrap();

        assert!(folder.is_present());
        assert!(file.is_present());
        assert!(media.is_present());

        index.set_device_present(&device, false).unwrap();

        // Cached instances follow the triggers after commit
        assert!(!device.is_present());
        assert!(!folder.is_present());
        assert!(!file.is_present());
        assert!(!media.is_present());

        index.set_device_present(&device, true).unwrap();
        assert!(media.is_present());
    }

    #[test]
    fn album_track_counters_and_presence() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        let device = index.create_device("usb-1", "file://", true).unwrap();
        let folder = index
            .create_folder("music/", None, device.id(), true)
            .unwrap();
        let artist = index.create_artist("artist").unwrap();
        let album = index.create_album(Some("album"), Some(artist.id())).unwrap();

        let mut media_ids = Vec::new();
        for i in 0..2i64 {
            let media = index
                .create_media(MediaType::Audio, Some("track"), Some("track.mp3"))
                .unwrap();
            index
                .create_file(
                    media.id(),
                    &format!("music/track{}.mp3", i),
                    super::file::FileType::Main,
                    Some(folder.id()),
                    0,
                    0,
                    true,
                    false,
                )
                .unwrap();
            index
                .create_album_track(
                    media.id(),
                    album.id(),
                    Some(artist.id()),
                    None,
                    Some(i + 1),
                    Some(1),
                )
                .unwrap();
            media_ids.push(media.id());
        }

        assert_eq!(2, album.nb_tracks());
        assert!(album.is_present());

        // Unplugging the device empties the album
        index.set_device_present(&device, false).unwrap();
        assert!(!album.is_present());
        assert!(!artist.is_present());

        index.set_device_present(&device, true).unwrap();
        assert!(album.is_present());

        // Deleting the media takes the tracks and the counter with them
        for media_id in media_ids {
            index.delete_media(media_id).unwrap();
        }
        assert_eq!(0, album.nb_tracks());
        assert!(!album.is_present());
    }

    #[test]
    fn release_year_conflicts_reset() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        let album = index.create_album(Some("album"), None).unwrap();

        index.set_album_release_year(&album, 1999, false).unwrap();
        assert_eq!(1999, album.release_year());

        // Same year is a no-op, a different year degrades to unknown
        index.set_album_release_year(&album, 1999, false).unwrap();
        assert_eq!(1999, album.release_year());
        index.set_album_release_year(&album, 2001, false).unwrap();
        assert_eq!(0, album.release_year());

        index.set_album_release_year(&album, 2005, true).unwrap();
        assert_eq!(2005, album.release_year());
    }

    #[test]
    fn rollback_discards_changes() {
        let (_dir, source) = open();
        let index = source.get().unwrap();

        {
            let _t = index.begin().unwrap();
            index
                .connection()
                .execute("INSERT INTO Genre (name) VALUES ('rock')", [])
                .unwrap();
            // dropped without commit
        }

        assert!(index.genre_by_name("rock").unwrap().is_none());

        let t = index.begin().unwrap();
        index
            .connection()
            .execute("INSERT INTO Genre (name) VALUES ('rock')", [])
            .unwrap();
        t.commit().unwrap();

        assert!(index.genre_by_name("rock").unwrap().is_some());
    }
}
