mod cache;
mod db_meta;
mod derivation;
mod discoverer;
mod error;
mod extensions;
pub mod fs;
mod index;
pub mod logger;
mod notifier;
mod parser;
mod schema;
mod sqlite;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{error, info, LevelFilter};

use cache::Caches;
use discoverer::{DiscoverCmd, DiscovererWorker};
use fs::local::{LocalDeviceLister, LocalFsFactory};
use fs::{mrl, DeviceLister, FsFactory};
use index::file::FileType;
use index::{Index, IndexSource};
use notifier::ModificationNotifier;
use parser::Parser;

pub use error::{Error, Result};
pub use extensions::SUPPORTED as SUPPORTED_EXTENSIONS;
pub use index::album::Album;
pub use index::album_track::AlbumTrack;
pub use index::artist::{Artist, UNKNOWN_ARTIST_ID, VARIOUS_ARTISTS_ID};
pub use index::device::Device;
pub use index::file::File;
pub use index::folder::Folder;
pub use index::genre::Genre;
pub use index::history::HistoryEntry;
pub use index::label::Label;
pub use index::media::{Media, MediaSubtype, MediaType};
pub use index::media_track::{AudioTrack, VideoTrack};
pub use index::movie::Movie;
pub use index::playlist::Playlist;
pub use index::show::{Show, ShowEpisode};
pub use index::SortingCriteria;
pub use parser::{
    AudioTrackInfo, MediaTags, ParserService, ServiceStatus, Task,
    VideoTrackInfo, MAX_RETRIES,
};

/// Patterns shorter than this return empty search results.
pub const MIN_SEARCH_PATTERN: usize = 3;

/// Everything the embedding application can be told about. All methods
/// default to no-ops so hosts implement what they care about. Batched
/// entity callbacks arrive on the notifier thread; discovery and parsing
/// callbacks arrive on the worker that produced them.
#[allow(unused_variables)]
pub trait MediaLibraryCb: Send + Sync {
    fn on_media_added(&self, media: Vec<Arc<Media>>) {}
    fn on_media_modified(&self, media: Vec<Arc<Media>>) {}
    fn on_media_removed(&self, media_ids: Vec<i64>) {}

    fn on_artists_added(&self, artists: Vec<Arc<Artist>>) {}
    fn on_artists_modified(&self, artists: Vec<Arc<Artist>>) {}
    fn on_artists_removed(&self, artist_ids: Vec<i64>) {}

    fn on_albums_added(&self, albums: Vec<Arc<Album>>) {}
    fn on_albums_modified(&self, albums: Vec<Arc<Album>>) {}
    fn on_albums_removed(&self, album_ids: Vec<i64>) {}

    fn on_album_tracks_added(&self, tracks: Vec<Arc<AlbumTrack>>) {}
    fn on_album_tracks_modified(&self, tracks: Vec<Arc<AlbumTrack>>) {}
    fn on_album_tracks_removed(&self, track_ids: Vec<i64>) {}

    fn on_playlists_added(&self, playlists: Vec<Arc<Playlist>>) {}
    fn on_playlists_modified(&self, playlists: Vec<Arc<Playlist>>) {}
    fn on_playlists_removed(&self, playlist_ids: Vec<i64>) {}

    fn on_genres_added(&self, genres: Vec<Arc<Genre>>) {}
    fn on_genres_modified(&self, genres: Vec<Arc<Genre>>) {}
    fn on_genres_removed(&self, genre_ids: Vec<i64>) {}

    fn on_discovery_started(&self, entry_point: &str) {}
    fn on_discovery_completed(&self, entry_point: &str, success: bool) {}
    fn on_reload_started(&self, entry_point: Option<&str>) {}
    fn on_reload_completed(&self, entry_point: Option<&str>, success: bool) {}

    fn on_parsing_stats_updated(&self, percent: u32) {}
    fn on_background_tasks_idle_changed(&self, idle: bool) {}

    fn on_entry_point_banned(&self, entry_point: &str, success: bool) {}
    fn on_entry_point_unbanned(&self, entry_point: &str, success: bool) {}
    fn on_entry_point_removed(&self, entry_point: &str, success: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

/// Folds the discoverer's and the parser's business into one boolean for
/// the host.
pub(crate) struct IdleNotifier {
    cb: Arc<dyn MediaLibraryCb>,
    discoverer_idle: AtomicBool,
    parser_idle: AtomicBool,
    idle: AtomicBool,
}

impl IdleNotifier {
    fn new(cb: Arc<dyn MediaLibraryCb>) -> IdleNotifier {
        IdleNotifier {
            cb,
            discoverer_idle: AtomicBool::new(true),
            parser_idle: AtomicBool::new(true),
            idle: AtomicBool::new(true),
        }
    }

    pub(crate) fn set_discoverer_idle(&self, idle: bool) {
        self.discoverer_idle.store(idle, Ordering::SeqCst);
        self.update();
    }

    pub(crate) fn set_parser_idle(&self, idle: bool) {
        self.parser_idle.store(idle, Ordering::SeqCst);
        self.update();
    }

    fn update(&self) {
        let idle = self.discoverer_idle.load(Ordering::SeqCst)
            && self.parser_idle.load(Ordering::SeqCst);
        if self.idle.swap(idle, Ordering::SeqCst) != idle {
            self.cb.on_background_tasks_idle_changed(idle);
        }
    }
}

struct Runtime {
    source: Arc<IndexSource>,
    caches: Arc<Caches>,
    notifier: Arc<ModificationNotifier>,
    factories: Vec<Arc<dyn FsFactory>>,
    lister: Arc<dyn DeviceLister>,
    discoverer: DiscovererWorker,
    parser: Arc<Parser>,
    thumbnail_dir: PathBuf,
}

/// The library facade. Construct, optionally install custom filesystem
/// factories / logger / parser services, `initialize`, then `start`.
pub struct MediaLibrary {
    state: Mutex<LibraryState>,
    fs_factories: Mutex<Vec<Arc<dyn FsFactory>>>,
    device_lister: Mutex<Arc<dyn DeviceLister>>,
    services: Mutex<Vec<Box<dyn ParserService>>>,
    logger: Mutex<Option<Box<dyn log::Log>>>,
    runtime: RwLock<Option<Runtime>>,
}

impl Default for MediaLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaLibrary {
    pub fn new() -> MediaLibrary {
        MediaLibrary {
            state: Mutex::new(LibraryState::Uninitialized),
            fs_factories: Mutex::new(Vec::new()),
            device_lister: Mutex::new(Arc::new(LocalDeviceLister)),
            services: Mutex::new(Vec::new()),
            logger: Mutex::new(None),
            runtime: RwLock::new(None),
        }
    }

    pub fn state(&self) -> LibraryState {
        *self.state.lock().unwrap()
    }

    /// Replaces the default local filesystem backend. Only supported
    /// before `initialize`.
    pub fn set_fs_factory(&self, factory: Arc<dyn FsFactory>) {
        self.fs_factories.lock().unwrap().push(factory);
    }

    pub fn set_device_lister(&self, lister: Arc<dyn DeviceLister>) {
        *self.device_lister.lock().unwrap() = lister;
    }

    /// Installs a custom log sink; effective at `initialize`.
    pub fn set_logger(&self, logger: Box<dyn log::Log>) {
        *self.logger.lock().unwrap() = Some(logger);
    }

    pub fn set_verbosity(&self, level: LevelFilter) {
        logger::set_verbosity(level);
    }

    /// Registers a parser stage; only supported before `initialize`.
    pub fn add_parser_service(&self, service: Box<dyn ParserService>) {
        self.services.lock().unwrap().push(service);
    }

    /// Opens (creating or migrating as needed) the database, prepares the
    /// thumbnail directory and starts the change notifier. Idempotent.
    /// Background workers stay off until `start`.
    pub fn initialize(
        &self,
        db_path: &Path,
        thumbnail_path: &Path,
        cb: Arc<dyn MediaLibraryCb>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != LibraryState::Uninitialized {
            return Ok(());
        }

        logger::install(self.logger.lock().unwrap().take());

        info!("initializing, db '{}'", db_path.to_string_lossy());

        std::fs::create_dir_all(thumbnail_path)?;

        let caches = Arc::new(Caches::new());
        let notifier = Arc::new(ModificationNotifier::new());
        let source = Arc::new(IndexSource::create(
            db_path,
            caches.clone(),
            notifier.clone(),
        )?);

        let mut factories = self.fs_factories.lock().unwrap().clone();
        if factories.is_empty() {
            factories.push(Arc::new(LocalFsFactory::new()));
        }
        let lister = self.device_lister.lock().unwrap().clone();

        let idle = Arc::new(IdleNotifier::new(cb.clone()));
        let services = std::mem::take(&mut *self.services.lock().unwrap());
        let parser = Arc::new(Parser::new(
            source.clone(),
            factories.clone(),
            cb.clone(),
            idle.clone(),
            services,
        ));
        let discoverer = DiscovererWorker::new(
            source.clone(),
            factories.clone(),
            parser.clone(),
            cb.clone(),
            idle,
        );

        notifier.start(cb);

        *self.runtime.write().unwrap() = Some(Runtime {
            source,
            caches,
            notifier,
            factories,
            lister,
            discoverer,
            parser,
            thumbnail_dir: thumbnail_path.to_path_buf(),
        });
        *state = LibraryState::Initialized;

        Ok(())
    }

    /// Refreshes devices and launches the discoverer and parser threads.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != LibraryState::Initialized {
            return Err(Error::BadState(*state));
        }

        self.with_runtime(|rt| {
            for factory in &rt.factories {
                factory.refresh_devices();
            }
            let index = rt.source.get()?;
            discoverer::seed_devices(&index, &rt.lister)?;

            rt.parser.start();
            rt.discoverer.start();
            Ok(())
        })?;

        *state = LibraryState::Started;
        info!("started");
        Ok(())
    }

    /// Stops all background threads and clears the entity caches. The
    /// state machine is monotonic; a stopped library is not reusable.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if *state != LibraryState::Started && *state != LibraryState::Initialized {
            return;
        }

        if let Some(rt) = self.runtime.read().unwrap().as_ref() {
            rt.discoverer.stop();
            rt.parser.stop();
            rt.notifier.stop();
            rt.caches.clear();
        }

        *state = LibraryState::Stopped;
        info!("stopped");
    }

    pub fn thumbnail_path(&self) -> Result<PathBuf> {
        self.with_runtime(|rt| Ok(rt.thumbnail_dir.clone()))
    }

    fn with_runtime<T>(&self, f: impl FnOnce(&Runtime) -> Result<T>) -> Result<T> {
        let guard = self.runtime.read().unwrap();
        match guard.as_ref() {
            Some(rt) => f(rt),
            None => Err(Error::BadState(*self.state.lock().unwrap())),
        }
    }

    fn with_index<T>(
        &self,
        f: impl FnOnce(&Index, &Runtime) -> Result<T>,
    ) -> Result<T> {
        self.with_runtime(|rt| {
            let index = rt.source.get()?;
            f(&index, rt)
        })
    }

    // Queries

    /// Every present file, all types included.
    pub fn files(&self) -> Result<Vec<Arc<File>>> {
        self.with_index(|index, _| index.files())
    }

    pub fn file_by_mrl(&self, file_mrl: &str) -> Result<Option<Arc<File>>> {
        let file_mrl = if mrl::has_scheme(file_mrl) {
            file_mrl.to_string()
        } else {
            mrl::from_local_path(file_mrl)
        };
        self.with_index(|index, rt| {
            // Fixed storage stores the full MRL
            if let Some(file) = index.file_by_mrl_any_folder(&file_mrl)? {
                return Ok(Some(file));
            }
            // Removable storage stores device-relative paths
            for factory in &rt.factories {
                let device = match factory.create_device_for_mrl(&file_mrl) {
                    Some(d) if d.is_present() => d,
                    _ => continue,
                };
                let relative = mrl::remove_path(&file_mrl, &device.mountpoint());
                if let Some(row) = index.device_by_uuid(&device.uuid())? {
                    if let Some(file) =
                        index.removable_file_by_path(relative, row.id())?
                    {
                        return Ok(Some(file));
                    }
                }
            }
            Ok(None)
        })
    }

    pub fn media(&self, media_id: i64) -> Result<Option<Arc<Media>>> {
        self.with_index(|index, _| index.media(media_id))
    }

    pub fn audio_files(
        &self,
        sort: SortingCriteria,
        desc: bool,
    ) -> Result<Vec<Arc<Media>>> {
        self.with_index(|index, _| {
            index.media_listing(Some(MediaType::Audio), sort, desc)
        })
    }

    pub fn video_files(
        &self,
        sort: SortingCriteria,
        desc: bool,
    ) -> Result<Vec<Arc<Media>>> {
        self.with_index(|index, _| {
            index.media_listing(Some(MediaType::Video), sort, desc)
        })
    }

    pub fn folder(&self, folder_mrl: &str) -> Result<Option<Arc<Folder>>> {
        let normalized = discoverer::normalize_entry_point(folder_mrl);
        self.with_index(|index, rt| {
            for device in index.devices()? {
                let path = if device.is_removable() {
                    match index.device_mountpoint(device.id(), &rt.factories)? {
                        Some(mountpoint) => {
                            mrl::remove_path(&normalized, &mountpoint).to_string()
                        }
                        None => continue,
                    }
                } else {
                    normalized.clone()
                };
                if let Some(folder) = index.folder_by_path(&path, device.id())? {
                    if !folder.is_blacklisted() {
                        return Ok(Some(folder));
                    }
                }
            }
            Ok(None)
        })
    }

    pub fn album(&self, album_id: i64) -> Result<Option<Arc<Album>>> {
        self.with_index(|index, _| index.album(album_id))
    }

    pub fn albums(
        &self,
        sort: SortingCriteria,
        desc: bool,
    ) -> Result<Vec<Arc<Album>>> {
        self.with_index(|index, _| index.albums(sort, desc))
    }

    pub fn tracks_of_album(&self, album_id: i64) -> Result<Vec<Arc<Media>>> {
        self.with_index(|index, _| index.tracks_of_album(album_id))
    }

    pub fn album_track_of_media(
        &self,
        media_id: i64,
    ) -> Result<Option<Arc<AlbumTrack>>> {
        self.with_index(|index, _| index.album_track_of_media(media_id))
    }

    pub fn artist(&self, artist_id: i64) -> Result<Option<Arc<Artist>>> {
        self.with_index(|index, _| index.artist(artist_id))
    }

    pub fn artists(&self, include_sentinels: bool) -> Result<Vec<Arc<Artist>>> {
        self.with_index(|index, _| index.artists(include_sentinels))
    }

    pub fn albums_of_artist(&self, artist_id: i64) -> Result<Vec<Arc<Album>>> {
        self.with_index(|index, _| index.albums_of_artist(artist_id))
    }

    pub fn genre(&self, genre_id: i64) -> Result<Option<Arc<Genre>>> {
        self.with_index(|index, _| index.genre(genre_id))
    }

    pub fn genres(&self) -> Result<Vec<Arc<Genre>>> {
        self.with_index(|index, _| index.genres())
    }

    pub fn tracks_of_genre(&self, genre_id: i64) -> Result<Vec<Arc<AlbumTrack>>> {
        self.with_index(|index, _| index.tracks_of_genre(genre_id))
    }

    pub fn playlist(&self, playlist_id: i64) -> Result<Option<Arc<Playlist>>> {
        self.with_index(|index, _| index.playlist(playlist_id))
    }

    pub fn playlists(&self) -> Result<Vec<Arc<Playlist>>> {
        self.with_index(|index, _| index.playlists())
    }

    pub fn media_of_playlist(&self, playlist_id: i64) -> Result<Vec<Arc<Media>>> {
        self.with_index(|index, _| index.media_of_playlist(playlist_id))
    }

    pub fn show(&self, show_id: i64) -> Result<Option<Arc<Show>>> {
        self.with_index(|index, _| index.show(show_id))
    }

    pub fn show_by_name(&self, name: &str) -> Result<Option<Arc<Show>>> {
        self.with_index(|index, _| index.show_by_name(name))
    }

    pub fn shows(&self) -> Result<Vec<Arc<Show>>> {
        self.with_index(|index, _| index.shows())
    }

    pub fn episodes_of_show(&self, show_id: i64) -> Result<Vec<ShowEpisode>> {
        self.with_index(|index, _| index.episodes_of_show(show_id))
    }

    pub fn movie(&self, movie_id: i64) -> Result<Option<Arc<Movie>>> {
        self.with_index(|index, _| index.movie(movie_id))
    }

    pub fn movies(&self) -> Result<Vec<Arc<Movie>>> {
        self.with_index(|index, _| index.movies())
    }

    pub fn labels_of_media(&self, media_id: i64) -> Result<Vec<Label>> {
        self.with_index(|index, _| index.labels_of_media(media_id))
    }

    pub fn video_tracks_of_media(&self, media_id: i64) -> Result<Vec<VideoTrack>> {
        self.with_index(|index, _| index.video_tracks_of_media(media_id))
    }

    pub fn audio_tracks_of_media(&self, media_id: i64) -> Result<Vec<AudioTrack>> {
        self.with_index(|index, _| index.audio_tracks_of_media(media_id))
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.with_index(|index, _| index.history())
    }

    // Search

    pub fn search_media(&self, pattern: &str) -> Result<Vec<Arc<Media>>> {
        if pattern.len() < MIN_SEARCH_PATTERN {
            return Ok(Vec::new());
        }
        self.with_index(|index, _| index.search_media(pattern))
    }

    pub fn search_albums(&self, pattern: &str) -> Result<Vec<Arc<Album>>> {
        if pattern.len() < MIN_SEARCH_PATTERN {
            return Ok(Vec::new());
        }
        self.with_index(|index, _| index.search_albums(pattern))
    }

    pub fn search_artists(&self, pattern: &str) -> Result<Vec<Arc<Artist>>> {
        if pattern.len() < MIN_SEARCH_PATTERN {
            return Ok(Vec::new());
        }
        self.with_index(|index, _| index.search_artists(pattern))
    }

    pub fn search_genres(&self, pattern: &str) -> Result<Vec<Arc<Genre>>> {
        if pattern.len() < MIN_SEARCH_PATTERN {
            return Ok(Vec::new());
        }
        self.with_index(|index, _| index.search_genres(pattern))
    }

    pub fn search_playlists(&self, pattern: &str) -> Result<Vec<Arc<Playlist>>> {
        if pattern.len() < MIN_SEARCH_PATTERN {
            return Ok(Vec::new());
        }
        self.with_index(|index, _| index.search_playlists(pattern))
    }

    // Mutations

    pub fn create_label(&self, name: &str) -> Result<Label> {
        self.with_index(|index, _| index.create_label(name))
    }

    pub fn delete_label(&self, name: &str) -> Result<bool> {
        self.with_index(|index, _| match index.label_by_name(name)? {
            Some(label) => index.delete_label(label.label_id),
            None => Ok(false),
        })
    }

    pub fn add_label_to_media(&self, label_id: i64, media_id: i64) -> Result<()> {
        self.with_index(|index, _| index.attach_label(label_id, media_id))
    }

    pub fn remove_label_from_media(
        &self,
        label_id: i64,
        media_id: i64,
    ) -> Result<()> {
        self.with_index(|index, _| index.detach_label(label_id, media_id))
    }

    pub fn create_playlist(&self, name: &str) -> Result<Arc<Playlist>> {
        self.with_index(|index, _| index.create_playlist(name))
    }

    pub fn delete_playlist(&self, playlist_id: i64) -> Result<bool> {
        self.with_index(|index, _| index.delete_playlist(playlist_id))
    }

    pub fn playlist_append(&self, playlist_id: i64, media_id: i64) -> Result<()> {
        self.with_index(|index, _| index.playlist_append(playlist_id, media_id))
    }

    pub fn playlist_add(
        &self,
        playlist_id: i64,
        media_id: i64,
        position: i64,
    ) -> Result<()> {
        self.with_index(|index, _| index.playlist_add(playlist_id, media_id, position))
    }

    pub fn playlist_move(
        &self,
        playlist_id: i64,
        media_id: i64,
        position: i64,
    ) -> Result<()> {
        self.with_index(|index, _| {
            index.playlist_move(playlist_id, media_id, position)
        })
    }

    pub fn playlist_remove(&self, playlist_id: i64, media_id: i64) -> Result<()> {
        self.with_index(|index, _| index.playlist_remove(playlist_id, media_id))
    }

    pub fn add_to_stream_history(&self, stream_mrl: &str) -> Result<()> {
        self.with_index(|index, _| index.add_to_history(stream_mrl))
    }

    pub fn clear_history(&self) -> Result<()> {
        self.with_index(|index, _| index.clear_history())
    }

    /// Registers a media that lives outside every entry point (a one-off
    /// file the user opened). It is never picked up by discovery.
    pub fn add_external_media(&self, media_mrl: &str) -> Result<Arc<Media>> {
        let media_mrl = if mrl::has_scheme(media_mrl) {
            media_mrl.to_string()
        } else {
            mrl::from_local_path(media_mrl)
        };
        self.with_index(|index, _| {
            let name = mrl::file_name(&media_mrl).to_string();
            let media =
                index.create_media(MediaType::External, Some(&name), Some(&name))?;
            index.create_file(
                media.id(),
                &media_mrl,
                FileType::Main,
                None,
                0,
                0,
                false,
                true,
            )?;
            Ok(media)
        })
    }

    pub fn set_media_title(&self, media_id: i64, title: &str) -> Result<()> {
        self.with_index(|index, _| index.set_media_title(media_id, title))
    }

    pub fn set_media_progress(&self, media_id: i64, progress: f64) -> Result<()> {
        self.with_index(|index, _| index.set_media_progress(media_id, progress))
    }

    pub fn set_media_rating(&self, media_id: i64, rating: i64) -> Result<()> {
        self.with_index(|index, _| index.set_media_rating(media_id, rating))
    }

    pub fn increase_play_count(&self, media_id: i64) -> Result<()> {
        self.with_index(|index, _| index.increase_media_play_count(media_id))
    }

    pub fn set_artist_short_bio(&self, artist_id: i64, bio: &str) -> Result<()> {
        self.with_index(|index, _| index.set_artist_short_bio(artist_id, bio))
    }

    pub fn set_artist_artwork_mrl(&self, artist_id: i64, artwork: &str) -> Result<()> {
        self.with_index(|index, _| index.set_artist_artwork_mrl(artist_id, artwork))
    }

    pub fn set_album_short_summary(&self, album_id: i64, summary: &str) -> Result<()> {
        self.with_index(|index, _| index.set_album_short_summary(album_id, summary))
    }

    pub fn set_album_artwork_mrl(&self, album_id: i64, artwork: &str) -> Result<()> {
        self.with_index(|index, _| index.set_album_artwork_mrl(album_id, artwork))
    }

    pub fn set_playlist_name(&self, playlist_id: i64, name: &str) -> Result<()> {
        self.with_index(|index, _| index.set_playlist_name(playlist_id, name))
    }

    pub fn movie_of_media(&self, media_id: i64) -> Result<Option<Arc<Movie>>> {
        self.with_index(|index, _| index.movie_of_media(media_id))
    }

    // Discovery control

    pub fn discover(&self, entry_point: &str) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer
                .enqueue(DiscoverCmd::Discover(entry_point.to_string()));
            Ok(())
        })
    }

    pub fn reload(&self) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer.enqueue(DiscoverCmd::Reload);
            Ok(())
        })
    }

    pub fn reload_entry_point(&self, entry_point: &str) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer
                .enqueue(DiscoverCmd::ReloadEntryPoint(entry_point.to_string()));
            Ok(())
        })
    }

    pub fn ban_folder(&self, entry_point: &str) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer
                .enqueue(DiscoverCmd::Ban(entry_point.to_string()));
            Ok(())
        })
    }

    pub fn unban_folder(&self, entry_point: &str) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer
                .enqueue(DiscoverCmd::Unban(entry_point.to_string()));
            Ok(())
        })
    }

    pub fn remove_entry_point(&self, entry_point: &str) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer
                .enqueue(DiscoverCmd::Remove(entry_point.to_string()));
            Ok(())
        })
    }

    /// Cooperatively pauses the discoverer and parser; in-flight units of
    /// work complete first.
    pub fn pause_background_operations(&self) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer.pause();
            rt.parser.pause();
            Ok(())
        })
    }

    pub fn resume_background_operations(&self) -> Result<()> {
        self.with_runtime(|rt| {
            rt.discoverer.resume();
            rt.parser.resume();
            Ok(())
        })
    }

    /// Clears all parser bookkeeping and reparses the whole library.
    pub fn force_parser_retry(&self) -> Result<()> {
        self.with_index(|index, rt| {
            index.reset_parser_state()?;
            rt.parser.restore()
        })
    }

    // Device events

    /// Returns true when the device was never seen before; the caller is
    /// expected to trigger discovery of its content.
    pub fn on_device_plugged(&self, uuid: &str, mountpoint: &str) -> Result<bool> {
        info!("device '{}' plugged at '{}'", uuid, mountpoint);

        self.with_index(|index, _| match index.device_by_uuid(uuid)? {
            None => Ok(true),
            Some(device) => {
                index.set_device_present(&device, true)?;
                Ok(false)
            }
        })
    }

    pub fn on_device_unplugged(&self, uuid: &str) -> Result<()> {
        info!("device '{}' unplugged", uuid);

        self.with_index(|index, _| match index.device_by_uuid(uuid)? {
            Some(device) => index.set_device_present(&device, false),
            None => {
                error!("unplug event for unknown device '{}'", uuid);
                Ok(())
            }
        })
    }

    pub fn is_device_known(&self, uuid: &str) -> Result<bool> {
        self.with_index(|index, _| Ok(index.device_by_uuid(uuid)?.is_some()))
    }
}

impl Drop for MediaLibrary {
    fn drop(&mut self) {
        self.stop();
    }
}
