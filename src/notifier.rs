use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::info;

use crate::index::album::Album;
use crate::index::album_track::AlbumTrack;
use crate::index::artist::Artist;
use crate::index::genre::Genre;
use crate::index::media::Media;
use crate::index::playlist::Playlist;
use crate::MediaLibraryCb;

const BATCH_DELAY: Duration = Duration::from_millis(500);

struct Queue<T> {
    added: Vec<Arc<T>>,
    modified: Vec<Arc<T>>,
    removed: Vec<i64>,
    deadline: Option<Instant>,
}

impl<T> Default for Queue<T> {
    fn default() -> Queue<T> {
        Queue {
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
            deadline: None,
        }
    }
}

impl<T> Queue<T> {
    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Swaps the queue out when its deadline has passed.
    fn take_due(&mut self, now: Instant) -> Option<Queue<T>> {
        match self.deadline {
            Some(deadline) if deadline <= now => Some(std::mem::take(self)),
            _ => None,
        }
    }

    fn bump(&mut self, now: Instant) {
        self.deadline = Some(now + BATCH_DELAY);
    }
}

#[derive(Default)]
struct Queues {
    media: Queue<Media>,
    artists: Queue<Artist>,
    albums: Queue<Album>,
    tracks: Queue<AlbumTrack>,
    playlists: Queue<Playlist>,
    genres: Queue<Genre>,
}

impl Queues {
    fn next_deadline(&self) -> Option<Instant> {
        [
            self.media.deadline,
            self.artists.deadline,
            self.albums.deadline,
            self.tracks.deadline,
            self.playlists.deadline,
            self.genres.deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

struct NotifierInner {
    queues: Mutex<Queues>,
    cond: Condvar,
    stop: AtomicBool,
}

/// Debounces entity change events: every enqueue re-arms its queue's
/// 500ms deadline, and once a queue stays quiet past it, the whole batch
/// goes out in one callback. Delivery is at-least-once; consumers must
/// tolerate redundant modifications.
pub(crate) struct ModificationNotifier {
    inner: Arc<NotifierInner>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

macro_rules! notify_methods {
    ($create:ident, $modify:ident, $remove:ident, $queue:ident, $entity:ty) => {
        pub fn $create(&self, entity: Arc<$entity>) {
            let mut queues = self.inner.queues.lock().unwrap();
            queues.$queue.added.push(entity);
            queues.$queue.bump(Instant::now());
            self.inner.cond.notify_all();
        }

        pub fn $modify(&self, entity: Arc<$entity>) {
            let mut queues = self.inner.queues.lock().unwrap();
            queues.$queue.modified.push(entity);
            queues.$queue.bump(Instant::now());
            self.inner.cond.notify_all();
        }

        pub fn $remove(&self, row_id: i64) {
            let mut queues = self.inner.queues.lock().unwrap();
            queues.$queue.removed.push(row_id);
            queues.$queue.bump(Instant::now());
            self.inner.cond.notify_all();
        }
    };
}

impl ModificationNotifier {
    pub fn new() -> ModificationNotifier {
        ModificationNotifier {
            inner: Arc::new(NotifierInner {
                queues: Mutex::new(Queues::default()),
                cond: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
            join_handle: Mutex::new(None),
        }
    }

    pub fn start(&self, cb: Arc<dyn MediaLibraryCb>) {
        let mut join_handle = self.join_handle.lock().unwrap();
        if join_handle.is_some() {
            return;
        }

        self.inner.stop.store(false, Ordering::Relaxed);

        let inner = self.inner.clone();
        *join_handle = Some(std::thread::spawn(move || run(inner, cb)));
    }

    pub fn stop(&self) {
        let mut join_handle = self.join_handle.lock().unwrap();

        self.inner.stop.store(true, Ordering::Relaxed);
        self.inner.cond.notify_all();

        if let Some(handle) = join_handle.take() {
            handle.join().unwrap();
        }
    }

    notify_methods!(
        notify_media_creation,
        notify_media_modification,
        notify_media_removal,
        media,
        Media
    );
    notify_methods!(
        notify_artist_creation,
        notify_artist_modification,
        notify_artist_removal,
        artists,
        Artist
    );
    notify_methods!(
        notify_album_creation,
        notify_album_modification,
        notify_album_removal,
        albums,
        Album
    );
    notify_methods!(
        notify_album_track_creation,
        notify_album_track_modification,
        notify_album_track_removal,
        tracks,
        AlbumTrack
    );
    notify_methods!(
        notify_playlist_creation,
        notify_playlist_modification,
        notify_playlist_removal,
        playlists,
        Playlist
    );
    notify_methods!(
        notify_genre_creation,
        notify_genre_modification,
        notify_genre_removal,
        genres,
        Genre
    );
}

fn run(inner: Arc<NotifierInner>, cb: Arc<dyn MediaLibraryCb>) {
    info!("started");

    let mut queues = inner.queues.lock().unwrap();
    loop {
        let stopping = inner.stop.load(Ordering::Relaxed);
        // On shutdown everything still queued goes out immediately
        let now = if stopping {
            Instant::now() + BATCH_DELAY + BATCH_DELAY
        } else {
            Instant::now()
        };

        let media = queues.media.take_due(now);
        let artists = queues.artists.take_due(now);
        let albums = queues.albums.take_due(now);
        let tracks = queues.tracks.take_due(now);
        let playlists = queues.playlists.take_due(now);
        let genres = queues.genres.take_due(now);

        let any_due = media.is_some()
            || artists.is_some()
            || albums.is_some()
            || tracks.is_some()
            || playlists.is_some()
            || genres.is_some();

        if any_due {
            drop(queues);
            if let Some(q) = media {
                deliver(&q, |b| cb.on_media_added(b), |b| cb.on_media_modified(b), |b| {
                    cb.on_media_removed(b)
                });
            }
            if let Some(q) = artists {
                deliver(
                    &q,
                    |b| cb.on_artists_added(b),
                    |b| cb.on_artists_modified(b),
                    |b| cb.on_artists_removed(b),
                );
            }
            if let Some(q) = albums {
                deliver(
                    &q,
                    |b| cb.on_albums_added(b),
                    |b| cb.on_albums_modified(b),
                    |b| cb.on_albums_removed(b),
                );
            }
            if let Some(q) = tracks {
                deliver(
                    &q,
                    |b| cb.on_album_tracks_added(b),
                    |b| cb.on_album_tracks_modified(b),
                    |b| cb.on_album_tracks_removed(b),
                );
            }
            if let Some(q) = playlists {
                deliver(
                    &q,
                    |b| cb.on_playlists_added(b),
                    |b| cb.on_playlists_modified(b),
                    |b| cb.on_playlists_removed(b),
                );
            }
            if let Some(q) = genres {
                deliver(
                    &q,
                    |b| cb.on_genres_added(b),
                    |b| cb.on_genres_modified(b),
                    |b| cb.on_genres_removed(b),
                );
            }
            queues = inner.queues.lock().unwrap();
            continue;
        }

        if stopping {
            break;
        }

        queues = match queues.next_deadline() {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                inner.cond.wait_timeout(queues, timeout).unwrap().0
            }
            None => inner.cond.wait(queues).unwrap(),
        };
    }

    info!("stopped");
}

fn deliver<T>(
    queue: &Queue<T>,
    added: impl FnOnce(Vec<Arc<T>>),
    modified: impl FnOnce(Vec<Arc<T>>),
    removed: impl FnOnce(Vec<i64>),
) {
    if queue.is_empty() {
        return;
    }
    if !queue.added.is_empty() {
        added(queue.added.clone());
    }
    if !queue.modified.is_empty() {
        modified(queue.modified.clone());
    }
    if !queue.removed.is_empty() {
        removed(queue.removed.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct RemovalCb {
        batches: Mutex<Vec<Vec<i64>>>,
    }

    impl crate::MediaLibraryCb for RemovalCb {
        fn on_media_removed(&self, media_ids: Vec<i64>) {
            self.batches.lock().unwrap().push(media_ids);
        }
    }

    #[test]
    fn debounces_into_one_ordered_batch() {
        let notifier = ModificationNotifier::new();
        let cb = Arc::new(RemovalCb::default());
        notifier.start(cb.clone());

        notifier.notify_media_removal(1);
        notifier.notify_media_removal(2);
        notifier.notify_media_removal(3);

        std::thread::sleep(Duration::from_millis(900));

        {
            let batches = cb.batches.lock().unwrap();
            assert_eq!(1, batches.len());
            assert_eq!(vec![1, 2, 3], batches[0]);
        }

        notifier.stop();
    }

    #[test]
    fn flushes_pending_on_stop() {
        let notifier = ModificationNotifier::new();
        let cb = Arc::new(RemovalCb::default());
        notifier.start(cb.clone());

        notifier.notify_media_removal(7);
        notifier.stop();

        assert_eq!(vec![vec![7]], *cb.batches.lock().unwrap());
    }
}
