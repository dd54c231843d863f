use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info, warn};

use crate::derivation;
use crate::fs::FsFactory;
use crate::index::IndexSource;
use crate::sqlite::{with_retries, LOCK_RETRIES};
use crate::{IdleNotifier, MediaLibraryCb, Result};

/// How often a task may come back with `TemporaryUnavailable` before it is
/// dropped, and how often a file may fail parsing before restore gives up
/// on it.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// The task may proceed to the next service.
    Success,
    /// The service failed; the task is dropped and the file's retry counter
    /// bumped so a later restore can try again.
    Error,
    /// The service can't run right now; the task goes back to the tail of
    /// this service's queue, a bounded number of times.
    TemporaryUnavailable,
    /// The task is dropped and the file flagged permanently failed.
    Fatal,
    /// This service has nothing to do for the task; it proceeds.
    Discarded,
}

#[derive(Debug, Clone, Default)]
pub struct VideoTrackInfo {
    pub codec: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AudioTrackInfo {
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
    pub samplerate: Option<i64>,
    pub nb_channels: Option<i64>,
    pub language: Option<String>,
    pub description: Option<String>,
}

/// Everything the pluggable stages may learn about a media. Whatever ends
/// up here when the chain completes is committed to the database by the
/// final stage.
#[derive(Debug, Clone, Default)]
pub struct MediaTags {
    pub title: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub release_year: Option<i64>,
    pub show_name: Option<String>,
    pub episode: Option<i64>,
    pub season: Option<i64>,
    pub duration: Option<i64>,
    pub thumbnail: Option<String>,
    pub video_tracks: Vec<VideoTrackInfo>,
    pub audio_tracks: Vec<AudioTrackInfo>,
}

impl MediaTags {
    /// True when the extractor saw anything usable for entity derivation.
    pub fn has_music_tags(&self) -> bool {
        self.album.is_some()
            || self.album_artist.is_some()
            || self.artist.is_some()
            || self.genre.is_some()
    }
}

pub struct Task {
    media_id: i64,
    file_id: i64,
    mrl: String,
    retries: u32,
    pub tags: Option<MediaTags>,
}

impl Task {
    pub fn media_id(&self) -> i64 {
        self.media_id
    }

    pub fn file_id(&self) -> i64 {
        self.file_id
    }

    pub fn mrl(&self) -> &str {
        &self.mrl
    }

    pub fn tags_mut(&mut self) -> &mut MediaTags {
        self.tags.get_or_insert_with(MediaTags::default)
    }
}

/// A parser stage. Stages run in descending `priority` order, each with up
/// to `nb_threads` workers. The canonical chain is a media probe, then a
/// metadata extractor, then a thumbnailer; all of them communicate through
/// `Task::tags` and the built-in final stage commits the outcome.
pub trait ParserService: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> u8;
    fn nb_threads(&self) -> u16 {
        1
    }
    fn run(&self, task: &mut Task) -> ServiceStatus;
}

struct ServiceQueue {
    service: Box<dyn ParserService>,
    queue: Mutex<VecDeque<Task>>,
    cond: Condvar,
    nb_threads: u16,
}

struct ParserInner {
    services: Vec<ServiceQueue>,
    source: Arc<IndexSource>,
    factories: Vec<Arc<dyn FsFactory>>,
    cb: Arc<dyn MediaLibraryCb>,
    idle: Arc<IdleNotifier>,
    stop: AtomicBool,
    paused: AtomicBool,
    busy: AtomicU32,
    scheduled: AtomicU32,
    done: AtomicU32,
    last_percent: AtomicU32,
}

impl ParserInner {
    fn notify_all(&self) {
        for sq in &self.services {
            sq.cond.notify_all();
        }
    }

    fn queues_empty(&self) -> bool {
        self.services
            .iter()
            .all(|sq| sq.queue.lock().unwrap().is_empty())
    }

    fn check_idle(&self) {
        let idle = self.busy.load(Ordering::SeqCst) == 0 && self.queues_empty();
        self.idle.set_parser_idle(idle);
        if idle {
            self.scheduled.store(0, Ordering::SeqCst);
            self.done.store(0, Ordering::SeqCst);
        }
    }

    fn task_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        self.idle.set_parser_idle(false);
        self.update_stats();
    }

    fn task_done(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
        self.update_stats();
    }

    fn update_stats(&self) {
        let scheduled = self.scheduled.load(Ordering::SeqCst);
        if scheduled == 0 {
            return;
        }
        let done = self.done.load(Ordering::SeqCst).min(scheduled);
        let percent = done * 100 / scheduled;
        if self.last_percent.swap(percent, Ordering::SeqCst) != percent {
            self.cb.on_parsing_stats_updated(percent);
        }
    }

    fn enqueue(&self, service_idx: usize, task: Task) {
        let sq = &self.services[service_idx];
        sq.queue.lock().unwrap().push_back(task);
        sq.cond.notify_one();
    }
}

/// The prioritized multi-stage pipeline. Tasks enter at the highest
/// priority service and flow down the chain; the implicit final stage
/// commits tags and marks files parsed.
pub(crate) struct Parser {
    inner: Arc<ParserInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Parser {
    pub fn new(
        source: Arc<IndexSource>,
        factories: Vec<Arc<dyn FsFactory>>,
        cb: Arc<dyn MediaLibraryCb>,
        idle: Arc<IdleNotifier>,
        mut services: Vec<Box<dyn ParserService>>,
    ) -> Parser {
        // Higher priority first; the committer closes the chain
        services.sort_by(|a, b| b.priority().cmp(&a.priority()));
        services.push(Box::new(MetadataCommitter {
            source: source.clone(),
        }));

        let services = services
            .into_iter()
            .map(|service| ServiceQueue {
                nb_threads: service.nb_threads().max(1),
                service,
                queue: Mutex::new(VecDeque::new()),
                cond: Condvar::new(),
            })
            .collect();

        Parser {
            inner: Arc::new(ParserInner {
                services,
                source,
                factories,
                cb,
                idle,
                stop: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                busy: AtomicU32::new(0),
                scheduled: AtomicU32::new(0),
                done: AtomicU32::new(0),
                last_percent: AtomicU32::new(0),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn start(&self) {
        let mut workers = self.workers.lock().unwrap();
        if !workers.is_empty() {
            return;
        }

        self.inner.stop.store(false, Ordering::Relaxed);

        if let Err(e) = self.restore() {
            error!("failed to restore parser tasks: {}", e);
        }

        for (idx, sq) in self.inner.services.iter().enumerate() {
            for _ in 0..sq.nb_threads {
                let inner = self.inner.clone();
                workers.push(std::thread::spawn(move || worker(inner, idx)));
            }
        }
    }

    pub fn stop(&self) {
        let mut workers = self.workers.lock().unwrap();

        self.inner.stop.store(true, Ordering::Relaxed);
        self.inner.notify_all();

        for handle in workers.drain(..) {
            handle.join().unwrap();
        }

        for sq in &self.inner.services {
            sq.queue.lock().unwrap().clear();
        }
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Relaxed);
        self.inner.notify_all();
    }

    /// Feeds a freshly discovered media into the chain.
    pub fn add(&self, media_id: i64, file_id: i64, mrl: &str) {
        debug!("queue task media_id={} file_id={}", media_id, file_id);

        self.inner.task_scheduled();
        self.inner.enqueue(
            0,
            Task {
                media_id,
                file_id,
                mrl: mrl.to_string(),
                retries: 0,
                tags: None,
            },
        );
    }

    /// Re-enqueues every file that never completed parsing. Files on absent
    /// devices stay put; they come back through discovery when their device
    /// returns.
    pub fn restore(&self) -> Result<()> {
        let index = self.inner.source.get()?;
        let files = index.restorable_files(MAX_RETRIES)?;
        if files.is_empty() {
            return Ok(());
        }

        info!("restoring {} unparsed files", files.len());

        for file in files {
            let mrl = index.file_mrl(&file, &self.inner.factories)?;
            if mrl.is_empty() {
                continue;
            }
            self.add(file.media_id(), file.id(), &mrl);
        }

        Ok(())
    }
}

fn worker(inner: Arc<ParserInner>, idx: usize) {
    let name = inner.services[idx].service.name().to_string();
    info!("parser service '{}' started", name);

    let index = match inner.source.get() {
        Ok(index) => index,
        Err(e) => {
            error!("parser service '{}' can't open database: {}", name, e);
            return;
        }
    };

    loop {
        let mut task = {
            let sq = &inner.services[idx];
            let mut queue = sq.queue.lock().unwrap();
            loop {
                if inner.stop.load(Ordering::Relaxed) {
                    info!("parser service '{}' exiting", name);
                    return;
                }
                if !inner.paused.load(Ordering::Relaxed) {
                    if let Some(task) = queue.pop_front() {
                        break task;
                    }
                }
                queue = sq.cond.wait(queue).unwrap();
            }
        };

        inner.busy.fetch_add(1, Ordering::SeqCst);

        let status = inner.services[idx].service.run(&mut task);

        match status {
            ServiceStatus::Success | ServiceStatus::Discarded => {
                if idx + 1 < inner.services.len() {
                    task.retries = 0;
                    inner.enqueue(idx + 1, task);
                } else {
                    inner.task_done();
                }
            }
            ServiceStatus::TemporaryUnavailable => {
                task.retries += 1;
                if task.retries < MAX_RETRIES {
                    inner.enqueue(idx, task);
                } else {
                    warn!(
                        "service '{}' unavailable for media_id={}, dropping task",
                        name, task.media_id
                    );
                    if let Err(e) = index.increment_parser_retries(task.file_id) {
                        error!("failed to record parser retry: {}", e);
                    }
                    inner.task_done();
                }
            }
            ServiceStatus::Error => {
                warn!(
                    "service '{}' failed for media_id={}",
                    name, task.media_id
                );
                if let Err(e) = index.increment_parser_retries(task.file_id) {
                    error!("failed to record parser retry: {}", e);
                }
                inner.task_done();
            }
            ServiceStatus::Fatal => {
                warn!(
                    "service '{}' gave up on media_id={}",
                    name, task.media_id
                );
                if let Err(e) = index.set_parser_retries(task.file_id, MAX_RETRIES) {
                    error!("failed to flag file unparseable: {}", e);
                }
                inner.task_done();
            }
        }

        inner.busy.fetch_sub(1, Ordering::SeqCst);
        inner.check_idle();
    }
}

/// The implicit final stage: writes everything the chain learned into the
/// database, derives albums/artists/genres or movies/episodes, and marks
/// the file parsed. One media is exactly one transaction.
struct MetadataCommitter {
    source: Arc<IndexSource>,
}

impl MetadataCommitter {
    fn commit(&self, task: &Task) -> Result<()> {
        let index = self.source.get()?;

        let media = match index.media(task.media_id)? {
            Some(m) => m,
            // The media vanished while the task was queued, nothing to do
            None => return Ok(()),
        };

        with_retries(LOCK_RETRIES, || {
            let t = index.begin()?;

            if let Some(tags) = &task.tags {
                derivation::apply_tags(&index, &media, tags)?;
            }
            index.set_media_parsed(media.id(), true)?;
            if let Some(file) = index.file(task.file_id)? {
                index.set_file_parsed(&file, true)?;
            }

            t.commit()
        })
    }
}

impl ParserService for MetadataCommitter {
    fn name(&self) -> &str {
        "committer"
    }

    fn priority(&self) -> u8 {
        0
    }

    fn run(&self, task: &mut Task) -> ServiceStatus {
        match self.commit(task) {
            Ok(()) => ServiceStatus::Success,
            Err(e) => {
                error!(
                    "failed to commit metadata for media_id={}: {}",
                    task.media_id, e
                );
                ServiceStatus::Error
            }
        }
    }
}
