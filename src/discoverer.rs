use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info, warn};

use crate::extensions;
use crate::fs::{mrl, DeviceLister, FsDirectory, FsFactory, FsFile};
use crate::index::device::Device;
use crate::index::file::FileType;
use crate::index::folder::Folder;
use crate::index::{Index, IndexSource};
use crate::parser::Parser;
use crate::sqlite::{with_retries, LOCK_RETRIES};
use crate::{Error, IdleNotifier, MediaLibraryCb, Result};

#[derive(Debug, Clone)]
pub(crate) enum DiscoverCmd {
    Discover(String),
    Reload,
    ReloadEntryPoint(String),
    Ban(String),
    Unban(String),
    Remove(String),
}

/// Entry points come in as plain paths or MRLs; everything downstream wants
/// a directory MRL with a trailing slash.
pub(crate) fn normalize_entry_point(entry_point: &str) -> String {
    let mut normalized = if mrl::has_scheme(entry_point) {
        entry_point.to_string()
    } else {
        mrl::from_local_path(entry_point)
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

struct DiscovererInner {
    queue: Mutex<VecDeque<DiscoverCmd>>,
    cond: Condvar,
    stop: AtomicBool,
    paused: AtomicBool,
    source: Arc<IndexSource>,
    factories: Vec<Arc<dyn FsFactory>>,
    parser: Arc<Parser>,
    cb: Arc<dyn MediaLibraryCb>,
    idle: Arc<IdleNotifier>,
}

/// One dedicated thread consuming discovery commands in order. While a
/// command runs, further enqueues are accepted; busy/idle edges are
/// reported through the idle notifier.
pub(crate) struct DiscovererWorker {
    inner: Arc<DiscovererInner>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DiscovererWorker {
    pub fn new(
        source: Arc<IndexSource>,
        factories: Vec<Arc<dyn FsFactory>>,
        parser: Arc<Parser>,
        cb: Arc<dyn MediaLibraryCb>,
        idle: Arc<IdleNotifier>,
    ) -> DiscovererWorker {
        DiscovererWorker {
            inner: Arc::new(DiscovererInner {
                queue: Mutex::new(VecDeque::new()),
                cond: Condvar::new(),
                stop: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                source,
                factories,
                parser,
                cb,
                idle,
            }),
            join_handle: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut join_handle = self.join_handle.lock().unwrap();
        if join_handle.is_some() {
            return;
        }

        self.inner.stop.store(false, Ordering::Relaxed);

        let inner = self.inner.clone();
        *join_handle = Some(std::thread::spawn(move || run(inner)));
    }

    pub fn stop(&self) {
        let mut join_handle = self.join_handle.lock().unwrap();

        self.inner.stop.store(true, Ordering::Relaxed);
        self.inner.cond.notify_all();

        if let Some(handle) = join_handle.take() {
            handle.join().unwrap();
        }
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Relaxed);
        self.inner.cond.notify_all();
    }

    pub fn enqueue(&self, cmd: DiscoverCmd) {
        debug!("queue command {:?}", cmd);

        self.inner.idle.set_discoverer_idle(false);
        self.inner.queue.lock().unwrap().push_back(cmd);
        self.inner.cond.notify_all();
    }
}

fn run(inner: Arc<DiscovererInner>) {
    info!("started");

    let index = match inner.source.get() {
        Ok(index) => index,
        Err(e) => {
            error!("can't open database: {}", e);
            return;
        }
    };

    loop {
        let cmd = {
            let mut queue = inner.queue.lock().unwrap();
            loop {
                if inner.stop.load(Ordering::Relaxed) {
                    info!("exiting");
                    return;
                }
                if !inner.paused.load(Ordering::Relaxed) {
                    if let Some(cmd) = queue.pop_front() {
                        break cmd;
                    }
                }
                inner.idle.set_discoverer_idle(true);
                queue = inner.cond.wait(queue).unwrap();
            }
        };

        inner.idle.set_discoverer_idle(false);
        process(&inner, &index, cmd);

        if inner.queue.lock().unwrap().is_empty() {
            inner.idle.set_discoverer_idle(true);
        }
    }
}

fn process(inner: &DiscovererInner, index: &Index, cmd: DiscoverCmd) {
    match cmd {
        DiscoverCmd::Discover(entry_point) => {
            let entry_point = normalize_entry_point(&entry_point);
            inner.cb.on_discovery_started(&entry_point);
            let success = match discover(inner, index, &entry_point) {
                Ok(()) => true,
                Err(e) => {
                    error!("failed to discover '{}': {}", entry_point, e);
                    false
                }
            };
            inner.cb.on_discovery_completed(&entry_point, success);
        }
        DiscoverCmd::Reload => {
            inner.cb.on_reload_started(None);
            let success = match reload_all(inner, index) {
                Ok(()) => true,
                Err(e) => {
                    error!("reload failed: {}", e);
                    false
                }
            };
            inner.cb.on_reload_completed(None, success);
        }
        DiscoverCmd::ReloadEntryPoint(entry_point) => {
            let entry_point = normalize_entry_point(&entry_point);
            inner.cb.on_reload_started(Some(&entry_point));
            let success = match reload_entry_point(inner, index, &entry_point) {
                Ok(()) => true,
                Err(e) => {
                    error!("failed to reload '{}': {}", entry_point, e);
                    false
                }
            };
            inner.cb.on_reload_completed(Some(&entry_point), success);
        }
        DiscoverCmd::Ban(entry_point) => {
            let entry_point = normalize_entry_point(&entry_point);
            let success = match ban(inner, index, &entry_point) {
                Ok(()) => true,
                Err(e) => {
                    error!("failed to ban '{}': {}", entry_point, e);
                    false
                }
            };
            inner.cb.on_entry_point_banned(&entry_point, success);
        }
        DiscoverCmd::Unban(entry_point) => {
            let entry_point = normalize_entry_point(&entry_point);
            let success = match unban(inner, index, &entry_point) {
                Ok(()) => true,
                Err(e) => {
                    error!("failed to unban '{}': {}", entry_point, e);
                    false
                }
            };
            if success {
                inner.queue.lock().unwrap().push_back(DiscoverCmd::Reload);
            }
            inner.cb.on_entry_point_unbanned(&entry_point, success);
        }
        DiscoverCmd::Remove(entry_point) => {
            let entry_point = normalize_entry_point(&entry_point);
            let success = match remove_entry_point(inner, index, &entry_point) {
                Ok(()) => true,
                Err(e) => {
                    error!("failed to remove '{}': {}", entry_point, e);
                    false
                }
            };
            inner.cb.on_entry_point_removed(&entry_point, success);
        }
    }
}

struct DeviceCtx {
    row: Arc<Device>,
    mountpoint: String,
    removable: bool,
}

fn factory_for<'a>(
    factories: &'a [Arc<dyn FsFactory>],
    target: &str,
) -> Result<&'a Arc<dyn FsFactory>> {
    let scheme =
        mrl::scheme(target).ok_or_else(|| Error::UnsupportedMrl(target.to_string()))?;
    factories
        .iter()
        .find(|f| f.supports(scheme))
        .ok_or_else(|| Error::UnsupportedMrl(target.to_string()))
}

/// Resolves (and creates on first sighting) the device row backing a
/// directory. None when the backing device is currently unreachable.
fn resolve_device(
    index: &Index,
    dir: &dyn FsDirectory,
) -> Result<Option<DeviceCtx>> {
    let fs_device = match dir.device() {
        Some(d) if d.is_present() => d,
        _ => return Ok(None),
    };

    let row = match index.device_by_uuid(&fs_device.uuid())? {
        Some(row) => row,
        None => index.create_device(
            &fs_device.uuid(),
            &fs_device.scheme(),
            fs_device.is_removable(),
        )?,
    };

    Ok(Some(DeviceCtx {
        row,
        mountpoint: fs_device.mountpoint(),
        removable: fs_device.is_removable(),
    }))
}

fn store_path(full_mrl: &str, device: &DeviceCtx) -> String {
    if device.removable {
        mrl::remove_path(full_mrl, &device.mountpoint).to_string()
    } else {
        full_mrl.to_string()
    }
}

fn discover(inner: &DiscovererInner, index: &Index, entry_point: &str) -> Result<()> {
    info!("discovering '{}'", entry_point);

    let factory = factory_for(&inner.factories, entry_point)?;
    let dir = factory.create_directory(entry_point)?;
    let dir_mrl = dir.mrl();

    let device = resolve_device(index, &*dir)?
        .ok_or_else(|| Error::DeviceAbsent(dir_mrl.clone()))?;
    let path = store_path(&dir_mrl, &device);

    let folder = match index.folder_by_path(&path, device.row.id())? {
        Some(f) if f.is_blacklisted() => {
            warn!("'{}' is banned, not discovering", entry_point);
            return Ok(());
        }
        Some(f) => f,
        None => index.create_folder(&path, None, device.row.id(), device.removable)?,
    };

    walk(inner, index, &*dir, &folder, &device)
}

fn reload_all(inner: &DiscovererInner, index: &Index) -> Result<()> {
    info!("reloading all entry points");

    refresh_devices(inner, index)?;

    for root in index.root_folders()? {
        let root_mrl = index.folder_mrl(&root, &inner.factories)?;
        if root_mrl.is_empty() {
            continue;
        }
        if let Err(e) = reload_folder(inner, index, &root, &root_mrl) {
            warn!("failed to reload '{}': {}", root_mrl, e);
        }
    }

    Ok(())
}

fn reload_entry_point(
    inner: &DiscovererInner,
    index: &Index,
    entry_point: &str,
) -> Result<()> {
    info!("reloading '{}'", entry_point);

    refresh_devices(inner, index)?;

    for root in index.root_folders()? {
        let root_mrl = index.folder_mrl(&root, &inner.factories)?;
        if root_mrl == entry_point {
            return reload_folder(inner, index, &root, &root_mrl);
        }
    }

    warn!("'{}' is not a known entry point", entry_point);
    Ok(())
}

fn reload_folder(
    inner: &DiscovererInner,
    index: &Index,
    folder: &Arc<Folder>,
    folder_mrl: &str,
) -> Result<()> {
    let factory = factory_for(&inner.factories, folder_mrl)?;
    let dir = factory.create_directory(folder_mrl)?;
    let device = resolve_device(index, &*dir)?
        .ok_or_else(|| Error::DeviceAbsent(folder_mrl.to_string()))?;

    walk(inner, index, &*dir, folder, &device)
}

/// Reconciles every known device's presence against the factories' current
/// view of the world.
fn refresh_devices(inner: &DiscovererInner, index: &Index) -> Result<()> {
    for factory in &inner.factories {
        factory.refresh_devices();
    }

    for device in index.devices()? {
        let fs_device = inner
            .factories
            .iter()
            .find(|f| f.supports(device.scheme()))
            .and_then(|f| f.create_device(device.uuid()));
        let present = fs_device.map(|d| d.is_present()).unwrap_or(false);
        if present != device.is_present() {
            info!(
                "device '{}' is now {}",
                device.uuid(),
                if present { "present" } else { "absent" }
            );
            index.set_device_present(&device, present)?;
        }
    }

    Ok(())
}

/// Depth-first reconciliation of one folder: new supported files become
/// media and parser tasks, vanished files take their last media with them,
/// then subfolders, skipping banned ones.
fn walk(
    inner: &DiscovererInner,
    index: &Index,
    dir: &dyn FsDirectory,
    folder: &Arc<Folder>,
    device: &DeviceCtx,
) -> Result<()> {
    if inner.stop.load(Ordering::Relaxed) {
        return Ok(());
    }

    let fs_files = dir.files()?;
    let mut to_parse = Vec::new();

    with_retries(LOCK_RETRIES, || {
        let t = index.begin()?;
        to_parse.clear();

        let mut known: HashMap<String, _> = index
            .files_of_folder(folder.id())?
            .into_iter()
            .map(|f| (f.raw_mrl().to_string(), f))
            .collect();

        for fs_file in &fs_files {
            if inner.stop.load(Ordering::Relaxed) {
                break;
            }
            if !extensions::is_supported(&fs_file.extension()) {
                continue;
            }

            let path = store_path(&fs_file.mrl(), device);

            if let Some(existing) = known.remove(&path) {
                if existing.last_modification_date()
                    == fs_file.last_modification_date()
                {
                    continue;
                }
                debug!("file '{}' changed, refreshing", fs_file.name());
                index.delete_file(existing.id())?;
                if index.files_of_media(existing.media_id())?.is_empty() {
                    index.delete_media(existing.media_id())?;
                }
            }

            match add_file(index, &**fs_file, &path, folder, device) {
                Ok(task) => to_parse.push(task),
                Err(e) => {
                    warn!("failed to add '{}': {}", fs_file.name(), e);
                }
            }
        }

        for (_, file) in known {
            debug!("file '{}' gone, removing", file.raw_mrl());
            index.delete_file(file.id())?;
            if index.files_of_media(file.media_id())?.is_empty() {
                index.delete_media(file.media_id())?;
            }
        }

        t.commit()
    })?;

    for (media_id, file_id, task_mrl) in to_parse {
        inner.parser.add(media_id, file_id, &task_mrl);
    }

    walk_subfolders(inner, index, dir, folder)
}

fn walk_subfolders(
    inner: &DiscovererInner,
    index: &Index,
    dir: &dyn FsDirectory,
    folder: &Arc<Folder>,
) -> Result<()> {
    let fs_dirs = dir.dirs()?;
    let mut seen = HashSet::new();

    for sub_dir in &fs_dirs {
        if inner.stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        let sub_device = match resolve_device(index, &**sub_dir)? {
            Some(d) => d,
            // Device is unreachable; leave its rows alone until it returns
            None => continue,
        };
        let sub_path = store_path(&sub_dir.mrl(), &sub_device);

        let sub_folder = match index.folder_by_path(&sub_path, sub_device.row.id())? {
            Some(f) if f.is_blacklisted() => {
                debug!("skipping banned folder '{}'", sub_dir.mrl());
                continue;
            }
            Some(f) => f,
            None => index.create_folder(
                &sub_path,
                Some(folder.id()),
                sub_device.row.id(),
                sub_device.removable,
            )?,
        };
        seen.insert(sub_folder.id());

        if let Err(e) = walk(inner, index, &**sub_dir, &sub_folder, &sub_device) {
            warn!("failed to walk '{}': {}", sub_dir.mrl(), e);
        }
    }

    // Folders gone from the filesystem; absent-device folders are excluded
    // by the presence filter and survive untouched
    for db_folder in index.subfolders(folder.id())? {
        if seen.contains(&db_folder.id()) {
            continue;
        }
        debug!("folder '{}' gone, removing", db_folder.path());
        index.delete_folder(db_folder.id())?;
    }
    index.delete_fileless_media()?;

    Ok(())
}

type ParseTask = (i64, i64, String);

fn add_file(
    index: &Index,
    fs_file: &dyn FsFile,
    path: &str,
    folder: &Arc<Folder>,
    device: &DeviceCtx,
) -> Result<ParseTask> {
    let name = fs_file.name();
    let media_type = extensions::media_type_for(&fs_file.extension());

    let media = index.create_media(media_type, Some(&name), Some(&name))?;
    let file = index.create_file(
        media.id(),
        path,
        FileType::Main,
        Some(folder.id()),
        fs_file.last_modification_date(),
        fs_file.size() as i64,
        device.removable,
        false,
    )?;

    info!("adding '{}'", name);

    Ok((media.id(), file.id(), fs_file.mrl()))
}

fn ban(inner: &DiscovererInner, index: &Index, entry_point: &str) -> Result<()> {
    info!("banning '{}'", entry_point);

    let factory = factory_for(&inner.factories, entry_point)?;
    let dir = factory.create_directory(entry_point)?;
    let device = resolve_device(index, &*dir)?
        .ok_or_else(|| Error::DeviceAbsent(entry_point.to_string()))?;
    let path = store_path(&dir.mrl(), &device);

    with_retries(LOCK_RETRIES, || {
        let t = index.begin()?;

        if let Some(existing) = index.folder_by_path(&path, device.row.id())? {
            if existing.is_blacklisted() {
                return t.commit();
            }
            index.delete_folder(existing.id())?;
            index.delete_fileless_media()?;
        }
        index.create_blacklisted_folder(&path, device.row.id(), device.removable)?;

        t.commit()
    })
}

fn unban(inner: &DiscovererInner, index: &Index, entry_point: &str) -> Result<()> {
    info!("unbanning '{}'", entry_point);

    let factory = factory_for(&inner.factories, entry_point)?;
    let dir = factory.create_directory(entry_point)?;
    let device = resolve_device(index, &*dir)?
        .ok_or_else(|| Error::DeviceAbsent(entry_point.to_string()))?;
    let path = store_path(&dir.mrl(), &device);

    match index.folder_by_path(&path, device.row.id())? {
        Some(folder) if folder.is_blacklisted() => {
            index.delete_folder(folder.id())?;
            Ok(())
        }
        _ => {
            warn!("'{}' was not banned", entry_point);
            Ok(())
        }
    }
}

fn remove_entry_point(
    inner: &DiscovererInner,
    index: &Index,
    entry_point: &str,
) -> Result<()> {
    info!("removing entry point '{}'", entry_point);

    for root in index.root_folders()? {
        let root_mrl = index.folder_mrl(&root, &inner.factories)?;
        if root_mrl == entry_point {
            index.delete_folder(root.id())?;
            index.delete_fileless_media()?;
            return Ok(());
        }
    }

    warn!("'{}' is not a known entry point", entry_point);
    Ok(())
}

// The lister only matters on startup: every device it reports present gets
// its row flagged back present before the first reload.
pub(crate) fn seed_devices(
    index: &Index,
    lister: &Arc<dyn DeviceLister>,
) -> Result<()> {
    for info in lister.devices() {
        if let Some(device) = index.device_by_uuid(&info.uuid)? {
            if !device.is_present() {
                index.set_device_present(&device, true)?;
            }
        }
    }
    Ok(())
}
