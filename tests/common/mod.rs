#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use medialib::fs::{
    DeviceInfo, DeviceLister, FsDevice, FsDirectory, FsFactory, FsFile,
};
use medialib::{MediaLibrary, MediaLibraryCb, ParserService, Result};

pub const ROOT: &str = "file:///a/";
pub const SUBFOLDER: &str = "file:///a/folder/";
pub const ROOT_DEVICE: &str = "root-device";
pub const REMOVABLE_DEVICE: &str = "removable-device";

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MockDevice {
    uuid: String,
    mountpoint: String,
    removable: bool,
    present: Mutex<bool>,
}

impl MockDevice {
    pub fn set_present(&self, present: bool) {
        *self.present.lock().unwrap() = present;
    }
}

impl FsDevice for MockDevice {
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    fn scheme(&self) -> String {
        "file://".to_string()
    }

    fn mountpoint(&self) -> String {
        self.mountpoint.clone()
    }

    fn is_removable(&self) -> bool {
        self.removable
    }

    fn is_present(&self) -> bool {
        *self.present.lock().unwrap()
    }

    fn refresh(&self) {}
}

#[derive(Clone)]
struct MockFileData {
    name: String,
    mtime: i64,
    size: u64,
}

#[derive(Default)]
struct MockDirData {
    files: Vec<MockFileData>,
    dirs: Vec<String>,
}

/// In-memory filesystem shaped like the scenarios expect: a fixed root
/// with three files and a removable subfolder with one.
pub struct MockFs {
    dirs: Mutex<HashMap<String, MockDirData>>,
    devices: Mutex<Vec<Arc<MockDevice>>>,
}

impl MockFs {
    pub fn empty() -> Arc<MockFs> {
        Arc::new(MockFs {
            dirs: Mutex::new(HashMap::new()),
            devices: Mutex::new(Vec::new()),
        })
    }

    pub fn standard() -> Arc<MockFs> {
        let fs = Self::empty();
        fs.add_device(ROOT_DEVICE, "file:///", false);
        fs.add_device(REMOVABLE_DEVICE, SUBFOLDER, true);
        fs.add_dir(ROOT);
        fs.add_subdir(ROOT, SUBFOLDER);
        fs.add_file(ROOT, "video.avi");
        fs.add_file(ROOT, "audio.mp3");
        fs.add_file(ROOT, "not_a_media.something");
        fs.add_file(SUBFOLDER, "subfile.mp4");
        fs
    }

    pub fn add_device(
        &self,
        uuid: &str,
        mountpoint: &str,
        removable: bool,
    ) -> Arc<MockDevice> {
        let device = Arc::new(MockDevice {
            uuid: uuid.to_string(),
            mountpoint: mountpoint.to_string(),
            removable,
            present: Mutex::new(true),
        });
        self.devices.lock().unwrap().push(device.clone());
        device
    }

    pub fn device(&self, uuid: &str) -> Arc<MockDevice> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.uuid == uuid)
            .cloned()
            .expect("unknown mock device")
    }

    pub fn add_dir(&self, mrl: &str) {
        self.dirs
            .lock()
            .unwrap()
            .entry(mrl.to_string())
            .or_default();
    }

    pub fn add_subdir(&self, parent: &str, mrl: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        dirs.entry(mrl.to_string()).or_default();
        let parent = dirs.entry(parent.to_string()).or_default();
        if !parent.dirs.iter().any(|d| d == mrl) {
            parent.dirs.push(mrl.to_string());
        }
    }

    pub fn add_file(&self, dir: &str, name: &str) {
        self.add_file_with_mtime(dir, name, 1000);
    }

    pub fn add_file_with_mtime(&self, dir: &str, name: &str, mtime: i64) {
        let mut dirs = self.dirs.lock().unwrap();
        let dir = dirs.entry(dir.to_string()).or_default();
        dir.files.retain(|f| f.name != name);
        dir.files.push(MockFileData {
            name: name.to_string(),
            mtime,
            size: 4096,
        });
    }

    pub fn remove_file(&self, dir: &str, name: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        if let Some(dir) = dirs.get_mut(dir) {
            dir.files.retain(|f| f.name != name);
        }
    }

    fn device_for_mrl(&self, mrl: &str) -> Option<Arc<MockDevice>> {
        let devices = self.devices.lock().unwrap();
        devices
            .iter()
            .filter(|d| mrl.starts_with(&d.mountpoint))
            .max_by_key(|d| d.mountpoint.len())
            .cloned()
    }
}

struct MockFile {
    mrl: String,
    data: MockFileData,
}

impl FsFile for MockFile {
    fn mrl(&self) -> String {
        self.mrl.clone()
    }

    fn name(&self) -> String {
        self.data.name.clone()
    }

    fn extension(&self) -> String {
        match self.data.name.rfind('.') {
            Some(pos) => self.data.name[pos + 1..].to_string(),
            None => String::new(),
        }
    }

    fn size(&self) -> u64 {
        self.data.size
    }

    fn last_modification_date(&self) -> i64 {
        self.data.mtime
    }
}

struct MockDirectory {
    mrl: String,
    fs: Arc<MockFs>,
}

impl FsDirectory for MockDirectory {
    fn mrl(&self) -> String {
        self.mrl.clone()
    }

    fn files(&self) -> Result<Vec<Box<dyn FsFile>>> {
        let dirs = self.fs.dirs.lock().unwrap();
        let data = dirs
            .get(&self.mrl)
            .ok_or_else(|| not_found(&self.mrl))?;
        Ok(data
            .files
            .iter()
            .map(|f| {
                Box::new(MockFile {
                    mrl: format!("{}{}", self.mrl, f.name),
                    data: f.clone(),
                }) as Box<dyn FsFile>
            })
            .collect())
    }

    fn dirs(&self) -> Result<Vec<Box<dyn FsDirectory>>> {
        let dirs = self.fs.dirs.lock().unwrap();
        let data = dirs
            .get(&self.mrl)
            .ok_or_else(|| not_found(&self.mrl))?;
        Ok(data
            .dirs
            .iter()
            .map(|mrl| {
                Box::new(MockDirectory {
                    mrl: mrl.clone(),
                    fs: self.fs.clone(),
                }) as Box<dyn FsDirectory>
            })
            .collect())
    }

    fn device(&self) -> Option<Arc<dyn FsDevice>> {
        self.fs
            .device_for_mrl(&self.mrl)
            .map(|d| d as Arc<dyn FsDevice>)
    }
}

fn not_found(mrl: &str) -> medialib::Error {
    medialib::Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no such mock directory '{}'", mrl),
    ))
}

pub struct MockFsFactory {
    fs: Arc<MockFs>,
}

impl MockFsFactory {
    pub fn new(fs: Arc<MockFs>) -> Arc<MockFsFactory> {
        Arc::new(MockFsFactory { fs })
    }
}

impl FsFactory for MockFsFactory {
    fn supports(&self, scheme: &str) -> bool {
        scheme == "file://"
    }

    fn is_network(&self) -> bool {
        false
    }

    fn create_directory(&self, mrl: &str) -> Result<Box<dyn FsDirectory>> {
        let mut mrl = mrl.to_string();
        if !mrl.ends_with('/') {
            mrl.push('/');
        }
        if !self.fs.dirs.lock().unwrap().contains_key(&mrl) {
            return Err(not_found(&mrl));
        }
        Ok(Box::new(MockDirectory {
            mrl,
            fs: self.fs.clone(),
        }))
    }

    fn create_file(&self, mrl: &str) -> Result<Box<dyn FsFile>> {
        let (dir, name) = match mrl.rfind('/') {
            Some(pos) => (&mrl[..=pos], &mrl[pos + 1..]),
            None => return Err(not_found(mrl)),
        };
        let dirs = self.fs.dirs.lock().unwrap();
        let data = dirs.get(dir).ok_or_else(|| not_found(dir))?;
        let file = data
            .files
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| not_found(mrl))?;
        Ok(Box::new(MockFile {
            mrl: mrl.to_string(),
            data: file.clone(),
        }))
    }

    fn create_device(&self, uuid: &str) -> Option<Arc<dyn FsDevice>> {
        self.fs
            .devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.uuid == uuid)
            .map(|d| d.clone() as Arc<dyn FsDevice>)
    }

    fn create_device_for_mrl(&self, mrl: &str) -> Option<Arc<dyn FsDevice>> {
        self.fs.device_for_mrl(mrl).map(|d| d as Arc<dyn FsDevice>)
    }

    fn refresh_devices(&self) {}
}

pub struct MockDeviceLister;

impl DeviceLister for MockDeviceLister {
    fn devices(&self) -> Vec<DeviceInfo> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct CbState {
    pub discoveries_completed: u32,
    pub reloads_completed: u32,
    pub media_added: Vec<i64>,
    pub media_removed: Vec<i64>,
    pub entry_points_banned: u32,
    pub entry_points_unbanned: u32,
    pub entry_points_removed: u32,
}

/// Counts callbacks and lets tests block on them, like the original
/// discovery-completion latches.
#[derive(Default)]
pub struct TestCb {
    state: Mutex<CbState>,
    cond: Condvar,
}

impl TestCb {
    fn update(&self, f: impl FnOnce(&mut CbState)) {
        let mut state = self.state.lock().unwrap();
        f(&mut state);
        self.cond.notify_all();
    }

    fn wait_until(&self, pred: impl Fn(&CbState) -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        let mut state = self.state.lock().unwrap();
        while !pred(&state) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
        true
    }

    pub fn wait_discovery(&self, count: u32) -> bool {
        self.wait_until(|s| s.discoveries_completed >= count)
    }

    pub fn wait_reload(&self, count: u32) -> bool {
        self.wait_until(|s| s.reloads_completed >= count)
    }

    pub fn wait_media_added(&self, count: usize) -> bool {
        self.wait_until(|s| s.media_added.len() >= count)
    }

    pub fn wait_media_removed(&self, count: usize) -> bool {
        self.wait_until(|s| s.media_removed.len() >= count)
    }

    pub fn wait_banned(&self, count: u32) -> bool {
        self.wait_until(|s| s.entry_points_banned >= count)
    }

    pub fn wait_unbanned(&self, count: u32) -> bool {
        self.wait_until(|s| s.entry_points_unbanned >= count)
    }

    pub fn wait_removed_entry_point(&self, count: u32) -> bool {
        self.wait_until(|s| s.entry_points_removed >= count)
    }

    pub fn media_added(&self) -> Vec<i64> {
        self.state.lock().unwrap().media_added.clone()
    }

    pub fn media_removed(&self) -> Vec<i64> {
        self.state.lock().unwrap().media_removed.clone()
    }
}

impl MediaLibraryCb for TestCb {
    fn on_media_added(&self, media: Vec<Arc<medialib::Media>>) {
        self.update(|s| s.media_added.extend(media.iter().map(|m| m.id())));
    }

    fn on_media_removed(&self, media_ids: Vec<i64>) {
        self.update(|s| s.media_removed.extend(media_ids));
    }

    fn on_discovery_completed(&self, _entry_point: &str, _success: bool) {
        self.update(|s| s.discoveries_completed += 1);
    }

    fn on_reload_completed(&self, _entry_point: Option<&str>, _success: bool) {
        self.update(|s| s.reloads_completed += 1);
    }

    fn on_entry_point_banned(&self, _entry_point: &str, _success: bool) {
        self.update(|s| s.entry_points_banned += 1);
    }

    fn on_entry_point_unbanned(&self, _entry_point: &str, _success: bool) {
        self.update(|s| s.entry_points_unbanned += 1);
    }

    fn on_entry_point_removed(&self, _entry_point: &str, _success: bool) {
        self.update(|s| s.entry_points_removed += 1);
    }
}

pub struct TestLib {
    pub ml: MediaLibrary,
    pub cb: Arc<TestCb>,
    pub fs: Arc<MockFs>,
    pub dir: tempfile::TempDir,
}

pub fn setup(fs: Arc<MockFs>) -> TestLib {
    setup_with_services(fs, Vec::new())
}

pub fn setup_with_services(
    fs: Arc<MockFs>,
    services: Vec<Box<dyn ParserService>>,
) -> TestLib {
    let dir = tempfile::tempdir().unwrap();
    open(dir, fs, services)
}

/// Closes the library and reopens a fresh handle on the same database.
pub fn reopen(lib: TestLib) -> TestLib {
    lib.ml.stop();
    let TestLib { fs, dir, .. } = lib;
    open(dir, fs, Vec::new())
}

fn open(
    dir: tempfile::TempDir,
    fs: Arc<MockFs>,
    services: Vec<Box<dyn ParserService>>,
) -> TestLib {
    let ml = MediaLibrary::new();
    ml.set_fs_factory(MockFsFactory::new(fs.clone()));
    ml.set_device_lister(Arc::new(MockDeviceLister));
    for service in services {
        ml.add_parser_service(service);
    }

    let cb = Arc::new(TestCb::default());
    ml.initialize(
        &dir.path().join("test.db"),
        &dir.path().join("thumbnails"),
        cb.clone(),
    )
    .unwrap();
    ml.start().unwrap();

    TestLib { ml, cb, fs, dir }
}

/// Polls a query until it yields a value; background workers make most
/// assertions eventually-consistent.
pub fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        if let Some(value) = f() {
            return value;
        }
        if Instant::now() >= deadline {
            panic!("condition not reached within {:?}", WAIT_TIMEOUT);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

pub fn wait_for_file_count(lib: &TestLib, count: usize) -> Vec<Arc<medialib::File>> {
    wait_for(|| {
        let files = lib.ml.files().unwrap();
        (files.len() == count).then_some(files)
    })
}
