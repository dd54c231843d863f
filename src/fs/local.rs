use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use log::{trace, warn};

use super::{DeviceInfo, DeviceLister, FsDevice, FsDirectory, FsFactory, FsFile};
use super::mrl;
use crate::{Error, Result};

/// Mount table entries we never want to treat as media storage.
const SKIPPED_FS_TYPES: &[&str] = &[
    "autofs", "binfmt_misc", "cgroup", "cgroup2", "configfs", "debugfs",
    "devpts", "devtmpfs", "efivarfs", "fusectl", "hugetlbfs", "mqueue",
    "overlay", "proc", "pstore", "securityfs", "squashfs", "sysfs", "tmpfs",
    "tracefs",
];

#[derive(Debug, Clone)]
struct Mountpoint {
    source: String,
    target: String,
}

fn list_mountpoints() -> Vec<Mountpoint> {
    let content = match fs::read_to_string("/proc/self/mounts") {
        Ok(c) => c,
        Err(e) => {
            warn!("can't read mount table: {}", e);
            return Vec::new();
        }
    };

    let mut res = Vec::new();
    for line in content.lines() {
        let mut cols = line.split_whitespace();
        let (source, target, fs_type) =
            match (cols.next(), cols.next(), cols.next()) {
                (Some(s), Some(t), Some(f)) => (s, t, f),
                _ => continue,
            };
        if SKIPPED_FS_TYPES.contains(&fs_type) {
            continue;
        }
        res.push(Mountpoint {
            source: source.to_string(),
            target: target.to_string(),
        });
    }
    // Longest target first, so prefix matching picks the innermost mount
    res.sort_by(|a, b| b.target.len().cmp(&a.target.len()));
    res
}

pub struct LocalDevice {
    uuid: String,
    mountpoint_path: String,
}

impl FsDevice for LocalDevice {
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    fn scheme(&self) -> String {
        "file://".to_string()
    }

    fn mountpoint(&self) -> String {
        let mut mountpoint = mrl::from_local_path(&self.mountpoint_path);
        if !mountpoint.ends_with('/') {
            mountpoint.push('/');
        }
        mountpoint
    }

    fn is_removable(&self) -> bool {
        // Without platform storage events every local mount is treated as
        // fixed; a host-provided lister refines this.
        false
    }

    fn is_present(&self) -> bool {
        true
    }

    fn refresh(&self) {}
}

pub struct LocalFile {
    mrl: String,
    name: String,
    extension: String,
    size: u64,
    last_modification_date: i64,
}

impl LocalFile {
    fn from_path(path: &Path) -> Result<LocalFile> {
        let meta = fs::metadata(path)?;
        let modified = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let path_str = path.to_string_lossy();
        let mrl = mrl::from_local_path(&path_str);
        Ok(LocalFile {
            name: mrl::file_name(&path_str).to_string(),
            extension: mrl::extension(&path_str).to_string(),
            mrl,
            size: meta.len(),
            last_modification_date: modified,
        })
    }
}

impl FsFile for LocalFile {
    fn mrl(&self) -> String {
        self.mrl.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn extension(&self) -> String {
        self.extension.clone()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn last_modification_date(&self) -> i64 {
        self.last_modification_date
    }
}

pub struct LocalDirectory {
    path: PathBuf,
    factory_devices: Arc<Mutex<Vec<Arc<LocalDevice>>>>,
}

impl LocalDirectory {
    fn read(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
        Ok((files, dirs))
    }
}

impl FsDirectory for LocalDirectory {
    fn mrl(&self) -> String {
        let mut mrl = mrl::from_local_path(&self.path.to_string_lossy());
        if !mrl.ends_with('/') {
            mrl.push('/');
        }
        mrl
    }

    fn files(&self) -> Result<Vec<Box<dyn FsFile>>> {
        let (files, _) = self.read()?;
        let mut res: Vec<Box<dyn FsFile>> = Vec::with_capacity(files.len());
        for path in files {
            match LocalFile::from_path(&path) {
                Ok(f) => res.push(Box::new(f)),
                Err(e) => {
                    warn!("skipping unreadable file '{}': {}", path.to_string_lossy(), e)
                }
            }
        }
        Ok(res)
    }

    fn dirs(&self) -> Result<Vec<Box<dyn FsDirectory>>> {
        let (_, dirs) = self.read()?;
        Ok(dirs
            .into_iter()
            .map(|path| {
                Box::new(LocalDirectory {
                    path,
                    factory_devices: self.factory_devices.clone(),
                }) as Box<dyn FsDirectory>
            })
            .collect())
    }

    fn device(&self) -> Option<Arc<dyn FsDevice>> {
        let path = self.path.to_string_lossy();
        device_for_path(&self.factory_devices.lock().unwrap(), &path)
    }
}

fn device_for_path(
    devices: &[Arc<LocalDevice>],
    path: &str,
) -> Option<Arc<dyn FsDevice>> {
    devices
        .iter()
        .find(|d| path.starts_with(&d.mountpoint_path))
        .map(|d| d.clone() as Arc<dyn FsDevice>)
}

/// Local (`file://`) filesystem backend built on std::fs and the mount
/// table.
pub struct LocalFsFactory {
    devices: Arc<Mutex<Vec<Arc<LocalDevice>>>>,
}

impl LocalFsFactory {
    pub fn new() -> LocalFsFactory {
        LocalFsFactory {
            devices: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for LocalFsFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FsFactory for LocalFsFactory {
    fn supports(&self, scheme: &str) -> bool {
        scheme == "file://"
    }

    fn is_network(&self) -> bool {
        false
    }

    fn create_directory(&self, mrl: &str) -> Result<Box<dyn FsDirectory>> {
        let path = PathBuf::from(mrl::to_local_path(mrl));
        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("'{}' is not a directory", path.to_string_lossy()),
            )));
        }
        Ok(Box::new(LocalDirectory {
            path,
            factory_devices: self.devices.clone(),
        }))
    }

    fn create_file(&self, mrl: &str) -> Result<Box<dyn FsFile>> {
        let path = PathBuf::from(mrl::to_local_path(mrl));
        Ok(Box::new(LocalFile::from_path(&path)?))
    }

    fn create_device(&self, uuid: &str) -> Option<Arc<dyn FsDevice>> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.uuid == uuid)
            .map(|d| d.clone() as Arc<dyn FsDevice>)
    }

    fn create_device_for_mrl(&self, mrl: &str) -> Option<Arc<dyn FsDevice>> {
        let path = mrl::to_local_path(mrl);
        device_for_path(&self.devices.lock().unwrap(), &path)
    }

    fn refresh_devices(&self) {
        let mounts = list_mountpoints();
        trace!("refreshing devices, {} mountpoints", mounts.len());
        let mut devices = self.devices.lock().unwrap();
        devices.clear();
        for m in mounts {
            devices.push(Arc::new(LocalDevice {
                uuid: m.source,
                mountpoint_path: m.target,
            }));
        }
    }
}

/// Default device lister backed by the same mount table.
pub struct LocalDeviceLister;

impl DeviceLister for LocalDeviceLister {
    fn devices(&self) -> Vec<DeviceInfo> {
        list_mountpoints()
            .into_iter()
            .map(|m| {
                let mut mountpoint = mrl::from_local_path(&m.target);
                if !mountpoint.ends_with('/') {
                    mountpoint.push('/');
                }
                DeviceInfo {
                    uuid: m.source,
                    mountpoint,
                    is_removable: false,
                }
            })
            .collect()
    }
}
