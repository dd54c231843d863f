pub mod local;
pub mod mrl;

use std::sync::Arc;

use crate::Result;

/// A filesystem device as seen by a backend. The database never stores a
/// mountpoint; it is re-read through this trait on every access so replugged
/// devices can move around.
pub trait FsDevice: Send + Sync {
    fn uuid(&self) -> String;
    fn scheme(&self) -> String;
    fn mountpoint(&self) -> String;
    fn is_removable(&self) -> bool;
    fn is_present(&self) -> bool;
    /// Re-reads the device state from the backend.
    fn refresh(&self);
}

pub trait FsFile: Send + Sync {
    fn mrl(&self) -> String;
    fn name(&self) -> String;
    fn extension(&self) -> String;
    fn size(&self) -> u64;
    fn last_modification_date(&self) -> i64;
}

pub trait FsDirectory: Send + Sync {
    /// MRL of this directory, always with a trailing slash.
    fn mrl(&self) -> String;
    fn files(&self) -> Result<Vec<Box<dyn FsFile>>>;
    fn dirs(&self) -> Result<Vec<Box<dyn FsDirectory>>>;
    fn device(&self) -> Option<Arc<dyn FsDevice>>;
}

pub trait FsFactory: Send + Sync {
    /// Whether this factory handles the given scheme (`"file://"`, ...).
    fn supports(&self, scheme: &str) -> bool;
    fn is_network(&self) -> bool;
    fn create_directory(&self, mrl: &str) -> Result<Box<dyn FsDirectory>>;
    fn create_file(&self, mrl: &str) -> Result<Box<dyn FsFile>>;
    fn create_device(&self, uuid: &str) -> Option<Arc<dyn FsDevice>>;
    fn create_device_for_mrl(&self, mrl: &str) -> Option<Arc<dyn FsDevice>>;
    /// Called by `MediaLibrary::start` and on explicit device refreshes.
    fn refresh_devices(&self);
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub uuid: String,
    pub mountpoint: String,
    pub is_removable: bool,
}

/// Enumerates the devices currently known to the platform. The default
/// implementation reads the local mount table; hosts embedding the library
/// on platforms with richer storage events provide their own.
pub trait DeviceLister: Send + Sync {
    fn devices(&self) -> Vec<DeviceInfo>;
}
