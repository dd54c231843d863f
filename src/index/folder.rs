use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::fs::FsFactory;
use crate::Result;

/// A directory known to the library. `path` is the full MRL for folders on
/// fixed storage and a mountpoint-relative path on removable devices, so a
/// replugged device can be mounted anywhere without invalidating its rows.
#[derive(Debug)]
pub struct Folder {
    id: i64,
    path: String,
    parent_id: Option<i64>,
    device_id: i64,
    is_removable: bool,
    state: Mutex<FolderState>,
}

#[derive(Debug, Clone)]
pub(crate) struct FolderState {
    pub is_blacklisted: bool,
    pub is_present: bool,
}

impl Folder {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The stored path; see `Index::folder_mrl` for the resolved MRL.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    pub fn is_removable(&self) -> bool {
        self.is_removable
    }

    pub fn is_root_folder(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_blacklisted(&self) -> bool {
        self.state.lock().unwrap().is_blacklisted
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: FolderState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_folder(row: &Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        path: row.get(1)?,
        parent_id: row.get(2)?,
        device_id: row.get(3)?,
        is_removable: row.get(5)?,
        state: Mutex::new(FolderState {
            is_blacklisted: row.get(4)?,
            is_present: row.get(6)?,
        }),
    })
}

const FOLDER_COLS: &str =
    "folder_id, path, parent_id, device_id, is_blacklisted, is_removable, is_present";

impl Index {
    pub fn folder(&self, folder_id: i64) -> Result<Option<Arc<Folder>>> {
        trace!("get folder folder_id={}", folder_id);

        self.caches()
            .folder
            .fetch(folder_id, || self.load_folder(folder_id))
    }

    fn load_folder(&self, folder_id: i64) -> Result<Option<Folder>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Folder WHERE folder_id = ?",
            FOLDER_COLS
        ))?;

        let mut rows = st.query([folder_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_folder(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_folder_state(
        &self,
        folder_id: i64,
    ) -> Result<Option<FolderState>> {
        let mut st = self.connection().prepare_cached(
            "SELECT is_blacklisted, is_present FROM Folder WHERE folder_id = ?",
        )?;

        let mut rows = st.query([folder_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(FolderState {
                is_blacklisted: row.get(0)?,
                is_present: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    /// Looks a folder up by its stored `(path, device)` key.
    pub fn folder_by_path(
        &self,
        path: &str,
        device_id: i64,
    ) -> Result<Option<Arc<Folder>>> {
        trace!("get folder path='{}' device_id={}", path, device_id);

        let mut st = self.connection().prepare_cached(
            "SELECT folder_id FROM Folder WHERE path = ? AND device_id = ?",
        )?;

        let mut rows = st.query(params![path, device_id])?;

        match rows.next()? {
            Some(row) => self.folder(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_folder(
        &self,
        path: &str,
        parent_id: Option<i64>,
        device_id: i64,
        is_removable: bool,
    ) -> Result<Arc<Folder>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO Folder (path, parent_id, device_id, is_removable)
                VALUES (?, ?, ?, ?)",
            )?
            .execute(params![path, parent_id, device_id, is_removable])?;

        let folder_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.folder(folder_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    /// Creates a folder row that exists only to be skipped by discovery.
    pub fn create_blacklisted_folder(
        &self,
        path: &str,
        device_id: i64,
        is_removable: bool,
    ) -> Result<Arc<Folder>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO Folder (path, parent_id, is_blacklisted, device_id, is_removable)
                VALUES (?, NULL, 1, ?, ?)",
            )?
            .execute(params![path, device_id, is_removable])?;

        let folder_id = self.connection().last_insert_rowid();
        t.commit()?;

        Ok(self.folder(folder_id)?.unwrap())
    }

    /// Deletes the folder row; files, media-less files and subfolders go
    /// with it through the foreign keys.
    pub fn delete_folder(&self, folder_id: i64) -> Result<bool> {
        trace!("delete folder folder_id={}", folder_id);

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached("DELETE FROM Folder WHERE folder_id = ?")?
            .execute([folder_id])?;
        t.commit()?;
        Ok(deleted > 0)
    }

    pub fn root_folders(&self) -> Result<Vec<Arc<Folder>>> {
        trace!("list root folders");

        self.folder_listing(&format!(
            "SELECT {} FROM Folder
            WHERE parent_id IS NULL AND is_blacklisted = 0 AND is_present = 1",
            FOLDER_COLS
        ))
    }

    pub fn subfolders(&self, parent_id: i64) -> Result<Vec<Arc<Folder>>> {
        trace!("list folders by parent_id={}", parent_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Folder
            WHERE parent_id = ? AND is_blacklisted = 0 AND is_present = 1",
            FOLDER_COLS
        ))?;

        let mut rows = st.query([parent_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let folder = _get_folder(row)?;
            let id = folder.id;
            result.push(self.caches().folder.resolve(id, || folder));
        }

        Ok(result)
    }

    fn folder_listing(&self, sql: &str) -> Result<Vec<Arc<Folder>>> {
        let mut st = self.connection().prepare_cached(sql)?;
        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let folder = _get_folder(row)?;
            let id = folder.id;
            result.push(self.caches().folder.resolve(id, || folder));
        }

        Ok(result)
    }

    /// The device's current mountpoint MRL, or None while it is away.
    pub(crate) fn device_mountpoint(
        &self,
        device_id: i64,
        factories: &[Arc<dyn FsFactory>],
    ) -> Result<Option<String>> {
        let device = match self.device(device_id)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let fs_device = factories
            .iter()
            .find(|f| f.supports(device.scheme()))
            .and_then(|f| f.create_device(device.uuid()));

        match fs_device {
            Some(d) if d.is_present() => Ok(Some(d.mountpoint())),
            _ => Ok(None),
        }
    }

    /// Reconstructs the full MRL. Fixed storage stores it verbatim;
    /// removable folders concatenate the device's current mountpoint, and
    /// yield an empty string while the device is away.
    pub fn folder_mrl(
        &self,
        folder: &Folder,
        factories: &[Arc<dyn FsFactory>],
    ) -> Result<String> {
        if !folder.is_removable() {
            return Ok(folder.path().to_string());
        }

        match self.device_mountpoint(folder.device_id(), factories)? {
            Some(mountpoint) => Ok(format!("{}{}", mountpoint, folder.path())),
            None => Ok(String::new()),
        }
    }
}
