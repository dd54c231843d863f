use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::fs::FsFactory;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Main = 0,
    Part = 1,
    Soundtrack = 2,
    Subtitles = 3,
    Playlist = 4,
}

impl FileType {
    pub fn from_i64(v: i64) -> FileType {
        match v {
            1 => FileType::Part,
            2 => FileType::Soundtrack,
            3 => FileType::Subtitles,
            4 => FileType::Playlist,
            _ => FileType::Main,
        }
    }
}

/// One filesystem file backing a media. Like folders, the stored MRL is
/// mountpoint-relative on removable devices.
#[derive(Debug)]
pub struct File {
    id: i64,
    media_id: i64,
    mrl: String,
    file_type: FileType,
    folder_id: Option<i64>,
    is_removable: bool,
    is_external: bool,
    state: Mutex<FileState>,
}

#[derive(Debug, Clone)]
pub(crate) struct FileState {
    pub last_modification_date: i64,
    pub size: i64,
    pub parser_retries: u32,
    pub is_parsed: bool,
    pub is_present: bool,
}

impl File {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn media_id(&self) -> i64 {
        self.media_id
    }

    /// The stored MRL; see `Index::file_mrl` for the resolved form.
    pub fn raw_mrl(&self) -> &str {
        &self.mrl
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn folder_id(&self) -> Option<i64> {
        self.folder_id
    }

    pub fn is_removable(&self) -> bool {
        self.is_removable
    }

    pub fn is_external(&self) -> bool {
        self.is_external
    }

    pub fn last_modification_date(&self) -> i64 {
        self.state.lock().unwrap().last_modification_date
    }

    pub fn size(&self) -> i64 {
        self.state.lock().unwrap().size
    }

    pub fn parser_retries(&self) -> u32 {
        self.state.lock().unwrap().parser_retries
    }

    pub fn is_parsed(&self) -> bool {
        self.state.lock().unwrap().is_parsed
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: FileState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_file(row: &Row) -> rusqlite::Result<File> {
    let file_type: i64 = row.get(3)?;
    Ok(File {
        id: row.get(0)?,
        media_id: row.get(1)?,
        mrl: row.get(2)?,
        file_type: FileType::from_i64(file_type),
        folder_id: row.get(8)?,
        is_removable: row.get(10)?,
        is_external: row.get(11)?,
        state: Mutex::new(FileState {
            last_modification_date: row.get(4)?,
            size: row.get(5)?,
            parser_retries: row.get(6)?,
            is_parsed: row.get(7)?,
            is_present: row.get(9)?,
        }),
    })
}

const FILE_COLS: &str = "file_id, media_id, mrl, type, last_modification_date, \
    size, parser_retries, is_parsed, folder_id, is_present, is_removable, \
    is_external";

impl Index {
    pub fn file(&self, file_id: i64) -> Result<Option<Arc<File>>> {
        trace!("get file file_id={}", file_id);

        self.caches().file.fetch(file_id, || self.load_file(file_id))
    }

    fn load_file(&self, file_id: i64) -> Result<Option<File>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM File WHERE file_id = ?",
            FILE_COLS
        ))?;

        let mut rows = st.query([file_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_file(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_file_state(&self, file_id: i64) -> Result<Option<FileState>> {
        let mut st = self.connection().prepare_cached(
            "SELECT last_modification_date, size, parser_retries, is_parsed, is_present
            FROM File WHERE file_id = ?",
        )?;

        let mut rows = st.query([file_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(FileState {
                last_modification_date: row.get(0)?,
                size: row.get(1)?,
                parser_retries: row.get(2)?,
                is_parsed: row.get(3)?,
                is_present: row.get(4)?,
            })),
            None => Ok(None),
        }
    }

    /// Lookup for fixed-storage files, which store their full MRL.
    pub fn file_by_mrl_any_folder(&self, mrl: &str) -> Result<Option<Arc<File>>> {
        trace!("get file mrl='{}'", mrl);

        let mut st = self.connection().prepare_cached(
            "SELECT file_id FROM File
            WHERE mrl = ? AND is_removable = 0 AND is_present = 1",
        )?;

        let mut rows = st.query([mrl])?;

        match rows.next()? {
            Some(row) => self.file(row.get(0)?),
            None => Ok(None),
        }
    }

    /// Lookup for removable files by their device-relative path.
    pub fn removable_file_by_path(
        &self,
        path: &str,
        device_id: i64,
    ) -> Result<Option<Arc<File>>> {
        trace!("get removable file path='{}' device_id={}", path, device_id);

        let mut st = self.connection().prepare_cached(
            "SELECT f.file_id FROM File f
            INNER JOIN Folder fo ON fo.folder_id = f.folder_id
            WHERE f.mrl = ? AND fo.device_id = ? AND f.is_present = 1",
        )?;

        let mut rows = st.query(params![path, device_id])?;

        match rows.next()? {
            Some(row) => self.file(row.get(0)?),
            None => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_file(
        &self,
        media_id: i64,
        mrl: &str,
        file_type: FileType,
        folder_id: Option<i64>,
        last_modification_date: i64,
        size: i64,
        is_removable: bool,
        is_external: bool,
    ) -> Result<Arc<File>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO File (media_id, mrl, type, last_modification_date,
                    size, folder_id, is_removable, is_external)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?
            .execute(params![
                media_id,
                mrl,
                file_type as i64,
                last_modification_date,
                size,
                folder_id,
                is_removable,
                is_external,
            ])?;

        let file_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.file(file_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn delete_file(&self, file_id: i64) -> Result<bool> {
        trace!("delete file file_id={}", file_id);

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached("DELETE FROM File WHERE file_id = ?")?
            .execute([file_id])?;
        t.commit()?;
        Ok(deleted > 0)
    }

    pub fn files_of_folder(&self, folder_id: i64) -> Result<Vec<Arc<File>>> {
        trace!("list files by folder_id={}", folder_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM File WHERE folder_id = ?",
            FILE_COLS
        ))?;

        let mut rows = st.query([folder_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let file = _get_file(row)?;
            let id = file.id;
            result.push(self.caches().file.resolve(id, || file));
        }

        Ok(result)
    }

    pub fn files_of_media(&self, media_id: i64) -> Result<Vec<Arc<File>>> {
        trace!("list files by media_id={}", media_id);

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM File WHERE media_id = ?",
            FILE_COLS
        ))?;

        let mut rows = st.query([media_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let file = _get_file(row)?;
            let id = file.id;
            result.push(self.caches().file.resolve(id, || file));
        }

        Ok(result)
    }

    /// All present files, every type included.
    pub fn files(&self) -> Result<Vec<Arc<File>>> {
        trace!("list files");

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM File WHERE is_present = 1",
            FILE_COLS
        ))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let file = _get_file(row)?;
            let id = file.id;
            result.push(self.caches().file.resolve(id, || file));
        }

        Ok(result)
    }

    pub fn set_file_parsed(&self, file: &File, parsed: bool) -> Result<()> {
        trace!("set file file_id={} parsed={}", file.id(), parsed);

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE File SET is_parsed = ? WHERE file_id = ?")?
            .execute(params![parsed, file.id()])?;
        t.commit()?;
        Ok(())
    }

    pub fn increment_parser_retries(&self, file_id: i64) -> Result<()> {
        trace!("increment parser retries file_id={}", file_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "UPDATE File SET parser_retries = parser_retries + 1 WHERE file_id = ?",
            )?
            .execute([file_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn set_parser_retries(&self, file_id: i64, retries: u32) -> Result<()> {
        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE File SET parser_retries = ? WHERE file_id = ?")?
            .execute(params![retries, file_id])?;
        t.commit()?;
        Ok(())
    }

    /// Main files still waiting for a successful parse, used to restore the
    /// parser queue on startup.
    pub fn restorable_files(&self, max_retries: u32) -> Result<Vec<Arc<File>>> {
        trace!("list restorable files");

        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM File
            WHERE is_parsed = 0 AND parser_retries < ? AND type = ?
                AND is_present = 1 AND is_external = 0",
            FILE_COLS
        ))?;

        let mut rows = st.query(params![max_retries, FileType::Main as i64])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let file = _get_file(row)?;
            let id = file.id;
            result.push(self.caches().file.resolve(id, || file));
        }

        Ok(result)
    }

    /// Resets the parser bookkeeping of every non-external main file so the
    /// whole library can be reparsed.
    pub fn reset_parser_state(&self) -> Result<()> {
        trace!("reset parser state");

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "UPDATE File SET parser_retries = 0, is_parsed = 0 WHERE is_external = 0",
            )?
            .execute([])?;
        t.commit()?;
        Ok(())
    }

    /// Like folders, a removable file stores its path relative to the
    /// device root, so the resolved MRL follows the current mountpoint.
    pub fn file_mrl(
        &self,
        file: &File,
        factories: &[Arc<dyn FsFactory>],
    ) -> Result<String> {
        if !file.is_removable() {
            return Ok(file.raw_mrl().to_string());
        }

        let folder = match file.folder_id() {
            Some(id) => self.folder(id)?,
            None => None,
        };
        let folder = match folder {
            Some(f) => f,
            None => return Ok(String::new()),
        };

        match self.device_mountpoint(folder.device_id(), factories)? {
            Some(mountpoint) => Ok(format!("{}{}", mountpoint, file.raw_mrl())),
            None => Ok(String::new()),
        }
    }
}
