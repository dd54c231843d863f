use std::sync::{Arc, Mutex};

use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

/// A storage device, identified by its UUID for the whole lifetime of the
/// database. Rows are never deleted; absence is tracked through
/// `is_present` so removable media keep their catalog identity across
/// unplug/replug cycles.
#[derive(Debug)]
pub struct Device {
    id: i64,
    uuid: String,
    scheme: String,
    is_removable: bool,
    state: Mutex<DeviceState>,
}

#[derive(Debug, Clone)]
pub(crate) struct DeviceState {
    pub is_present: bool,
}

impl Device {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_removable(&self) -> bool {
        self.is_removable
    }

    pub fn is_present(&self) -> bool {
        self.state.lock().unwrap().is_present
    }

    pub(crate) fn replace_state(&self, state: DeviceState) {
        *self.state.lock().unwrap() = state;
    }
}

fn _get_device(row: &Row) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        uuid: row.get(1)?,
        scheme: row.get(2)?,
        is_removable: row.get(3)?,
        state: Mutex::new(DeviceState {
            is_present: row.get(4)?,
        }),
    })
}

const DEVICE_COLS: &str = "device_id, uuid, scheme, is_removable, is_present";

impl Index {
    pub fn device(&self, device_id: i64) -> Result<Option<Arc<Device>>> {
        trace!("get device device_id={}", device_id);

        self.caches()
            .device
            .fetch(device_id, || self.load_device(device_id))
    }

    fn load_device(&self, device_id: i64) -> Result<Option<Device>> {
        let mut st = self.connection().prepare_cached(&format!(
            "SELECT {} FROM Device WHERE device_id = ?",
            DEVICE_COLS
        ))?;

        let mut rows = st.query([device_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_device(row)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn load_device_state(
        &self,
        device_id: i64,
    ) -> Result<Option<DeviceState>> {
        let mut st = self
            .connection()
            .prepare_cached("SELECT is_present FROM Device WHERE device_id = ?")?;

        let mut rows = st.query([device_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(DeviceState {
                is_present: row.get(0)?,
            })),
            None => Ok(None),
        }
    }

    pub fn device_by_uuid(&self, uuid: &str) -> Result<Option<Arc<Device>>> {
        trace!("get device uuid='{}'", uuid);

        let mut st = self
            .connection()
            .prepare_cached("SELECT device_id FROM Device WHERE uuid = ?")?;

        let mut rows = st.query([uuid])?;

        match rows.next()? {
            Some(row) => self.device(row.get(0)?),
            None => Ok(None),
        }
    }

    pub fn create_device(
        &self,
        uuid: &str,
        scheme: &str,
        is_removable: bool,
    ) -> Result<Arc<Device>> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached(
                "INSERT INTO Device (uuid, scheme, is_removable) VALUES (?, ?, ?)",
            )?
            .execute(params![uuid, scheme, is_removable])?;

        let device_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = self.device(device_id)?.unwrap();

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn set_device_present(&self, device: &Device, present: bool) -> Result<()> {
        trace!(
            "set device device_id={} present={}",
            device.id(),
            present
        );

        let t = self.begin()?;
        self.connection()
            .prepare_cached("UPDATE Device SET is_present = ? WHERE device_id = ?")?
            .execute(params![present, device.id()])?;
        t.commit()?;
        Ok(())
    }

    pub fn devices(&self) -> Result<Vec<Arc<Device>>> {
        trace!("list devices");

        let mut st = self
            .connection()
            .prepare_cached(&format!("SELECT {} FROM Device", DEVICE_COLS))?;

        let mut rows = st.query([])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let device = _get_device(row)?;
            let id = device.id;
            result.push(self.caches().device.resolve(id, || device));
        }

        Ok(result)
    }
}
