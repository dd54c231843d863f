use log::{debug, trace};
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

/// A free-form tag attached to media.
#[derive(Debug, Clone)]
pub struct Label {
    pub label_id: i64,
    pub name: String,
}

fn _get_label(row: &Row) -> rusqlite::Result<Label> {
    Ok(Label {
        label_id: row.get(0)?,
        name: row.get(1)?,
    })
}

impl Index {
    pub fn label_by_name(&self, name: &str) -> Result<Option<Label>> {
        trace!("get label name='{}'", name);

        let mut st = self
            .connection()
            .prepare_cached("SELECT label_id, name FROM Label WHERE name = ?")?;

        let mut rows = st.query([name])?;

        match rows.next()? {
            Some(row) => Ok(Some(_get_label(row)?)),
            None => Ok(None),
        }
    }

    pub fn create_label(&self, name: &str) -> Result<Label> {
        let t = self.begin()?;

        self.connection()
            .prepare_cached("INSERT INTO Label (name) VALUES (?)")?
            .execute([name])?;

        let label_id = self.connection().last_insert_rowid();
        t.commit()?;

        let result = Label {
            label_id,
            name: name.to_string(),
        };

        debug!("create {:?}", result);

        Ok(result)
    }

    pub fn delete_label(&self, label_id: i64) -> Result<bool> {
        trace!("delete label label_id={}", label_id);

        let t = self.begin()?;
        let deleted = self
            .connection()
            .prepare_cached("DELETE FROM Label WHERE label_id = ?")?
            .execute([label_id])?;
        t.commit()?;
        Ok(deleted > 0)
    }

    pub fn attach_label(&self, label_id: i64, media_id: i64) -> Result<()> {
        trace!("attach label label_id={} media_id={}", label_id, media_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "INSERT OR IGNORE INTO LabelRelation (label_id, media_id)
                VALUES (?, ?)",
            )?
            .execute(params![label_id, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn detach_label(&self, label_id: i64, media_id: i64) -> Result<()> {
        trace!("detach label label_id={} media_id={}", label_id, media_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "DELETE FROM LabelRelation WHERE label_id = ? AND media_id = ?",
            )?
            .execute(params![label_id, media_id])?;
        t.commit()?;
        Ok(())
    }

    pub fn labels_of_media(&self, media_id: i64) -> Result<Vec<Label>> {
        trace!("list labels by media_id={}", media_id);

        let mut st = self.connection().prepare_cached(
            "SELECT lab.label_id, lab.name FROM Label lab
            INNER JOIN LabelRelation rel ON rel.label_id = lab.label_id
            WHERE rel.media_id = ? ORDER BY lab.name",
        )?;

        let mut rows = st.query([media_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            result.push(_get_label(row)?);
        }

        Ok(result)
    }
}
