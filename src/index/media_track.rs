use log::trace;
use rusqlite::{params, Row};

use super::Index;
use crate::Result;

/// Stream-level track rows filled in by the probe stage. Plain data, not
/// identity cached.
#[derive(Debug, Clone)]
pub struct VideoTrack {
    pub video_track_id: i64,
    pub codec: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fps: Option<f64>,
    pub media_id: i64,
}

#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub audio_track_id: i64,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,
    pub samplerate: Option<i64>,
    pub nb_channels: Option<i64>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub media_id: i64,
}

fn _get_video_track(row: &Row) -> rusqlite::Result<VideoTrack> {
    Ok(VideoTrack {
        video_track_id: row.get(0)?,
        codec: row.get(1)?,
        width: row.get(2)?,
        height: row.get(3)?,
        fps: row.get(4)?,
        media_id: row.get(5)?,
    })
}

fn _get_audio_track(row: &Row) -> rusqlite::Result<AudioTrack> {
    Ok(AudioTrack {
        audio_track_id: row.get(0)?,
        codec: row.get(1)?,
        bitrate: row.get(2)?,
        samplerate: row.get(3)?,
        nb_channels: row.get(4)?,
        language: row.get(5)?,
        description: row.get(6)?,
        media_id: row.get(7)?,
    })
}

impl Index {
    pub fn add_video_track(
        &self,
        media_id: i64,
        codec: Option<&str>,
        width: Option<i64>,
        height: Option<i64>,
        fps: Option<f64>,
    ) -> Result<()> {
        trace!("add video track media_id={}", media_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "INSERT INTO VideoTrack (codec, width, height, fps, media_id)
                VALUES (?, ?, ?, ?, ?)",
            )?
            .execute(params![codec, width, height, fps, media_id])?;
        t.commit()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_audio_track(
        &self,
        media_id: i64,
        codec: Option<&str>,
        bitrate: Option<i64>,
        samplerate: Option<i64>,
        nb_channels: Option<i64>,
        language: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        trace!("add audio track media_id={}", media_id);

        let t = self.begin()?;
        self.connection()
            .prepare_cached(
                "INSERT INTO AudioTrack
                    (codec, bitrate, samplerate, nb_channels, language, description, media_id)
                VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?
            .execute(params![
                codec,
                bitrate,
                samplerate,
                nb_channels,
                language,
                description,
                media_id,
            ])?;
        t.commit()?;
        Ok(())
    }

    pub fn video_tracks_of_media(&self, media_id: i64) -> Result<Vec<VideoTrack>> {
        trace!("list video tracks by media_id={}", media_id);

        let mut st = self.connection().prepare_cached(
            "SELECT video_track_id, codec, width, height, fps, media_id
            FROM VideoTrack WHERE media_id = ?",
        )?;

        let mut rows = st.query([media_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            result.push(_get_video_track(row)?);
        }

        Ok(result)
    }

    pub fn audio_tracks_of_media(&self, media_id: i64) -> Result<Vec<AudioTrack>> {
        trace!("list audio tracks by media_id={}", media_id);

        let mut st = self.connection().prepare_cached(
            "SELECT audio_track_id, codec, bitrate, samplerate, nb_channels,
                language, description, media_id
            FROM AudioTrack WHERE media_id = ?",
        )?;

        let mut rows = st.query([media_id])?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            result.push(_get_audio_track(row)?);
        }

        Ok(result)
    }
}
