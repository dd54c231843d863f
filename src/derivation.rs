use std::sync::Arc;

use log::{trace, warn};

use crate::index::album::Album;
use crate::index::artist::{Artist, UNKNOWN_ARTIST_ID, VARIOUS_ARTISTS_ID};
use crate::index::media::{Media, MediaSubtype, MediaType};
use crate::index::Index;
use crate::parser::MediaTags;
use crate::{Error, Result};

/// Applies everything a parse learned about `media`. Must run inside the
/// caller's transaction: one media is one unit of work.
pub(crate) fn apply_tags(
    index: &Index,
    media: &Arc<Media>,
    tags: &MediaTags,
) -> Result<()> {
    trace!("derive media_id={}", media.id());

    if let Some(title) = &tags.title {
        index.set_media_title(media.id(), title)?;
    }
    if let Some(duration) = tags.duration {
        index.set_media_duration(media.id(), duration)?;
    }
    if let Some(thumbnail) = &tags.thumbnail {
        index.set_media_thumbnail(media.id(), thumbnail)?;
    }
    for track in &tags.video_tracks {
        index.add_video_track(
            media.id(),
            track.codec.as_deref(),
            track.width,
            track.height,
            track.fps,
        )?;
    }
    for track in &tags.audio_tracks {
        index.add_audio_track(
            media.id(),
            track.codec.as_deref(),
            track.bitrate,
            track.samplerate,
            track.nb_channels,
            track.language.as_deref(),
            track.description.as_deref(),
        )?;
    }

    match media.media_type() {
        MediaType::Audio => derive_audio(index, media, tags)?,
        MediaType::Video => derive_video(index, media, tags)?,
        // Type was never settled; let the tags decide
        _ => {
            if tags.has_music_tags() {
                index.set_media_type(media.id(), MediaType::Audio)?;
                derive_audio(index, media, tags)?;
            } else if !tags.video_tracks.is_empty() {
                index.set_media_type(media.id(), MediaType::Video)?;
                derive_video(index, media, tags)?;
            }
        }
    }

    Ok(())
}

/// Resolves the album, album artist, track artist and genre for an audio
/// media and records its album track.
fn derive_audio(index: &Index, media: &Arc<Media>, tags: &MediaTags) -> Result<()> {
    if index.album_track_of_media(media.id())?.is_some() {
        trace!("media_id={} already derived", media.id());
        return Ok(());
    }

    let album_artist_tag = non_empty(&tags.album_artist);
    let artist_tag = non_empty(&tags.artist);

    let (album_artist, track_artist) = match (album_artist_tag, artist_tag) {
        (None, None) => {
            let unknown = index
                .artist(UNKNOWN_ARTIST_ID)?
                .ok_or_else(|| Error::ConstraintViolation("missing sentinel artist".into()))?;
            (unknown.clone(), unknown)
        }
        (Some(album_artist), None) => {
            let artist = artist_for_name(index, album_artist)?;
            (artist.clone(), artist)
        }
        (None, Some(artist)) => {
            let artist = artist_for_name(index, artist)?;
            (artist.clone(), artist)
        }
        (Some(album_artist), Some(artist)) if album_artist == artist => {
            let artist = artist_for_name(index, artist)?;
            (artist.clone(), artist)
        }
        (Some(album_artist), Some(artist)) => (
            artist_for_name(index, album_artist)?,
            artist_for_name(index, artist)?,
        ),
    };

    let album = album_for_tags(index, tags, &album_artist)?;

    // An album keeps the first artist it saw; as soon as a track disagrees,
    // VariousArtists takes over while tracks keep their own artist.
    match album.artist_id() {
        None => index.set_album_artist(&album, album_artist.id())?,
        Some(current)
            if current != VARIOUS_ARTISTS_ID
                && (current != album_artist.id()
                    || track_artist.id() != album_artist.id()) =>
        {
            let various = index
                .artist(VARIOUS_ARTISTS_ID)?
                .ok_or_else(|| Error::ConstraintViolation("missing sentinel artist".into()))?;
            index.set_album_artist(&album, various.id())?;
        }
        Some(_) => {}
    }

    let genre = match non_empty(&tags.genre) {
        Some(name) => Some(genre_for_name(index, name)?),
        None => None,
    };

    index.create_album_track(
        media.id(),
        album.id(),
        Some(track_artist.id()),
        genre.as_ref().map(|g| g.id()),
        tags.track_number,
        tags.disc_number,
    )?;
    index.set_media_subtype(media.id(), MediaSubtype::AlbumTrack)?;
    index.add_media_artist(media.id(), track_artist.id())?;

    if let Some(year) = tags.release_year {
        index.set_album_release_year(&album, year, false)?;
        index.set_media_release_date(media.id(), year)?;
    }

    Ok(())
}

/// Videos become a show episode when the extractor identified one, a
/// standalone movie otherwise.
fn derive_video(index: &Index, media: &Arc<Media>, tags: &MediaTags) -> Result<()> {
    if media.subtype() != MediaSubtype::Unknown {
        return Ok(());
    }

    if let Some(show_name) = non_empty(&tags.show_name) {
        let show = match index.show_by_name(show_name)? {
            Some(show) => show,
            None => index.create_show(show_name)?,
        };
        index.create_show_episode(
            media.id(),
            show.id(),
            tags.episode,
            tags.season,
            tags.title.as_deref(),
        )?;
        index.set_media_subtype(media.id(), MediaSubtype::ShowEpisode)?;
        return Ok(());
    }

    let title = tags
        .title
        .clone()
        .or_else(|| media.title())
        .unwrap_or_default();
    index.create_movie(media.id(), &title)?;
    index.set_media_subtype(media.id(), MediaSubtype::Movie)?;

    Ok(())
}

/// Album lookup honoring the VariousArtists promotion: a same-titled album
/// fronted by the expected artist, by VariousArtists, or still unclaimed is
/// a match; anything else gets its own album.
fn album_for_tags(
    index: &Index,
    tags: &MediaTags,
    album_artist: &Arc<Artist>,
) -> Result<Arc<Album>> {
    if let Some(title) = non_empty(&tags.album) {
        if let Some(album) = index.album_by_title(title, None)? {
            let matches = match album.artist_id() {
                None => true,
                Some(id) => id == album_artist.id() || id == VARIOUS_ARTISTS_ID,
            };
            if matches {
                return Ok(album);
            }
        }
        let album = index.create_album(Some(title), Some(album_artist.id()))?;
        index.update_artist_nb_albums(album_artist.id(), 1)?;
        return Ok(album);
    }

    // No album tag: tracks gather on the artist's title-less album
    match index.unknown_album_of_artist(album_artist.id())? {
        Some(album) => Ok(album),
        None => {
            let album = index.create_album(None, Some(album_artist.id()))?;
            index.update_artist_nb_albums(album_artist.id(), 1)?;
            Ok(album)
        }
    }
}

fn artist_for_name(index: &Index, name: &str) -> Result<Arc<Artist>> {
    if let Some(artist) = index.artist_by_name(name)? {
        return Ok(artist);
    }
    match index.create_artist(name) {
        Ok(artist) => Ok(artist),
        Err(e) if e.is_constraint_violation() => {
            // Lost a race against another parser worker
            warn!("artist '{}' already created, fetching", name);
            match index.artist_by_name(name)? {
                Some(artist) => Ok(artist),
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

fn genre_for_name(
    index: &Index,
    name: &str,
) -> Result<Arc<crate::index::genre::Genre>> {
    if let Some(genre) = index.genre_by_name(name)? {
        return Ok(genre);
    }
    match index.create_genre(name) {
        Ok(genre) => Ok(genre),
        Err(e) if e.is_constraint_violation() => {
            warn!("genre '{}' already created, fetching", name);
            match index.genre_by_name(name)? {
                Some(genre) => Ok(genre),
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
