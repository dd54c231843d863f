mod common;

use std::collections::HashMap;

use common::*;
use medialib::fs::mrl;
use medialib::{
    MediaTags, ParserService, ServiceStatus, Task, VARIOUS_ARTISTS_ID,
    UNKNOWN_ARTIST_ID,
};

/// Stands in for the real metadata extractor: hands out canned tags keyed
/// by file name.
struct TagService {
    tags: HashMap<String, MediaTags>,
}

impl TagService {
    fn new(tags: Vec<(&str, MediaTags)>) -> Box<dyn ParserService> {
        Box::new(TagService {
            tags: tags
                .into_iter()
                .map(|(name, tags)| (name.to_string(), tags))
                .collect(),
        })
    }
}

impl ParserService for TagService {
    fn name(&self) -> &str {
        "mock-extractor"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn run(&self, task: &mut Task) -> ServiceStatus {
        let name = mrl::file_name(task.mrl()).to_string();
        if let Some(tags) = self.tags.get(&name) {
            *task.tags_mut() = tags.clone();
        }
        ServiceStatus::Success
    }
}

fn music_fs(names: &[&str]) -> std::sync::Arc<MockFs> {
    let fs = MockFs::empty();
    fs.add_device(ROOT_DEVICE, "file:///", false);
    fs.add_dir(ROOT);
    for name in names {
        fs.add_file(ROOT, name);
    }
    fs
}

fn tags(
    album: Option<&str>,
    album_artist: Option<&str>,
    artist: Option<&str>,
    track: Option<i64>,
) -> MediaTags {
    MediaTags {
        album: album.map(str::to_string),
        album_artist: album_artist.map(str::to_string),
        artist: artist.map(str::to_string),
        track_number: track,
        ..Default::default()
    }
}

#[test]
fn album_artist_promoted_to_various_artists() {
    let fs = music_fs(&["one.mp3", "two.mp3"]);
    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![
            ("one.mp3", tags(Some("X"), Some("A"), Some("A"), Some(1))),
            ("two.mp3", tags(Some("X"), Some("A"), Some("B"), Some(2))),
        ])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let album = wait_for(|| {
        let albums = lib
            .ml
            .albums(medialib::SortingCriteria::Default, false)
            .unwrap();
        let album = albums.into_iter().next()?;
        (album.nb_tracks() == 2).then_some(album)
    });

    assert_eq!(Some("X".to_string()), album.title());
    assert_eq!(Some(VARIOUS_ARTISTS_ID), album.artist_id());

    // Tracks keep their own artist
    let artists = lib.ml.artists(false).unwrap();
    let a = artists
        .iter()
        .find(|ar| ar.name().as_deref() == Some("A"))
        .unwrap();
    let b = artists
        .iter()
        .find(|ar| ar.name().as_deref() == Some("B"))
        .unwrap();

    let tracks = lib.ml.tracks_of_album(album.id()).unwrap();
    assert_eq!(2, tracks.len());
    let first = lib
        .ml
        .album_track_of_media(tracks[0].id())
        .unwrap()
        .unwrap();
    let second = lib
        .ml
        .album_track_of_media(tracks[1].id())
        .unwrap()
        .unwrap();
    assert_eq!(Some(a.id()), first.artist_id());
    assert_eq!(Some(b.id()), second.artist_id());
    assert_eq!(Some(1), first.track_number());
    assert_eq!(Some(2), second.track_number());
}

#[test]
fn single_artist_album_keeps_its_artist() {
    let fs = music_fs(&["one.mp3", "two.mp3"]);
    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![
            ("one.mp3", tags(Some("X"), Some("A"), Some("A"), Some(1))),
            ("two.mp3", tags(Some("X"), Some("A"), Some("A"), Some(2))),
        ])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let album = wait_for(|| {
        let albums = lib
            .ml
            .albums(medialib::SortingCriteria::Default, false)
            .unwrap();
        let album = albums.into_iter().next()?;
        (album.nb_tracks() == 2).then_some(album)
    });

    let artist = lib.ml.artist(album.artist_id().unwrap()).unwrap().unwrap();
    assert_eq!(Some("A".to_string()), artist.name());
    assert_eq!(1, artist.nb_albums());
}

#[test]
fn untagged_audio_falls_back_to_unknown_artist() {
    let fs = music_fs(&["mystery.mp3"]);
    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![(
            "mystery.mp3",
            MediaTags {
                title: Some("mystery".to_string()),
                ..Default::default()
            },
        )])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let track = wait_for(|| {
        let media = lib
            .ml
            .audio_files(medialib::SortingCriteria::Default, false)
            .unwrap();
        let media = media.into_iter().next()?;
        lib.ml.album_track_of_media(media.id()).unwrap()
    });

    assert_eq!(Some(UNKNOWN_ARTIST_ID), track.artist_id());

    // The unknown album has no title and stays out of album listings
    let album = lib.ml.album(track.album_id()).unwrap().unwrap();
    assert_eq!(None, album.title());
    assert!(lib
        .ml
        .albums(medialib::SortingCriteria::Default, false)
        .unwrap()
        .is_empty());
}

#[test]
fn genres_are_case_insensitive() {
    let fs = music_fs(&["one.mp3", "two.mp3"]);
    let mut rock = tags(Some("X"), None, Some("A"), Some(1));
    rock.genre = Some("Rock".to_string());
    let mut rock_lower = tags(Some("X"), None, Some("A"), Some(2));
    rock_lower.genre = Some("rock".to_string());

    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![
            ("one.mp3", rock),
            ("two.mp3", rock_lower),
        ])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let genres = wait_for(|| {
        let genres = lib.ml.genres().unwrap();
        (!genres.is_empty()).then_some(genres)
    });
    assert_eq!(1, genres.len());
    assert_eq!(2, lib.ml.tracks_of_genre(genres[0].id()).unwrap().len());
}

#[test]
fn conflicting_release_years_reset_to_zero() {
    let fs = music_fs(&["one.mp3", "two.mp3"]);
    let mut first = tags(Some("X"), None, Some("A"), Some(1));
    first.release_year = Some(1999);
    let mut second = tags(Some("X"), None, Some("A"), Some(2));
    second.release_year = Some(2001);

    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![
            ("one.mp3", first),
            ("two.mp3", second),
        ])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let album = wait_for(|| {
        let albums = lib
            .ml
            .albums(medialib::SortingCriteria::Default, false)
            .unwrap();
        let album = albums.into_iter().next()?;
        (album.nb_tracks() == 2).then_some(album)
    });
    assert_eq!(0, album.release_year());
}

#[test]
fn videos_become_movies_or_episodes() {
    let fs = music_fs(&["movie.mkv", "episode.mkv"]);
    let lib = setup_with_services(
        fs,
        vec![TagService::new(vec![
            (
                "movie.mkv",
                MediaTags {
                    title: Some("Some Movie".to_string()),
                    ..Default::default()
                },
            ),
            (
                "episode.mkv",
                MediaTags {
                    title: Some("Pilot".to_string()),
                    show_name: Some("Some Show".to_string()),
                    episode: Some(1),
                    season: Some(1),
                    ..Default::default()
                },
            ),
        ])],
    );

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let movies = wait_for(|| {
        let movies = lib.ml.movies().unwrap();
        (!movies.is_empty()).then_some(movies)
    });
    assert_eq!(1, movies.len());
    assert_eq!(Some("Some Movie".to_string()), movies[0].title());

    let show = wait_for(|| {
        lib.ml.show_by_name("Some Show").unwrap()
    });
    let episodes = lib.ml.episodes_of_show(show.id()).unwrap();
    assert_eq!(1, episodes.len());
    assert_eq!(Some(1), episodes[0].episode_number);

    let media = lib.ml.media(episodes[0].media_id).unwrap().unwrap();
    assert_eq!(medialib::MediaSubtype::ShowEpisode, media.subtype());
}

#[test]
fn derived_entities_survive_reopen() {
    let fs = music_fs(&["one.mp3"]);
    let mut t = tags(Some("X"), None, Some("A"), Some(1));
    t.release_year = Some(1999);

    let lib = setup_with_services(fs, vec![TagService::new(vec![("one.mp3", t)])]);

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let album = wait_for(|| {
        let albums = lib
            .ml
            .albums(medialib::SortingCriteria::Default, false)
            .unwrap();
        albums.into_iter().next()
    });
    let artist_id = album.artist_id().unwrap();
    lib.ml.set_artist_short_bio(artist_id, "a short bio").unwrap();

    let album_id = album.id();
    drop(album);
    let lib = reopen(lib);

    let album = lib.ml.album(album_id).unwrap().unwrap();
    assert_eq!(Some("X".to_string()), album.title());
    assert_eq!(1999, album.release_year());
    assert_eq!(1, album.nb_tracks());

    let artist = lib.ml.artist(artist_id).unwrap().unwrap();
    assert_eq!(Some("A".to_string()), artist.name());
    assert_eq!(Some("a short bio".to_string()), artist.short_bio());
}
