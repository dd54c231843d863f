mod common;

use common::*;

fn external_media(lib: &TestLib, name: &str) -> i64 {
    lib.ml
        .add_external_media(&format!("file:///elsewhere/{}", name))
        .unwrap()
        .id()
}

#[test]
fn playlist_ordering_round_trip() {
    let lib = setup(MockFs::standard());

    let a = external_media(&lib, "a.mp3");
    let b = external_media(&lib, "b.mp3");
    let c = external_media(&lib, "c.mp3");

    let playlist = lib.ml.create_playlist("mix").unwrap();
    lib.ml.playlist_append(playlist.id(), a).unwrap();
    lib.ml.playlist_append(playlist.id(), b).unwrap();
    lib.ml.playlist_add(playlist.id(), c, 1).unwrap();

    let order = |lib: &TestLib| {
        lib.ml
            .media_of_playlist(playlist.id())
            .unwrap()
            .iter()
            .map(|m| m.id())
            .collect::<Vec<_>>()
    };
    assert_eq!(vec![c, a, b], order(&lib));

    lib.ml.playlist_move(playlist.id(), b, 1).unwrap();
    assert_eq!(vec![b, c, a], order(&lib));

    lib.ml.playlist_remove(playlist.id(), c).unwrap();
    assert_eq!(vec![b, a], order(&lib));

    let playlist_id = playlist.id();
    drop(playlist);
    let lib = reopen(lib);

    let reopened = lib.ml.playlist(playlist_id).unwrap().unwrap();
    assert_eq!("mix", reopened.name());
    let order: Vec<i64> = lib
        .ml
        .media_of_playlist(playlist_id)
        .unwrap()
        .iter()
        .map(|m| m.id())
        .collect();
    assert_eq!(vec![b, a], order);

    assert!(lib.ml.delete_playlist(playlist_id).unwrap());
    assert!(lib.ml.playlist(playlist_id).unwrap().is_none());
    assert!(lib.ml.media_of_playlist(playlist_id).unwrap().is_empty());
}

#[test]
fn search_needs_three_characters() {
    let lib = setup(MockFs::standard());

    for i in 1..=10 {
        let id = external_media(&lib, &format!("t{}.mp3", i));
        lib.ml
            .set_media_title(id, &format!("track {}", i))
            .unwrap();
    }

    assert!(lib.ml.search_media("ab").unwrap().is_empty());
    assert!(lib.ml.search_media("abc").unwrap().is_empty());
    assert_eq!(10, lib.ml.search_media("tra").unwrap().len());

    // Prefix match per whitespace token: "1" also matches "10"
    assert_eq!(2, lib.ml.search_media("track 1").unwrap().len());
    assert_eq!(1, lib.ml.search_media("track 7").unwrap().len());
}

#[test]
fn labels_attach_and_cascade() {
    let lib = setup(MockFs::standard());

    let media = external_media(&lib, "labeled.mp3");
    let label = lib.ml.create_label("favorites").unwrap();
    lib.ml.add_label_to_media(label.label_id, media).unwrap();

    let labels = lib.ml.labels_of_media(media).unwrap();
    assert_eq!(1, labels.len());
    assert_eq!("favorites", labels[0].name);

    assert!(lib.ml.delete_label("favorites").unwrap());
    assert!(lib.ml.labels_of_media(media).unwrap().is_empty());
    assert!(!lib.ml.delete_label("favorites").unwrap());
}

#[test]
fn stream_history() {
    let lib = setup(MockFs::standard());

    lib.ml
        .add_to_stream_history("http://example.com/radio")
        .unwrap();
    lib.ml
        .add_to_stream_history("http://example.com/other")
        .unwrap();

    let history = lib.ml.history().unwrap();
    assert_eq!(2, history.len());

    lib.ml.clear_history().unwrap();
    assert!(lib.ml.history().unwrap().is_empty());
}

#[test]
fn media_state_round_trip() {
    let lib = setup(MockFs::standard());

    let id = external_media(&lib, "song.mp3");
    lib.ml.set_media_rating(id, 4).unwrap();
    lib.ml.set_media_progress(id, 0.5).unwrap();
    lib.ml.increase_play_count(id).unwrap();
    lib.ml.increase_play_count(id).unwrap();

    let lib = reopen(lib);

    let media = lib.ml.media(id).unwrap().unwrap();
    assert_eq!(4, media.rating());
    assert_eq!(0.5, media.progress());
    assert_eq!(2, media.play_count());
    assert!(media.last_played_date().is_some());
    assert_eq!(medialib::MediaType::External, media.media_type());
}

#[test]
fn entity_cache_returns_same_instance() {
    let lib = setup(MockFs::standard());

    let id = external_media(&lib, "cached.mp3");
    let first = lib.ml.media(id).unwrap().unwrap();
    let second = lib.ml.media(id).unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn initialize_is_idempotent() {
    let lib = setup(MockFs::standard());

    let cb = std::sync::Arc::new(TestCb::default());
    lib.ml
        .initialize(
            &lib.dir.path().join("test.db"),
            &lib.dir.path().join("thumbnails"),
            cb,
        )
        .unwrap();

    assert_eq!(medialib::LibraryState::Started, lib.ml.state());
}

#[test]
fn pause_defers_parsing() {
    let lib = setup(MockFs::standard());

    lib.ml.pause_background_operations().unwrap();
    lib.ml.discover(ROOT).unwrap();

    // Nothing moves while paused
    std::thread::sleep(std::time::Duration::from_millis(300));
    assert_eq!(0, lib.ml.files().unwrap().len());

    lib.ml.resume_background_operations().unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);
}
