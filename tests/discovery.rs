mod common;

use common::*;

#[test]
fn discover_and_classify() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));

    let files = wait_for_file_count(&lib, 3);
    assert_eq!(3, files.len());

    let audio = lib
        .ml
        .audio_files(medialib::SortingCriteria::Default, false)
        .unwrap();
    assert_eq!(1, audio.len());
    assert_eq!(Some("audio.mp3".to_string()), audio[0].filename());
    assert_eq!(medialib::MediaType::Audio, audio[0].media_type());

    let video = lib
        .ml
        .video_files(medialib::SortingCriteria::Default, false)
        .unwrap();
    assert_eq!(2, video.len());

    // The unsupported extension never became a media
    assert!(lib.cb.wait_media_added(3));
    assert_eq!(3, lib.cb.media_added().len());

    assert!(lib.ml.folder(ROOT).unwrap().is_some());
    assert!(lib.ml.folder(SUBFOLDER).unwrap().is_some());
    assert!(lib.ml.folder("file:///nowhere/").unwrap().is_none());
}

#[test]
fn discovering_twice_adds_nothing() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(2));

    // Still three files, still three additions
    std::thread::sleep(std::time::Duration::from_millis(700));
    assert_eq!(3, lib.ml.files().unwrap().len());
    assert_eq!(3, lib.cb.media_added().len());
}

#[test]
fn reload_picks_up_new_files() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.fs.add_file(ROOT, "fresh.mkv");
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));

    wait_for_file_count(&lib, 4);
}

#[test]
fn reload_drops_vanished_files() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.fs.remove_file(ROOT, "video.avi");
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));

    wait_for_file_count(&lib, 2);
    assert!(lib.cb.wait_media_removed(1));
    assert_eq!(
        0,
        lib.ml
            .video_files(medialib::SortingCriteria::Default, false)
            .unwrap()
            .iter()
            .filter(|m| m.filename().as_deref() == Some("video.avi"))
            .count()
    );
}

#[test]
fn modified_file_is_recreated() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    let before = lib
        .ml
        .file_by_mrl("file:///a/video.avi")
        .unwrap()
        .unwrap();

    lib.fs.add_file_with_mtime(ROOT, "video.avi", 2000);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));

    let after = wait_for(|| {
        let file = lib.ml.file_by_mrl("file:///a/video.avi").unwrap()?;
        (file.id() != before.id()).then_some(file)
    });
    assert_eq!(2000, after.last_modification_date());
    assert_eq!(3, lib.ml.files().unwrap().len());
}

#[test]
fn ban_cascades_and_unban_rediscovers() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    let banned_media = lib
        .ml
        .file_by_mrl("file:///a/folder/subfile.mp4")
        .unwrap()
        .unwrap()
        .media_id();

    lib.ml.ban_folder(SUBFOLDER).unwrap();
    assert!(lib.cb.wait_banned(1));

    wait_for_file_count(&lib, 2);
    assert!(lib.cb.wait_media_removed(1));
    assert!(lib.cb.media_removed().contains(&banned_media));
    assert!(lib.ml.folder(SUBFOLDER).unwrap().is_none());
    assert!(lib
        .ml
        .file_by_mrl("file:///a/folder/subfile.mp4")
        .unwrap()
        .is_none());

    // A reload while banned must not resurrect anything
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));
    std::thread::sleep(std::time::Duration::from_millis(200));
    assert_eq!(2, lib.ml.files().unwrap().len());

    // Unban queues a reload on its own
    lib.ml.unban_folder(SUBFOLDER).unwrap();
    assert!(lib.cb.wait_unbanned(1));

    let files = wait_for_file_count(&lib, 3);
    let new_media = files
        .iter()
        .find(|f| f.raw_mrl().contains("subfile"))
        .unwrap()
        .media_id();
    assert_ne!(banned_media, new_media);
}

#[test]
fn remove_entry_point_deletes_everything() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.ml.remove_entry_point(ROOT).unwrap();
    assert!(lib.cb.wait_removed_entry_point(1));

    wait_for_file_count(&lib, 0);
    assert!(lib.ml.folder(ROOT).unwrap().is_none());
    assert!(lib.cb.wait_media_removed(3));
}

#[test]
fn discovering_unknown_directory_fails_gracefully() {
    let lib = setup(MockFs::standard());

    lib.ml.discover("file:///missing/").unwrap();
    assert!(lib.cb.wait_discovery(1));

    assert_eq!(0, lib.ml.files().unwrap().len());
}
