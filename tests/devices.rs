mod common;

use common::*;

#[test]
fn unplug_and_replug_preserves_identity() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    let subfile = lib
        .ml
        .file_by_mrl("file:///a/folder/subfile.mp4")
        .unwrap()
        .unwrap();
    let file_id = subfile.id();
    let media_id = subfile.media_id();
    drop(subfile);

    lib.fs.device(REMOVABLE_DEVICE).set_present(false);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));

    wait_for_file_count(&lib, 2);
    assert!(lib
        .ml
        .file_by_mrl("file:///a/folder/subfile.mp4")
        .unwrap()
        .is_none());

    lib.fs.device(REMOVABLE_DEVICE).set_present(true);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(2));

    wait_for_file_count(&lib, 3);
    let replugged = lib
        .ml
        .file_by_mrl("file:///a/folder/subfile.mp4")
        .unwrap()
        .unwrap();
    assert_eq!(file_id, replugged.id());
    assert_eq!(media_id, replugged.media_id());
}

#[test]
fn replug_with_new_files() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.fs.device(REMOVABLE_DEVICE).set_present(false);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));
    wait_for_file_count(&lib, 2);

    lib.fs.add_file(SUBFOLDER, "newfile.mkv");
    lib.fs.device(REMOVABLE_DEVICE).set_present(true);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(2));

    wait_for_file_count(&lib, 4);
}

#[test]
fn device_events() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    assert!(lib.ml.is_device_known(REMOVABLE_DEVICE).unwrap());
    assert!(!lib.ml.is_device_known("never-seen").unwrap());

    // A brand new device asks the caller to start a discovery
    assert!(lib
        .ml
        .on_device_plugged("never-seen", "file:///mnt/x/")
        .unwrap());

    lib.ml.on_device_unplugged(REMOVABLE_DEVICE).unwrap();
    wait_for(|| {
        (lib.ml.files().unwrap().len() == 2).then_some(())
    });

    let is_new = lib
        .ml
        .on_device_plugged(REMOVABLE_DEVICE, SUBFOLDER)
        .unwrap();
    assert!(!is_new);
    wait_for(|| (lib.ml.files().unwrap().len() == 3).then_some(()));
}

#[test]
fn device_rows_survive_unplug() {
    let lib = setup(MockFs::standard());

    lib.ml.discover(ROOT).unwrap();
    assert!(lib.cb.wait_discovery(1));
    wait_for_file_count(&lib, 3);

    lib.fs.device(REMOVABLE_DEVICE).set_present(false);
    lib.ml.reload().unwrap();
    assert!(lib.cb.wait_reload(1));
    wait_for_file_count(&lib, 2);

    // The device is gone from the filesystem but not from the catalog
    assert!(lib.ml.is_device_known(REMOVABLE_DEVICE).unwrap());

    // And it is still known after reopening the database
    let lib = reopen(lib);
    assert!(lib.ml.is_device_known(REMOVABLE_DEVICE).unwrap());
}
