pub const DB_MODEL_VERSION: u32 = 4;

pub const SETTINGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Settings (
    db_model_version INTEGER NOT NULL);
";

pub const MODEL_SCHEMA: &str = "
CREATE TABLE Device (
    device_id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE ON CONFLICT FAIL,
    scheme TEXT NOT NULL,
    is_removable BOOLEAN NOT NULL,
    is_present BOOLEAN NOT NULL DEFAULT 1);

CREATE TABLE Folder (
    folder_id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    parent_id INTEGER,
    device_id INTEGER NOT NULL,
    is_blacklisted BOOLEAN NOT NULL DEFAULT 0,
    is_removable BOOLEAN NOT NULL,
    is_present BOOLEAN NOT NULL DEFAULT 1,
    FOREIGN KEY(parent_id) REFERENCES Folder(folder_id) ON DELETE CASCADE,
    FOREIGN KEY(device_id) REFERENCES Device(device_id) ON DELETE CASCADE,
    UNIQUE(path, device_id) ON CONFLICT FAIL);

CREATE INDEX Folder_device_id ON Folder (device_id);
CREATE INDEX Folder_parent_id ON Folder (parent_id);

CREATE TABLE Media (
    media_id INTEGER PRIMARY KEY AUTOINCREMENT,
    type INTEGER NOT NULL,
    subtype INTEGER NOT NULL DEFAULT 0,
    title TEXT COLLATE NOCASE,
    filename TEXT,
    duration INTEGER DEFAULT -1,
    play_count INTEGER NOT NULL DEFAULT 0,
    last_played_date INTEGER,
    rating INTEGER DEFAULT -1,
    progress REAL NOT NULL DEFAULT 0,
    insertion_date INTEGER NOT NULL,
    release_date INTEGER,
    thumbnail TEXT,
    is_parsed BOOLEAN NOT NULL DEFAULT 0,
    is_present BOOLEAN NOT NULL DEFAULT 1);

CREATE TABLE File (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id INTEGER NOT NULL,
    mrl TEXT,
    type INTEGER NOT NULL,
    last_modification_date INTEGER,
    size INTEGER,
    parser_retries INTEGER NOT NULL DEFAULT 0,
    is_parsed BOOLEAN NOT NULL DEFAULT 0,
    folder_id INTEGER,
    is_present BOOLEAN NOT NULL DEFAULT 1,
    is_removable BOOLEAN NOT NULL,
    is_external BOOLEAN NOT NULL DEFAULT 0,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE,
    FOREIGN KEY(folder_id) REFERENCES Folder(folder_id) ON DELETE CASCADE,
    UNIQUE(mrl, folder_id) ON CONFLICT FAIL);

CREATE INDEX File_media_id ON File (media_id);
CREATE INDEX File_folder_id ON File (folder_id);

CREATE TABLE Label (
    label_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE ON CONFLICT FAIL);

CREATE TABLE LabelRelation (
    label_id INTEGER NOT NULL,
    media_id INTEGER NOT NULL,
    PRIMARY KEY (label_id, media_id),
    FOREIGN KEY(label_id) REFERENCES Label(label_id) ON DELETE CASCADE,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE);

CREATE TABLE Playlist (
    playlist_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    creation_date INTEGER NOT NULL);

CREATE TABLE PlaylistMediaRelation (
    playlist_id INTEGER NOT NULL,
    media_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (playlist_id, media_id),
    FOREIGN KEY(playlist_id) REFERENCES Playlist(playlist_id) ON DELETE CASCADE,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE);

CREATE TABLE Genre (
    genre_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT COLLATE NOCASE NOT NULL UNIQUE ON CONFLICT FAIL);

CREATE TABLE Artist (
    artist_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT COLLATE NOCASE UNIQUE ON CONFLICT FAIL,
    short_bio TEXT,
    artwork_mrl TEXT,
    nb_albums INTEGER NOT NULL DEFAULT 0,
    is_present BOOLEAN NOT NULL DEFAULT 1);

CREATE TABLE MediaArtistRelation (
    media_id INTEGER NOT NULL,
    artist_id INTEGER NOT NULL,
    PRIMARY KEY (media_id, artist_id),
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE,
    FOREIGN KEY(artist_id) REFERENCES Artist(artist_id) ON DELETE CASCADE);

CREATE TABLE Album (
    album_id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT COLLATE NOCASE,
    artist_id INTEGER,
    release_year INTEGER,
    short_summary TEXT,
    artwork_mrl TEXT,
    nb_tracks INTEGER NOT NULL DEFAULT 0,
    is_present BOOLEAN NOT NULL DEFAULT 1,
    FOREIGN KEY(artist_id) REFERENCES Artist(artist_id) ON DELETE CASCADE);

CREATE INDEX Album_artist_id ON Album (artist_id);

CREATE TABLE AlbumTrack (
    track_id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id INTEGER NOT NULL UNIQUE ON CONFLICT FAIL,
    album_id INTEGER NOT NULL,
    artist_id INTEGER,
    genre_id INTEGER,
    track_number INTEGER,
    disc_number INTEGER,
    is_present BOOLEAN NOT NULL DEFAULT 1,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE,
    FOREIGN KEY(album_id) REFERENCES Album(album_id) ON DELETE CASCADE,
    FOREIGN KEY(artist_id) REFERENCES Artist(artist_id),
    FOREIGN KEY(genre_id) REFERENCES Genre(genre_id));

CREATE INDEX AlbumTrack_album_id ON AlbumTrack (album_id);
CREATE INDEX AlbumTrack_media_id ON AlbumTrack (media_id);

CREATE TABLE Show (
    show_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    release_date INTEGER,
    short_summary TEXT,
    artwork_mrl TEXT,
    tvdb_id TEXT);

CREATE TABLE ShowEpisode (
    episode_id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id INTEGER NOT NULL UNIQUE ON CONFLICT FAIL,
    show_id INTEGER NOT NULL,
    episode_number INTEGER,
    season_number INTEGER,
    title TEXT,
    short_summary TEXT,
    tvdb_id TEXT,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE,
    FOREIGN KEY(show_id) REFERENCES Show(show_id) ON DELETE CASCADE);

CREATE TABLE Movie (
    movie_id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id INTEGER NOT NULL UNIQUE ON CONFLICT FAIL,
    title TEXT COLLATE NOCASE,
    summary TEXT,
    artwork_mrl TEXT,
    imdb_id TEXT,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE);

CREATE TABLE VideoTrack (
    video_track_id INTEGER PRIMARY KEY AUTOINCREMENT,
    codec TEXT,
    width INTEGER,
    height INTEGER,
    fps REAL,
    media_id INTEGER NOT NULL,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE);

CREATE INDEX VideoTrack_media_id ON VideoTrack (media_id);

CREATE TABLE AudioTrack (
    audio_track_id INTEGER PRIMARY KEY AUTOINCREMENT,
    codec TEXT,
    bitrate INTEGER,
    samplerate INTEGER,
    nb_channels INTEGER,
    language TEXT,
    description TEXT,
    media_id INTEGER NOT NULL,
    FOREIGN KEY(media_id) REFERENCES Media(media_id) ON DELETE CASCADE);

CREATE INDEX AudioTrack_media_id ON AudioTrack (media_id);

CREATE TABLE History (
    history_id INTEGER PRIMARY KEY AUTOINCREMENT,
    mrl TEXT NOT NULL,
    insertion_date INTEGER NOT NULL);
";

/// Sentinel artists. UnknownArtist owns tracks carrying no artist tag at
/// all, VariousArtists fronts albums whose tracks disagree on their artist.
pub const DEFAULT_ARTISTS: &str = "
INSERT OR IGNORE INTO Artist(artist_id) VALUES(1),(2);
";

/// Presence propagation and counter maintenance. Application code only ever
/// writes `is_present` on Device; everything below follows.
pub const TRIGGER_SCHEMA: &str = "
CREATE TRIGGER is_device_present AFTER UPDATE OF is_present ON Device
BEGIN
    UPDATE Folder SET is_present = new.is_present WHERE device_id = new.device_id;
END;

CREATE TRIGGER is_folder_present AFTER UPDATE OF is_present ON Folder
BEGIN
    UPDATE File SET is_present = new.is_present WHERE folder_id = new.folder_id;
END;

CREATE TRIGGER is_file_present AFTER UPDATE OF is_present ON File
BEGIN
    UPDATE Media SET is_present = EXISTS(
        SELECT file_id FROM File WHERE media_id = new.media_id AND is_present = 1)
    WHERE media_id = new.media_id;
END;

CREATE TRIGGER is_media_present AFTER UPDATE OF is_present ON Media
BEGIN
    UPDATE AlbumTrack SET is_present = new.is_present WHERE media_id = new.media_id;
END;

CREATE TRIGGER is_track_present AFTER UPDATE OF is_present ON AlbumTrack
BEGIN
    UPDATE Album SET is_present = EXISTS(
        SELECT track_id FROM AlbumTrack WHERE album_id = new.album_id AND is_present = 1)
    WHERE album_id = new.album_id;
END;

CREATE TRIGGER has_album_present AFTER UPDATE OF is_present ON Album
WHEN new.artist_id IS NOT NULL
BEGIN
    UPDATE Artist SET is_present = EXISTS(
        SELECT album_id FROM Album WHERE artist_id = new.artist_id AND is_present = 1)
    WHERE artist_id = new.artist_id;
END;

CREATE TRIGGER add_album_track AFTER INSERT ON AlbumTrack
BEGIN
    UPDATE Album SET nb_tracks = nb_tracks + 1,
        is_present = EXISTS(
            SELECT track_id FROM AlbumTrack WHERE album_id = new.album_id AND is_present = 1)
    WHERE album_id = new.album_id;
END;

CREATE TRIGGER delete_album_track AFTER DELETE ON AlbumTrack
BEGIN
    UPDATE Album SET nb_tracks = nb_tracks - 1,
        is_present = EXISTS(
            SELECT track_id FROM AlbumTrack WHERE album_id = old.album_id AND is_present = 1)
    WHERE album_id = old.album_id;
END;

CREATE TRIGGER limit_history_size AFTER INSERT ON History
BEGIN
    DELETE FROM History WHERE history_id IN (
        SELECT history_id FROM History ORDER BY insertion_date DESC LIMIT -1 OFFSET 100);
END;
";

/// Full-text indexes mirror their base table; rows without a searchable
/// field are skipped.
pub const FTS_SCHEMA: &str = "
CREATE VIRTUAL TABLE MediaFts USING FTS4(title);
CREATE VIRTUAL TABLE AlbumFts USING FTS4(title);
CREATE VIRTUAL TABLE ArtistFts USING FTS4(name);
CREATE VIRTUAL TABLE GenreFts USING FTS4(name);
CREATE VIRTUAL TABLE PlaylistFts USING FTS4(name);

CREATE TRIGGER insert_media_fts AFTER INSERT ON Media
WHEN new.title IS NOT NULL
BEGIN
    INSERT INTO MediaFts(rowid, title) VALUES(new.media_id, new.title);
END;

CREATE TRIGGER update_media_title_fts AFTER UPDATE OF title ON Media
WHEN new.title IS NOT NULL
BEGIN
    DELETE FROM MediaFts WHERE rowid = new.media_id;
    INSERT INTO MediaFts(rowid, title) VALUES(new.media_id, new.title);
END;

CREATE TRIGGER delete_media_fts BEFORE DELETE ON Media
WHEN old.title IS NOT NULL
BEGIN
    DELETE FROM MediaFts WHERE rowid = old.media_id;
END;

CREATE TRIGGER insert_album_fts AFTER INSERT ON Album
WHEN new.title IS NOT NULL
BEGIN
    INSERT INTO AlbumFts(rowid, title) VALUES(new.album_id, new.title);
END;

CREATE TRIGGER delete_album_fts BEFORE DELETE ON Album
WHEN old.title IS NOT NULL
BEGIN
    DELETE FROM AlbumFts WHERE rowid = old.album_id;
END;

CREATE TRIGGER insert_artist_fts AFTER INSERT ON Artist
WHEN new.name IS NOT NULL
BEGIN
    INSERT INTO ArtistFts(rowid, name) VALUES(new.artist_id, new.name);
END;

CREATE TRIGGER delete_artist_fts BEFORE DELETE ON Artist
WHEN old.name IS NOT NULL
BEGIN
    DELETE FROM ArtistFts WHERE rowid = old.artist_id;
END;

CREATE TRIGGER insert_genre_fts AFTER INSERT ON Genre
BEGIN
    INSERT INTO GenreFts(rowid, name) VALUES(new.genre_id, new.name);
END;

CREATE TRIGGER delete_genre_fts BEFORE DELETE ON Genre
BEGIN
    DELETE FROM GenreFts WHERE rowid = old.genre_id;
END;

CREATE TRIGGER insert_playlist_fts AFTER INSERT ON Playlist
BEGIN
    INSERT INTO PlaylistFts(rowid, name) VALUES(new.playlist_id, new.name);
END;

CREATE TRIGGER delete_playlist_fts BEFORE DELETE ON Playlist
BEGIN
    DELETE FROM PlaylistFts WHERE rowid = old.playlist_id;
END;
";

/// Reverse-dependency drop list used by the baseline migration.
pub const WIPE_SCHEMA: &str = "
DROP TABLE IF EXISTS History;
DROP TABLE IF EXISTS AudioTrack;
DROP TABLE IF EXISTS VideoTrack;
DROP TABLE IF EXISTS Movie;
DROP TABLE IF EXISTS ShowEpisode;
DROP TABLE IF EXISTS Show;
DROP TABLE IF EXISTS AlbumTrack;
DROP TABLE IF EXISTS Album;
DROP TABLE IF EXISTS MediaArtistRelation;
DROP TABLE IF EXISTS Artist;
DROP TABLE IF EXISTS Genre;
DROP TABLE IF EXISTS PlaylistMediaRelation;
DROP TABLE IF EXISTS Playlist;
DROP TABLE IF EXISTS LabelRelation;
DROP TABLE IF EXISTS Label;
DROP TABLE IF EXISTS File;
DROP TABLE IF EXISTS Media;
DROP TABLE IF EXISTS Folder;
DROP TABLE IF EXISTS Device;
DROP TABLE IF EXISTS MediaFts;
DROP TABLE IF EXISTS AlbumFts;
DROP TABLE IF EXISTS ArtistFts;
DROP TABLE IF EXISTS GenreFts;
DROP TABLE IF EXISTS PlaylistFts;
DROP TABLE IF EXISTS Settings;
";
