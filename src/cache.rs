use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::index::album::Album;
use crate::index::album_track::AlbumTrack;
use crate::index::artist::Artist;
use crate::index::device::Device;
use crate::index::file::File;
use crate::index::folder::Folder;
use crate::index::genre::Genre;
use crate::index::media::Media;
use crate::index::movie::Movie;
use crate::index::playlist::Playlist;
use crate::index::show::Show;
use crate::Result;

/// Identity map for one entity kind. While any caller holds a strong
/// reference to a row's entity, every fetch of that row yields the same
/// instance; once all strong references drop, the slot is reclaimed and a
/// later fetch rebuilds the entity from the database.
pub(crate) struct EntityCache<T> {
    map: Mutex<HashMap<i64, Weak<T>>>,
}

impl<T> EntityCache<T> {
    pub fn new() -> EntityCache<T> {
        EntityCache {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the live instance for `id`, or loads it through `load`.
    pub fn fetch(
        &self,
        id: i64,
        load: impl FnOnce() -> Result<Option<T>>,
    ) -> Result<Option<Arc<T>>> {
        let mut map = self.map.lock().unwrap();
        if let Some(entity) = map.get(&id).and_then(Weak::upgrade) {
            return Ok(Some(entity));
        }
        match load()? {
            Some(entity) => {
                let entity = Arc::new(entity);
                map.insert(id, Arc::downgrade(&entity));
                Ok(Some(entity))
            }
            None => {
                map.remove(&id);
                Ok(None)
            }
        }
    }

    /// Like `fetch` but for rows already materialized by a listing query.
    pub fn resolve(&self, id: i64, make: impl FnOnce() -> T) -> Arc<T> {
        let mut map = self.map.lock().unwrap();
        if let Some(entity) = map.get(&id).and_then(Weak::upgrade) {
            return entity;
        }
        let entity = Arc::new(make());
        map.insert(id, Arc::downgrade(&entity));
        entity
    }

    /// The live instance for `id`, if any caller still holds one.
    pub fn peek(&self, id: i64) -> Option<Arc<T>> {
        self.map.lock().unwrap().get(&id).and_then(Weak::upgrade)
    }

    pub fn evict(&self, id: i64) {
        self.map.lock().unwrap().remove(&id);
    }

    pub fn clear(&self) {
        self.map.lock().unwrap().clear();
    }
}

/// All identity maps of one library handle. Owning them per handle keeps
/// multiple concurrently-open libraries isolated.
pub(crate) struct Caches {
    pub device: EntityCache<Device>,
    pub folder: EntityCache<Folder>,
    pub file: EntityCache<File>,
    pub media: EntityCache<Media>,
    pub album: EntityCache<Album>,
    pub album_track: EntityCache<AlbumTrack>,
    pub artist: EntityCache<Artist>,
    pub genre: EntityCache<Genre>,
    pub playlist: EntityCache<Playlist>,
    pub show: EntityCache<Show>,
    pub movie: EntityCache<Movie>,
}

impl Caches {
    pub fn new() -> Caches {
        Caches {
            device: EntityCache::new(),
            folder: EntityCache::new(),
            file: EntityCache::new(),
            media: EntityCache::new(),
            album: EntityCache::new(),
            album_track: EntityCache::new(),
            artist: EntityCache::new(),
            genre: EntityCache::new(),
            playlist: EntityCache::new(),
            show: EntityCache::new(),
            movie: EntityCache::new(),
        }
    }

    pub fn clear(&self) {
        self.device.clear();
        self.folder.clear();
        self.file.clear();
        self.media.clear();
        self.album.clear();
        self.album_track.clear();
        self.artist.clear();
        self.genre.clear();
        self.playlist.clear();
        self.show.clear();
        self.movie.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_while_alive() {
        let cache: EntityCache<String> = EntityCache::new();
        let a = cache
            .fetch(1, || Ok(Some("one".to_string())))
            .unwrap()
            .unwrap();
        let b = cache
            .fetch(1, || panic!("must not reload a live entity"))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn reload_after_drop() {
        let cache: EntityCache<String> = EntityCache::new();
        let a = cache
            .fetch(1, || Ok(Some("one".to_string())))
            .unwrap()
            .unwrap();
        drop(a);
        let b = cache
            .fetch(1, || Ok(Some("one again".to_string())))
            .unwrap()
            .unwrap();
        assert_eq!("one again", *b);
    }

    #[test]
    fn eviction() {
        let cache: EntityCache<String> = EntityCache::new();
        let a = cache
            .fetch(1, || Ok(Some("one".to_string())))
            .unwrap()
            .unwrap();
        cache.evict(1);
        let b = cache
            .fetch(1, || Ok(Some("two".to_string())))
            .unwrap()
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!("two", *b);
    }
}
