use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Result;
use lru::LruCache;
use tracing::{debug, warn};

use crate::capture::CaptureKind;
use crate::models::{Item, ItemId, MediaStore, MediaTypeMode};
use crate::source::{register_in_store, MediaIndex, MediaSource};

const ITEM_CACHE_ENTRIES: usize = 512;

/// Positional cursor over a `MediaStore`.
///
/// Holds an ordered id snapshot taken at construction or `refresh()`, and
/// reads records lazily through a small LRU.
pub struct MediaCursor {
    store: MediaStore,
    mode: MediaTypeMode,
    ids: Vec<ItemId>,
    cache: RefCell<LruCache<ItemId, Item>>,
}

impl MediaCursor {
    pub fn new(store: MediaStore, mode: MediaTypeMode) -> Result<Self> {
        let ids = store.ordered_ids(mode)?;
        debug!(count = ids.len(), ?mode, "Opened media cursor");
        Ok(Self {
            store,
            mode,
            ids,
            cache: RefCell::new(LruCache::new(
                NonZeroUsize::new(ITEM_CACHE_ENTRIES).unwrap(),
            )),
        })
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }
}

impl MediaSource for MediaCursor {
    fn count(&self) -> usize {
        self.ids.len()
    }

    fn item_at(&self, index: usize) -> Option<Item> {
        let id = *self.ids.get(index)?;
        if let Some(item) = self.cache.borrow_mut().get(&id) {
            return Some(item.clone());
        }

        match self.store.get_item(id) {
            Ok(Some(item)) => {
                self.cache.borrow_mut().put(id, item.clone());
                Some(item)
            }
            Ok(None) => {
                warn!(%id, index, "Media record vanished since the last refresh");
                None
            }
            Err(e) => {
                warn!(%id, index, error = ?e, "Failed to read media record");
                None
            }
        }
    }

    fn refresh(&mut self) -> Result<()> {
        self.ids = self.store.ordered_ids(self.mode)?;
        self.cache.borrow_mut().clear();
        debug!(count = self.ids.len(), "Refreshed media cursor");
        Ok(())
    }
}

impl MediaIndex for MediaCursor {
    fn register(&mut self, path: &Path, kind: CaptureKind) -> Result<Item> {
        register_in_store(&self.store, path, kind)
    }
}
