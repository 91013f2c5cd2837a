//! Backing dataset seen by the grid, and the index captures are registered in.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::capture::CaptureKind;
use crate::models::{Item, ItemId, MediaStore, Uri};

/// Positional view over the media the grid displays.
pub trait MediaSource {
    fn count(&self) -> usize;

    /// `None` when the record vanished or could not be read.
    fn item_at(&self, index: usize) -> Option<Item>;

    /// Re-reads the dataset, e.g. after a capture was registered.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Where finished captures are registered so they show up in the grid.
pub trait MediaIndex {
    fn register(&mut self, path: &Path, kind: CaptureKind) -> Result<Item>;
}

/// A source that can also take new captures.
pub trait MediaLibrary: MediaSource + MediaIndex {}

impl<T: MediaSource + MediaIndex> MediaLibrary for T {}

/// In-memory library, newest item first.
#[derive(Debug, Default)]
pub struct VecSource {
    items: Vec<Item>,
    next_id: i64,
}

impl VecSource {
    pub fn new(items: Vec<Item>) -> Self {
        let next_id = items.iter().map(|i| i.id().0).max().unwrap_or(0) + 1;
        Self { items, next_id }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

impl MediaSource for VecSource {
    fn count(&self) -> usize {
        self.items.len()
    }

    fn item_at(&self, index: usize) -> Option<Item> {
        self.items.get(index).cloned()
    }
}

impl MediaIndex for VecSource {
    fn register(&mut self, path: &Path, kind: CaptureKind) -> Result<Item> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat capture: {:?}", path))?
            .len();
        let item = Item::new(
            ItemId(self.next_id),
            kind.mime_type(),
            size,
            0,
            Uri::from_path(path),
        );
        self.next_id += 1;
        self.items.insert(0, item.clone());
        debug!(id = %item.id(), ?path, "Registered capture");
        Ok(item)
    }
}

/// Records a capture in a `MediaStore`, timestamped now.
pub(crate) fn register_in_store(store: &MediaStore, path: &Path, kind: CaptureKind) -> Result<Item> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat capture: {:?}", path))?
        .len();
    let duration_ms = match kind {
        CaptureKind::Video => crate::scanner::probe_duration_ms(path).unwrap_or(0),
        CaptureKind::Photo => 0,
    };
    let now = MediaStore::now();
    let id = store.upsert_media(&crate::models::MediaRecord {
        path: path.to_path_buf(),
        mime_type: kind.mime_type().to_string(),
        size: size as i64,
        duration_ms: duration_ms as i64,
        date_added: now,
        last_seen: now,
    })?;
    store
        .get_item(id)?
        .with_context(|| format!("Capture vanished after registration: {:?}", path))
}
