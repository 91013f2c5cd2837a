//! Thumbnail caching with a memory layer and an optional disk layer.
//!
//! - Memory cache: LRU of decoded RGBA thumbnails with a byte budget
//! - Disk cache: PNG files in XDG_CACHE_HOME/mediapick/thumbs/
//!
//! Keys are an xxhash of (uri, mtime, size, edge) so a modified source or a
//! new cell size never hits a stale entry.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use image::{ImageFormat, RgbaImage};
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::Thumbnail;
use crate::models::Uri;

/// Default memory cache size in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: usize = 64;

const MIN_MEMORY_MB: usize = 8;
const MAX_MEMORY_MB: usize = 512;

/// Bump when decoding semantics change (crop mode, filter).
const THUMB_CACHE_VERSION: u8 = 1;

const DEFAULT_LRU_CAPACITY: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(uri: &Uri, mtime: i64, size: u64, edge: u32) -> Self {
        let uri = uri.as_str().as_bytes();
        let mut data = Vec::with_capacity(uri.len() + 21);
        data.push(THUMB_CACHE_VERSION);
        data.extend_from_slice(uri);
        data.extend_from_slice(&mtime.to_le_bytes());
        data.extend_from_slice(&size.to_le_bytes());
        data.extend_from_slice(&edge.to_le_bytes());
        Self(xxh3_64(&data))
    }

    /// Key for a local file, from its current metadata.
    ///
    /// `None` for non-file uris or unreadable files, which are never cached.
    pub fn for_file(uri: &Uri, edge: u32) -> Option<Self> {
        let meta = std::fs::metadata(uri.to_file_path()?).ok()?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Some(Self::new(uri, mtime, meta.len(), edge))
    }

    pub fn disk_filename(&self) -> String {
        format!("{:016x}.png", self.0)
    }
}

/// Shared thumbnail cache. Clones share the same storage.
#[derive(Clone)]
pub struct ThumbnailCache {
    cache_dir: Option<PathBuf>,
    max_memory_bytes: usize,
    current_memory_bytes: Arc<RwLock<usize>>,
    memory_cache: Arc<RwLock<LruCache<CacheKey, Thumbnail>>>,
}

impl ThumbnailCache {
    /// Memory-only cache.
    pub fn in_memory(max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        Self {
            cache_dir: None,
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            current_memory_bytes: Arc::new(RwLock::new(0)),
            memory_cache: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_LRU_CAPACITY).unwrap(),
            ))),
        }
    }

    /// Memory cache backed by PNG files in `cache_dir`.
    pub fn with_disk(cache_dir: PathBuf, max_memory_mb: usize) -> Self {
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!(?cache_dir, error = ?e, "Failed to create cache directory");
        }
        debug!(?cache_dir, max_memory_mb, "Initialized thumbnail cache");
        Self {
            cache_dir: Some(cache_dir),
            ..Self::in_memory(max_memory_mb)
        }
    }

    pub fn default_cache_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "mediapick")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.cache_dir().join("thumbs"))
    }

    /// Memory first, then disk. A disk hit is promoted to memory.
    pub fn get(&self, key: &CacheKey) -> Option<Thumbnail> {
        if let Some(thumb) = self.memory_cache.write().get(key).cloned() {
            trace!(?key, "Memory cache hit");
            return Some(thumb);
        }

        let disk_path = self.disk_path(key)?;
        if !disk_path.exists() {
            return None;
        }
        match load_png(&disk_path) {
            Ok(thumb) => {
                trace!(?key, "Disk cache hit");
                self.add_to_memory_cache(*key, thumb.clone());
                Some(thumb)
            }
            Err(e) => {
                warn!(?disk_path, error = ?e, "Dropping unreadable cache entry");
                let _ = std::fs::remove_file(&disk_path);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, thumb: Thumbnail) {
        if let Some(disk_path) = self.disk_path(&key) {
            if let Err(e) = save_png(&disk_path, &thumb) {
                warn!(?disk_path, error = ?e, "Failed to write cache entry");
            }
        }
        self.add_to_memory_cache(key, thumb);
    }

    fn disk_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|d| d.join(key.disk_filename()))
    }

    fn add_to_memory_cache(&self, key: CacheKey, thumb: Thumbnail) {
        let new_size = thumb.memory_bytes();

        // Lock order: byte counter, then LRU.
        let mut current = self.current_memory_bytes.write();
        let mut cache = self.memory_cache.write();
        if let Some(old) = cache.pop(&key) {
            *current = current.saturating_sub(old.memory_bytes());
        }
        Self::evict_if_needed(&mut current, &mut cache, self.max_memory_bytes, new_size);
        if let Some((_, evicted)) = cache.push(key, thumb) {
            *current = current.saturating_sub(evicted.memory_bytes());
        }
        *current += new_size;
    }

    fn evict_if_needed(
        current: &mut usize,
        cache: &mut LruCache<CacheKey, Thumbnail>,
        max_memory_bytes: usize,
        needed_bytes: usize,
    ) {
        while *current + needed_bytes > max_memory_bytes {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.memory_bytes());
                    trace!(
                        evicted_bytes = evicted.memory_bytes(),
                        current_bytes = *current,
                        "Evicted thumbnail from memory cache"
                    );
                }
                None => break,
            }
        }
    }

    pub fn clear_memory(&self) {
        self.memory_cache.write().clear();
        *self.current_memory_bytes.write() = 0;
        debug!("Cleared memory cache");
    }

    pub fn memory_usage(&self) -> usize {
        *self.current_memory_bytes.read()
    }

    pub fn memory_entry_count(&self) -> usize {
        self.memory_cache.read().len()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }
}

fn load_png(path: &Path) -> Result<Thumbnail> {
    let img = image::open(path).with_context(|| format!("Failed to load thumbnail: {:?}", path))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Thumbnail::new(width, height, rgba.into_raw()))
}

fn save_png(path: &Path, thumb: &Thumbnail) -> Result<()> {
    let img = RgbaImage::from_raw(thumb.width, thumb.height, thumb.rgba.as_ref().clone())
        .context("Thumbnail buffer does not match its dimensions")?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to save thumbnail: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn thumb(edge: u32, value: u8) -> Thumbnail {
        Thumbnail::new(edge, edge, vec![value; (edge * edge * 4) as usize])
    }

    #[test]
    fn test_cache_key_hash() {
        let uri = Uri::new("file:///a.jpg");
        assert_eq!(CacheKey::new(&uri, 10, 1024, 64), CacheKey::new(&uri, 10, 1024, 64));
        assert_ne!(CacheKey::new(&uri, 10, 1024, 64), CacheKey::new(&uri, 11, 1024, 64));
        assert_ne!(CacheKey::new(&uri, 10, 1024, 64), CacheKey::new(&uri, 10, 1024, 96));
    }

    #[test]
    fn test_disk_filename() {
        let key = CacheKey::new(&Uri::new("file:///a.jpg"), 1, 2, 3);
        let filename = key.disk_filename();
        assert!(filename.ends_with(".png"));
        assert_eq!(filename.len(), 20);
    }

    #[test]
    fn test_for_file_needs_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        assert!(CacheKey::for_file(&Uri::from_path(&path), 64).is_none());
        std::fs::write(&path, b"x").unwrap();
        assert!(CacheKey::for_file(&Uri::from_path(&path), 64).is_some());
        assert!(CacheKey::for_file(&Uri::new("content://x"), 64).is_none());
    }

    #[test]
    fn test_memory_limit_clamping() {
        assert_eq!(ThumbnailCache::in_memory(1).max_memory(), MIN_MEMORY_MB * 1024 * 1024);
        assert_eq!(ThumbnailCache::in_memory(4096).max_memory(), MAX_MEMORY_MB * 1024 * 1024);
        assert_eq!(ThumbnailCache::in_memory(100).max_memory(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_eviction_respects_budget() {
        let cache = ThumbnailCache::in_memory(MIN_MEMORY_MB);
        // 1 MiB each.
        for i in 0..(MIN_MEMORY_MB as u64 + 4) {
            let key = CacheKey::new(&Uri::new("file:///x"), 0, i, 512);
            cache.put(key, thumb(512, 1));
        }
        assert!(cache.memory_usage() <= cache.max_memory());
        assert_eq!(cache.memory_entry_count(), MIN_MEMORY_MB);

        let oldest = CacheKey::new(&Uri::new("file:///x"), 0, 0, 512);
        assert!(cache.get(&oldest).is_none());
    }

    #[test]
    fn test_disk_layer_survives_memory_clear() {
        let dir = tempdir().unwrap();
        let cache = ThumbnailCache::with_disk(dir.path().join("thumbs"), 16);
        let key = CacheKey::new(&Uri::new("file:///a.png"), 5, 5, 4);

        cache.put(key, thumb(4, 7));
        cache.clear_memory();
        assert_eq!(cache.memory_entry_count(), 0);

        let loaded = cache.get(&key).unwrap();
        assert_eq!((loaded.width, loaded.height), (4, 4));
        assert_eq!(loaded.rgba[0], 7);
        assert_eq!(cache.memory_entry_count(), 1);
    }
}
