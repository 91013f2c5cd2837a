//! File scanner that fills the media index from a directory tree.
//!
//! This module provides the `FileScanner` struct which handles:
//! - Recursive directory scanning using walkdir
//! - Media type detection by file extension
//! - Cache-aware scanning (skip unchanged files based on mtime and size)
//! - Batched SQLite writes
//! - Optional pruning of records whose files disappeared

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tokio::task;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use super::metadata::{mime_for_path, probe_duration_ms};
use crate::models::{MediaKind, MediaRecord, MediaStore};

/// Configuration for the file scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to scan directories recursively.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    /// Number of records to batch before writing to the database.
    pub batch_size: usize,
    pub follow_symlinks: bool,
    /// Delete records whose files were not seen by this scan.
    pub prune_missing: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0,
            batch_size: 100,
            follow_symlinks: false,
            prune_missing: false,
        }
    }
}

/// Statistics of a completed scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub total_files: usize,
    /// Newly added or changed records.
    pub new_items: usize,
    /// Records left untouched because the file did not change.
    pub cached_items: usize,
    pub pruned_items: usize,
}

pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scans `dir` on the blocking pool and hands the store back.
    pub async fn scan_directory(
        &self,
        dir: &Path,
        mut store: MediaStore,
    ) -> Result<(MediaStore, ScanResult)> {
        let dir = dir.to_path_buf();
        let config = self.config.clone();

        let result = task::spawn_blocking(move || {
            Self::scan_directory_sync(&dir, &config, &mut store).map(|r| (store, r))
        })
        .await
        .context("Scan task panicked")??;

        Ok(result)
    }

    pub fn scan_directory_sync(
        dir: &Path,
        config: &ScanConfig,
        store: &mut MediaStore,
    ) -> Result<ScanResult> {
        info!("Starting scan of {:?}", dir);
        let scan_time = MediaStore::now();

        let cache_map = store.get_cache_map()?;
        debug!("Loaded {} cached entries", cache_map.len());

        let discovered = Self::discover_files(dir, config)?;
        info!("Discovered {} media files", discovered.len());

        let mut batch = Vec::with_capacity(config.batch_size);
        let mut result = ScanResult {
            total_files: discovered.len(),
            ..Default::default()
        };

        for entry in &discovered {
            if is_unchanged(entry, &cache_map) {
                trace!("Cache hit for {:?}", entry.path);
                result.cached_items += 1;
                continue;
            }

            batch.push(Self::record_for(entry, scan_time));
            result.new_items += 1;
            if batch.len() >= config.batch_size {
                store.upsert_media_batch(&batch)?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            store.upsert_media_batch(&batch)?;
        }

        let paths: Vec<PathBuf> = discovered.into_iter().map(|e| e.path).collect();
        store.touch_last_seen(&paths, scan_time)?;

        if config.prune_missing {
            result.pruned_items = store.delete_stale(scan_time)?.len();
        }

        info!(
            "Scan complete: {} total, {} new, {} cached, {} pruned",
            result.total_files, result.new_items, result.cached_items, result.pruned_items
        );

        Ok(result)
    }

    fn discover_files(dir: &Path, config: &ScanConfig) -> Result<Vec<DiscoveredEntry>> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {:?}", dir);
        }

        let mut walker = WalkDir::new(dir).follow_links(config.follow_symlinks);
        if !config.recursive {
            walker = walker.max_depth(1);
        } else if config.max_depth > 0 {
            walker = walker.max_depth(config.max_depth);
        }

        let mut entries = Vec::new();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let Some(mime_type) = mime_for_path(path) else {
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to read metadata for {:?}: {}", path, e);
                    continue;
                }
            };

            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            entries.push(DiscoveredEntry {
                path: path.to_path_buf(),
                mime_type,
                mtime,
                size: metadata.len() as i64,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn record_for(entry: &DiscoveredEntry, scan_time: i64) -> MediaRecord {
        let duration_ms = match MediaKind::from_mime(entry.mime_type) {
            Some(MediaKind::Video) => probe_duration_ms(&entry.path).unwrap_or(0),
            _ => 0,
        };
        MediaRecord {
            path: entry.path.clone(),
            mime_type: entry.mime_type.to_string(),
            size: entry.size,
            duration_ms: duration_ms as i64,
            date_added: entry.mtime,
            last_seen: scan_time,
        }
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct DiscoveredEntry {
    path: PathBuf,
    mime_type: &'static str,
    mtime: i64,
    size: i64,
}

fn is_unchanged(entry: &DiscoveredEntry, cache_map: &HashMap<PathBuf, (i64, i64)>) -> bool {
    cache_map.get(&entry.path) == Some(&(entry.mtime, entry.size))
}
