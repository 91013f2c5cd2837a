//! Thumbnail pipeline for the picker grid.
//!
//! This module provides:
//! - `ThumbnailEngine` - the seam the grid binder talks to
//! - `ThumbnailLoader` - worker pool implementation with ticket cancellation
//! - `ThumbnailCache` - memory LRU with an optional disk layer
//! - `decode` - square thumbnails from images, GIFs and video frames

pub mod cache;
pub mod decode;
pub mod loader;

use std::fmt;
use std::sync::Arc;

use crate::grid::SlotId;
use crate::models::Uri;

pub use cache::{CacheKey, ThumbnailCache};
pub use loader::{ThumbnailLoader, ThumbnailLoaderBuilder};

/// Token a slot remembers for its in-flight thumbnail.
///
/// Tickets are allocated by the binder, never reused within a session, and
/// echoed back unchanged in the matching `ThumbnailReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub ticket: Ticket,
    pub slot: SlotId,
    pub uri: Uri,
    /// Side of the square thumbnail in pixels.
    pub edge: u32,
}

/// Decoded RGBA8 pixels, shared between the cache and the views.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
}

impl Thumbnail {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba: Arc::new(rgba),
        }
    }

    pub fn memory_bytes(&self) -> usize {
        self.rgba.len()
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Completion of one request, successful or not.
#[derive(Debug, Clone)]
pub struct ThumbnailReady {
    pub ticket: Ticket,
    pub slot: SlotId,
    pub uri: Uri,
    pub result: Result<Thumbnail, String>,
}

/// Asynchronous thumbnail producer.
///
/// Results are only handed out by `poll`, so they always land on the
/// caller's thread. A cancelled ticket never shows up in `poll`.
pub trait ThumbnailEngine {
    fn request(&mut self, request: ThumbnailRequest);
    fn cancel(&mut self, ticket: Ticket);
    fn poll(&mut self) -> Vec<ThumbnailReady>;
}
