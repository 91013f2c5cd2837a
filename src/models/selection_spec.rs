//! Picker configuration.
//!
//! One `SelectionSpec` is built per picker session and handed to every
//! component that needs it. It can be assembled in code with the `with_*`
//! methods or loaded from a TOML file:
//!
//! ```toml
//! max_selectable = 9
//! media_type_mode = "images_only"
//! countable = true
//! capture = true
//!
//! [[constraints]]
//! kind = "max_size"
//! bytes = 10485760
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::capture::CaptureKind;
use crate::models::{Item, MediaKind};

/// Which media types the picker offers and accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaTypeMode {
    ImagesOnly,
    VideosOnly,
    #[default]
    Mixed,
}

impl MediaTypeMode {
    pub fn admits(self, kind: MediaKind) -> bool {
        match self {
            Self::ImagesOnly => kind == MediaKind::Image,
            Self::VideosOnly => kind == MediaKind::Video,
            Self::Mixed => true,
        }
    }

    /// What the capture cell records in this mode.
    pub fn capture_kind(self) -> CaptureKind {
        match self {
            Self::VideosOnly => CaptureKind::Video,
            Self::ImagesOnly | Self::Mixed => CaptureKind::Photo,
        }
    }
}

/// Engine-specific acceptance rule evaluated after the structural checks.
pub trait ItemFilter: Send + Sync + fmt::Debug {
    /// Kinds this filter inspects; other kinds pass untouched.
    fn applies_to(&self, _kind: MediaKind) -> bool {
        true
    }

    /// `Err` carries the user-facing reason.
    fn check(&self, item: &Item) -> Result<(), String>;
}

/// Built-in filters that can be expressed in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    MinDuration { ms: u64 },
    MaxDuration { ms: u64 },
    MaxSize { bytes: u64 },
}

impl ItemFilter for Constraint {
    fn applies_to(&self, kind: MediaKind) -> bool {
        match self {
            Self::MinDuration { .. } | Self::MaxDuration { .. } => kind == MediaKind::Video,
            Self::MaxSize { .. } => true,
        }
    }

    fn check(&self, item: &Item) -> Result<(), String> {
        match *self {
            Self::MinDuration { ms } if item.duration_ms() < ms => Err(format!(
                "Video must be at least {} seconds long",
                ms.div_ceil(1000)
            )),
            Self::MaxDuration { ms } if item.duration_ms() > ms => Err(format!(
                "Video must be at most {} seconds long",
                ms / 1000
            )),
            Self::MaxSize { bytes } if item.size_bytes() > bytes => Err(format!(
                "File must be smaller than {:.1} MB",
                bytes as f64 / (1024.0 * 1024.0)
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionSpec {
    /// Upper bound on the selection length.
    pub max_selectable: usize,
    /// Per-type bounds, applied in addition to `max_selectable`.
    pub max_image_selectable: Option<usize>,
    pub max_video_selectable: Option<usize>,
    pub media_type_mode: MediaTypeMode,
    /// In `Mixed` mode, lock the selection to the type of its first item.
    pub media_type_exclusive: bool,
    /// Badges show insertion numbers instead of a plain tick.
    pub countable: bool,
    /// Offer a capture cell at position 0.
    pub capture: bool,
    pub span_count: usize,
    /// When set, the column count follows the viewport width.
    pub grid_expected_size: Option<u32>,
    pub grid_spacing: u32,
    pub thumbnail_scale: f32,
    pub constraints: Vec<Constraint>,
    #[serde(skip)]
    pub filters: Vec<Arc<dyn ItemFilter>>,
}

impl Default for SelectionSpec {
    fn default() -> Self {
        Self {
            max_selectable: 1,
            max_image_selectable: None,
            max_video_selectable: None,
            media_type_mode: MediaTypeMode::Mixed,
            media_type_exclusive: true,
            countable: false,
            capture: false,
            span_count: 3,
            grid_expected_size: None,
            grid_spacing: 4,
            thumbnail_scale: 0.5,
            constraints: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl SelectionSpec {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let spec: Self = toml::from_str(text).context("Failed to parse selection config")?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selection config: {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid selection config: {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_selectable == 0 {
            bail!("max_selectable must be at least 1");
        }
        if self.span_count == 0 {
            bail!("span_count must be at least 1");
        }
        if !(self.thumbnail_scale > 0.0 && self.thumbnail_scale <= 1.0) {
            bail!(
                "thumbnail_scale must be in (0, 1], got {}",
                self.thumbnail_scale
            );
        }
        if self.grid_expected_size == Some(0) {
            bail!("grid_expected_size must be positive");
        }
        Ok(())
    }

    pub fn with_max_selectable(mut self, max: usize) -> Self {
        self.max_selectable = max;
        self
    }

    pub fn with_type_limits(mut self, images: Option<usize>, videos: Option<usize>) -> Self {
        self.max_image_selectable = images;
        self.max_video_selectable = videos;
        self
    }

    pub fn with_mode(mut self, mode: MediaTypeMode) -> Self {
        self.media_type_mode = mode;
        self
    }

    pub fn with_exclusive_types(mut self, exclusive: bool) -> Self {
        self.media_type_exclusive = exclusive;
        self
    }

    pub fn with_countable(mut self, countable: bool) -> Self {
        self.countable = countable;
        self
    }

    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_span_count(mut self, span_count: usize) -> Self {
        self.span_count = span_count;
        self
    }

    pub fn with_grid_expected_size(mut self, size: u32) -> Self {
        self.grid_expected_size = Some(size);
        self
    }

    pub fn with_grid_spacing(mut self, spacing: u32) -> Self {
        self.grid_spacing = spacing;
        self
    }

    pub fn with_thumbnail_scale(mut self, scale: f32) -> Self {
        self.thumbnail_scale = scale;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ItemFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Limit that applies to one kind, if any.
    pub fn max_for(&self, kind: MediaKind) -> Option<usize> {
        match kind {
            MediaKind::Image => self.max_image_selectable,
            MediaKind::Video => self.max_video_selectable,
        }
    }

    /// Config constraints first, then code-supplied filters.
    pub fn item_filters(&self) -> impl Iterator<Item = &dyn ItemFilter> + '_ {
        self.constraints
            .iter()
            .map(|c| c as &dyn ItemFilter)
            .chain(self.filters.iter().map(|f| f.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemId, Uri};

    fn video(duration_ms: u64, size: u64) -> Item {
        Item::new(ItemId(1), "video/mp4", size, duration_ms, Uri::new("file:///v.mp4"))
    }

    #[test]
    fn test_defaults_are_valid() {
        let spec = SelectionSpec::default();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.max_selectable, 1);
        assert_eq!(spec.media_type_mode, MediaTypeMode::Mixed);
    }

    #[test]
    fn test_parse_toml() {
        let spec = SelectionSpec::from_toml_str(
            r#"
            max_selectable = 9
            media_type_mode = "videos_only"
            countable = true
            capture = true

            [[constraints]]
            kind = "min_duration"
            ms = 3000

            [[constraints]]
            kind = "max_size"
            bytes = 1048576
            "#,
        )
        .unwrap();

        assert_eq!(spec.max_selectable, 9);
        assert_eq!(spec.media_type_mode, MediaTypeMode::VideosOnly);
        assert!(spec.countable);
        assert!(spec.capture);
        assert_eq!(spec.span_count, 3);
        assert_eq!(
            spec.constraints,
            vec![
                Constraint::MinDuration { ms: 3000 },
                Constraint::MaxSize { bytes: 1048576 }
            ]
        );
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(SelectionSpec::from_toml_str("max_selectable = 0").is_err());
        assert!(SelectionSpec::from_toml_str("thumbnail_scale = 1.5").is_err());
        assert!(SelectionSpec::from_toml_str("media_type_mode = \"audio\"").is_err());
    }

    #[test]
    fn test_duration_constraints_only_touch_videos() {
        let min = Constraint::MinDuration { ms: 3000 };
        assert!(!min.applies_to(MediaKind::Image));
        assert!(min.applies_to(MediaKind::Video));
        assert!(min.check(&video(2999, 0)).is_err());
        assert!(min.check(&video(3000, 0)).is_ok());

        let max = Constraint::MaxDuration { ms: 10_000 };
        assert!(max.check(&video(10_001, 0)).is_err());
        assert!(max.check(&video(10_000, 0)).is_ok());
    }

    #[test]
    fn test_size_constraint() {
        let max = Constraint::MaxSize { bytes: 100 };
        assert!(max.applies_to(MediaKind::Image));
        assert!(max.check(&video(0, 101)).is_err());
        assert!(max.check(&video(0, 100)).is_ok());
    }

    #[test]
    fn test_capture_kind_follows_mode() {
        assert_eq!(MediaTypeMode::VideosOnly.capture_kind(), CaptureKind::Video);
        assert_eq!(MediaTypeMode::ImagesOnly.capture_kind(), CaptureKind::Photo);
        assert_eq!(MediaTypeMode::Mixed.capture_kind(), CaptureKind::Photo);
    }
}
