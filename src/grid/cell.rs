use crate::capture::CaptureKind;
use crate::models::Item;
use crate::selection::CheckState;
use crate::thumbnails::{Thumbnail, Ticket};

/// Index of a recyclable view in the binder's pool.
pub type SlotId = usize;

/// What a grid position shows, resolved once per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Capture,
    Media,
}

/// Check badge of a media cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBadge {
    pub check: CheckState,
    /// False dims a cell whose item cannot currently be added.
    pub enabled: bool,
}

/// A recyclable view handle the binder drives.
pub trait CellView {
    fn show_capture(&mut self, kind: CaptureKind);
    /// Metadata overlays such as the GIF tag and video duration.
    fn show_media(&mut self, item: &Item);
    fn show_placeholder(&mut self);
    fn set_thumbnail(&mut self, thumbnail: &Thumbnail);
    fn set_badge(&mut self, badge: CellBadge);
    fn clear(&mut self);
}

/// What a slot is currently bound to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellBinding {
    #[default]
    Unbound,
    Capture {
        position: usize,
    },
    Media {
        position: usize,
        item: Item,
        badge: CellBadge,
        /// Thumbnail request still in flight.
        ticket: Option<Ticket>,
        /// Edge the current thumbnail was requested at.
        edge: u32,
    },
}

impl CellBinding {
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Unbound => None,
            Self::Capture { position } | Self::Media { position, .. } => Some(*position),
        }
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Media { item, .. } => Some(item),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<CellKind> {
        match self {
            Self::Unbound => None,
            Self::Capture { .. } => Some(CellKind::Capture),
            Self::Media { .. } => Some(CellKind::Media),
        }
    }
}

/// `MM:SS` below an hour, `H:MM:SS` above.
pub fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
