//! mediapick: a media picker core.
//!
//! Selection state machine, acceptance rules, a virtualized grid binder with
//! stale-safe thumbnail delivery, and the capture lifecycle, backed by a
//! SQLite media index filled from a directory scan.

pub mod capture;
pub mod error;
pub mod grid;
pub mod models;
pub mod scanner;
pub mod selection;
pub mod session;
pub mod source;
pub mod thumbnails;

pub use capture::{
    CaptureDirs, CaptureDispatcher, CaptureKind, CaptureOutcome, CaptureSession, CaptureTarget,
    DiscardPolicy,
};
pub use error::{CaptureError, FeedbackForm, SelectionError};
pub use grid::{CellBadge, CellKind, CellView, GridBinder, GridEvent};
pub use models::{Item, ItemId, MediaKind, MediaTypeMode, SelectionSpec, Uri};
pub use selection::{CheckState, SelectedItemCollection, ValidationResult};
pub use session::{Collaborators, Feedback, PickerSession};
pub use source::{MediaIndex, MediaLibrary, MediaSource, VecSource};
pub use thumbnails::{Thumbnail, ThumbnailEngine, ThumbnailLoader};
