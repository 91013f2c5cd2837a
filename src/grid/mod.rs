//! Virtualized grid over the media source.
//!
//! - `GridBinder` - recycles a fixed pool of views across positions
//! - `CellSizer` - cached square cell edge
//! - `CellView` - what a recyclable view must support

pub mod binder;
pub mod cell;
pub mod sizing;

pub use binder::{GridBinder, GridEvent};
pub use cell::{format_duration, CellBadge, CellBinding, CellKind, CellView, SlotId};
pub use sizing::CellSizer;
