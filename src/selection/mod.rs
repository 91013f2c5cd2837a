//! Selection state machine.
//!
//! - `SelectedItemCollection` - ordered, validated selection
//! - `validator` - pure acceptance rules shared by `add` and grid dimming

pub mod collection;
pub mod validator;

pub use collection::{CheckState, SelectedItemCollection, Toggled};
pub use validator::{is_acceptable, CollectionType, ValidationResult};
