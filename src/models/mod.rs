pub mod item;
pub mod media_cursor;
pub mod media_store;
pub mod selection_spec;

pub use item::*;
pub use media_cursor::*;
pub use media_store::*;
pub use selection_spec::*;
