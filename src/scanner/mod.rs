//! Directory scanning into the media index.

pub mod file_scanner;
pub mod metadata;

pub use file_scanner::{FileScanner, ScanConfig, ScanResult};
pub use metadata::{mime_for_path, probe_duration_ms};
