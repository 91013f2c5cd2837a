//! Lifecycle of one external photo/video capture.
//!
//! `begin` names a timestamped target file and hands out its uri, the
//! capture app writes into it, then `commit` registers the result with the
//! media index or `discard` drops it. At most one capture is pending.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use directories::UserDirs;
use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::models::{Item, MediaKind, Uri};
use crate::source::MediaIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Photo,
    Video,
}

impl CaptureKind {
    fn file_prefix(self) -> &'static str {
        match self {
            Self::Photo => "JPEG",
            Self::Video => "MP4",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Photo => "jpeg",
            Self::Video => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Photo => "image/jpeg",
            Self::Video => "video/mp4",
        }
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            Self::Photo => MediaKind::Image,
            Self::Video => MediaKind::Video,
        }
    }
}

/// Kind-specific output directories.
#[derive(Debug, Clone)]
pub struct CaptureDirs {
    pub pictures: PathBuf,
    pub movies: PathBuf,
}

impl CaptureDirs {
    /// `Pictures/` and `Movies/` under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            pictures: root.join("Pictures"),
            movies: root.join("Movies"),
        }
    }

    /// The user's XDG pictures and videos directories.
    pub fn default_dirs() -> Result<Self> {
        let dirs = UserDirs::new().context("Failed to determine user directories")?;
        let home = dirs.home_dir().to_path_buf();
        Ok(Self {
            pictures: dirs
                .picture_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join("Pictures")),
            movies: dirs
                .video_dir()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join("Videos")),
        })
    }

    pub fn dir_for(&self, kind: CaptureKind) -> &Path {
        match kind {
            CaptureKind::Photo => &self.pictures,
            CaptureKind::Video => &self.movies,
        }
    }
}

/// The file a capture app is asked to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    pub temp_path: PathBuf,
    pub temp_uri: Uri,
    pub kind: CaptureKind,
}

/// What happens to the target file when a capture is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscardPolicy {
    #[default]
    Remove,
    Keep,
}

/// How the external capture app returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success,
    Canceled,
}

/// Launches the external capture app for a target.
///
/// Completion is reported later through `PickerSession::capture_finished`.
pub trait CaptureDispatcher {
    fn dispatch(&mut self, target: &CaptureTarget) -> Result<(), CaptureError>;
}

pub struct CaptureSession {
    dirs: CaptureDirs,
    policy: DiscardPolicy,
    pending: Option<CaptureTarget>,
}

impl CaptureSession {
    pub fn new(dirs: CaptureDirs) -> Self {
        Self {
            dirs,
            policy: DiscardPolicy::default(),
            pending: None,
        }
    }

    pub fn with_policy(mut self, policy: DiscardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn pending(&self) -> Option<&CaptureTarget> {
        self.pending.as_ref()
    }

    /// Allocates a new target. A capture still pending is discarded first.
    pub fn begin(&mut self, kind: CaptureKind) -> Result<CaptureTarget, CaptureError> {
        let dir = self.dirs.dir_for(kind);
        std::fs::create_dir_all(dir)
            .map_err(|e| CaptureError::StorageUnavailable(format!("{}: {}", dir.display(), e)))?;

        let temp_path = dir.join(capture_file_name(kind, Local::now()));
        let target = CaptureTarget {
            temp_uri: Uri::from_path(&temp_path),
            temp_path,
            kind,
        };

        if let Some(previous) = self.pending.take() {
            warn!(path = ?previous.temp_path, "Replacing capture that never returned");
            self.remove_output(&previous);
        }

        info!(path = ?target.temp_path, ?kind, "Capture started");
        self.pending = Some(target.clone());
        Ok(target)
    }

    /// Registers the written file and returns the item describing it.
    ///
    /// The item is not selected here; callers add it through the validator
    /// like any other item.
    pub fn commit<I>(&mut self, target: &CaptureTarget, index: &mut I) -> Result<Item, CaptureError>
    where
        I: MediaIndex + ?Sized,
    {
        if self.pending.as_ref() != Some(target) {
            return Err(CaptureError::NotPending(target.temp_path.clone()));
        }
        self.pending = None;

        let written = std::fs::metadata(&target.temp_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            self.remove_output(target);
            return Err(CaptureError::MissingOutput(target.temp_path.clone()));
        }

        let item = index
            .register(&target.temp_path, target.kind)
            .map_err(CaptureError::Index)?;
        info!(id = %item.id(), path = ?target.temp_path, "Capture committed");
        Ok(item)
    }

    /// Drops a cancelled capture according to the discard policy.
    pub fn discard(&mut self, target: &CaptureTarget) {
        if self.pending.as_ref() == Some(target) {
            self.pending = None;
        }
        match self.policy {
            DiscardPolicy::Remove => self.remove_output(target),
            DiscardPolicy::Keep => debug!(path = ?target.temp_path, "Keeping cancelled capture"),
        }
        debug!(path = ?target.temp_path, "Capture discarded");
    }

    fn remove_output(&self, target: &CaptureTarget) {
        match std::fs::remove_file(&target.temp_path) {
            Ok(()) => debug!(path = ?target.temp_path, "Removed capture output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?target.temp_path, error = ?e, "Failed to remove capture output"),
        }
    }
}

/// `JPEG_20260101_093000_.jpeg` / `MP4_20260101_093000_.mp4`.
fn capture_file_name(kind: CaptureKind, at: DateTime<Local>) -> String {
    format!(
        "{}_{}_.{}",
        kind.file_prefix(),
        at.format("%Y%m%d_%H%M%S"),
        kind.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MediaSource, VecSource};
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_file_names() {
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            capture_file_name(CaptureKind::Photo, at),
            "JPEG_20260307_090501_.jpeg"
        );
        assert_eq!(
            capture_file_name(CaptureKind::Video, at),
            "MP4_20260307_090501_.mp4"
        );
    }

    #[test]
    fn test_begin_uses_kind_directory() {
        let dir = tempdir().unwrap();
        let mut session = CaptureSession::new(CaptureDirs::under(dir.path()));

        let target = session.begin(CaptureKind::Video).unwrap();
        assert!(target.temp_path.starts_with(dir.path().join("Movies")));
        assert_eq!(target.temp_uri, Uri::from_path(&target.temp_path));
        assert_eq!(session.pending(), Some(&target));
        assert!(dir.path().join("Movies").is_dir());
    }

    #[test]
    fn test_storage_unavailable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut session = CaptureSession::new(CaptureDirs::under(&blocker));

        let err = session.begin(CaptureKind::Photo).unwrap_err();
        assert!(matches!(err, CaptureError::StorageUnavailable(_)));
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_commit_registers_written_file() {
        let dir = tempdir().unwrap();
        let mut session = CaptureSession::new(CaptureDirs::under(dir.path()));
        let mut index = VecSource::default();

        let target = session.begin(CaptureKind::Photo).unwrap();
        std::fs::write(&target.temp_path, b"jpeg-bytes").unwrap();

        let item = session.commit(&target, &mut index).unwrap();
        assert_eq!(item.uri(), &target.temp_uri);
        assert_eq!(item.mime_type(), "image/jpeg");
        assert_eq!(index.count(), 1);
        assert!(session.pending().is_none());

        // A second commit of the same target is refused.
        assert!(matches!(
            session.commit(&target, &mut index),
            Err(CaptureError::NotPending(_))
        ));
    }

    #[test]
    fn test_commit_without_output() {
        let dir = tempdir().unwrap();
        let mut session = CaptureSession::new(CaptureDirs::under(dir.path()));
        let mut index = VecSource::default();

        let target = session.begin(CaptureKind::Photo).unwrap();
        assert!(matches!(
            session.commit(&target, &mut index),
            Err(CaptureError::MissingOutput(_))
        ));
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn test_discard_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let mut session = CaptureSession::new(CaptureDirs::under(dir.path()));

        let target = session.begin(CaptureKind::Photo).unwrap();
        session.discard(&target);
        assert!(session.pending().is_none());

        let target = session.begin(CaptureKind::Photo).unwrap();
        std::fs::write(&target.temp_path, b"partial").unwrap();
        session.discard(&target);
        assert!(!target.temp_path.exists());
    }

    #[test]
    fn test_keep_policy_leaves_file() {
        let dir = tempdir().unwrap();
        let mut session =
            CaptureSession::new(CaptureDirs::under(dir.path())).with_policy(DiscardPolicy::Keep);

        let target = session.begin(CaptureKind::Video).unwrap();
        std::fs::write(&target.temp_path, b"frames").unwrap();
        session.discard(&target);
        assert!(target.temp_path.exists());
    }
}
