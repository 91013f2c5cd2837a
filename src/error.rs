//! Error taxonomy for selection and capture.
//!
//! Every variant here is recoverable by the user: it is reported to the
//! feedback collaborator and leaves selection and cell state untouched.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ItemId;

/// How a rejection is meant to be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackForm {
    /// Short transient message.
    Toast,
    /// Modal message that needs acknowledging.
    Dialog,
    /// Nothing visible.
    None,
}

/// Why an item could not be added to the selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("You can only select up to {max} media files")]
    CapacityExceeded { max: usize },
    #[error("Can't select images and videos at the same time")]
    TypeConflict,
    #[error("Item {0} is already selected")]
    AlreadySelected(ItemId),
    #[error("{0}")]
    ConstraintViolation(String),
}

impl SelectionError {
    pub fn form(&self) -> FeedbackForm {
        match self {
            Self::CapacityExceeded { .. } => FeedbackForm::Dialog,
            Self::TypeConflict | Self::ConstraintViolation(_) => FeedbackForm::Toast,
            Self::AlreadySelected(_) => FeedbackForm::None,
        }
    }
}

/// Failures while starting or finishing an external capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Capture produced no output at {0:?}")]
    MissingOutput(PathBuf),
    #[error("No pending capture for {0:?}")]
    NotPending(PathBuf),
    #[error("Capture app could not be launched: {0}")]
    DispatchFailed(String),
    #[error("Failed to register capture with the media index: {0:#}")]
    Index(anyhow::Error),
}

impl CaptureError {
    pub fn form(&self) -> FeedbackForm {
        match self {
            Self::StorageUnavailable(_) | Self::DispatchFailed(_) => FeedbackForm::Dialog,
            _ => FeedbackForm::Toast,
        }
    }
}
