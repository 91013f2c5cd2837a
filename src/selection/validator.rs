//! Acceptance rules for adding an item to the selection.
//!
//! Checks run in a fixed order and the first violation wins, so the same
//! state always yields the same cause: capacity, then type, then filters.

use crate::error::SelectionError;
use crate::models::{Item, MediaKind, MediaTypeMode, SelectionSpec};

/// Outcome of an acceptance query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    Rejected(SelectionError),
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn cause(&self) -> Option<&SelectionError> {
        match self {
            Self::Accepted => None,
            Self::Rejected(cause) => Some(cause),
        }
    }

    pub fn into_result(self) -> Result<(), SelectionError> {
        match self {
            Self::Accepted => Ok(()),
            Self::Rejected(cause) => Err(cause),
        }
    }
}

/// What the current selection holds, by media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Undefined,
    Image,
    Video,
    Mixed,
}

impl CollectionType {
    pub fn of(items: &[Item]) -> Self {
        let (images, videos) = count_kinds(items);
        match (images > 0, videos > 0) {
            (false, false) => Self::Undefined,
            (true, false) => Self::Image,
            (false, true) => Self::Video,
            (true, true) => Self::Mixed,
        }
    }
}

/// Decides whether `candidate` may join `selected` under `spec`.
///
/// Pure: callers can use it to dim cells without committing anything.
pub fn is_acceptable(candidate: &Item, selected: &[Item], spec: &SelectionSpec) -> ValidationResult {
    match check(candidate, selected, spec) {
        Ok(()) => ValidationResult::Accepted,
        Err(cause) => ValidationResult::Rejected(cause),
    }
}

fn check(candidate: &Item, selected: &[Item], spec: &SelectionSpec) -> Result<(), SelectionError> {
    check_capacity(candidate, selected, spec)?;

    let Some(kind) = candidate.kind() else {
        return Err(SelectionError::ConstraintViolation(format!(
            "Unsupported media type: {}",
            if candidate.is_capture() {
                "capture cell"
            } else {
                candidate.mime_type()
            }
        )));
    };

    check_type(kind, selected, spec)?;
    check_filters(kind, candidate, spec)
}

fn check_capacity(
    candidate: &Item,
    selected: &[Item],
    spec: &SelectionSpec,
) -> Result<(), SelectionError> {
    if selected.len() >= spec.max_selectable {
        return Err(SelectionError::CapacityExceeded {
            max: spec.max_selectable,
        });
    }

    if let Some(kind) = candidate.kind() {
        if let Some(max) = spec.max_for(kind) {
            let (images, videos) = count_kinds(selected);
            let held = match kind {
                MediaKind::Image => images,
                MediaKind::Video => videos,
            };
            if held >= max {
                return Err(SelectionError::CapacityExceeded { max });
            }
        }
    }

    Ok(())
}

fn check_type(kind: MediaKind, selected: &[Item], spec: &SelectionSpec) -> Result<(), SelectionError> {
    if !spec.media_type_mode.admits(kind) {
        return Err(SelectionError::TypeConflict);
    }

    if spec.media_type_mode == MediaTypeMode::Mixed && spec.media_type_exclusive {
        let conflict = match CollectionType::of(selected) {
            CollectionType::Undefined => false,
            CollectionType::Image => kind == MediaKind::Video,
            CollectionType::Video => kind == MediaKind::Image,
            CollectionType::Mixed => true,
        };
        if conflict {
            return Err(SelectionError::TypeConflict);
        }
    }

    Ok(())
}

fn check_filters(kind: MediaKind, candidate: &Item, spec: &SelectionSpec) -> Result<(), SelectionError> {
    for filter in spec.item_filters() {
        if !filter.applies_to(kind) {
            continue;
        }
        filter
            .check(candidate)
            .map_err(SelectionError::ConstraintViolation)?;
    }
    Ok(())
}

fn count_kinds(items: &[Item]) -> (usize, usize) {
    items
        .iter()
        .fold((0, 0), |(images, videos), item| match item.kind() {
            Some(MediaKind::Image) => (images + 1, videos),
            Some(MediaKind::Video) => (images, videos + 1),
            None => (images, videos),
        })
}
