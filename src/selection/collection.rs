use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::validator::{self, CollectionType, ValidationResult};
use crate::error::SelectionError;
use crate::models::{Item, ItemId, MediaKind, SelectionSpec, Uri};

/// Badge state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    /// 1-based insertion position, shown when the selection is countable.
    Numbered(usize),
    /// Selected, shown as a plain tick.
    Checked,
}

impl CheckState {
    pub fn is_checked(self) -> bool {
        !matches!(self, Self::Unchecked)
    }
}

/// What a successful toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    /// Appended; carries the new check-number.
    Added(usize),
    Removed,
}

/// The ordered selection of one picker session.
///
/// Insertion order is check-number order. The collection is the single
/// writer of its state: every mutation goes through `add`, `remove`,
/// `toggle`, `clear` or `overwrite`, and `add` runs the validator itself so
/// no caller-side check can go stale before the append.
#[derive(Debug, Clone)]
pub struct SelectedItemCollection {
    spec: Arc<SelectionSpec>,
    items: Vec<Item>,
    ids: HashSet<ItemId>,
}

impl SelectedItemCollection {
    pub fn new(spec: Arc<SelectionSpec>) -> Self {
        Self {
            spec,
            items: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn spec(&self) -> &SelectionSpec {
        &self.spec
    }

    pub fn is_selected(&self, item: &Item) -> bool {
        self.ids.contains(&item.id())
    }

    /// 1-based position in insertion order, `None` when unselected.
    pub fn checked_num_of(&self, item: &Item) -> Option<usize> {
        if !self.is_selected(item) {
            return None;
        }
        self.items.iter().position(|i| i == item).map(|p| p + 1)
    }

    pub fn check_state_of(&self, item: &Item) -> CheckState {
        match self.checked_num_of(item) {
            None => CheckState::Unchecked,
            Some(n) if self.spec.countable => CheckState::Numbered(n),
            Some(_) => CheckState::Checked,
        }
    }

    pub fn is_acceptable(&self, item: &Item) -> ValidationResult {
        validator::is_acceptable(item, &self.items, &self.spec)
    }

    pub fn add(&mut self, item: Item) -> Result<usize, SelectionError> {
        if self.is_selected(&item) {
            return Err(SelectionError::AlreadySelected(item.id()));
        }
        self.is_acceptable(&item).into_result()?;

        self.ids.insert(item.id());
        self.items.push(item);
        let number = self.items.len();
        debug!(number, max = self.spec.max_selectable, "Item selected");
        Ok(number)
    }

    /// Returns whether the item was present.
    pub fn remove(&mut self, item: &Item) -> bool {
        if !self.ids.remove(&item.id()) {
            return false;
        }
        self.items.retain(|i| i != item);
        debug!(id = %item.id(), remaining = self.items.len(), "Item deselected");
        true
    }

    pub fn toggle(&mut self, item: &Item) -> Result<Toggled, SelectionError> {
        if self.remove(item) {
            Ok(Toggled::Removed)
        } else {
            self.add(item.clone()).map(Toggled::Added)
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
    }

    /// Replaces the selection, keeping only items the validator accepts in
    /// order. Returns the rejected items with their causes.
    pub fn overwrite(&mut self, items: Vec<Item>) -> Vec<(Item, SelectionError)> {
        self.clear();
        let mut rejected = Vec::new();
        for item in items {
            if let Err(cause) = self.add(item.clone()) {
                rejected.push((item, cause));
            }
        }
        rejected
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    pub fn uris(&self) -> Vec<Uri> {
        self.items.iter().map(|i| i.uri().clone()).collect()
    }

    /// Local paths of the selected items; non-`file://` uris are skipped.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter_map(|i| i.uri().to_file_path())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_selectable_reached(&self) -> bool {
        self.items.len() >= self.spec.max_selectable
    }

    pub fn collection_type(&self) -> CollectionType {
        CollectionType::of(&self.items)
    }

    pub fn count_of(&self, kind: MediaKind) -> usize {
        self.items
            .iter()
            .filter(|i| i.kind() == Some(kind))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaTypeMode;

    fn image(id: i64) -> Item {
        Item::new(ItemId(id), "image/jpeg", 100, 0, Uri::new(format!("file:///{id}.jpg")))
    }

    fn video(id: i64) -> Item {
        Item::new(ItemId(id), "video/mp4", 100, 4000, Uri::new(format!("file:///{id}.mp4")))
    }

    fn collection(spec: SelectionSpec) -> SelectedItemCollection {
        SelectedItemCollection::new(Arc::new(spec))
    }

    #[test]
    fn test_renumbering_after_remove() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(9));
        let (a, b, c) = (image(1), image(2), image(3));
        selection.add(a.clone()).unwrap();
        selection.add(b.clone()).unwrap();
        selection.add(c.clone()).unwrap();

        assert!(selection.remove(&b));
        assert_eq!(selection.checked_num_of(&a), Some(1));
        assert_eq!(selection.checked_num_of(&c), Some(2));
        assert_eq!(selection.checked_num_of(&b), None);
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(9));
        for id in 1..=3 {
            selection.add(image(id)).unwrap();
        }
        let before: Vec<ItemId> = selection.items().iter().map(|i| i.id()).collect();

        let x = image(2);
        assert_eq!(selection.toggle(&x), Ok(Toggled::Removed));
        assert_eq!(selection.toggle(&x), Ok(Toggled::Added(3)));
        assert_eq!(selection.toggle(&x), Ok(Toggled::Removed));

        let y = image(7);
        assert_eq!(selection.toggle(&y), Ok(Toggled::Added(3)));
        assert_eq!(selection.toggle(&y), Ok(Toggled::Removed));

        let after: Vec<ItemId> = selection.items().iter().map(|i| i.id()).collect();
        assert_eq!(after, vec![before[0], before[2]]);
    }

    #[test]
    fn test_toggle_of_unselected_then_back_is_identity() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(9));
        selection.add(image(1)).unwrap();
        selection.add(image(2)).unwrap();
        let before: Vec<ItemId> = selection.items().iter().map(|i| i.id()).collect();

        let x = image(5);
        selection.toggle(&x).unwrap();
        selection.toggle(&x).unwrap();

        let after: Vec<ItemId> = selection.items().iter().map(|i| i.id()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(1));
        selection.add(image(1)).unwrap();
        // Duplicate is reported as such even though the selection is also full.
        assert_eq!(
            selection.add(image(1)),
            Err(SelectionError::AlreadySelected(ItemId(1)))
        );
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_capacity_reported_before_type_conflict() {
        let mut selection = collection(
            SelectionSpec::default()
                .with_max_selectable(1)
                .with_mode(MediaTypeMode::ImagesOnly),
        );
        selection.add(image(1)).unwrap();
        assert_eq!(
            selection.toggle(&video(2)),
            Err(SelectionError::CapacityExceeded { max: 1 })
        );
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_rejected_add_leaves_state_untouched() {
        let mut selection = collection(
            SelectionSpec::default()
                .with_max_selectable(3)
                .with_mode(MediaTypeMode::VideosOnly),
        );
        selection.add(video(1)).unwrap();
        assert_eq!(selection.add(image(2)), Err(SelectionError::TypeConflict));
        assert_eq!(selection.items(), &[video(1)]);
        assert!(!selection.is_selected(&image(2)));
    }

    #[test]
    fn test_check_state_respects_countable() {
        let item = image(1);
        let mut counted = collection(
            SelectionSpec::default()
                .with_max_selectable(2)
                .with_countable(true),
        );
        assert_eq!(counted.check_state_of(&item), CheckState::Unchecked);
        counted.add(item.clone()).unwrap();
        assert_eq!(counted.check_state_of(&item), CheckState::Numbered(1));

        let mut ticked = collection(SelectionSpec::default().with_max_selectable(2));
        ticked.add(item.clone()).unwrap();
        assert_eq!(ticked.check_state_of(&item), CheckState::Checked);
    }

    #[test]
    fn test_overwrite_validates_each_item() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(2));
        let rejected = selection.overwrite(vec![image(1), image(1), video(2), image(3), image(4)]);

        assert_eq!(selection.items(), &[image(1), image(3)]);
        let causes: Vec<SelectionError> = rejected.into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            causes,
            vec![
                SelectionError::AlreadySelected(ItemId(1)),
                SelectionError::TypeConflict,
                SelectionError::CapacityExceeded { max: 2 },
            ]
        );
    }

    #[test]
    fn test_random_sequences_keep_invariants() {
        let spec = SelectionSpec::default()
            .with_max_selectable(4)
            .with_exclusive_types(false)
            .with_type_limits(None, Some(2));
        let mut selection = collection(spec);
        let pool: Vec<Item> = (0..12)
            .map(|i| if i % 3 == 0 { video(i) } else { image(i) })
            .collect();

        // Small LCG so the sequence is reproducible.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let item = &pool[(seed >> 33) as usize % pool.len()];
            match (seed >> 20) % 3 {
                0 => {
                    let _ = selection.add(item.clone());
                }
                1 => {
                    selection.remove(item);
                }
                _ => {
                    let _ = selection.toggle(item);
                }
            }

            assert!(selection.len() <= 4);
            assert!(selection.count_of(MediaKind::Video) <= 2);
            let unique: HashSet<ItemId> = selection.items().iter().map(|i| i.id()).collect();
            assert_eq!(unique.len(), selection.len());
            for (index, selected) in selection.items().iter().enumerate() {
                assert_eq!(selection.checked_num_of(selected), Some(index + 1));
            }
        }
    }

    #[test]
    fn test_uris_in_selection_order() {
        let mut selection = collection(SelectionSpec::default().with_max_selectable(3));
        selection.add(image(2)).unwrap();
        selection.add(image(1)).unwrap();
        assert_eq!(
            selection.uris(),
            vec![Uri::new("file:///2.jpg"), Uri::new("file:///1.jpg")]
        );
        assert_eq!(
            selection.paths(),
            vec![PathBuf::from("/2.jpg"), PathBuf::from("/1.jpg")]
        );
        assert!(!selection.max_selectable_reached());
        assert_eq!(selection.collection_type(), CollectionType::Image);
    }
}
