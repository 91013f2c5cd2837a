//! One picker session: selection, grid and capture wired together.
//!
//! The session is the single writer of the selection. Grid taps arrive over
//! the binder's event channel and thumbnails through the engine; both are
//! drained by `pump` on the caller's thread.

use std::sync::Arc;

use anyhow::Result;
use flume::Receiver;
use tracing::{debug, info, warn};

use crate::capture::{CaptureDirs, CaptureDispatcher, CaptureOutcome, CaptureSession, DiscardPolicy};
use crate::error::{CaptureError, SelectionError};
use crate::grid::{CellView, GridBinder, GridEvent};
use crate::models::{Item, SelectionSpec};
use crate::selection::{SelectedItemCollection, Toggled};
use crate::source::MediaLibrary;
use crate::thumbnails::ThumbnailEngine;

/// User-facing notifications.
pub trait Feedback {
    /// Called exactly once per rejected add.
    fn report(&mut self, cause: &SelectionError);
    fn capture_failed(&mut self, error: &CaptureError);
    fn selection_changed(&mut self, _count: usize, _max: usize) {}
}

/// Everything a session needs besides its configuration.
pub struct Collaborators<V: CellView> {
    pub views: Vec<V>,
    pub engine: Box<dyn ThumbnailEngine>,
    pub library: Box<dyn MediaLibrary>,
    pub feedback: Box<dyn Feedback>,
    pub dispatcher: Box<dyn CaptureDispatcher>,
    pub capture_dirs: CaptureDirs,
    pub discard_policy: DiscardPolicy,
}

pub struct PickerSession<V: CellView> {
    spec: Arc<SelectionSpec>,
    selection: SelectedItemCollection,
    grid: GridBinder<V>,
    events: Receiver<GridEvent>,
    capture: CaptureSession,
    library: Box<dyn MediaLibrary>,
    feedback: Box<dyn Feedback>,
    dispatcher: Box<dyn CaptureDispatcher>,
}

impl<V: CellView> PickerSession<V> {
    /// Fails when `spec` does not pass `SelectionSpec::validate`.
    pub fn new(spec: SelectionSpec, parts: Collaborators<V>) -> Result<Self> {
        spec.validate()?;
        let spec = Arc::new(spec);
        let (grid, events) = GridBinder::new(Arc::clone(&spec), parts.views, parts.engine);
        info!(
            max = spec.max_selectable,
            mode = ?spec.media_type_mode,
            capture = spec.capture,
            "Picker session started"
        );
        Ok(Self {
            selection: SelectedItemCollection::new(Arc::clone(&spec)),
            spec,
            grid,
            events,
            capture: CaptureSession::new(parts.capture_dirs).with_policy(parts.discard_policy),
            library: parts.library,
            feedback: parts.feedback,
            dispatcher: parts.dispatcher,
        })
    }

    pub fn spec(&self) -> &SelectionSpec {
        &self.spec
    }

    pub fn selection(&self) -> &SelectedItemCollection {
        &self.selection
    }

    pub fn grid(&self) -> &GridBinder<V> {
        &self.grid
    }

    pub fn library(&self) -> &dyn MediaLibrary {
        self.library.as_ref()
    }

    /// Restores a saved selection. Items no longer acceptable are dropped and
    /// returned with their causes.
    pub fn restore_selection(&mut self, items: Vec<Item>) -> Vec<(Item, SelectionError)> {
        let rejected = self.selection.overwrite(items);
        if !rejected.is_empty() {
            warn!(dropped = rejected.len(), "Saved selection partly rejected");
        }
        self.grid.refresh_check_states(&self.selection);
        rejected
    }

    pub fn scroll_to(&mut self, first: usize, visible: usize) {
        self.grid
            .scroll_to(first, visible, self.library.as_ref(), &self.selection);
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.grid.set_viewport_width(width);
    }

    pub fn set_columns(&mut self, columns: u32) {
        self.grid.set_columns(columns);
    }

    /// Queues a tap; it takes effect on the next `pump`.
    pub fn tap(&self, slot: usize) {
        self.grid.tap(slot);
    }

    /// Drains grid events, then thumbnail results. Returns the number of
    /// events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        self.grid.pump_thumbnails();
        handled
    }

    fn handle_event(&mut self, event: GridEvent) {
        match event {
            GridEvent::MediaTapped { slot, item } => match self.selection.toggle(&item) {
                Ok(toggled) => {
                    debug!(slot, id = %item.id(), ?toggled, "Selection toggled");
                    self.selection_updated();
                }
                Err(cause) => {
                    debug!(slot, id = %item.id(), %cause, "Selection rejected");
                    self.feedback.report(&cause);
                }
            },
            GridEvent::CaptureTapped { slot } => {
                debug!(slot, "Capture requested");
                self.start_capture();
            }
        }
    }

    fn selection_updated(&mut self) {
        self.grid.refresh_check_states(&self.selection);
        self.feedback
            .selection_changed(self.selection.len(), self.spec.max_selectable);
    }

    fn start_capture(&mut self) {
        let kind = self.spec.media_type_mode.capture_kind();
        let target = match self.capture.begin(kind) {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Capture could not start");
                self.feedback.capture_failed(&e);
                return;
            }
        };
        if let Err(e) = self.dispatcher.dispatch(&target) {
            warn!(error = %e, "Capture app could not be launched");
            self.capture.discard(&target);
            self.feedback.capture_failed(&e);
        }
    }

    /// Completes the pending capture.
    ///
    /// On success the file is registered, the grid rebinds and the new item
    /// goes through the validator like a tap would. Returns the registered
    /// item, selected or not.
    pub fn capture_finished(&mut self, outcome: CaptureOutcome) -> Option<Item> {
        let Some(target) = self.capture.pending().cloned() else {
            warn!(?outcome, "Capture result without a pending capture");
            return None;
        };

        if outcome == CaptureOutcome::Canceled {
            self.capture.discard(&target);
            return None;
        }

        let item = match self.capture.commit(&target, self.library.as_mut()) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "Capture could not be committed");
                self.feedback.capture_failed(&e);
                return None;
            }
        };

        if let Err(e) = self.library.refresh() {
            warn!(error = ?e, "Failed to refresh media library after capture");
        }
        self.grid
            .notify_data_changed(self.library.as_ref(), &self.selection);

        match self.selection.add(item.clone()) {
            Ok(number) => {
                debug!(id = %item.id(), number, "Captured item selected");
                self.selection_updated();
            }
            Err(cause) => {
                debug!(id = %item.id(), %cause, "Captured item rejected");
                self.feedback.report(&cause);
            }
        }
        Some(item)
    }

    /// Ends the session and returns the selection in check-number order.
    pub fn finish(mut self) -> Vec<Item> {
        if let Some(target) = self.capture.pending().cloned() {
            self.capture.discard(&target);
        }
        drop(self.grid.teardown());
        info!(selected = self.selection.len(), "Picker session finished");
        self.selection.into_items()
    }

    /// Toggles directly, bypassing the grid. Used by restoring front ends.
    pub fn toggle(&mut self, item: &Item) -> Result<Toggled, SelectionError> {
        let result = self.selection.toggle(item);
        match &result {
            Ok(_) => self.selection_updated(),
            Err(cause) => self.feedback.report(cause),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureKind, CaptureTarget};
    use crate::grid::CellBadge;
    use crate::models::{ItemId, Uri};
    use crate::source::VecSource;
    use crate::thumbnails::{Thumbnail, ThumbnailReady, ThumbnailRequest, Ticket};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct NullView;

    impl CellView for NullView {
        fn show_capture(&mut self, _kind: CaptureKind) {}
        fn show_media(&mut self, _item: &Item) {}
        fn show_placeholder(&mut self) {}
        fn set_thumbnail(&mut self, _thumbnail: &Thumbnail) {}
        fn set_badge(&mut self, _badge: CellBadge) {}
        fn clear(&mut self) {}
    }

    struct NullEngine;

    impl ThumbnailEngine for NullEngine {
        fn request(&mut self, _request: ThumbnailRequest) {}
        fn cancel(&mut self, _ticket: Ticket) {}
        fn poll(&mut self) -> Vec<ThumbnailReady> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct Log {
        reports: Vec<SelectionError>,
        capture_failures: Vec<String>,
        counts: Vec<usize>,
        dispatched: Vec<CaptureTarget>,
    }

    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Log>>);

    impl Feedback for Shared {
        fn report(&mut self, cause: &SelectionError) {
            self.0.borrow_mut().reports.push(cause.clone());
        }
        fn capture_failed(&mut self, error: &CaptureError) {
            self.0.borrow_mut().capture_failures.push(error.to_string());
        }
        fn selection_changed(&mut self, count: usize, _max: usize) {
            self.0.borrow_mut().counts.push(count);
        }
    }

    impl CaptureDispatcher for Shared {
        fn dispatch(&mut self, target: &CaptureTarget) -> Result<(), CaptureError> {
            self.0.borrow_mut().dispatched.push(target.clone());
            Ok(())
        }
    }

    fn image(id: i64) -> Item {
        Item::new(ItemId(id), "image/jpeg", 10, 0, Uri::new(format!("file:///{id}.jpg")))
    }

    fn session_with_dirs(
        spec: SelectionSpec,
        items: usize,
        dirs: CaptureDirs,
    ) -> (PickerSession<NullView>, Shared) {
        let shared = Shared::default();
        let library = VecSource::new((1..=items as i64).map(image).collect());
        let parts = Collaborators {
            views: (0..6).map(|_| NullView).collect(),
            engine: Box::new(NullEngine),
            library: Box::new(library),
            feedback: Box::new(shared.clone()),
            dispatcher: Box::new(shared.clone()),
            capture_dirs: dirs,
            discard_policy: DiscardPolicy::Remove,
        };
        let mut session = PickerSession::new(spec, parts).unwrap();
        session.set_viewport_width(600);
        session.scroll_to(0, 6);
        (session, shared)
    }

    fn session(spec: SelectionSpec, items: usize) -> (PickerSession<NullView>, Shared, TempDir) {
        let dir = tempdir().unwrap();
        let (session, shared) = session_with_dirs(spec, items, CaptureDirs::under(dir.path()));
        (session, shared, dir)
    }

    fn slot_of(session: &PickerSession<NullView>, position: usize) -> usize {
        session.grid().slot_for_position(position).unwrap()
    }

    #[test]
    fn test_invalid_spec_is_rejected() {
        let dir = tempdir().unwrap();
        for spec in [
            SelectionSpec::default().with_max_selectable(0),
            SelectionSpec::default().with_thumbnail_scale(-0.5),
            SelectionSpec::default().with_span_count(0),
        ] {
            let parts = Collaborators {
                views: vec![NullView],
                engine: Box::new(NullEngine),
                library: Box::new(VecSource::default()),
                feedback: Box::new(Shared::default()),
                dispatcher: Box::new(Shared::default()),
                capture_dirs: CaptureDirs::under(dir.path()),
                discard_policy: DiscardPolicy::Remove,
            };
            assert!(PickerSession::new(spec, parts).is_err());
        }
    }

    #[test]
    fn test_tap_toggles_selection() {
        let (mut session, shared, _dir) =
            session(SelectionSpec::default().with_max_selectable(3), 4);

        session.tap(slot_of(&session, 0));
        session.tap(slot_of(&session, 2));
        assert_eq!(session.pump(), 2);
        assert_eq!(session.selection().items(), &[image(1), image(3)]);

        session.tap(slot_of(&session, 0));
        session.pump();
        assert_eq!(session.selection().items(), &[image(3)]);
        assert_eq!(shared.0.borrow().counts, vec![1, 2, 1]);
        assert!(shared.0.borrow().reports.is_empty());
    }

    #[test]
    fn test_rejection_reported_exactly_once() {
        let (mut session, shared, _dir) = session(SelectionSpec::default(), 3);

        session.tap(slot_of(&session, 0));
        session.tap(slot_of(&session, 1));
        session.pump();

        assert_eq!(
            shared.0.borrow().reports,
            vec![SelectionError::CapacityExceeded { max: 1 }]
        );
        assert_eq!(session.selection().items(), &[image(1)]);
    }

    #[test]
    fn test_capture_success_selects_new_item() {
        let (mut session, shared, _dir) = session(
            SelectionSpec::default()
                .with_max_selectable(2)
                .with_capture(true),
            2,
        );

        session.tap(slot_of(&session, 0));
        session.pump();
        let target = shared.0.borrow().dispatched[0].clone();
        assert_eq!(target.kind, CaptureKind::Photo);
        std::fs::write(&target.temp_path, b"jpeg").unwrap();

        let item = session.capture_finished(CaptureOutcome::Success).unwrap();
        assert_eq!(item.uri(), &target.temp_uri);
        assert_eq!(session.selection().items(), &[item.clone()]);
        assert_eq!(session.library().count(), 3);
        // Newest item is bound right after the capture cell.
        let slot = slot_of(&session, 1);
        assert_eq!(session.grid().binding(slot).unwrap().item(), Some(&item));
    }

    #[test]
    fn test_captured_item_rejected_when_full() {
        let (mut session, shared, _dir) = session(
            SelectionSpec::default().with_capture(true),
            2,
        );
        session.tap(slot_of(&session, 1));
        session.tap(slot_of(&session, 0));
        session.pump();
        let target = shared.0.borrow().dispatched[0].clone();
        std::fs::write(&target.temp_path, b"jpeg").unwrap();

        let item = session.capture_finished(CaptureOutcome::Success).unwrap();
        assert!(!session.selection().is_selected(&item));
        assert_eq!(session.selection().items(), &[image(1)]);
        assert_eq!(
            shared.0.borrow().reports,
            vec![SelectionError::CapacityExceeded { max: 1 }]
        );
    }

    #[test]
    fn test_capture_cancel_discards() {
        let (mut session, shared, _dir) =
            session(SelectionSpec::default().with_capture(true), 1);
        session.tap(slot_of(&session, 0));
        session.pump();
        let target = shared.0.borrow().dispatched[0].clone();
        std::fs::write(&target.temp_path, b"partial").unwrap();

        assert!(session.capture_finished(CaptureOutcome::Canceled).is_none());
        assert!(!target.temp_path.exists());
        assert!(session.selection().is_empty());
        assert!(session.capture_finished(CaptureOutcome::Success).is_none());
    }

    #[test]
    fn test_storage_unavailable_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let (mut session, shared) = session_with_dirs(
            SelectionSpec::default().with_capture(true),
            1,
            CaptureDirs::under(&blocker),
        );

        session.tap(slot_of(&session, 0));
        session.pump();
        let log = shared.0.borrow();
        assert_eq!(log.capture_failures.len(), 1);
        assert!(log.dispatched.is_empty());
    }

    #[test]
    fn test_restore_and_finish() {
        let (mut session, _shared, _dir) =
            session(SelectionSpec::default().with_max_selectable(2), 3);
        let rejected = session.restore_selection(vec![image(2), image(1), image(3)]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(session.finish(), vec![image(2), image(1)]);
    }
}
