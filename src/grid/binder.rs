//! Virtualized grid binding.
//!
//! A fixed pool of views is recycled across dataset positions as the window
//! scrolls. Every thumbnail request carries a fresh ticket which the slot
//! remembers; a result is applied only while its ticket and uri still match,
//! so a recycled slot never shows the previous item's image.

use std::ops::Range;
use std::sync::Arc;

use flume::{Receiver, Sender};
use tracing::{debug, trace, warn};

use super::cell::{CellBadge, CellBinding, CellKind, CellView, SlotId};
use super::sizing::CellSizer;
use crate::models::{Item, SelectionSpec};
use crate::selection::SelectedItemCollection;
use crate::source::MediaSource;
use crate::thumbnails::{ThumbnailEngine, ThumbnailReady, ThumbnailRequest, Ticket};

/// Taps routed from the grid to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    MediaTapped { slot: SlotId, item: Item },
    CaptureTapped { slot: SlotId },
}

struct Slot<V> {
    view: V,
    binding: CellBinding,
}

pub struct GridBinder<V: CellView> {
    spec: Arc<SelectionSpec>,
    slots: Vec<Slot<V>>,
    window: Range<usize>,
    /// Window length last asked for, before clamping.
    requested_visible: usize,
    sizer: CellSizer,
    engine: Box<dyn ThumbnailEngine>,
    events: Sender<GridEvent>,
    next_ticket: u64,
}

impl<V: CellView> GridBinder<V> {
    /// Builds a binder over a pool of views. The receiver yields taps.
    pub fn new(
        spec: Arc<SelectionSpec>,
        views: Vec<V>,
        engine: Box<dyn ThumbnailEngine>,
    ) -> (Self, Receiver<GridEvent>) {
        let (events, rx) = flume::unbounded();
        let sizer = CellSizer::new(&spec);
        let slots = views
            .into_iter()
            .map(|view| Slot {
                view,
                binding: CellBinding::Unbound,
            })
            .collect();
        let binder = Self {
            spec,
            slots,
            window: 0..0,
            requested_visible: 0,
            sizer,
            engine,
            events,
            next_ticket: 1,
        };
        (binder, rx)
    }

    fn capture_offset(&self) -> usize {
        usize::from(self.spec.capture)
    }

    /// Dataset items plus the synthetic capture position.
    pub fn position_count<S: MediaSource + ?Sized>(&self, source: &S) -> usize {
        source.count() + self.capture_offset()
    }

    pub fn resolve_view_kind(&self, position: usize) -> CellKind {
        if self.spec.capture && position == 0 {
            CellKind::Capture
        } else {
            CellKind::Media
        }
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    pub fn binding(&self, slot: SlotId) -> Option<&CellBinding> {
        self.slots.get(slot).map(|s| &s.binding)
    }

    pub fn view(&self, slot: SlotId) -> Option<&V> {
        self.slots.get(slot).map(|s| &s.view)
    }

    pub fn slot_for_position(&self, position: usize) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.binding.position() == Some(position))
    }

    pub fn cell_edge(&mut self) -> u32 {
        self.sizer.cell_edge()
    }

    pub fn columns(&self) -> u32 {
        self.sizer.columns()
    }

    /// Binds `slot` to `position`.
    ///
    /// Rebinding a slot to the item it already shows only refreshes the badge.
    pub fn bind<S: MediaSource + ?Sized>(
        &mut self,
        slot: SlotId,
        position: usize,
        source: &S,
        selection: &SelectedItemCollection,
    ) {
        let count = self.position_count(source);
        debug_assert!(
            slot < self.slots.len() && position < count,
            "bind out of range: slot {} of {}, position {} of {}",
            slot,
            self.slots.len(),
            position,
            count
        );
        if slot >= self.slots.len() || position >= count {
            warn!(slot, position, count, "Ignoring out-of-range bind");
            return;
        }

        match self.resolve_view_kind(position) {
            CellKind::Capture => self.bind_capture(slot, position),
            CellKind::Media => match source.item_at(position - self.capture_offset()) {
                Some(item) => self.bind_media(slot, position, item, selection),
                None => {
                    warn!(slot, position, "Media record vanished, leaving cell empty");
                    self.unbind(slot);
                    self.slots[slot].view.show_placeholder();
                }
            },
        }
    }

    fn bind_capture(&mut self, slot: SlotId, position: usize) {
        if self.slots[slot].binding == (CellBinding::Capture { position }) {
            return;
        }
        self.release(slot);
        let kind = self.spec.media_type_mode.capture_kind();
        let s = &mut self.slots[slot];
        s.view.show_capture(kind);
        s.binding = CellBinding::Capture { position };
        trace!(slot, position, "Bound capture cell");
    }

    fn bind_media(
        &mut self,
        slot: SlotId,
        position: usize,
        item: Item,
        selection: &SelectedItemCollection,
    ) {
        let badge = badge_for(&item, selection);

        let s = &mut self.slots[slot];
        if let CellBinding::Media {
            position: bound_position,
            item: bound_item,
            badge: bound_badge,
            ..
        } = &mut s.binding
        {
            if *bound_item == item {
                *bound_position = position;
                if *bound_badge != badge {
                    *bound_badge = badge;
                    s.view.set_badge(badge);
                }
                return;
            }
        }

        self.release(slot);
        let edge = self.sizer.cell_edge();
        let ticket = self.request_thumbnail(slot, &item, edge);

        let s = &mut self.slots[slot];
        s.view.show_media(&item);
        s.view.show_placeholder();
        s.view.set_badge(badge);
        trace!(slot, position, id = %item.id(), ?ticket, "Bound media cell");
        s.binding = CellBinding::Media {
            position,
            item,
            badge,
            ticket,
            edge,
        };
    }

    /// Returns the slot to `Unbound`, cancelling its pending thumbnail.
    pub fn unbind(&mut self, slot: SlotId) {
        if slot >= self.slots.len() {
            return;
        }
        if self.release(slot) {
            self.slots[slot].view.clear();
        }
    }

    /// Cancels any in-flight request and forgets the binding.
    /// Returns whether the slot was bound.
    fn release(&mut self, slot: SlotId) -> bool {
        let binding = std::mem::take(&mut self.slots[slot].binding);
        if let CellBinding::Media {
            ticket: Some(ticket),
            ..
        } = &binding
        {
            self.engine.cancel(*ticket);
        }
        binding != CellBinding::Unbound
    }

    fn request_thumbnail(&mut self, slot: SlotId, item: &Item, edge: u32) -> Option<Ticket> {
        if edge == 0 {
            return None;
        }
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.engine.request(ThumbnailRequest {
            ticket,
            slot,
            uri: item.uri().clone(),
            edge,
        });
        Some(ticket)
    }

    /// Moves the window to `[first, first + visible)`.
    ///
    /// Positions that stay visible keep their slot untouched. Freed slots are
    /// handed to newly visible positions in ascending order.
    pub fn scroll_to<S: MediaSource + ?Sized>(
        &mut self,
        first: usize,
        visible: usize,
        source: &S,
        selection: &SelectedItemCollection,
    ) {
        self.requested_visible = visible;
        let count = self.position_count(source);
        let start = first.min(count);
        let end = start.saturating_add(visible.min(self.slots.len())).min(count);
        let window = start..end;

        let mut held = vec![false; window.len()];
        let mut free = Vec::new();
        for (slot, s) in self.slots.iter().enumerate() {
            match s.binding.position() {
                Some(p) if window.contains(&p) && !held[p - start] => held[p - start] = true,
                _ => free.push(slot),
            }
        }

        let mut free = free.into_iter();
        for position in window.clone() {
            if held[position - start] {
                continue;
            }
            match free.next() {
                Some(slot) => self.bind(slot, position, source, selection),
                None => break,
            }
        }
        for slot in free {
            self.unbind(slot);
        }

        debug!(?window, count, "Grid window moved");
        self.window = window;
    }

    /// Emits the tap on the event channel. Unbound slots are ignored.
    pub fn tap(&self, slot: SlotId) {
        let event = match self.slots.get(slot).map(|s| &s.binding) {
            Some(CellBinding::Media { item, .. }) => GridEvent::MediaTapped {
                slot,
                item: item.clone(),
            },
            Some(CellBinding::Capture { .. }) => GridEvent::CaptureTapped { slot },
            _ => {
                debug!(slot, "Tap on unbound slot");
                return;
            }
        };
        if let Err(e) = self.events.send(event) {
            warn!(slot, error = ?e, "Grid event receiver dropped");
        }
    }

    /// Recomputes badges of bound media cells, pushing only changed ones.
    /// Returns how many views were updated.
    pub fn refresh_check_states(&mut self, selection: &SelectedItemCollection) -> usize {
        let mut updated = 0;
        for s in &mut self.slots {
            if let CellBinding::Media { item, badge, .. } = &mut s.binding {
                let fresh = badge_for(item, selection);
                if *badge != fresh {
                    *badge = fresh;
                    s.view.set_badge(fresh);
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Applies a finished thumbnail if its ticket is still current.
    pub fn deliver(&mut self, ready: ThumbnailReady) -> bool {
        let Some(s) = self.slots.get_mut(ready.slot) else {
            return false;
        };
        let CellBinding::Media { item, ticket, .. } = &mut s.binding else {
            trace!(slot = ready.slot, "Discarding thumbnail for non-media slot");
            return false;
        };
        if *ticket != Some(ready.ticket) || *item.uri() != ready.uri {
            trace!(slot = ready.slot, ticket = ready.ticket.0, "Discarding stale thumbnail");
            return false;
        }

        *ticket = None;
        match ready.result {
            Ok(thumbnail) => {
                s.view.set_thumbnail(&thumbnail);
                true
            }
            Err(e) => {
                debug!(slot = ready.slot, uri = %ready.uri, error = %e, "Thumbnail unavailable");
                false
            }
        }
    }

    /// Drains the engine and applies current results. Returns how many landed.
    pub fn pump_thumbnails(&mut self) -> usize {
        let results = self.engine.poll();
        results
            .into_iter()
            .map(|ready| self.deliver(ready))
            .filter(|applied| *applied)
            .count()
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        if self.sizer.set_viewport_width(width) {
            self.on_edge_changed();
        }
    }

    pub fn set_columns(&mut self, columns: u32) {
        if self.sizer.set_columns(columns) {
            self.on_edge_changed();
        }
    }

    fn on_edge_changed(&mut self) {
        let edge = self.sizer.cell_edge();
        debug!(edge, columns = self.sizer.columns(), "Cell edge changed");

        for slot in 0..self.slots.len() {
            let (item, old_ticket) = match &self.slots[slot].binding {
                CellBinding::Media {
                    item,
                    ticket,
                    edge: bound_edge,
                    ..
                } if *bound_edge != edge => (item.clone(), *ticket),
                _ => continue,
            };
            if let Some(old) = old_ticket {
                self.engine.cancel(old);
            }
            let fresh = self.request_thumbnail(slot, &item, edge);
            if let CellBinding::Media {
                ticket,
                edge: bound_edge,
                ..
            } = &mut self.slots[slot].binding
            {
                *ticket = fresh;
                *bound_edge = edge;
            }
        }
    }

    /// Rebinds every bound slot after the dataset changed, then refills the
    /// window.
    pub fn notify_data_changed<S: MediaSource + ?Sized>(
        &mut self,
        source: &S,
        selection: &SelectedItemCollection,
    ) {
        let count = self.position_count(source);
        for slot in 0..self.slots.len() {
            match self.slots[slot].binding.position() {
                Some(p) if p < count => self.bind(slot, p, source, selection),
                Some(_) => self.unbind(slot),
                None => {}
            }
        }
        self.scroll_to(self.window.start, self.requested_visible, source, selection);
    }

    /// Unbinds everything and hands the views back.
    pub fn teardown(mut self) -> Vec<V> {
        for slot in 0..self.slots.len() {
            self.unbind(slot);
        }
        self.slots.into_iter().map(|s| s.view).collect()
    }
}

fn badge_for(item: &Item, selection: &SelectedItemCollection) -> CellBadge {
    let check = selection.check_state_of(item);
    CellBadge {
        check,
        enabled: check.is_checked() || selection.is_acceptable(item).is_accepted(),
    }
}
