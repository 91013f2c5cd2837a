//! Cell edge computation.
//!
//! `edge = floor((width - spacing * (columns - 1)) / columns) * scale`,
//! cached until the viewport width or the column count changes.

use crate::models::SelectionSpec;

#[derive(Debug, Clone)]
pub struct CellSizer {
    viewport_width: u32,
    columns: Option<u32>,
    span_count: u32,
    expected_size: Option<u32>,
    spacing: u32,
    scale: f32,
    cached_edge: Option<u32>,
}

impl CellSizer {
    pub fn new(spec: &SelectionSpec) -> Self {
        Self {
            viewport_width: 0,
            columns: None,
            span_count: u32::try_from(spec.span_count).unwrap_or(u32::MAX),
            expected_size: spec.grid_expected_size,
            spacing: spec.grid_spacing,
            scale: spec.thumbnail_scale,
            cached_edge: None,
        }
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    /// Returns whether the width changed.
    pub fn set_viewport_width(&mut self, width: u32) -> bool {
        if width == self.viewport_width {
            return false;
        }
        self.viewport_width = width;
        self.cached_edge = None;
        true
    }

    /// Overrides the configured column count. Returns whether it changed.
    pub fn set_columns(&mut self, columns: u32) -> bool {
        let columns = columns.max(1);
        if self.columns == Some(columns) {
            return false;
        }
        let changed = self.columns() != columns;
        self.columns = Some(columns);
        self.cached_edge = None;
        changed
    }

    pub fn columns(&self) -> u32 {
        if let Some(columns) = self.columns {
            return columns;
        }
        match self.expected_size {
            Some(expected) if expected > 0 && self.viewport_width > 0 => {
                ((self.viewport_width as f32 / expected as f32).round() as u32).max(1)
            }
            _ => self.span_count.max(1),
        }
    }

    /// Square thumbnail side in pixels; 0 until a viewport width is known.
    pub fn cell_edge(&mut self) -> u32 {
        if let Some(edge) = self.cached_edge {
            return edge;
        }
        let edge = self.compute_edge();
        self.cached_edge = Some(edge);
        edge
    }

    fn compute_edge(&self) -> u32 {
        if self.viewport_width == 0 {
            return 0;
        }
        let columns = self.columns();
        let gaps = self.spacing.saturating_mul(columns - 1);
        let cell = self.viewport_width.saturating_sub(gaps) / columns;
        (cell as f32 * self.scale).floor() as u32
    }
}
