//! Grid placement for memo cards.
//!
//! [`place`] is a pure function from a memo's ordinal within its board to a
//! screen coordinate. Cells are laid out row-major:
//!
//! ```text
//!   header_offset
//!   ┌──────┐ gap ┌──────┐ gap ┌──────┐
//!   │  0   │     │  1   │     │  2   │     columns_per_row = 3
//!   └──────┘     └──────┘     └──────┘
//!      gap
//!   ┌──────┐     ┌──────┐
//!   │  3   │     │  4   │
//!   └──────┘     └──────┘
//! ```
//!
//! The gap is `padding * SPACING_MULTIPLIER` in both directions, so two cells
//! at different indices never share any area.
//!
//! [`LayoutEngine`] holds the current responsive config and placement mode and
//! decides when the reconciler should reflow.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tackboard_types::{Memo, MemoId};
use thiserror::Error;
use tracing::debug;

use crate::constants::{
    DEFAULT_VIEWPORT_WIDTH, HEADER_OFFSET, PHONE_MAX_WIDTH, SPACING_MULTIPLIER, TABLET_MAX_WIDTH,
};

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Rejected layout parameters.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("columns per row must be at least 1")]
    NoColumns,
    #[error("cell size must be positive, got {width}x{height}")]
    CellSize { width: f64, height: f64 },
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

/// Viewport size classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceClass {
    Phone,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn classify(viewport_width: f64) -> Self {
        if viewport_width < PHONE_MAX_WIDTH {
            DeviceClass::Phone
        } else if viewport_width < TABLET_MAX_WIDTH {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn max_columns(self) -> usize {
        match self {
            DeviceClass::Phone => 2,
            DeviceClass::Tablet => 3,
            DeviceClass::Desktop => 5,
        }
    }

    /// `(cell_width, cell_height, padding)` for this class.
    fn cell_metrics(self) -> (f64, f64, f64) {
        match self {
            DeviceClass::Phone => (150.0, 140.0, 8.0),
            DeviceClass::Tablet => (180.0, 170.0, 10.0),
            DeviceClass::Desktop => (220.0, 200.0, 12.0),
        }
    }
}

/// Grid parameters. Construct through [`LayoutConfig::new`] or
/// [`LayoutConfig::responsive`]; both uphold the placement invariants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    columns_per_row: usize,
    cell_width: f64,
    cell_height: f64,
    padding: f64,
    header_offset: f64,
}

impl LayoutConfig {
    pub fn new(
        columns_per_row: usize,
        cell_width: f64,
        cell_height: f64,
        padding: f64,
        header_offset: f64,
    ) -> Result<Self, LayoutError> {
        if columns_per_row == 0 {
            return Err(LayoutError::NoColumns);
        }
        if !(cell_width > 0.0 && cell_height > 0.0) || !cell_width.is_finite() || !cell_height.is_finite() {
            return Err(LayoutError::CellSize {
                width: cell_width,
                height: cell_height,
            });
        }
        for (field, value) in [("padding", padding), ("header offset", header_offset)] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(LayoutError::Negative { field, value });
            }
        }
        Ok(Self {
            columns_per_row,
            cell_width,
            cell_height,
            padding,
            header_offset,
        })
    }

    /// Config for a viewport: cell size by device class, as many columns as
    /// fit, clamped to the class maximum.
    pub fn responsive(viewport_width: f64) -> Self {
        let width = if viewport_width.is_finite() && viewport_width > 0.0 {
            viewport_width
        } else {
            0.0
        };
        let class = DeviceClass::classify(width);
        let (cell_width, cell_height, padding) = class.cell_metrics();
        let gap = padding * SPACING_MULTIPLIER;
        let fit = ((width - 2.0 * padding + gap) / (cell_width + gap)).floor();
        let columns_per_row = if fit >= 1.0 {
            (fit as usize).min(class.max_columns())
        } else {
            1
        };
        Self {
            columns_per_row,
            cell_width,
            cell_height,
            padding,
            header_offset: HEADER_OFFSET,
        }
    }

    pub fn columns_per_row(&self) -> usize {
        self.columns_per_row
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    pub fn header_offset(&self) -> f64 {
        self.header_offset
    }

    fn spacing(&self) -> f64 {
        self.padding * SPACING_MULTIPLIER
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::responsive(DEFAULT_VIEWPORT_WIDTH)
    }
}

/// Position of the memo at `index` within its board.
pub fn place(index: usize, config: &LayoutConfig) -> Position {
    let row = index / config.columns_per_row;
    let col = index % config.columns_per_row;
    let spacing = config.spacing();
    Position {
        x: col as f64 * (config.cell_width + spacing) + config.padding,
        y: row as f64 * (config.cell_height + spacing) + config.header_offset + config.padding,
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Whether card coordinates come from the grid or from users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// Automatic reflow on every membership or viewport change.
    #[default]
    Grid,
    /// Coordinates set by drags are kept; only an explicit repack reflows.
    FreeDrag,
}

/// Current layout config plus the placement policy.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
    mode: PlacementMode,
    viewport_width: f64,
}

impl LayoutEngine {
    pub fn new(mode: PlacementMode, viewport_width: f64) -> Self {
        Self {
            config: LayoutConfig::responsive(viewport_width),
            mode,
            viewport_width,
        }
    }

    /// Engine with a fixed config; viewport changes still recompute it.
    pub fn with_config(config: LayoutConfig, mode: PlacementMode) -> Self {
        Self {
            config,
            mode,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlacementMode) {
        self.mode = mode;
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    /// Adopt a new viewport width. Returns true if the config changed.
    pub fn set_viewport(&mut self, width: f64) -> bool {
        self.viewport_width = width;
        let config = LayoutConfig::responsive(width);
        if config == self.config {
            return false;
        }
        debug!(
            width,
            class = %DeviceClass::classify(width),
            columns = config.columns_per_row,
            "layout config changed"
        );
        self.config = config;
        true
    }

    /// Reflow automatically on membership and viewport changes?
    pub fn auto_reflow(&self) -> bool {
        self.mode == PlacementMode::Grid
    }

    pub fn place(&self, index: usize) -> Position {
        place(index, &self.config)
    }

    /// Slot for a new memo appended after `count` existing ones.
    pub fn next_slot(&self, count: usize) -> Position {
        self.place(count)
    }

    /// Positions for `memos` in their given order.
    pub fn reflow<'a>(&self, memos: impl IntoIterator<Item = &'a Memo>) -> Vec<(MemoId, Position)> {
        memos
            .into_iter()
            .enumerate()
            .map(|(index, memo)| (memo.id.clone(), self.place(index)))
            .collect()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(PlacementMode::Grid, DEFAULT_VIEWPORT_WIDTH)
    }
}
