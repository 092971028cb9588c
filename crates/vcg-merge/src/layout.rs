//! Lane layout for generated nodes
//!
//! Nodes arriving without a position are placed in a horizontal lane chosen
//! by their kind, staggered over a fixed number of columns, to the right of
//! whatever the current graph already occupies.

use serde::{Deserialize, Serialize};
use vcg_graph::{Graph, NodeKind, Position};

/// Horizontal band a node kind is laid out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Support,
    Primary,
    External,
    Auxiliary,
}

impl Lane {
    /// Lane for a node kind
    #[must_use]
    pub const fn of(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Support => Self::Support,
            NodeKind::Primary => Self::Primary,
            NodeKind::External => Self::External,
            NodeKind::Metric | NodeKind::Milestone | NodeKind::Resource => Self::Auxiliary,
        }
    }

    /// Vertical extent `(min_y, max_y)`; `None` max means unbounded
    #[must_use]
    pub const fn band(self) -> (f64, Option<f64>) {
        match self {
            Self::Support => (50.0, Some(150.0)),
            Self::Primary => (200.0, Some(350.0)),
            Self::External => (400.0, Some(600.0)),
            Self::Auxiliary => (650.0, None),
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Support => 0,
            Self::Primary => 1,
            Self::External => 2,
            Self::Auxiliary => 3,
        }
    }
}

/// Grid parameters for lane placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneLayout {
    pub column_width: f64,
    pub row_height: f64,
    pub columns: usize,
}

impl Default for LaneLayout {
    fn default() -> Self {
        Self {
            column_width: 220.0,
            row_height: 50.0,
            columns: 3,
        }
    }
}

impl LaneLayout {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_column_width(mut self, column_width: f64) -> Self {
        self.column_width = column_width;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_row_height(mut self, row_height: f64) -> Self {
        self.row_height = row_height;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns.max(1);
        self
    }

    /// Left edge of the area new nodes go into
    ///
    /// One column past the rightmost existing node, or `0.0` for an empty graph.
    #[must_use]
    pub fn origin_x(&self, current: &Graph) -> f64 {
        current
            .bounds()
            .map_or(0.0, |b| b.max_x + self.column_width)
    }

    /// Position of the `index`-th placed node of `lane`
    ///
    /// Bounded lanes wrap their rows and continue one block of columns
    /// further right instead of growing past the band.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn position(&self, lane: Lane, index: usize, origin_x: f64) -> Position {
        let columns = self.columns.max(1);
        let col = index % columns;
        let row = index / columns;
        let (min_y, max_y) = lane.band();

        let (block, row_in_band) = match max_y {
            Some(max_y) => {
                let rows_per_band = self.rows_per_band(min_y, max_y);
                (row / rows_per_band, row % rows_per_band)
            }
            None => (0, row),
        };

        let x = origin_x + ((block * columns + col) as f64) * self.column_width;
        let y = min_y + (row_in_band as f64) * self.row_height;
        Position::new(x, y)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rows_per_band(&self, min_y: f64, max_y: f64) -> usize {
        if self.row_height <= 0.0 {
            return 1;
        }
        ((max_y - min_y) / self.row_height).floor() as usize + 1
    }
}

/// Hands out consecutive lane slots for one placement pass
#[derive(Debug, Clone)]
pub struct LaneCursor {
    layout: LaneLayout,
    origin_x: f64,
    next: [usize; 4],
}

impl LaneCursor {
    /// Start placing to the right of `current`
    #[must_use]
    pub fn new(layout: LaneLayout, current: &Graph) -> Self {
        Self {
            origin_x: layout.origin_x(current),
            layout,
            next: [0; 4],
        }
    }

    /// Next free position for `kind`
    pub fn place(&mut self, kind: NodeKind) -> Position {
        let lane = Lane::of(kind);
        let index = self.next[lane.slot()];
        self.next[lane.slot()] += 1;
        self.layout.position(lane, index, self.origin_x)
    }

    #[inline]
    #[must_use]
    pub fn origin_x(&self) -> f64 {
        self.origin_x
    }
}
