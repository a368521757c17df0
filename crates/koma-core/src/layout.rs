//! Layout registry: the fixed catalogue of multi-panel row arrangements.
//!
//! Each entry describes a grid by its column and row track templates and,
//! for arrangements where a panel spans several tracks, an explicit cell
//! per panel. Arrangements without explicit cells fill the grid in
//! reading order.

use crate::template::{Span, format_tracks, parse_span, parse_tracks};
use serde::Serialize;
use smallvec::SmallVec;

// ─── Registry ────────────────────────────────────────────────────────────

/// A registered arrangement, as authored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutDef {
    pub key: &'static str,
    /// Column track template, e.g. `"2fr 1fr"`.
    pub cols: &'static str,
    /// Row track template.
    pub rows: &'static str,
    /// Number of panels the arrangement holds.
    pub count: usize,
    pub label: &'static str,
    /// Explicit `(column, row)` span per panel, in panel order.
    pub positions: Option<&'static [(&'static str, &'static str)]>,
}

/// Registered arrangements, in presentation order.
pub static LAYOUTS: &[LayoutDef] = &[
    LayoutDef {
        key: "col-2",
        cols: "1fr 1fr",
        rows: "1fr",
        count: 2,
        label: "2 columns",
        positions: None,
    },
    LayoutDef {
        key: "col-2-left",
        cols: "2fr 1fr",
        rows: "1fr",
        count: 2,
        label: "Wide left + narrow right",
        positions: None,
    },
    LayoutDef {
        key: "col-2-right",
        cols: "1fr 2fr",
        rows: "1fr",
        count: 2,
        label: "Narrow left + wide right",
        positions: None,
    },
    LayoutDef {
        key: "col-3",
        cols: "1fr 1fr 1fr",
        rows: "1fr",
        count: 3,
        label: "3 equal columns",
        positions: None,
    },
    LayoutDef {
        key: "col-2-stack-r",
        cols: "2fr 1fr",
        rows: "1fr 1fr",
        count: 3,
        label: "Wide left + 2 stacked right",
        positions: Some(&[("1", "1 / 3"), ("2", "1"), ("2", "2")]),
    },
    LayoutDef {
        key: "col-2-stack-l",
        cols: "1fr 2fr",
        rows: "1fr 1fr",
        count: 3,
        label: "2 stacked left + wide right",
        positions: Some(&[("1", "1"), ("1", "2"), ("2", "1 / 3")]),
    },
    LayoutDef {
        key: "col-4",
        cols: "1fr 1fr 1fr 1fr",
        rows: "1fr",
        count: 4,
        label: "4 equal columns",
        positions: None,
    },
    LayoutDef {
        key: "2x2",
        cols: "1fr 1fr",
        rows: "1fr 1fr",
        count: 4,
        label: "2×2 grid",
        positions: None,
    },
    LayoutDef {
        key: "col-2-stack-r3",
        cols: "2fr 1fr",
        rows: "1fr 1fr 1fr",
        count: 4,
        label: "Wide left + 3 stacked right",
        positions: Some(&[("1", "1 / 4"), ("2", "1"), ("2", "2"), ("2", "3")]),
    },
    LayoutDef {
        key: "col-2-stack-l3",
        cols: "1fr 2fr",
        rows: "1fr 1fr 1fr",
        count: 4,
        label: "3 stacked left + wide right",
        positions: Some(&[("1", "1"), ("1", "2"), ("1", "3"), ("2", "1 / 4")]),
    },
];

/// Look up an arrangement by key.
pub fn find_layout(key: &str) -> Option<&'static LayoutDef> {
    LAYOUTS.iter().find(|l| l.key == key)
}

/// The first registered arrangement for `count` panels.
pub fn default_layout(count: usize) -> Option<&'static LayoutDef> {
    LAYOUTS.iter().find(|l| l.count == count)
}

/// Every arrangement for `count` panels, resolved with one cell per panel.
pub fn get_layouts(count: usize) -> Vec<GridLayout> {
    LAYOUTS
        .iter()
        .filter(|l| l.count == count)
        .map(LayoutDef::resolve)
        .collect()
}

// ─── Resolved grids ──────────────────────────────────────────────────────

/// Where one panel sits in a row grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub col: Span,
    pub row: Span,
}

impl GridCell {
    /// Reading-order cell for panel `index` in a grid `columns` wide.
    pub fn auto(index: usize, columns: usize) -> Self {
        let columns = columns.max(1);
        Self {
            col: Span::single((index % columns + 1) as u16),
            row: Span::single((index / columns + 1) as u16),
        }
    }
}

/// A grid with parsed track weights and one cell per panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    /// Registry key; `None` for a fallback grid.
    pub key: Option<&'static str>,
    pub label: &'static str,
    pub count: usize,
    pub cols: Vec<f32>,
    pub rows: Vec<f32>,
    pub positions: SmallVec<[GridCell; 4]>,
}

impl LayoutDef {
    /// Number of column tracks, counted the way the template is written.
    pub fn column_count(&self) -> usize {
        self.cols.split_whitespace().count()
    }

    /// Resolve with exactly `self.count` cells.
    pub fn resolve(&self) -> GridLayout {
        self.resolve_for(self.count)
    }

    /// Resolve for `count` panels. Explicit cells are used first; any
    /// panel past them is placed in reading order.
    pub fn resolve_for(&self, count: usize) -> GridLayout {
        let cols = parse_tracks(self.cols).unwrap_or_else(|e| {
            log::warn!("layout {}: {e}", self.key);
            vec![1.0; self.column_count().max(1)]
        });
        let rows = parse_tracks(self.rows).unwrap_or_else(|e| {
            log::warn!("layout {}: {e}", self.key);
            vec![1.0]
        });
        GridLayout {
            key: Some(self.key),
            label: self.label,
            count: self.count,
            positions: resolve_positions(self, count),
            cols,
            rows,
        }
        .covering_all_cells()
    }
}

/// Cells for the first `count` panels of `layout`.
pub fn resolve_positions(layout: &LayoutDef, count: usize) -> SmallVec<[GridCell; 4]> {
    let columns = layout.column_count();
    (0..count)
        .map(|i| {
            let explicit = layout.positions.and_then(|p| p.get(i));
            match explicit {
                Some((col, row)) => match (parse_span(col), parse_span(row)) {
                    (Ok(col), Ok(row)) => GridCell { col, row },
                    (Err(e), _) | (_, Err(e)) => {
                        log::warn!("layout {} cell {i}: {e}", layout.key);
                        GridCell::auto(i, columns)
                    }
                },
                None => GridCell::auto(i, columns),
            }
        })
        .collect()
}

/// One-row grid whose columns are weighted by `weights`. Used for groups
/// whose layout key is not registered.
pub fn fallback_grid(weights: &[f32]) -> GridLayout {
    let cols: Vec<f32> = if weights.iter().all(|w| *w > 0.0 && w.is_finite()) {
        weights.to_vec()
    } else {
        vec![1.0; weights.len()]
    };
    GridLayout {
        key: None,
        label: "Single row",
        count: weights.len(),
        positions: (0..weights.len())
            .map(|i| GridCell::auto(i, weights.len()))
            .collect(),
        cols,
        rows: vec![1.0],
    }
}

impl GridLayout {
    /// Column template in CSS form.
    pub fn cols_template(&self) -> String {
        format_tracks(&self.cols)
    }

    /// Row template in CSS form.
    pub fn rows_template(&self) -> String {
        format_tracks(&self.rows)
    }

    /// Extend the track lists with implicit `1fr` tracks so every cell
    /// lands inside the grid.
    fn covering_all_cells(mut self) -> Self {
        let max_col = self.positions.iter().map(|c| c.col.end).max().unwrap_or(1);
        let max_row = self.positions.iter().map(|c| c.row.end).max().unwrap_or(1);
        while self.cols.len() + 1 < max_col as usize {
            self.cols.push(1.0);
        }
        while self.rows.len() + 1 < max_row as usize {
            self.rows.push(1.0);
        }
        self
    }
}
