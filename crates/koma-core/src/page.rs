//! Panel store: row ordering, panel CRUD, width balancing, and grouping.
//!
//! All edits go through `Page` methods addressed by id (or row index).
//! A rejected edit returns an [`EditError`] and leaves the page untouched.

use crate::bubble::{Bubble, BubbleKind};
use crate::error::EditError;
use crate::id::{BubbleId, OverlayId, PanelId};
use crate::layout::{default_layout, find_layout};
use crate::model::{
    DEFAULT_HEIGHT, MIN_WIDTH_PCT, Overlay, Page, Panel, Row, RowKind, STANDARD_WIDTH,
};

/// Widths may drift this far from 100 before a row is rescaled.
const WIDTH_EPSILON: f32 = 0.01;
/// A fully locked row whose widths drift further than this is reported.
const LOCK_TOLERANCE: f32 = 1.0;

/// Result of a successful [`Page::toggle_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Toggled,
    /// Every panel in the row is now locked and the widths do not add up
    /// to 100; they can no longer be corrected by resizing.
    FrozenInconsistent,
}

/// Where a panel lives: row index and position within the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLocation {
    pub row: usize,
    pub slot: usize,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// All panels in reading order (rows top to bottom, then left to right).
    pub fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.rows.iter().flat_map(|r| r.panels.iter())
    }

    pub fn panels_mut(&mut self) -> impl Iterator<Item = &mut Panel> {
        self.rows.iter_mut().flat_map(|r| r.panels.iter_mut())
    }

    pub fn panel_count(&self) -> usize {
        self.rows.iter().map(|r| r.panels.len()).sum()
    }

    pub fn find_row(&self, id: PanelId) -> Option<PanelLocation> {
        self.rows.iter().enumerate().find_map(|(row, r)| {
            r.panels
                .iter()
                .position(|p| p.id == id)
                .map(|slot| PanelLocation { row, slot })
        })
    }

    fn locate(&self, id: PanelId) -> Result<PanelLocation, EditError> {
        self.find_row(id).ok_or(EditError::PanelNotFound(id))
    }

    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.panels().find(|p| p.id == id)
    }

    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels_mut().find(|p| p.id == id)
    }

    fn panel_mut_or_err(&mut self, id: PanelId) -> Result<&mut Panel, EditError> {
        self.panel_mut(id).ok_or(EditError::PanelNotFound(id))
    }

    /// 1-based position of the panel in reading order.
    pub fn panel_index(&self, id: PanelId) -> Option<usize> {
        self.panels().position(|p| p.id == id).map(|i| i + 1)
    }

    /// Inverse of [`Page::panel_index`].
    pub fn panel_by_index(&self, index: usize) -> Option<&Panel> {
        index.checked_sub(1).and_then(|i| self.panels().nth(i))
    }

    // ─── Panel CRUD ──────────────────────────────────────────────────────

    /// Append a new panel in its own single row.
    pub fn add_panel(&mut self, src: impl Into<String>) -> PanelId {
        self.add_panel_with_aspect(src, None)
    }

    /// Append a new panel, sizing its height from the image's
    /// height / width ratio when one is known.
    pub fn add_panel_with_aspect(&mut self, src: impl Into<String>, aspect: Option<f32>) -> PanelId {
        let id = self.counters.next_panel();
        let mut panel = Panel::new(id, src);
        if let Some(ratio) = aspect.filter(|r| r.is_finite() && *r > 0.0) {
            panel.aspect_ratio = Some(ratio);
            panel.height = height_for_aspect(ratio);
        }
        let row = self.counters.next_row();
        self.rows.push(Row::single(row, panel));
        log::debug!("added panel {id} in row {row}");
        id
    }

    /// Apply an aspect ratio learned after an asynchronous decode. The
    /// panel may have been deleted in the meantime.
    pub fn apply_decoded_aspect(&mut self, id: PanelId, aspect: f32) -> Result<(), EditError> {
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(EditError::InvalidValue {
                field: "aspect ratio",
                value: aspect,
            });
        }
        let panel = self.panel_mut_or_err(id)?;
        panel.aspect_ratio = Some(aspect);
        panel.height = height_for_aspect(aspect);
        Ok(())
    }

    /// Remove a panel. An emptied row disappears; a group left with one
    /// panel becomes a single row.
    pub fn delete_panel(&mut self, id: PanelId) -> Result<Panel, EditError> {
        let loc = self.locate(id)?;
        let row = &mut self.rows[loc.row];
        let removed = row.panels.remove(loc.slot);

        match row.panels.len() {
            0 => {
                self.rows.remove(loc.row);
            }
            1 => {
                row.kind = RowKind::Single;
                let last = &mut row.panels[0];
                last.width = 100.0;
                last.locked = false;
            }
            n => {
                normalize_widths(&mut row.panels);
                let fits = row
                    .layout()
                    .and_then(find_layout)
                    .is_some_and(|l| l.count == n);
                if !fits {
                    if let Some(layout) = default_layout(n) {
                        log::debug!("row {}: switching to layout {}", row.id, layout.key);
                        row.kind = RowKind::Group {
                            layout: layout.key.to_string(),
                        };
                    }
                }
            }
        }
        log::debug!("deleted panel {id}");
        Ok(removed)
    }

    pub fn set_height(&mut self, id: PanelId, height: f32) -> Result<(), EditError> {
        if !height.is_finite() {
            return Err(EditError::InvalidValue {
                field: "height",
                value: height,
            });
        }
        self.panel_mut_or_err(id)?.height = height.max(1.0);
        Ok(())
    }

    pub fn set_offset(&mut self, id: PanelId, ox: f32, oy: f32) -> Result<(), EditError> {
        for (field, value) in [("ox", ox), ("oy", oy)] {
            if !value.is_finite() {
                return Err(EditError::InvalidValue { field, value });
            }
        }
        let panel = self.panel_mut_or_err(id)?;
        panel.ox = ox;
        panel.oy = oy;
        Ok(())
    }

    /// Zoom percentage; must be positive.
    pub fn set_scale(&mut self, id: PanelId, scale: f32) -> Result<(), EditError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EditError::InvalidValue {
                field: "scale",
                value: scale,
            });
        }
        self.panel_mut_or_err(id)?.scale = scale;
        Ok(())
    }

    // ─── Width balancing ─────────────────────────────────────────────────

    /// Resize a grouped panel and let its unlocked siblings absorb the
    /// difference.
    ///
    /// The target is floored at 10 %, the delta is split evenly over the
    /// unlocked siblings (each floored at 10 %), and the row is finally
    /// rescaled to sum to 100. Width clipped by a sibling's floor is not
    /// handed on to the other siblings before the rescale.
    pub fn set_width(&mut self, id: PanelId, width: f32) -> Result<(), EditError> {
        if !width.is_finite() {
            return Err(EditError::InvalidValue {
                field: "width",
                value: width,
            });
        }
        let loc = self.locate(id)?;
        let row = &mut self.rows[loc.row];
        if !row.is_group() || row.panels.len() < 2 {
            return Err(EditError::NotGrouped(id));
        }

        let width = width.max(MIN_WIDTH_PCT);
        let delta = row.panels[loc.slot].width - width;
        let unlocked: Vec<usize> = (0..row.panels.len())
            .filter(|&i| i != loc.slot && !row.panels[i].locked)
            .collect();
        if unlocked.is_empty() {
            log::debug!("panel {id}: resize refused, no unlocked siblings");
            return Err(EditError::NoUnlockedSiblings);
        }

        row.panels[loc.slot].width = width;
        let share = delta / unlocked.len() as f32;
        for i in unlocked {
            let p = &mut row.panels[i];
            p.width = (p.width + share).max(MIN_WIDTH_PCT);
        }
        normalize_widths(&mut row.panels);
        Ok(())
    }

    /// Flip a panel's lock.
    pub fn toggle_lock(&mut self, id: PanelId) -> Result<LockOutcome, EditError> {
        let loc = self.locate(id)?;
        let row = &mut self.rows[loc.row];
        let panel = &mut row.panels[loc.slot];
        panel.locked = !panel.locked;

        if row.is_group() && row.panels.iter().all(|p| p.locked) {
            let total: f32 = row.panels.iter().map(|p| p.width).sum();
            if (total - 100.0).abs() > LOCK_TOLERANCE {
                log::warn!("row {}: all panels locked at {total:.2} %", row.id);
                return Ok(LockOutcome::FrozenInconsistent);
            }
        }
        Ok(LockOutcome::Toggled)
    }

    // ─── Grouping ────────────────────────────────────────────────────────

    /// Merge 2–4 panels, each alone in a single row, into one group row
    /// placed where the earliest of them was. Panels keep the order they
    /// were given in. Returns the new row's index.
    pub fn create_group_from_panels(&mut self, ids: &[PanelId], layout: &str) -> Result<usize, EditError> {
        if !(2..=4).contains(&ids.len()) {
            return Err(EditError::GroupSize(ids.len()));
        }
        let def = find_layout(layout).ok_or_else(|| EditError::UnknownLayout(layout.to_string()))?;
        if def.count != ids.len() {
            return Err(EditError::LayoutCount {
                key: layout.to_string(),
                expected: def.count,
                actual: ids.len(),
            });
        }

        let mut source_rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            if ids[..i].contains(&id) {
                return Err(EditError::DuplicatePanel(id));
            }
            let loc = self.locate(id)?;
            let row = &self.rows[loc.row];
            if row.is_group() || row.panels.len() != 1 {
                return Err(EditError::NotSingle(id));
            }
            source_rows.push(loc.row);
        }

        let insert_at = source_rows.iter().copied().min().unwrap_or(0);
        // Highest index first so earlier indices stay valid.
        source_rows.sort_unstable_by(|a, b| b.cmp(a));
        let mut taken: Vec<Panel> = Vec::with_capacity(ids.len());
        for row_idx in source_rows {
            taken.extend(self.rows.remove(row_idx).panels);
        }

        let share = 100.0 / ids.len() as f32;
        let mut panels = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pos) = taken.iter().position(|p| p.id == *id) {
                let mut p = taken.swap_remove(pos);
                p.width = share;
                p.locked = false;
                panels.push(p);
            }
        }

        let insert_at = insert_at.min(self.rows.len());
        let row_id = self.counters.next_row();
        self.rows.insert(
            insert_at,
            Row {
                id: row_id,
                kind: RowKind::Group {
                    layout: layout.to_string(),
                },
                panels,
            },
        );
        log::debug!("grouped {} panels into row {row_id} ({layout})", ids.len());
        Ok(insert_at)
    }

    /// Split a group into one single row per panel, in order.
    pub fn ungroup_row(&mut self, row_idx: usize) -> Result<(), EditError> {
        let row = self.rows.get(row_idx).ok_or(EditError::RowNotFound(row_idx))?;
        if !row.is_group() {
            return Err(EditError::NotAGroup(row_idx));
        }

        let row = self.rows.remove(row_idx);
        let singles: Vec<Row> = row
            .panels
            .into_iter()
            .map(|mut p| {
                p.width = 100.0;
                p.locked = false;
                Row::single(self.counters.next_row(), p)
            })
            .collect();
        self.rows.splice(row_idx..row_idx, singles);
        Ok(())
    }

    /// Switch a group to another layout holding the same number of panels.
    pub fn change_group_layout(&mut self, row_idx: usize, layout: &str) -> Result<(), EditError> {
        let row = self.rows.get_mut(row_idx).ok_or(EditError::RowNotFound(row_idx))?;
        if !row.is_group() {
            return Err(EditError::NotAGroup(row_idx));
        }
        let def = find_layout(layout).ok_or_else(|| EditError::UnknownLayout(layout.to_string()))?;
        if def.count != row.panels.len() {
            return Err(EditError::LayoutCount {
                key: layout.to_string(),
                expected: def.count,
                actual: row.panels.len(),
            });
        }
        row.kind = RowKind::Group {
            layout: layout.to_string(),
        };
        Ok(())
    }

    // ─── Row order ───────────────────────────────────────────────────────

    /// Shift a row up (negative `delta`) or down. Returns `Ok(false)` when
    /// the row is already at that end of the page.
    pub fn move_row(&mut self, row_idx: usize, delta: isize) -> Result<bool, EditError> {
        if row_idx >= self.rows.len() {
            return Err(EditError::RowNotFound(row_idx));
        }
        let target = row_idx
            .saturating_add_signed(delta)
            .min(self.rows.len() - 1);
        if target == row_idx {
            return Ok(false);
        }
        self.move_row_to(row_idx, target)?;
        Ok(true)
    }

    /// Move the row at `from` so it ends up at index `to`.
    pub fn move_row_to(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let len = self.rows.len();
        for index in [from, to] {
            if index >= len {
                return Err(EditError::IndexOutOfRange { index, len });
            }
        }
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        Ok(())
    }

    // ─── Bubbles & overlays ──────────────────────────────────────────────

    /// Add a bubble with the defaults for `kind` on top of the panel's stack.
    pub fn add_bubble(&mut self, panel: PanelId, kind: BubbleKind) -> Result<BubbleId, EditError> {
        self.add_bubble_with(panel, |id| Bubble::new(id, kind))
    }

    /// Add a bubble built by `make` from a freshly minted id.
    pub fn add_bubble_with(
        &mut self,
        panel: PanelId,
        make: impl FnOnce(BubbleId) -> Bubble,
    ) -> Result<BubbleId, EditError> {
        if self.panel(panel).is_none() {
            return Err(EditError::PanelNotFound(panel));
        }
        let id = self.counters.next_bubble();
        let mut bubble = make(id);
        bubble.id = id;
        self.panel_mut_or_err(panel)?.push_bubble(bubble);
        Ok(id)
    }

    pub fn remove_bubble(&mut self, panel: PanelId, bubble: BubbleId) -> Result<Bubble, EditError> {
        self.panel_mut_or_err(panel)?.remove_bubble(bubble)
    }

    pub fn bubble_mut(&mut self, panel: PanelId, bubble: BubbleId) -> Result<&mut Bubble, EditError> {
        self.panel_mut_or_err(panel)?
            .bubble_mut(bubble)
            .ok_or(EditError::BubbleNotFound(bubble))
    }

    /// The panel owning a bubble.
    pub fn bubble_owner(&self, bubble: BubbleId) -> Option<PanelId> {
        self.panels()
            .find(|p| p.bubble(bubble).is_some())
            .map(|p| p.id)
    }

    /// Drop an asset onto a panel as a new overlay on top of its stack.
    pub fn add_overlay(&mut self, panel: PanelId, file: impl Into<String>) -> Result<OverlayId, EditError> {
        if self.panel(panel).is_none() {
            return Err(EditError::PanelNotFound(panel));
        }
        let id = self.counters.next_overlay();
        self.panel_mut_or_err(panel)?
            .push_overlay(Overlay::new(id, file));
        Ok(id)
    }

    pub fn remove_overlay(&mut self, panel: PanelId, overlay: OverlayId) -> Result<Overlay, EditError> {
        self.panel_mut_or_err(panel)?.remove_overlay(overlay)
    }

    /// Mutable access for layer-stack edits on one panel.
    pub fn layers_of(&mut self, panel: PanelId) -> Result<&mut Panel, EditError> {
        self.panel_mut_or_err(panel)
    }
}

/// Height at [`STANDARD_WIDTH`] for an image of the given height / width.
fn height_for_aspect(aspect: f32) -> f32 {
    let h = (STANDARD_WIDTH * aspect).round();
    if h.is_finite() && h >= 1.0 { h } else { DEFAULT_HEIGHT }
}

/// Rescale widths proportionally so they sum to 100, unless already
/// within [`WIDTH_EPSILON`].
pub fn normalize_widths(panels: &mut [Panel]) {
    if panels.len() < 2 {
        return;
    }
    let total: f32 = panels.iter().map(|p| p.width).sum();
    if total <= 0.0 || (total - 100.0).abs() <= WIDTH_EPSILON {
        return;
    }
    let scale = 100.0 / total;
    for p in panels {
        p.width *= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(n: usize) -> (Page, Vec<PanelId>) {
        let mut page = Page::new();
        let ids = (0..n).map(|i| page.add_panel(format!("p{i}.png"))).collect();
        (page, ids)
    }

    fn width_sum(page: &Page, row: usize) -> f32 {
        page.rows[row].panels.iter().map(|p| p.width).sum()
    }

    #[test]
    fn add_panel_appends_single_row() {
        let (page, ids) = page_with(2);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[1].panels[0].id, ids[1]);
        assert_eq!(page.rows[1].kind, RowKind::Single);
    }

    #[test]
    fn aspect_sets_height() {
        let mut page = Page::new();
        let id = page.add_panel_with_aspect("wide.png", Some(0.5));
        assert_eq!(page.panel(id).unwrap().height, 400.0);
        page.apply_decoded_aspect(id, 2.0).unwrap();
        assert_eq!(page.panel(id).unwrap().height, 1600.0);
        page.delete_panel(id).unwrap();
        assert_eq!(
            page.apply_decoded_aspect(id, 1.0),
            Err(EditError::PanelNotFound(id))
        );
    }

    #[test]
    fn set_width_keeps_sum() {
        let (mut page, ids) = page_with(3);
        page.create_group_from_panels(&ids, "col-3").unwrap();
        page.set_width(ids[0], 50.0).unwrap();
        assert!((width_sum(&page, 0) - 100.0).abs() <= 0.01);
        assert!((page.panel(ids[0]).unwrap().width - 50.0).abs() < 0.01);
        assert!((page.panel(ids[1]).unwrap().width - 25.0).abs() < 0.01);
    }

    #[test]
    fn set_width_floors_target() {
        let (mut page, ids) = page_with(2);
        page.create_group_from_panels(&ids, "col-2").unwrap();
        page.set_width(ids[0], 2.0).unwrap();
        assert!((page.panel(ids[0]).unwrap().width - 10.0).abs() < 0.01);
        assert!((page.panel(ids[1]).unwrap().width - 90.0).abs() < 0.01);
    }

    #[test]
    fn set_width_rejects_non_finite() {
        let (mut page, ids) = page_with(3);
        page.create_group_from_panels(&ids, "col-3").unwrap();
        let before: Vec<f32> = page.rows[0].panels.iter().map(|p| p.width).collect();
        for bad in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            assert!(matches!(
                page.set_width(ids[0], bad),
                Err(EditError::InvalidValue { field: "width", .. })
            ));
        }
        let after: Vec<f32> = page.rows[0].panels.iter().map(|p| p.width).collect();
        assert_eq!(before, after);
        assert!((width_sum(&page, 0) - 100.0).abs() <= 0.01);
    }

    #[test]
    fn floor_clipped_remainder_is_rescaled() {
        let (mut page, ids) = page_with(3);
        page.create_group_from_panels(&ids, "col-3").unwrap();
        page.rows[0].panels[1].width = 12.0;
        page.rows[0].panels[2].width = 54.0;
        page.rows[0].panels[0].width = 34.0;
        // +40 on the first panel: each sibling gives 20, the 12 % one floors at 10.
        page.set_width(ids[0], 74.0).unwrap();
        let w: Vec<f32> = page.rows[0].panels.iter().map(|p| p.width).collect();
        let total = 74.0 + 10.0 + 34.0;
        assert!((w[0] - 74.0 * 100.0 / total).abs() < 0.01);
        assert!((w[1] - 10.0 * 100.0 / total).abs() < 0.01);
        assert!((width_sum(&page, 0) - 100.0).abs() <= 0.01);
    }

    #[test]
    fn set_width_fails_when_siblings_locked() {
        let (mut page, ids) = page_with(3);
        page.create_group_from_panels(&ids, "col-3").unwrap();
        page.toggle_lock(ids[1]).unwrap();
        page.toggle_lock(ids[2]).unwrap();
        let before: Vec<f32> = page.rows[0].panels.iter().map(|p| p.width).collect();
        assert_eq!(
            page.set_width(ids[0], 60.0),
            Err(EditError::NoUnlockedSiblings)
        );
        let after: Vec<f32> = page.rows[0].panels.iter().map(|p| p.width).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn set_width_on_single_row_fails() {
        let (mut page, ids) = page_with(1);
        assert_eq!(page.set_width(ids[0], 50.0), Err(EditError::NotGrouped(ids[0])));
        assert_eq!(page.panel(ids[0]).unwrap().width, 100.0);
    }

    #[test]
    fn toggle_lock_warns_on_frozen_drift() {
        let (mut page, ids) = page_with(2);
        page.create_group_from_panels(&ids, "col-2").unwrap();
        page.rows[0].panels[0].width = 70.0;
        assert_eq!(page.toggle_lock(ids[0]), Ok(LockOutcome::Toggled));
        assert_eq!(page.toggle_lock(ids[1]), Ok(LockOutcome::FrozenInconsistent));
        assert!(page.panel(ids[1]).unwrap().locked);
        assert_eq!(
            page.toggle_lock(PanelId(99)),
            Err(EditError::PanelNotFound(PanelId(99)))
        );
    }

    #[test]
    fn toggle_lock_consistent_row_is_fine() {
        let (mut page, ids) = page_with(2);
        page.create_group_from_panels(&ids, "col-2").unwrap();
        page.toggle_lock(ids[0]).unwrap();
        assert_eq!(page.toggle_lock(ids[1]), Ok(LockOutcome::Toggled));
    }

    #[test]
    fn group_then_ungroup_restores_singles() {
        let (mut page, ids) = page_with(3);
        let row = page.create_group_from_panels(&ids, "col-3").unwrap();
        assert_eq!(page.rows.len(), 1);
        page.ungroup_row(row).unwrap();
        assert_eq!(page.rows.len(), 3);
        for (row, id) in page.rows.iter().zip(&ids) {
            assert_eq!(row.kind, RowKind::Single);
            assert_eq!(row.panels.len(), 1);
            assert_eq!(row.panels[0].id, *id);
            assert_eq!(row.panels[0].width, 100.0);
            assert!(!row.panels[0].locked);
        }
    }

    #[test]
    fn group_keeps_selection_order_and_position() {
        let (mut page, ids) = page_with(4);
        let row = page
            .create_group_from_panels(&[ids[3], ids[1]], "col-2")
            .unwrap();
        assert_eq!(row, 1);
        assert_eq!(page.rows.len(), 3);
        let grouped: Vec<PanelId> = page.rows[1].panels.iter().map(|p| p.id).collect();
        assert_eq!(grouped, vec![ids[3], ids[1]]);
        assert_eq!(page.rows[0].panels[0].id, ids[0]);
        assert_eq!(page.rows[2].panels[0].id, ids[2]);
    }

    #[test]
    fn group_rejects_bad_selections() {
        let (mut page, ids) = page_with(5);
        assert_eq!(
            page.create_group_from_panels(&ids[..1], "col-2"),
            Err(EditError::GroupSize(1))
        );
        assert_eq!(
            page.create_group_from_panels(&ids, "col-4"),
            Err(EditError::GroupSize(5))
        );
        assert_eq!(
            page.create_group_from_panels(&[ids[0], ids[0]], "col-2"),
            Err(EditError::DuplicatePanel(ids[0]))
        );
        assert!(matches!(
            page.create_group_from_panels(&ids[..2], "col-3"),
            Err(EditError::LayoutCount { .. })
        ));
        page.create_group_from_panels(&ids[..2], "col-2").unwrap();
        assert_eq!(
            page.create_group_from_panels(&[ids[0], ids[2]], "col-2"),
            Err(EditError::NotSingle(ids[0]))
        );
        assert_eq!(page.rows.len(), 4);
    }

    #[test]
    fn delete_down_to_one_makes_single() {
        let (mut page, ids) = page_with(2);
        page.create_group_from_panels(&ids, "col-2-left").unwrap();
        page.toggle_lock(ids[1]).unwrap();
        page.delete_panel(ids[0]).unwrap();
        let row = &page.rows[0];
        assert_eq!(row.kind, RowKind::Single);
        assert_eq!(row.panels[0].width, 100.0);
        assert!(!row.panels[0].locked);
    }

    #[test]
    fn delete_from_group_rebalances_and_relayouts() {
        let (mut page, ids) = page_with(3);
        page.create_group_from_panels(&ids, "col-2-stack-r").unwrap();
        page.delete_panel(ids[1]).unwrap();
        assert!((width_sum(&page, 0) - 100.0).abs() <= 0.01);
        assert_eq!(page.rows[0].layout(), Some("col-2"));
    }

    #[test]
    fn delete_last_panel_removes_row() {
        let (mut page, ids) = page_with(2);
        page.delete_panel(ids[0]).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(page.delete_panel(ids[0]).is_err());
    }

    #[test]
    fn change_layout_checks_count() {
        let (mut page, ids) = page_with(4);
        let row = page.create_group_from_panels(&ids, "2x2").unwrap();
        page.change_group_layout(row, "col-4").unwrap();
        assert_eq!(page.rows[row].layout(), Some("col-4"));
        assert!(matches!(
            page.change_group_layout(row, "col-3"),
            Err(EditError::LayoutCount {
                expected: 3,
                actual: 4,
                ..
            })
        ));
        assert_eq!(page.rows[row].layout(), Some("col-4"));
        assert_eq!(
            page.change_group_layout(row, "nope"),
            Err(EditError::UnknownLayout("nope".into()))
        );
    }

    #[test]
    fn panel_index_roundtrip() {
        let (mut page, ids) = page_with(4);
        page.create_group_from_panels(&ids[1..3], "col-2").unwrap();
        for (n, id) in ids.iter().enumerate() {
            assert_eq!(page.panel_index(*id), Some(n + 1));
            assert_eq!(page.panel_by_index(n + 1).map(|p| p.id), Some(*id));
        }
        assert!(page.panel_by_index(0).is_none());
        assert!(page.panel_by_index(5).is_none());
    }

    #[test]
    fn move_rows() {
        let (mut page, ids) = page_with(3);
        assert_eq!(page.move_row(0, -1), Ok(false));
        assert_eq!(page.move_row(0, 1), Ok(true));
        assert_eq!(page.rows[1].panels[0].id, ids[0]);
        page.move_row_to(2, 0).unwrap();
        assert_eq!(page.rows[0].panels[0].id, ids[2]);
        assert!(page.move_row_to(3, 0).is_err());
    }

    #[test]
    fn transform_setters_validate() {
        let (mut page, ids) = page_with(1);
        page.set_height(ids[0], -5.0).unwrap();
        assert_eq!(page.panel(ids[0]).unwrap().height, 1.0);
        assert!(page.set_scale(ids[0], 0.0).is_err());
        page.set_scale(ids[0], 150.0).unwrap();
        page.set_offset(ids[0], -20.0, 12.5).unwrap();
        let p = page.panel(ids[0]).unwrap();
        assert_eq!((p.ox, p.oy, p.scale), (-20.0, 12.5, 150.0));
        assert!(page.set_offset(ids[0], f32::INFINITY, 0.0).is_err());
    }

    #[test]
    fn bubbles_get_fresh_ids_on_top() {
        let (mut page, ids) = page_with(2);
        page.add_overlay(ids[0], "fx.png").unwrap();
        let a = page.add_bubble(ids[0], BubbleKind::Speech).unwrap();
        let b = page.add_bubble(ids[1], BubbleKind::Sfx).unwrap();
        assert_ne!(a, b);
        let p = page.panel(ids[0]).unwrap();
        assert_eq!(p.layers.last().map(|l| l.z_index), Some(2));
        assert_eq!(page.bubble_owner(b), Some(ids[1]));
        page.remove_bubble(ids[0], a).unwrap();
        assert!(page.remove_bubble(ids[0], a).is_err());
        assert_eq!(
            page.add_bubble(PanelId(42), BubbleKind::Speech),
            Err(EditError::PanelNotFound(PanelId(42)))
        );
    }
}
