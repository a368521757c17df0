//! Editor session: the page, what is selected, and the active tool.
//!
//! The page model knows nothing about selection. The session owns it,
//! routes every edit through [`EditorSession::apply`], and prunes the
//! selection whenever an edit removes what it pointed at.
//!
//! Each successful edit bumps a revision counter. An autosave timer
//! calls [`EditorSession::snapshot_if_changed`] and only gets a snapshot
//! when something changed since the last one.

use crate::input::InputEvent;
use crate::tools::{BubbleTool, PanTool, Tool, ToolKind};
use koma_core::bubble::{BorderStyle, BubbleKind, BubbleShape, TailDir};
use koma_core::color::Color;
use koma_core::error::EditError;
use koma_core::geometry::{PageLayout, PageMetrics, layout_page};
use koma_core::id::{BubbleId, LayerId, OverlayId, PanelId};
use koma_core::import::{ImportDocument, ImportReport};
use koma_core::model::{BlendMode, Page, PixelBox};
use koma_core::page::LockOutcome;
use koma_core::snapshot::Snapshot;
use koma_render::hit::{Hit, hit_test};
use serde::{Deserialize, Serialize};

// ─── Mutations ───────────────────────────────────────────────────────────

/// One edit to the page, as sent by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Mutation {
    AddPanel {
        src: String,
        #[serde(default)]
        aspect: Option<f32>,
    },
    /// Aspect ratio learned after the image finished decoding.
    ApplyAspect { panel: PanelId, aspect: f32 },
    DeletePanel { panel: PanelId },
    SetHeight { panel: PanelId, height: f32 },
    SetOffset { panel: PanelId, ox: f32, oy: f32 },
    SetScale { panel: PanelId, scale: f32 },
    SetWidth { panel: PanelId, width: f32 },
    ToggleLock { panel: PanelId },

    CreateGroup { panels: Vec<PanelId>, layout: String },
    Ungroup { row: usize },
    ChangeLayout { row: usize, layout: String },
    MoveRow { row: usize, delta: isize },
    MoveRowTo { from: usize, to: usize },

    AddBubble { panel: PanelId, kind: BubbleKind },
    RemoveBubble { panel: PanelId, bubble: BubbleId },
    EditBubble {
        panel: PanelId,
        bubble: BubbleId,
        edit: BubbleEdit,
    },
    /// Move the bubble whose panel-relative box was `start` by `(dx, dy)`.
    DragBubble {
        panel: PanelId,
        bubble: BubbleId,
        start: PixelBox,
        dx: f32,
        dy: f32,
    },
    ResizeBubble {
        panel: PanelId,
        bubble: BubbleId,
        start: PixelBox,
        dx: f32,
        dy: f32,
    },

    AddOverlay { panel: PanelId, file: String },
    RemoveOverlay { panel: PanelId, overlay: OverlayId },
    SetOverlayOpacity {
        panel: PanelId,
        overlay: OverlayId,
        opacity: f32,
    },
    SetOverlayBlend {
        panel: PanelId,
        overlay: OverlayId,
        mode: BlendMode,
    },
    ReorderOverlay { panel: PanelId, from: usize, to: usize },
    MoveLayerUp { panel: PanelId, layer: LayerId },
    MoveLayerDown { panel: PanelId, layer: LayerId },
    SetLayerZ { panel: PanelId, layer: LayerId, z: i32 },
}

/// A single bubble property change from the inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum BubbleEdit {
    Text(String),
    FontSize(f32),
    Tail(TailDir),
    FillColor(Color),
    TextColor(Color),
    StrokeColor(Color),
    Shape(BubbleShape),
    BorderStyle(BorderStyle),
}

/// What an applied mutation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Outcome {
    Done,
    /// The edit was valid but left the page as it was.
    Unchanged,
    Panel(PanelId),
    Bubble(BubbleId),
    Overlay(OverlayId),
    /// Index of the row a group was created at.
    Row(usize),
    /// Every panel of the row is locked with widths off 100.
    FrozenWidths,
}

// ─── Selection ───────────────────────────────────────────────────────────

/// Selected panel and bubble. A selected bubble always belongs to the
/// selected panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub panel: Option<PanelId>,
    pub bubble: Option<BubbleId>,
}

impl Selection {
    /// Drop ids that no longer exist in `page`.
    fn prune(&mut self, page: &Page) {
        if self.panel.is_some_and(|p| page.panel(p).is_none()) {
            *self = Selection::default();
        }
        if let Some(b) = self.bubble
            && page.bubble_owner(b) != self.panel
        {
            self.bubble = None;
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────────

pub struct EditorSession {
    page: Page,
    pub selection: Selection,
    metrics: PageMetrics,
    layout: PageLayout,
    revision: u64,
    saved_revision: u64,
    tool: Box<dyn Tool>,
}

impl EditorSession {
    pub fn new(metrics: PageMetrics) -> Self {
        Self::with_page(Page::new(), metrics)
    }

    pub fn with_page(page: Page, metrics: PageMetrics) -> Self {
        let layout = layout_page(&page, &metrics);
        Self {
            page,
            selection: Selection::default(),
            metrics,
            layout,
            revision: 0,
            saved_revision: 0,
            tool: Box::new(BubbleTool::new()),
        }
    }

    /// Resume from an autosave. An unreadable or foreign snapshot gives
    /// an empty page; a stale selection is dropped.
    pub fn restore(json: &str, metrics: PageMetrics) -> Self {
        let (page, selection) = match Snapshot::from_json(json).and_then(|s| {
            let sel = Selection {
                panel: s.selected_panel,
                bubble: s.selected_bubble,
            };
            s.restore().map(|page| (page, sel))
        }) {
            Ok(restored) => restored,
            Err(e) => {
                log::warn!("discarding saved page: {e}");
                (Page::new(), Selection::default())
            }
        };
        let mut session = Self::with_page(page, metrics);
        session.selection = selection;
        session.selection.prune(&session.page);
        session
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn metrics(&self) -> PageMetrics {
        self.metrics
    }

    /// Change the render width; the layout is recomputed.
    pub fn set_metrics(&mut self, metrics: PageMetrics) {
        self.metrics = metrics;
        self.relayout();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn relayout(&mut self) {
        self.layout = layout_page(&self.page, &self.metrics);
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select_panel(&mut self, panel: Option<PanelId>) {
        self.selection = Selection {
            panel: panel.filter(|p| self.page.panel(*p).is_some()),
            bubble: None,
        };
    }

    /// Select a bubble and the panel that holds it.
    pub fn select_bubble(&mut self, bubble: BubbleId) -> Result<(), EditError> {
        let panel = self
            .page
            .bubble_owner(bubble)
            .ok_or(EditError::BubbleNotFound(bubble))?;
        self.selection = Selection {
            panel: Some(panel),
            bubble: Some(bubble),
        };
        Ok(())
    }

    // ─── Edits ───────────────────────────────────────────────────────────

    /// Apply one mutation. A rejected edit leaves page, selection and
    /// revision untouched.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Outcome, EditError> {
        let outcome = self.dispatch(mutation)?;
        if outcome != Outcome::Unchanged {
            self.revision += 1;
            self.relayout();
        }
        self.selection.prune(&self.page);
        Ok(outcome)
    }

    fn dispatch(&mut self, mutation: Mutation) -> Result<Outcome, EditError> {
        let page = &mut self.page;
        let outcome = match mutation {
            Mutation::AddPanel { src, aspect } => {
                let id = page.add_panel_with_aspect(src, aspect);
                self.selection = Selection {
                    panel: Some(id),
                    bubble: None,
                };
                Outcome::Panel(id)
            }
            Mutation::ApplyAspect { panel, aspect } => {
                page.apply_decoded_aspect(panel, aspect)?;
                Outcome::Done
            }
            Mutation::DeletePanel { panel } => {
                page.delete_panel(panel)?;
                Outcome::Done
            }
            Mutation::SetHeight { panel, height } => {
                page.set_height(panel, height)?;
                Outcome::Done
            }
            Mutation::SetOffset { panel, ox, oy } => {
                page.set_offset(panel, ox, oy)?;
                Outcome::Done
            }
            Mutation::SetScale { panel, scale } => {
                page.set_scale(panel, scale)?;
                Outcome::Done
            }
            Mutation::SetWidth { panel, width } => {
                page.set_width(panel, width)?;
                Outcome::Done
            }
            Mutation::ToggleLock { panel } => match page.toggle_lock(panel)? {
                LockOutcome::Toggled => Outcome::Done,
                LockOutcome::FrozenInconsistent => Outcome::FrozenWidths,
            },

            Mutation::CreateGroup { panels, layout } => {
                Outcome::Row(page.create_group_from_panels(&panels, &layout)?)
            }
            Mutation::Ungroup { row } => {
                page.ungroup_row(row)?;
                Outcome::Done
            }
            Mutation::ChangeLayout { row, layout } => {
                page.change_group_layout(row, &layout)?;
                Outcome::Done
            }
            Mutation::MoveRow { row, delta } => {
                if page.move_row(row, delta)? {
                    Outcome::Done
                } else {
                    Outcome::Unchanged
                }
            }
            Mutation::MoveRowTo { from, to } => {
                page.move_row_to(from, to)?;
                if from == to { Outcome::Unchanged } else { Outcome::Done }
            }

            Mutation::AddBubble { panel, kind } => {
                let id = page.add_bubble(panel, kind)?;
                self.selection = Selection {
                    panel: Some(panel),
                    bubble: Some(id),
                };
                Outcome::Bubble(id)
            }
            Mutation::RemoveBubble { panel, bubble } => {
                page.remove_bubble(panel, bubble)?;
                Outcome::Done
            }
            Mutation::EditBubble { panel, bubble, edit } => {
                let b = page.bubble_mut(panel, bubble)?;
                match edit {
                    BubbleEdit::Text(text) => b.text = text,
                    BubbleEdit::FontSize(size) => {
                        if !size.is_finite() || size <= 0.0 {
                            return Err(EditError::InvalidValue {
                                field: "font size",
                                value: size,
                            });
                        }
                        b.font_size = size;
                    }
                    BubbleEdit::Tail(tail) => b.tail = tail,
                    BubbleEdit::FillColor(c) => b.fill_color = c,
                    BubbleEdit::TextColor(c) => b.text_color = c,
                    BubbleEdit::StrokeColor(c) => b.stroke_color = c,
                    BubbleEdit::Shape(shape) => b.shape = shape,
                    BubbleEdit::BorderStyle(style) => b.border_style = style,
                }
                Outcome::Done
            }
            Mutation::DragBubble {
                panel,
                bubble,
                start,
                dx,
                dy,
            } => {
                let (w, h) = self.panel_size(panel)?;
                self.page.bubble_mut(panel, bubble)?.drag_from(start, dx, dy, w, h);
                Outcome::Done
            }
            Mutation::ResizeBubble {
                panel,
                bubble,
                start,
                dx,
                dy,
            } => {
                let (w, h) = self.panel_size(panel)?;
                self.page.bubble_mut(panel, bubble)?.resize_from(start, dx, dy, w, h);
                Outcome::Done
            }

            Mutation::AddOverlay { panel, file } => Outcome::Overlay(page.add_overlay(panel, file)?),
            Mutation::RemoveOverlay { panel, overlay } => {
                page.remove_overlay(panel, overlay)?;
                Outcome::Done
            }
            Mutation::SetOverlayOpacity {
                panel,
                overlay,
                opacity,
            } => {
                page.layers_of(panel)?.set_overlay_opacity(overlay, opacity)?;
                Outcome::Done
            }
            Mutation::SetOverlayBlend { panel, overlay, mode } => {
                page.layers_of(panel)?.set_overlay_blend_mode(overlay, mode)?;
                Outcome::Done
            }
            Mutation::ReorderOverlay { panel, from, to } => {
                page.layers_of(panel)?.reorder_overlay(from, to)?;
                Outcome::Done
            }
            Mutation::MoveLayerUp { panel, layer } => {
                if page.layers_of(panel)?.move_layer_up(layer)? {
                    Outcome::Done
                } else {
                    Outcome::Unchanged
                }
            }
            Mutation::MoveLayerDown { panel, layer } => {
                if page.layers_of(panel)?.move_layer_down(layer)? {
                    Outcome::Done
                } else {
                    Outcome::Unchanged
                }
            }
            Mutation::SetLayerZ { panel, layer, z } => {
                page.layers_of(panel)?.set_layer_z(layer, z)?;
                Outcome::Done
            }
        };
        Ok(outcome)
    }

    /// Current pixel size of a panel's box.
    fn panel_size(&self, panel: PanelId) -> Result<(f32, f32), EditError> {
        self.layout
            .panel_box(panel)
            .map(|b| (b.rect.width, b.rect.height))
            .ok_or(EditError::PanelNotFound(panel))
    }

    /// Bulk-add bubbles from an import document.
    pub fn import_bubbles(&mut self, doc: &ImportDocument) -> ImportReport {
        let report = self.page.import_bubbles(doc);
        if report.imported > 0 {
            self.revision += 1;
            self.relayout();
        }
        report
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    pub fn set_tool(&mut self, kind: ToolKind) {
        if self.tool.kind() == kind {
            return;
        }
        self.tool = match kind {
            ToolKind::Bubble => Box::new(BubbleTool::new()),
            ToolKind::Pan => Box::new(PanTool::new()),
        };
    }

    pub fn tool(&self) -> ToolKind {
        self.tool.kind()
    }

    /// What lies under a page-pixel position.
    pub fn hit(&self, x: f32, y: f32) -> Option<Hit> {
        hit_test(&self.page, &self.layout, x, y)
    }

    /// Feed a pointer event. Pressing selects what is under the pointer;
    /// the active tool turns the gesture into mutations. Returns whether
    /// the page changed.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let (x, y) = event.position();
        let hit = self.hit(x, y);
        if let InputEvent::PointerDown { .. } = event {
            self.selection = match hit {
                Some(Hit::Bubble { panel, bubble, .. }) => Selection {
                    panel: Some(panel),
                    bubble: Some(bubble),
                },
                Some(Hit::Panel(panel)) => Selection {
                    panel: Some(panel),
                    bubble: None,
                },
                None => Selection::default(),
            };
        }

        let mutations = self.tool.handle(event, hit, &self.page, &self.layout);
        let mut changed = false;
        for m in mutations {
            match self.apply(m) {
                Ok(outcome) => changed |= outcome != Outcome::Unchanged,
                Err(e) => log::debug!("pointer edit rejected: {e}"),
            }
        }
        changed
    }

    // ─── Autosave ────────────────────────────────────────────────────────

    /// Full snapshot, selection included.
    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::capture(&self.page);
        snap.selected_panel = self.selection.panel;
        snap.selected_bubble = self.selection.bubble;
        snap
    }

    /// A snapshot when the page changed since the last call, else `None`.
    pub fn snapshot_if_changed(&mut self) -> Option<Snapshot> {
        if self.revision == self.saved_revision {
            return None;
        }
        self.saved_revision = self.revision;
        log::trace!("autosave at revision {}", self.revision);
        Some(self.snapshot())
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(PageMetrics::default())
    }
}
