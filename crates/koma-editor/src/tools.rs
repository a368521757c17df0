//! Tool system for canvas interactions.
//!
//! Each tool translates pointer events into [`Mutation`]s that the
//! session applies to the page.
//!
//! | Tool | Down on bubble | Down on bubble grip | Down on panel |
//! |------|----------------|---------------------|---------------|
//! | **Bubble** | Drag the bubble | Resize the bubble | — |
//! | **Pan** | — | — | Pan the panel image |

use crate::input::InputEvent;
use crate::session::Mutation;
use koma_core::geometry::PageLayout;
use koma_core::id::{BubbleId, PanelId};
use koma_core::model::{Page, PixelBox, STANDARD_WIDTH};
use koma_render::hit::Hit;

/// The active tool determines how input events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Bubble,
    Pan,
}

/// Trait for tools that handle input and produce mutations.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Handle an input event, returning zero or more mutations.
    /// `hit` is what lay under the pointer when the event arrived.
    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, page: &Page, layout: &PageLayout) -> Vec<Mutation>;

    /// Whether a gesture is in progress.
    fn is_active(&self) -> bool;
}

// ─── Bubble Tool ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Drag,
    Resize,
}

#[derive(Debug, Clone, Copy)]
struct BubbleGrab {
    panel: PanelId,
    bubble: BubbleId,
    gesture: Gesture,
    origin: (f32, f32),
    /// Bubble box relative to the panel when the gesture started.
    start: PixelBox,
}

/// Moves and resizes bubbles. Every move is expressed against the box at
/// gesture start, so clamping at a panel edge never accumulates drift.
#[derive(Debug, Default)]
pub struct BubbleTool {
    grab: Option<BubbleGrab>,
}

impl BubbleTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> Option<Gesture> {
        self.grab.map(|g| g.gesture)
    }

    fn mutation(grab: &BubbleGrab, x: f32, y: f32) -> Mutation {
        let (dx, dy) = (x - grab.origin.0, y - grab.origin.1);
        match grab.gesture {
            Gesture::Drag => Mutation::DragBubble {
                panel: grab.panel,
                bubble: grab.bubble,
                start: grab.start,
                dx,
                dy,
            },
            Gesture::Resize => Mutation::ResizeBubble {
                panel: grab.panel,
                bubble: grab.bubble,
                start: grab.start,
                dx,
                dy,
            },
        }
    }
}

impl Tool for BubbleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Bubble
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, page: &Page, layout: &PageLayout) -> Vec<Mutation> {
        match *event {
            InputEvent::PointerDown { x, y } => {
                self.grab = None;
                let Some(Hit::Bubble {
                    panel,
                    bubble,
                    on_handle,
                }) = hit
                else {
                    return Vec::new();
                };
                let (Some(area), Some(b)) = (
                    layout.panel_box(panel),
                    page.panel(panel).and_then(|p| p.bubble(bubble)),
                ) else {
                    return Vec::new();
                };
                self.grab = Some(BubbleGrab {
                    panel,
                    bubble,
                    gesture: if on_handle { Gesture::Resize } else { Gesture::Drag },
                    origin: (x, y),
                    start: b.local_rect(area.rect.width, area.rect.height),
                });
                Vec::new()
            }
            InputEvent::PointerMove { x, y } => match &self.grab {
                Some(grab) => vec![Self::mutation(grab, x, y)],
                None => Vec::new(),
            },
            InputEvent::PointerUp { x, y } => match self.grab.take() {
                Some(grab) if (x, y) != grab.origin => vec![Self::mutation(&grab, x, y)],
                _ => Vec::new(),
            },
        }
    }

    fn is_active(&self) -> bool {
        self.grab.is_some()
    }
}

// ─── Pan Tool ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PanGrab {
    panel: PanelId,
    origin: (f32, f32),
    start: (f32, f32),
    /// Rendered pixels per authored pixel.
    unit: f32,
}

/// Drags a panel's image offset. Offsets are stored in authored pixels,
/// so pointer deltas are divided by the render scale.
#[derive(Debug, Default)]
pub struct PanTool {
    grab: Option<PanGrab>,
}

impl PanTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutation(grab: &PanGrab, x: f32, y: f32) -> Mutation {
        Mutation::SetOffset {
            panel: grab.panel,
            ox: grab.start.0 + (x - grab.origin.0) / grab.unit,
            oy: grab.start.1 + (y - grab.origin.1) / grab.unit,
        }
    }
}

impl Tool for PanTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Pan
    }

    fn handle(&mut self, event: &InputEvent, hit: Option<Hit>, page: &Page, layout: &PageLayout) -> Vec<Mutation> {
        match *event {
            InputEvent::PointerDown { x, y } => {
                self.grab = match hit {
                    Some(Hit::Panel(id)) => page.panel(id).map(|p| PanGrab {
                        panel: id,
                        origin: (x, y),
                        start: (p.ox, p.oy),
                        unit: (layout.width / STANDARD_WIDTH).max(f32::EPSILON),
                    }),
                    _ => None,
                };
                Vec::new()
            }
            InputEvent::PointerMove { x, y } => match &self.grab {
                Some(grab) => vec![Self::mutation(grab, x, y)],
                None => Vec::new(),
            },
            InputEvent::PointerUp { x, y } => match self.grab.take() {
                Some(grab) if (x, y) != grab.origin => vec![Self::mutation(&grab, x, y)],
                _ => Vec::new(),
            },
        }
    }

    fn is_active(&self) -> bool {
        self.grab.is_some()
    }
}
