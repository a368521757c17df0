pub mod bubble;
pub mod color;
pub mod error;
pub mod geometry;
pub mod id;
pub mod import;
pub mod layers;
pub mod layout;
pub mod lint;
pub mod model;
pub mod page;
pub mod snapshot;
pub mod template;

pub use bubble::{BorderStyle, Bubble, BubbleKind, BubbleShape, TailDir};
pub use color::Color;
pub use error::EditError;
pub use geometry::{PageLayout, PageMetrics, PanelBox, dom_layout, layout_page, place_image};
pub use id::{BubbleId, IdCounters, LayerId, OverlayId, PanelId, RowId};
pub use import::{ImportDocument, ImportError, ImportReport, parse_import};
pub use layout::{GridLayout, LAYOUTS, LayoutDef, find_layout, get_layouts};
pub use lint::{LintDiagnostic, LintSeverity, LintTarget, lint_page};
pub use model::*;
pub use page::{LockOutcome, PanelLocation};
pub use snapshot::{Snapshot, SnapshotError, restore_or_empty};
