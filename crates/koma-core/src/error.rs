use crate::id::{BubbleId, LayerId, OverlayId, PanelId};
use thiserror::Error;

/// A rejected page edit. The page is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("panel {0} not found")]
    PanelNotFound(PanelId),
    #[error("no row at index {0}")]
    RowNotFound(usize),
    #[error("bubble {0} not found")]
    BubbleNotFound(BubbleId),
    #[error("overlay {0} not found")]
    OverlayNotFound(OverlayId),
    #[error("layer {0} not found")]
    LayerNotFound(LayerId),
    #[error("the image layer is fixed at the bottom of the stack")]
    ImageLayerFixed,
    #[error("panel {0} is not part of a group")]
    NotGrouped(PanelId),
    #[error("row {0} is not a group")]
    NotAGroup(usize),
    #[error("no unlocked panel can absorb the change")]
    NoUnlockedSiblings,
    #[error("a group holds 2 to 4 panels, got {0}")]
    GroupSize(usize),
    #[error("panel {0} is not alone in a single row")]
    NotSingle(PanelId),
    #[error("panel {0} was selected more than once")]
    DuplicatePanel(PanelId),
    #[error("unknown layout `{0}`")]
    UnknownLayout(String),
    #[error("layout `{key}` holds {expected} panels, the row has {actual}")]
    LayoutCount {
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },
}
