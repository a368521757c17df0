//! Input abstraction layer.
//!
//! Pointer positions arrive in page pixels at the session's metrics,
//! the same space the layout and hit tests use.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed (mouse down, touch start).
    PointerDown { x: f32, y: f32 },
    /// Pointer moved, pressed or not.
    PointerMove { x: f32, y: f32 },
    /// Pointer released.
    PointerUp { x: f32, y: f32 },
}

impl InputEvent {
    pub fn position(&self) -> (f32, f32) {
        match *self {
            Self::PointerDown { x, y } | Self::PointerMove { x, y } | Self::PointerUp { x, y } => (x, y),
        }
    }
}
