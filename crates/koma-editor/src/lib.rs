pub mod input;
pub mod session;
pub mod tools;

pub use input::InputEvent;
pub use session::{BubbleEdit, EditorSession, Mutation, Outcome, Selection};
pub use tools::{BubbleTool, Gesture, PanTool, Tool, ToolKind};
