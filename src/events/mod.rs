pub mod action;
pub mod input;
pub mod window;

pub use action::{DragAction, DragSourceData, FrameDescriptor, TabDestination, TabId, WindowId};
pub use input::{InputEvent, KeyCode, KeyState};
pub use window::{WindowEvent, WindowEventType, WindowInfo};
