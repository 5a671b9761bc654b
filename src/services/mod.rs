pub mod drag_coordinator;
pub mod drag_reporter;
pub mod window_motion;
pub mod window_registry;

pub use drag_coordinator::{DragCoordinator, DragSession, EffectExecutor};
pub use drag_reporter::DragReporter;
pub use window_motion::create_window_motion;
pub use window_registry::{InMemoryWindowRegistry, WindowRegistry};
