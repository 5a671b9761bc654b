//! DragCoordinator: ответственность и границы
//!
//! Владеет авторитетной сессией перетаскивания и выбирает цели присоединения
//! и отсоединения. Решения принимает синхронный редьюсер, команды окнам и
//! вкладкам ставятся в очередь эффектов и применяются исполнителем позже.
//! Сырой ввод указателя сюда не попадает, см. `drag_reporter`.

mod coordinator;
mod effects;
mod reducer;
mod session;

pub use self::coordinator::DragCoordinator;
pub use self::effects::{DragEffect, EffectExecutor};
pub use self::reducer::{reduce, ReduceContext, Transition};
pub use self::session::{DetachOrigin, DragPhase, DragSession};
