//! DragReporter: ответственность и границы
//!
//! Единственное место, где потребляется сырой ввод указателя и клавиш. Из
//! состояния перетаскивания хранит только "моё ли окно источник", дальше по
//! цепочке видны лишь дискретные действия.

mod reporter;
mod throttle;

pub use self::reporter::DragReporter;
pub use self::throttle::Throttle;
