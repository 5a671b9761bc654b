//! WindowRegistry: ответственность и границы
//!
//! Модуль отвечает на вопросы об окнах и вкладках (геометрия, видимость,
//! фокус, владелец вкладки, буферное окно перетаскивания) и выполняет команды
//! над окнами и вкладками. Решений о перетаскивании здесь быть НЕ ДОЛЖНО,
//! они принадлежат редьюсеру координатора.

mod in_memory;
mod r#trait;

pub use self::in_memory::InMemoryWindowRegistry;
pub use self::r#trait::WindowRegistry;
