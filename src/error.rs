use crate::events::{TabId, WindowId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DragError {
    #[error("Окно не найдено: {0}")]
    WindowNotFound(WindowId),

    #[error("Вкладка не найдена: {0}")]
    TabNotFound(TabId),

    #[error("Канал закрыт: {0}")]
    ChannelClosed(String),

    /// Оконный слой нарушил свою гарантию.
    #[error("Нарушен инвариант: {0}")]
    InvariantViolation(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl DragError {
    pub fn window_not_found<T>(id: WindowId) -> Result<T> {
        Err(DragError::WindowNotFound(id))
    }
}

pub type Result<T> = std::result::Result<T, DragError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! drag_error {
    (channel, $($arg:tt)*) => {
        $crate::error::DragError::ChannelClosed(format!($($arg)*))
    };
    (invariant, $($arg:tt)*) => {
        $crate::error::DragError::InvariantViolation(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::DragError::Internal(format!($($arg)*))
    };
}
