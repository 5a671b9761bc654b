use crate::error::Result;
use crate::events::{FrameDescriptor, TabDestination, TabId, WindowEvent, WindowId, WindowInfo};
use crate::utils::window_geometry::{Bounds, Point, Size};
use tokio::sync::broadcast;

/// Оконный слой с точки зрения координатора перетаскивания.
///
/// Запросы синхронные и дешёвые, их вызывает редьюсер. Команды отдаёт только
/// исполнитель эффектов и никогда во время редукции сессии. Подтверждение
/// выполнения команды приходит асинхронно через [`WindowRegistry::subscribe`].
pub trait WindowRegistry: Send + Sync {
    fn window(&self, id: WindowId) -> Option<WindowInfo>;

    /// Все окна в стабильном порядке перечисления.
    fn all_windows(&self) -> Vec<WindowInfo>;

    fn cursor_screen_point(&self) -> Point;

    fn focused_window(&self) -> Option<WindowId>;

    /// Какое окно сейчас владеет вкладкой.
    fn tab_window(&self, tab_id: TabId) -> Option<WindowId>;

    fn tab_count(&self, window_id: WindowId) -> usize;

    fn buffer_window(&self) -> Option<WindowId>;

    fn set_position(&self, window_id: WindowId, position: Point, animate: bool) -> Result<()>;

    fn set_size(&self, window_id: WindowId, size: Size) -> Result<()>;

    fn focus(&self, window_id: WindowId) -> Result<()>;

    fn show(&self, window_id: WindowId) -> Result<()>;

    fn hide(&self, window_id: WindowId) -> Result<()>;

    fn create_window(&self, bounds: Bounds, visible: bool) -> WindowId;

    /// Закрывает окно без вкладок.
    fn close_window(&self, window_id: WindowId) -> Result<()>;

    fn set_buffer_window(&self, window_id: WindowId) -> Result<()>;

    fn clear_buffer_window(&self);

    /// Переносит вкладку. Возвращает окно, в котором она теперь находится.
    fn move_tab(
        &self,
        tab_id: TabId,
        frame: &FrameDescriptor,
        destination: TabDestination,
    ) -> Result<WindowId>;

    fn set_tab_index(&self, tab_id: TabId, index: usize) -> Result<()>;

    /// Доставляет синтетическое движение указателя окну, которое не получает
    /// нативных событий указателя во время чужого перетаскивания.
    fn send_pointer_move(&self, window_id: WindowId, screen: Point) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<WindowEvent>;
}
