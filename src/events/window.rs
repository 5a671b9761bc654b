use super::action::{TabId, WindowId};
use crate::utils::window_geometry::{Point, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Снимок окна приложения с точки зрения оконного слоя
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    /// Внешний (с рамкой) левый верхний угол в экранных координатах.
    pub position: Point,
    /// Внешний размер с заголовком и рамками.
    pub size: Size,
    /// Размер клиентской области.
    pub content_size: Size,
    pub visible: bool,
    pub focused: bool,
}

impl WindowInfo {
    pub fn new(id: WindowId, position: Point, size: Size) -> Self {
        Self {
            id,
            position,
            size,
            content_size: size,
            visible: true,
            focused: false,
        }
    }

    pub fn with_content_size(mut self, content_size: Size) -> Self {
        self.content_size = content_size;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} ({}){}",
            self.id,
            self.position,
            self.size,
            if self.visible { "" } else { " hidden" }
        )
    }
}

/// Событие оконного слоя
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub window_id: WindowId,
    pub timestamp: std::time::Instant,
    pub event_type: WindowEventType,
}

impl WindowEvent {
    pub fn new(window_id: WindowId, event_type: WindowEventType) -> Self {
        Self {
            window_id,
            timestamp: std::time::Instant::now(),
            event_type,
        }
    }

    pub fn created(window_id: WindowId) -> Self {
        Self::new(window_id, WindowEventType::Created)
    }

    pub fn tab_attached(window_id: WindowId, tab_id: TabId) -> Self {
        Self::new(window_id, WindowEventType::TabAttached(tab_id))
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} ({}ms ago)",
            self.event_type,
            self.window_id,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Тип события окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventType {
    FocusChanged,
    Created,
    Destroyed,
    GeometryChanged,
    TabAttached(TabId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_info_creation() {
        let window = WindowInfo::new(WindowId(1), Point::new(10, 20), Size::new(800, 600))
            .with_content_size(Size::new(800, 570))
            .hidden();

        assert_eq!(window.id, WindowId(1));
        assert_eq!(window.content_size, Size::new(800, 570));
        assert!(!window.visible);
        assert!(!window.focused);
    }

    #[test]
    fn test_window_event_creation() {
        let event = WindowEvent::tab_attached(WindowId(2), TabId(7));
        assert_eq!(event.window_id, WindowId(2));
        assert_eq!(event.event_type, WindowEventType::TabAttached(TabId(7)));

        let event = WindowEvent::created(WindowId(3));
        assert_eq!(event.event_type, WindowEventType::Created);
    }
}
