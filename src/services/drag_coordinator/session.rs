use crate::events::{DragSourceData, FrameDescriptor, TabId, WindowId};
use crate::utils::window_geometry::{FrameInsets, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Где произошло отсоединение: окно, которое покинула вкладка, и её клиентская позиция там.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachOrigin {
    pub window_id: WindowId,
    pub tab: Point,
}

/// Единственное текущее перетаскивание вкладки. Отсутствует, когда перетаскивания нет.
///
/// Из `attach_requested_window_id`, `detach_to_requested_window_id` и
/// `detach_requested_window_id` одновременно задано не больше одного поля:
/// сессия ждёт не больше одного межоконного перехода.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragSession {
    pub source_tab_id: TabId,
    pub original_window_id: WindowId,
    /// Окно, подтвердившее владение вкладкой. Никогда не обновляется заранее.
    pub current_window_id: WindowId,
    pub origin_client: Point,
    pub origin_screen: Point,
    pub frame_insets: FrameInsets,
    pub relative_drag_start: Point,
    /// Последняя позиция курсора в клиентских координатах целевого окна, для его полосы вкладок.
    pub drag_window_client: Option<Point>,
    /// Последний отправленный индекс перестановки, отсекает повторные команды.
    pub display_index_requested: Option<usize>,
    pub attach_requested_window_id: Option<WindowId>,
    /// Ожидаемое отсоединение в (уже существующее) буферное окно.
    pub detach_to_requested_window_id: Option<WindowId>,
    /// Ожидаемое отсоединение в окно, которое ещё не создано.
    pub detach_requested_window_id: Option<WindowId>,
    pub detached_from: Option<DetachOrigin>,
    /// Окно, которое существует только потому, что это перетаскивание отсоединило в него вкладку.
    pub drag_detached_window_id: Option<WindowId>,
    pub originated_from_single_tab_window: bool,
    pub frame: FrameDescriptor,
}

/// Фаза, выведенная из заполненных ожидающих полей.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Free,
    AwaitingAttach(WindowId),
    AwaitingDetach(WindowId),
    AwaitingWindowCreated,
}

impl fmt::Display for DragPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DragPhase::Free => f.write_str("свободно"),
            DragPhase::AwaitingAttach(id) => write!(f, "ждём присоединения к {}", id),
            DragPhase::AwaitingDetach(id) => write!(f, "ждём отсоединения в {}", id),
            DragPhase::AwaitingWindowCreated => f.write_str("ждём новое окно"),
        }
    }
}

impl DragSession {
    pub fn start(source: &DragSourceData, frame_insets: FrameInsets) -> Self {
        Self {
            source_tab_id: source.source_tab_id,
            original_window_id: source.original_window_id,
            current_window_id: source.current_window_id,
            origin_client: source.origin_client,
            origin_screen: source.origin_screen,
            frame_insets,
            relative_drag_start: source.relative_drag_start,
            drag_window_client: None,
            display_index_requested: None,
            attach_requested_window_id: None,
            detach_to_requested_window_id: None,
            detach_requested_window_id: None,
            detached_from: None,
            drag_detached_window_id: None,
            originated_from_single_tab_window: source.originated_from_single_tab_window,
            frame: source.frame.clone(),
        }
    }

    pub fn phase(&self) -> DragPhase {
        if let Some(id) = self.attach_requested_window_id {
            DragPhase::AwaitingAttach(id)
        } else if let Some(id) = self.detach_to_requested_window_id {
            DragPhase::AwaitingDetach(id)
        } else if self.detach_requested_window_id.is_some() {
            DragPhase::AwaitingWindowCreated
        } else {
            DragPhase::Free
        }
    }

    pub fn is_attach_pending(&self) -> bool {
        self.attach_requested_window_id.is_some()
    }

    pub fn is_detach_pending(&self) -> bool {
        self.detach_to_requested_window_id.is_some() || self.detach_requested_window_id.is_some()
    }

    pub fn is_awaiting_window_created(&self) -> bool {
        self.detach_requested_window_id.is_some()
    }

    /// Ждёт какого-либо межоконного перехода.
    pub fn is_busy(&self) -> bool {
        self.is_attach_pending() || self.is_detach_pending()
    }

    /// True, если `window_id` появилось из-за отсоединения в него перетаскиваемой вкладки.
    pub fn is_window_detached(&self, window_id: WindowId) -> bool {
        self.drag_detached_window_id == Some(window_id)
    }

    /// Клиентская точка под курсором, когда отсоединённое окно следует за указателем.
    pub fn detach_anchor(&self) -> Point {
        Point::new(self.relative_drag_start.x, self.origin_client.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DragSession {
        let source = DragSourceData {
            source_tab_id: TabId(1),
            original_window_id: WindowId(1),
            current_window_id: WindowId(1),
            origin_client: Point::new(40, 12),
            origin_screen: Point::new(40, 42),
            relative_drag_start: Point::new(8, 4),
            originated_from_single_tab_window: false,
            frame: FrameDescriptor::default(),
        };
        DragSession::start(&source, FrameInsets { left: 0, top: 30 })
    }

    #[test]
    fn test_phase_follows_pending_fields() {
        let mut s = session();
        assert_eq!(s.phase(), DragPhase::Free);
        assert!(!s.is_busy());

        s.attach_requested_window_id = Some(WindowId(2));
        assert_eq!(s.phase(), DragPhase::AwaitingAttach(WindowId(2)));

        s.attach_requested_window_id = None;
        s.detach_requested_window_id = Some(WindowId(1));
        assert_eq!(s.phase(), DragPhase::AwaitingWindowCreated);
        assert!(s.is_detach_pending());
    }

    #[test]
    fn test_detached_window_selector() {
        let mut s = session();
        assert!(!s.is_window_detached(WindowId(3)));
        s.drag_detached_window_id = Some(WindowId(3));
        assert!(s.is_window_detached(WindowId(3)));
        assert!(!s.is_window_detached(WindowId(1)));
    }

    #[test]
    fn test_detach_anchor() {
        assert_eq!(session().detach_anchor(), Point::new(8, 12));
    }
}
