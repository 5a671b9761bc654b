use crate::utils::window_geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl WindowId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Идентификатор вкладки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Куда переносится вкладка.
///
/// `NewWindow` означает "целевого окна нет": оконный слой создаёт для вкладки
/// новое окно и позже сообщает о нём событием `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabDestination {
    Window(WindowId),
    NewWindow,
}

impl fmt::Display for TabDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabDestination::Window(id) => write!(f, "{}", id),
            TabDestination::NewWindow => write!(f, "-1"),
        }
    }
}

/// Непрозрачное описание содержимого вкладки. Передаётся при переносах без изменений.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub key: u32,
    pub location: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pinned: bool,
}

impl FrameDescriptor {
    pub fn new(key: u32, location: impl Into<String>) -> Self {
        Self {
            key,
            location: location.into(),
            ..Self::default()
        }
    }
}

/// Всё, что полоса вкладок знает в момент начала перетаскивания.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragSourceData {
    pub source_tab_id: TabId,
    pub original_window_id: WindowId,
    pub current_window_id: WindowId,
    /// Позиция указателя в начале перетаскивания, клиентские координаты исходного окна.
    pub origin_client: Point,
    /// Позиция указателя в начале перетаскивания, экранные координаты.
    pub origin_screen: Point,
    /// Смещение указателя от левого верхнего угла самой вкладки.
    pub relative_drag_start: Point,
    pub originated_from_single_tab_window: bool,
    pub frame: FrameDescriptor,
}

/// Действия, которые обрабатывает координатор перетаскивания.
///
/// Все действия сериализуемы, чтобы пересекать границу процесса или окна
/// обычным сообщением.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragAction {
    DragStarted {
        source: DragSourceData,
    },
    DragCancelled,
    DragComplete,
    ChangeWindowDisplayIndex {
        sender_window_id: WindowId,
        destination_display_index: usize,
        destination_frame_index: usize,
        /// Полоса вкладок была перемонтирована, позицию курсора нужно задать заново.
        #[serde(default)]
        requires_mouse_update: bool,
    },
    SingleTabMoved {
        window_id: WindowId,
        tab_x: i32,
        tab_y: i32,
    },
    TabAttached {
        window_id: WindowId,
    },
    DetachRequested {
        tab_x: i32,
        tab_y: i32,
    },
    WindowReady {
        window_id: WindowId,
    },
}

impl DragAction {
    pub fn name(&self) -> &'static str {
        match self {
            DragAction::DragStarted { .. } => "DragStarted",
            DragAction::DragCancelled => "DragCancelled",
            DragAction::DragComplete => "DragComplete",
            DragAction::ChangeWindowDisplayIndex { .. } => "ChangeWindowDisplayIndex",
            DragAction::SingleTabMoved { .. } => "SingleTabMoved",
            DragAction::TabAttached { .. } => "TabAttached",
            DragAction::DetachRequested { .. } => "DetachRequested",
            DragAction::WindowReady { .. } => "WindowReady",
        }
    }

    /// Завершающие действия заканчивают перетаскивание в любой фазе.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DragAction::DragCancelled | DragAction::DragComplete)
    }
}

impl fmt::Display for DragAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DragAction::SingleTabMoved { window_id, tab_x, tab_y } => {
                write!(f, "SingleTabMoved({} @ {},{})", window_id, tab_x, tab_y)
            }
            DragAction::TabAttached { window_id } => write!(f, "TabAttached({})", window_id),
            DragAction::WindowReady { window_id } => write!(f, "WindowReady({})", window_id),
            DragAction::ChangeWindowDisplayIndex {
                sender_window_id,
                destination_display_index,
                ..
            } => write!(
                f,
                "ChangeWindowDisplayIndex({} -> {})",
                sender_window_id, destination_display_index
            ),
            other => f.write_str(other.name()),
        }
    }
}
