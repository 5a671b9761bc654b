use crate::drag_error;
use crate::error::{DragError, Result};
use crate::events::{
    FrameDescriptor, TabDestination, TabId, WindowEvent, WindowEventType, WindowId, WindowInfo,
};
use crate::trace_if_enabled;
use crate::utils::window_geometry::{Bounds, Point, Size};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::r#trait::WindowRegistry;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub window_id: WindowId,
    pub position: Point,
    pub animate: bool,
}

/// Оконный слой целиком в памяти.
///
/// Используется для симулированного рабочего стола и как реестр в тестах.
/// Команды выполняются сразу и подтверждаются через канал событий, так же как
/// настоящий оконный слой подтвердил бы их позже.
pub struct InMemoryWindowRegistry {
    windows: DashMap<WindowId, WindowInfo>,
    tabs: RwLock<BTreeMap<WindowId, Vec<TabId>>>,
    frames: DashMap<TabId, FrameDescriptor>,
    cursor: RwLock<Point>,
    focused: RwLock<Option<WindowId>>,
    buffer: RwLock<Option<WindowId>>,
    next_window_id: AtomicU32,
    events: broadcast::Sender<WindowEvent>,
    position_history: RwLock<Vec<PositionChange>>,
    pointer_moves: RwLock<Vec<(WindowId, Point)>>,
}

impl Default for InMemoryWindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWindowRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            windows: DashMap::new(),
            tabs: RwLock::new(BTreeMap::new()),
            frames: DashMap::new(),
            cursor: RwLock::new(Point::ORIGIN),
            focused: RwLock::new(None),
            buffer: RwLock::new(None),
            next_window_id: AtomicU32::new(1),
            events,
            position_history: RwLock::new(Vec::new()),
            pointer_moves: RwLock::new(Vec::new()),
        }
    }

    pub fn add_window(&self, window: WindowInfo, tabs: &[TabId]) {
        let id = window.id;
        self.next_window_id.fetch_max(id.value() + 1, Ordering::Relaxed);
        if window.focused {
            self.set_focused(Some(id));
        }
        self.windows.insert(id, window);
        self.tabs.write().insert(id, tabs.to_vec());
        for tab in tabs {
            self.frames
                .entry(*tab)
                .or_insert_with(|| FrameDescriptor::new(tab.0, "about:blank"));
        }
    }

    pub fn set_cursor(&self, cursor: Point) {
        *self.cursor.write() = cursor;
    }

    pub fn tabs_of(&self, window_id: WindowId) -> Vec<TabId> {
        self.tabs.read().get(&window_id).cloned().unwrap_or_default()
    }

    pub fn position_history(&self) -> Vec<PositionChange> {
        self.position_history.read().clone()
    }

    pub fn pointer_moves(&self) -> Vec<(WindowId, Point)> {
        self.pointer_moves.read().clone()
    }

    fn emit(&self, event: WindowEvent) {
        trace_if_enabled!("Событие окна: {}", event);
        // Подписчиков может не быть, тогда подтверждения никто не ждёт.
        let _ = self.events.send(event);
    }

    fn set_focused(&self, focused: Option<WindowId>) {
        let previous = std::mem::replace(&mut *self.focused.write(), focused);
        if let Some(previous) = previous {
            if let Some(mut window) = self.windows.get_mut(&previous) {
                window.focused = false;
            }
        }
        if let Some(id) = focused {
            if let Some(mut window) = self.windows.get_mut(&id) {
                window.focused = true;
            }
        }
    }

    fn with_window<T>(&self, window_id: WindowId, f: impl FnOnce(&mut WindowInfo) -> T) -> Result<T> {
        match self.windows.get_mut(&window_id) {
            Some(mut window) => Ok(f(&mut window)),
            None => DragError::window_not_found(window_id),
        }
    }

    /// Окно без вкладок исчезает, если только это не буфер перетаскивания.
    /// Буфер лишь скрывается, чтобы принять следующее отсоединение.
    fn release_if_empty(&self, window_id: WindowId) {
        if self.tab_count(window_id) > 0 {
            return;
        }

        if self.buffer_window() == Some(window_id) {
            debug!("Окно {} пустое и остаётся буфером перетаскивания", window_id);
            if let Some(mut window) = self.windows.get_mut(&window_id) {
                window.visible = false;
            }
            return;
        }

        info!("В окне {} не осталось вкладок, закрываем", window_id);
        self.remove_window(window_id);
    }

    fn remove_window(&self, window_id: WindowId) {
        self.windows.remove(&window_id);
        self.tabs.write().remove(&window_id);
        if *self.focused.read() == Some(window_id) {
            self.set_focused(None);
        }
        {
            let mut buffer = self.buffer.write();
            if *buffer == Some(window_id) {
                *buffer = None;
            }
        }
        self.emit(WindowEvent::new(window_id, WindowEventType::Destroyed));
    }
}

impl WindowRegistry for InMemoryWindowRegistry {
    fn window(&self, id: WindowId) -> Option<WindowInfo> {
        self.windows.get(&id).map(|w| w.clone())
    }

    fn all_windows(&self) -> Vec<WindowInfo> {
        let mut windows: Vec<WindowInfo> = self.windows.iter().map(|w| w.value().clone()).collect();
        windows.sort_by_key(|w| w.id);
        windows
    }

    fn cursor_screen_point(&self) -> Point {
        *self.cursor.read()
    }

    fn focused_window(&self) -> Option<WindowId> {
        *self.focused.read()
    }

    fn tab_window(&self, tab_id: TabId) -> Option<WindowId> {
        self.tabs
            .read()
            .iter()
            .find(|(_, tabs)| tabs.contains(&tab_id))
            .map(|(id, _)| *id)
    }

    fn tab_count(&self, window_id: WindowId) -> usize {
        self.tabs.read().get(&window_id).map_or(0, Vec::len)
    }

    fn buffer_window(&self) -> Option<WindowId> {
        *self.buffer.read()
    }

    fn set_position(&self, window_id: WindowId, position: Point, animate: bool) -> Result<()> {
        self.with_window(window_id, |w| w.position = position)?;
        self.position_history.write().push(PositionChange {
            window_id,
            position,
            animate,
        });
        self.emit(WindowEvent::new(window_id, WindowEventType::GeometryChanged));
        Ok(())
    }

    fn set_size(&self, window_id: WindowId, size: Size) -> Result<()> {
        self.with_window(window_id, |w| {
            let frame_w = w.size.width.saturating_sub(w.content_size.width);
            let frame_h = w.size.height.saturating_sub(w.content_size.height);
            w.size = size;
            w.content_size = Size::new(
                size.width.saturating_sub(frame_w),
                size.height.saturating_sub(frame_h),
            );
        })?;
        self.emit(WindowEvent::new(window_id, WindowEventType::GeometryChanged));
        Ok(())
    }

    fn focus(&self, window_id: WindowId) -> Result<()> {
        if !self.windows.contains_key(&window_id) {
            return DragError::window_not_found(window_id);
        }
        self.set_focused(Some(window_id));
        self.emit(WindowEvent::new(window_id, WindowEventType::FocusChanged));
        Ok(())
    }

    fn show(&self, window_id: WindowId) -> Result<()> {
        self.with_window(window_id, |w| w.visible = true)
    }

    fn hide(&self, window_id: WindowId) -> Result<()> {
        self.with_window(window_id, |w| w.visible = false)
    }

    fn create_window(&self, bounds: Bounds, visible: bool) -> WindowId {
        let id = WindowId(self.next_window_id.fetch_add(1, Ordering::Relaxed));
        let mut window = WindowInfo::new(id, bounds.position, bounds.size);
        window.visible = visible;
        self.windows.insert(id, window);
        self.tabs.write().insert(id, Vec::new());
        debug!("Создано окно {} в {} ({})", id, bounds.position, bounds.size);
        id
    }

    fn close_window(&self, window_id: WindowId) -> Result<()> {
        if !self.windows.contains_key(&window_id) {
            return DragError::window_not_found(window_id);
        }
        let tabs = self.tab_count(window_id);
        if tabs > 0 {
            return Err(drag_error!(
                internal,
                "в окне {} ещё {} вкладок",
                window_id,
                tabs
            ));
        }
        debug!("Закрываем окно {}", window_id);
        self.remove_window(window_id);
        Ok(())
    }

    fn set_buffer_window(&self, window_id: WindowId) -> Result<()> {
        if !self.windows.contains_key(&window_id) {
            return DragError::window_not_found(window_id);
        }
        *self.buffer.write() = Some(window_id);
        Ok(())
    }

    fn clear_buffer_window(&self) {
        *self.buffer.write() = None;
    }

    fn move_tab(
        &self,
        tab_id: TabId,
        frame: &FrameDescriptor,
        destination: TabDestination,
    ) -> Result<WindowId> {
        let source = self.tab_window(tab_id).ok_or(DragError::TabNotFound(tab_id))?;

        let (target, created) = match destination {
            TabDestination::Window(id) => {
                if !self.windows.contains_key(&id) {
                    return DragError::window_not_found(id);
                }
                (id, false)
            }
            TabDestination::NewWindow => {
                let id = WindowId(self.next_window_id.fetch_add(1, Ordering::Relaxed));
                let template = self.window(source);
                let window = match template {
                    Some(template) => WindowInfo {
                        id,
                        visible: true,
                        focused: false,
                        ..template
                    },
                    None => WindowInfo::new(id, Point::ORIGIN, Size::new(800, 600)),
                };
                self.windows.insert(id, window);
                (id, true)
            }
        };

        {
            let mut tabs = self.tabs.write();
            if let Some(list) = tabs.get_mut(&source) {
                list.retain(|t| *t != tab_id);
            }
            tabs.entry(target).or_default().push(tab_id);
        }
        self.frames.insert(tab_id, frame.clone());

        info!("Вкладка {} перенесена {} -> {}", tab_id, source, destination);

        if created {
            self.set_focused(Some(target));
            self.emit(WindowEvent::created(target));
        }
        self.emit(WindowEvent::tab_attached(target, tab_id));

        if source != target {
            self.release_if_empty(source);
        }

        Ok(target)
    }

    fn set_tab_index(&self, tab_id: TabId, index: usize) -> Result<()> {
        let mut tabs = self.tabs.write();
        let list = tabs
            .values_mut()
            .find(|list| list.contains(&tab_id))
            .ok_or(DragError::TabNotFound(tab_id))?;
        list.retain(|t| *t != tab_id);
        let index = index.min(list.len());
        list.insert(index, tab_id);
        Ok(())
    }

    fn send_pointer_move(&self, window_id: WindowId, screen: Point) -> Result<()> {
        if !self.windows.contains_key(&window_id) {
            return DragError::window_not_found(window_id);
        }
        self.pointer_moves.write().push((window_id, screen));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_windows() -> InMemoryWindowRegistry {
        let registry = InMemoryWindowRegistry::new();
        registry.add_window(
            WindowInfo::new(WindowId(1), Point::new(0, 0), Size::new(800, 600)),
            &[TabId(10), TabId(11)],
        );
        registry.add_window(
            WindowInfo::new(WindowId(2), Point::new(900, 0), Size::new(800, 600)),
            &[TabId(20)],
        );
        registry
    }

    #[test]
    fn test_move_tab_to_existing_window() {
        let registry = two_windows();
        let mut events = registry.subscribe();

        let host = registry
            .move_tab(TabId(10), &FrameDescriptor::default(), TabDestination::Window(WindowId(2)))
            .unwrap();

        assert_eq!(host, WindowId(2));
        assert_eq!(registry.tab_window(TabId(10)), Some(WindowId(2)));
        assert_eq!(registry.tabs_of(WindowId(1)), vec![TabId(11)]);
        assert_eq!(
            events.try_recv().unwrap().event_type,
            WindowEventType::TabAttached(TabId(10))
        );
    }

    #[test]
    fn test_move_tab_to_new_window_emits_created_first() {
        let registry = two_windows();
        let mut events = registry.subscribe();

        let host = registry
            .move_tab(TabId(11), &FrameDescriptor::default(), TabDestination::NewWindow)
            .unwrap();

        assert_eq!(host, WindowId(3));
        assert_eq!(registry.focused_window(), Some(WindowId(3)));
        let created = events.try_recv().unwrap();
        assert_eq!(created.window_id, WindowId(3));
        assert_eq!(created.event_type, WindowEventType::Created);
        let attached = events.try_recv().unwrap();
        assert_eq!(attached.event_type, WindowEventType::TabAttached(TabId(11)));
    }

    #[test]
    fn test_empty_window_closes_unless_buffer() {
        let registry = two_windows();
        registry
            .move_tab(TabId(20), &FrameDescriptor::default(), TabDestination::Window(WindowId(1)))
            .unwrap();
        assert!(registry.window(WindowId(2)).is_none());

        let registry = two_windows();
        registry.set_buffer_window(WindowId(2)).unwrap();
        registry
            .move_tab(TabId(20), &FrameDescriptor::default(), TabDestination::Window(WindowId(1)))
            .unwrap();
        let buffer = registry.window(WindowId(2)).unwrap();
        assert!(!buffer.visible);
    }

    #[test]
    fn test_close_window_requires_no_tabs() {
        let registry = two_windows();
        assert!(registry.close_window(WindowId(1)).is_err());
        assert!(registry.window(WindowId(1)).is_some());

        let empty = registry.create_window(Bounds::default(), false);
        registry.set_buffer_window(empty).unwrap();
        let mut events = registry.subscribe();
        registry.close_window(empty).unwrap();

        assert!(registry.window(empty).is_none());
        assert_eq!(registry.buffer_window(), None);
        assert_eq!(events.try_recv().unwrap().event_type, WindowEventType::Destroyed);
        assert!(registry.close_window(empty).is_err());
    }

    #[test]
    fn test_set_tab_index_clamps() {
        let registry = two_windows();
        registry.set_tab_index(TabId(10), 5).unwrap();
        assert_eq!(registry.tabs_of(WindowId(1)), vec![TabId(11), TabId(10)]);
        registry.set_tab_index(TabId(10), 0).unwrap();
        assert_eq!(registry.tabs_of(WindowId(1)), vec![TabId(10), TabId(11)]);
    }

    #[test]
    fn test_focus_tracks_single_window() {
        let registry = two_windows();
        registry.focus(WindowId(1)).unwrap();
        registry.focus(WindowId(2)).unwrap();
        assert!(!registry.window(WindowId(1)).unwrap().focused);
        assert!(registry.window(WindowId(2)).unwrap().focused);
        assert!(registry.focus(WindowId(9)).is_err());
    }
}
