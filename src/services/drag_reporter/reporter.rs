use crate::config::ReporterConfig;
use crate::drag_error;
use crate::error::Result;
use crate::events::{DragAction, InputEvent, KeyCode, KeyState, WindowId};
use crate::services::window_registry::WindowRegistry;
use crate::utils::window_geometry::Point;
use crate::{debug_if_enabled, trace_if_enabled};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use super::throttle::Throttle;

/// Сторона ввода перетаскивания для одного окна.
///
/// Взведён, только пока его окно источник перетаскивания. Превращает отпускание
/// указателя и клавишу отмены в завершающие действия и передаёт движения
/// указателя (с троттлингом) другому окну в фокусе: пока перетаскивание
/// держит это окно, нативных событий указателя у того нет.
pub struct DragReporter {
    window_id: WindowId,
    registry: Arc<dyn WindowRegistry>,
    actions: mpsc::Sender<DragAction>,
    cancel_key: KeyCode,
    throttle: Throttle,
    armed: bool,
}

impl DragReporter {
    pub fn new(
        window_id: WindowId,
        config: &ReporterConfig,
        registry: Arc<dyn WindowRegistry>,
        actions: mpsc::Sender<DragAction>,
    ) -> Self {
        debug_if_enabled!("Инициализация DragReporter для окна {}", window_id);
        Self {
            window_id,
            registry,
            actions,
            cancel_key: KeyCode::new(config.cancel_key),
            throttle: Throttle::new(config.throttle()),
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn arm(&mut self) {
        info!("Окно {} источник перетаскивания, слушаем ввод указателя", self.window_id);
        self.armed = true;
        self.throttle.reset();
    }

    fn disarm(&mut self) {
        if self.armed {
            debug_if_enabled!("Окно {} перестаёт слушать ввод перетаскивания", self.window_id);
        }
        self.armed = false;
        self.throttle.reset();
    }

    /// Реагирует на действия, принятые координатором.
    pub fn observe(&mut self, action: &DragAction) {
        match action {
            DragAction::DragStarted { source } if source.original_window_id == self.window_id => {
                self.arm()
            }
            action if action.is_terminal() => self.disarm(),
            _ => {}
        }
    }

    pub async fn handle_input(&mut self, event: InputEvent) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        trace_if_enabled!("Ввод окна {}: {}", self.window_id, event);

        match event {
            InputEvent::PointerReleased { .. } => {
                self.disarm();
                self.send(DragAction::DragComplete).await?;
            }
            InputEvent::Key {
                code,
                state: KeyState::Pressed,
            } if code == self.cancel_key => {
                self.disarm();
                self.send(DragAction::DragCancelled).await?;
            }
            InputEvent::Key { .. } => {}
            InputEvent::PointerMoved { screen } => {
                if let Some(point) = self.throttle.offer(screen, Instant::now()) {
                    self.forward(point);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(point) = self.throttle.flush(Instant::now()) {
            self.forward(point);
        }
    }

    fn forward(&self, screen: Point) {
        let Some(target) = self.registry.focused_window() else {
            return;
        };
        if target == self.window_id {
            return;
        }
        if let Err(e) = self.registry.send_pointer_move(target, screen) {
            warn!("Не удалось передать движение указателя окну {}: {}", target, e);
        }
    }

    async fn send(&self, action: DragAction) -> Result<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| drag_error!(channel, "канал действий координатора закрыт"))
    }

    pub async fn run(
        mut self,
        mut bus: broadcast::Receiver<DragAction>,
        mut input: mpsc::Receiver<InputEvent>,
    ) -> Result<()> {
        loop {
            let deadline = self.throttle.deadline();
            tokio::select! {
                action = bus.recv() => match action {
                    Ok(action) => self.observe(&action),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Репортёр окна {} пропустил {} действий", self.window_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Шина действий закрыта, репортёр окна {} останавливается", self.window_id);
                        return Ok(());
                    }
                },
                event = input.recv() => match event {
                    Some(event) => self.handle_input(event).await?,
                    None => {
                        info!("Ввод закрыт, репортёр окна {} останавливается", self.window_id);
                        return Ok(());
                    }
                },
                _ = async { sleep_until(deadline.unwrap_or_else(Instant::now)).await }, if deadline.is_some() => {
                    self.flush();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DragSourceData, FrameDescriptor, TabId, WindowInfo};
    use crate::services::window_registry::InMemoryWindowRegistry;
    use crate::utils::window_geometry::Size;
    use tokio::time::Duration;

    fn setup() -> (
        Arc<InMemoryWindowRegistry>,
        DragReporter,
        mpsc::Receiver<DragAction>,
    ) {
        let registry = Arc::new(InMemoryWindowRegistry::new());
        registry.add_window(
            WindowInfo::new(WindowId(1), Point::ORIGIN, Size::new(800, 600)),
            &[TabId(1)],
        );
        registry.add_window(
            WindowInfo::new(WindowId(2), Point::new(900, 0), Size::new(800, 600)),
            &[TabId(2)],
        );
        let (tx, rx) = mpsc::channel(16);
        let reporter = DragReporter::new(WindowId(1), &ReporterConfig::default(), registry.clone(), tx);
        (registry, reporter, rx)
    }

    fn started_in(window: u32) -> DragAction {
        DragAction::DragStarted {
            source: DragSourceData {
                source_tab_id: TabId(1),
                original_window_id: WindowId(window),
                current_window_id: WindowId(window),
                origin_client: Point::ORIGIN,
                origin_screen: Point::ORIGIN,
                relative_drag_start: Point::ORIGIN,
                originated_from_single_tab_window: true,
                frame: FrameDescriptor::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_ignores_input_until_armed() {
        let (_registry, mut reporter, mut actions) = setup();
        reporter.handle_input(InputEvent::released(0, 0)).await.unwrap();
        assert!(actions.try_recv().is_err());

        reporter.observe(&started_in(2));
        assert!(!reporter.is_armed());

        reporter.observe(&started_in(1));
        assert!(reporter.is_armed());
    }

    #[test]
    fn test_drag_ended_elsewhere_disarms() {
        let (_registry, mut reporter, _actions) = setup();
        reporter.observe(&started_in(1));
        reporter.observe(&DragAction::TabAttached { window_id: WindowId(2) });
        assert!(reporter.is_armed());

        reporter.observe(&DragAction::DragCancelled);
        assert!(!reporter.is_armed());

        reporter.observe(&started_in(1));
        reporter.observe(&DragAction::DragComplete);
        assert!(!reporter.is_armed());
    }

    #[tokio::test]
    async fn test_release_completes_and_disarms() {
        let (_registry, mut reporter, mut actions) = setup();
        reporter.observe(&started_in(1));

        reporter.handle_input(InputEvent::released(5, 5)).await.unwrap();
        assert_eq!(actions.try_recv().unwrap(), DragAction::DragComplete);
        assert!(!reporter.is_armed());

        reporter.handle_input(InputEvent::released(5, 5)).await.unwrap();
        assert!(actions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_key_only() {
        let (_registry, mut reporter, mut actions) = setup();
        reporter.observe(&started_in(1));

        reporter.handle_input(InputEvent::key_down(KeyCode(28))).await.unwrap();
        assert!(actions.try_recv().is_err());
        assert!(reporter.is_armed());

        reporter.handle_input(InputEvent::key_down(KeyCode::ESCAPE)).await.unwrap();
        assert_eq!(actions.try_recv().unwrap(), DragAction::DragCancelled);
        assert!(!reporter.is_armed());
    }

    #[tokio::test]
    async fn test_moves_forwarded_to_focused_foreign_window() {
        let (registry, mut reporter, _actions) = setup();
        reporter.observe(&started_in(1));

        registry.focus(WindowId(1)).unwrap();
        reporter.handle_input(InputEvent::moved(10, 10)).await.unwrap();
        assert!(registry.pointer_moves().is_empty());

        reporter.throttle.reset();
        registry.focus(WindowId(2)).unwrap();
        reporter.handle_input(InputEvent::moved(950, 20)).await.unwrap();
        assert_eq!(registry.pointer_moves(), vec![(WindowId(2), Point::new(950, 20))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_throttles_and_flushes_trailing_move() {
        let (registry, reporter, mut actions) = setup();
        registry.focus(WindowId(2)).unwrap();

        let (bus_tx, bus_rx) = broadcast::channel(8);
        let (input_tx, input_rx) = mpsc::channel(16);
        bus_tx.send(started_in(1)).unwrap();
        let handle = tokio::spawn(reporter.run(bus_rx, input_rx));
        tokio::task::yield_now().await;

        for x in 0..5 {
            input_tx.send(InputEvent::moved(900 + x, 10)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let moves = registry.pointer_moves();
        assert_eq!(moves.first(), Some(&(WindowId(2), Point::new(900, 10))));
        assert_eq!(moves.last(), Some(&(WindowId(2), Point::new(904, 10))));
        assert!(moves.len() < 5);

        input_tx.send(InputEvent::released(904, 10)).await.unwrap();
        assert_eq!(actions.recv().await, Some(DragAction::DragComplete));

        drop(input_tx);
        handle.await.unwrap().unwrap();
    }
}
