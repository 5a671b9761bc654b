use crate::config::Config;
use crate::drag_error;
use crate::error::{DragError, Result};
use crate::events::{DragAction, WindowEvent, WindowEventType};
use crate::services::window_registry::WindowRegistry;
use crate::trace_if_enabled;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use super::effects::DragEffect;
use super::reducer::{reduce, ReduceContext};
use super::session::DragSession;

const ACTION_BUS_CAPACITY: usize = 256;

/// Единственный владелец сессии перетаскивания.
///
/// Обрабатывает по одному действию, фиксирует новую сессию, затем ставит
/// эффекты в очередь и публикует действие в шину, чтобы оконные компоненты
/// (репортёры) могли отреагировать.
pub struct DragCoordinator {
    config: Arc<Config>,
    registry: Arc<dyn WindowRegistry>,
    session: Option<DragSession>,
    effects: mpsc::UnboundedSender<DragEffect>,
    bus: broadcast::Sender<DragAction>,
    session_tx: watch::Sender<Option<DragSession>>,
}

impl DragCoordinator {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<dyn WindowRegistry>,
        effects: mpsc::UnboundedSender<DragEffect>,
    ) -> Self {
        info!("Инициализация DragCoordinator");
        let (bus, _) = broadcast::channel(ACTION_BUS_CAPACITY);
        let (session_tx, _) = watch::channel(None);
        Self {
            config,
            registry,
            session: None,
            effects,
            bus,
            session_tx,
        }
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<DragAction> {
        self.bus.subscribe()
    }

    /// Шина действий для подписчиков, созданных после запуска `run`.
    pub fn bus(&self) -> broadcast::Sender<DragAction> {
        self.bus.clone()
    }

    pub fn watch_session(&self) -> watch::Receiver<Option<DragSession>> {
        self.session_tx.subscribe()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Обрабатывает одно действие. При ошибке сессия остаётся прежней.
    pub fn dispatch(&mut self, action: DragAction) -> Result<()> {
        trace_if_enabled!("Обработка {}", action);

        let ctx = ReduceContext {
            registry: self.registry.as_ref(),
            config: &self.config.drag,
        };
        let transition = reduce(self.session.as_ref(), &action, &ctx)?;

        if let Some(session) = &transition.session {
            debug!(
                "{} -> вкладка {} в {} ({})",
                action,
                session.source_tab_id,
                session.current_window_id,
                session.phase()
            );
        }

        self.session = transition.session;
        self.session_tx.send_replace(self.session.clone());

        for effect in transition.effects {
            self.effects
                .send(effect)
                .map_err(|_| drag_error!(channel, "очередь эффектов закрыта"))?;
        }

        // Слушателей может не быть.
        let _ = self.bus.send(action);
        Ok(())
    }

    /// События подтверждения от оконного слоя в виде действий.
    pub fn action_for_window_event(event: &WindowEvent) -> Option<DragAction> {
        match event.event_type {
            WindowEventType::Created => Some(DragAction::WindowReady {
                window_id: event.window_id,
            }),
            WindowEventType::TabAttached(_) => Some(DragAction::TabAttached {
                window_id: event.window_id,
            }),
            _ => None,
        }
    }

    /// Восстанавливает подтверждение, которого ждёт сессия, по тому, какое окно
    /// владеет вкладкой в реестре. Нужно после потери событий окон.
    fn confirmation_from_registry(&self) -> Option<DragAction> {
        let session = self.session.as_ref()?;
        if !session.is_busy() {
            return None;
        }
        let owner = self.registry.tab_window(session.source_tab_id)?;

        if session.is_awaiting_window_created() {
            // Вкладка ещё не покинула исходное окно.
            if session.detached_from.is_some_and(|origin| origin.window_id == owner) {
                return None;
            }
            return Some(DragAction::WindowReady { window_id: owner });
        }
        Some(DragAction::TabAttached { window_id: owner })
    }

    fn resync(&mut self) -> Result<()> {
        match self.confirmation_from_registry() {
            Some(action) => {
                info!("Синхронизация ожидающего перетаскивания по реестру: {}", action);
                self.dispatch_logged(action)
            }
            None => Ok(()),
        }
    }

    fn dispatch_logged(&mut self, action: DragAction) -> Result<()> {
        match self.dispatch(action) {
            Ok(()) => Ok(()),
            Err(DragError::InvariantViolation(msg)) => {
                error!("Нарушен инвариант перетаскивания, действие отброшено: {}", msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn run(
        mut self,
        mut actions: mpsc::Receiver<DragAction>,
        mut window_events: broadcast::Receiver<WindowEvent>,
    ) -> Result<()> {
        info!("DragCoordinator запущен");
        let mut window_events_open = true;

        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.dispatch_logged(action)?,
                    None => {
                        info!("Канал действий закрыт, DragCoordinator останавливается");
                        return Ok(());
                    }
                },
                event = window_events.recv(), if window_events_open => match event {
                    Ok(event) => {
                        if let Some(action) = Self::action_for_window_event(&event) {
                            self.dispatch_logged(action)?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Пропущено событий окон: {}", skipped);
                        self.resync()?;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Канал событий окон закрыт");
                        window_events_open = false;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        DragSourceData, FrameDescriptor, TabDestination, TabId, WindowId, WindowInfo,
    };
    use crate::services::window_registry::InMemoryWindowRegistry;
    use crate::utils::window_geometry::{Point, Size};

    fn setup() -> (
        Arc<InMemoryWindowRegistry>,
        DragCoordinator,
        mpsc::UnboundedReceiver<DragEffect>,
    ) {
        let registry = Arc::new(InMemoryWindowRegistry::new());
        registry.add_window(
            WindowInfo::new(WindowId(1), Point::ORIGIN, Size::new(800, 600)),
            &[TabId(1), TabId(2)],
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = DragCoordinator::new(Arc::new(Config::default()), registry.clone(), tx);
        (registry, coordinator, rx)
    }

    fn started() -> DragAction {
        DragAction::DragStarted {
            source: DragSourceData {
                source_tab_id: TabId(1),
                original_window_id: WindowId(1),
                current_window_id: WindowId(1),
                origin_client: Point::new(10, 10),
                origin_screen: Point::new(10, 40),
                relative_drag_start: Point::new(5, 5),
                originated_from_single_tab_window: false,
                frame: FrameDescriptor::default(),
            },
        }
    }

    #[test]
    fn test_dispatch_commits_session_and_queues_effects() {
        let (_registry, mut coordinator, mut effects) = setup();
        let mut bus = coordinator.subscribe_actions();
        let watch = coordinator.watch_session();

        coordinator.dispatch(started()).unwrap();

        assert!(coordinator.session().is_some());
        assert!(watch.borrow().is_some());
        assert!(matches!(
            effects.try_recv().unwrap(),
            DragEffect::PrepareBufferWindow { .. }
        ));
        assert_eq!(bus.try_recv().unwrap().name(), "DragStarted");

        coordinator.dispatch(DragAction::DragComplete).unwrap();
        assert!(coordinator.session().is_none());
        assert!(watch.borrow().is_none());
        assert_eq!(effects.try_recv().unwrap(), DragEffect::HideBufferWindow);
    }

    #[test]
    fn test_invariant_violation_keeps_session() {
        let (_registry, mut coordinator, _effects) = setup();
        coordinator.dispatch(started()).unwrap();
        coordinator
            .dispatch(DragAction::DetachRequested { tab_x: 0, tab_y: 0 })
            .unwrap();
        let before = coordinator.session().cloned();

        let result = coordinator.dispatch(DragAction::WindowReady { window_id: WindowId(1) });
        assert!(matches!(result, Err(DragError::InvariantViolation(_))));
        assert_eq!(coordinator.session().cloned(), before);

        assert!(coordinator
            .dispatch_logged(DragAction::WindowReady { window_id: WindowId(1) })
            .is_ok());
    }

    #[test]
    fn test_window_events_translate_to_confirmations() {
        let created = WindowEvent::created(WindowId(4));
        assert_eq!(
            DragCoordinator::action_for_window_event(&created),
            Some(DragAction::WindowReady { window_id: WindowId(4) })
        );
        let attached = WindowEvent::tab_attached(WindowId(2), TabId(1));
        assert_eq!(
            DragCoordinator::action_for_window_event(&attached),
            Some(DragAction::TabAttached { window_id: WindowId(2) })
        );
        let focus = WindowEvent::new(WindowId(2), WindowEventType::FocusChanged);
        assert_eq!(DragCoordinator::action_for_window_event(&focus), None);
    }

    #[tokio::test]
    async fn test_lost_attach_confirmation_recovered_after_lag() {
        let (registry, mut coordinator, _effects) = setup();
        registry.add_window(
            WindowInfo::new(WindowId(2), Point::new(1000, 100), Size::new(800, 600)),
            &[TabId(9)],
        );
        let window_events = registry.subscribe();

        coordinator.dispatch(started()).unwrap();
        registry.set_cursor(Point::new(1100, 120));
        coordinator
            .dispatch(DragAction::SingleTabMoved {
                window_id: WindowId(1),
                tab_x: 0,
                tab_y: 20,
            })
            .unwrap();
        assert_eq!(
            coordinator.session().and_then(|s| s.attach_requested_window_id),
            Some(WindowId(2))
        );

        registry
            .move_tab(TabId(1), &FrameDescriptor::default(), TabDestination::Window(WindowId(2)))
            .unwrap();
        // Подтверждение TabAttached тонет в потоке событий геометрии.
        for x in 0..300 {
            registry.set_position(WindowId(2), Point::new(x, 100), false).unwrap();
        }

        let mut session = coordinator.watch_session();
        let (actions_tx, actions_rx) = mpsc::channel(4);
        let handle = tokio::spawn(coordinator.run(actions_rx, window_events));

        let recovered = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            session.wait_for(|s| s.as_ref().is_some_and(|s| !s.is_busy())),
        )
        .await
        .unwrap()
        .unwrap()
        .clone()
        .unwrap();
        assert_eq!(recovered.current_window_id, WindowId(2));
        assert_eq!(recovered.attach_requested_window_id, None);

        drop(actions_tx);
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_registry_confirmation_waits_for_tab_to_leave_source() {
        let (registry, mut coordinator, _effects) = setup();
        coordinator.dispatch(started()).unwrap();
        assert_eq!(coordinator.confirmation_from_registry(), None);

        coordinator
            .dispatch(DragAction::DetachRequested { tab_x: 0, tab_y: 0 })
            .unwrap();
        assert_eq!(coordinator.confirmation_from_registry(), None);

        let created = registry
            .move_tab(TabId(1), &FrameDescriptor::default(), TabDestination::NewWindow)
            .unwrap();
        assert_eq!(
            coordinator.confirmation_from_registry(),
            Some(DragAction::WindowReady { window_id: created })
        );

        coordinator.resync().unwrap();
        assert_eq!(coordinator.session().map(|s| s.current_window_id), Some(created));
    }

    #[test]
    fn test_closed_effect_queue_is_an_error() {
        let (_registry, mut coordinator, effects) = setup();
        drop(effects);
        let result = coordinator.dispatch(started());
        assert!(matches!(result, Err(DragError::ChannelClosed(_))));
    }
}
