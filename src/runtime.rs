use crate::config::Config;
use crate::drag_error;
use crate::error::Result;
use crate::events::{DragAction, InputEvent, WindowId};
use crate::services::{
    create_window_motion, DragCoordinator, DragReporter, DragSession, EffectExecutor,
    WindowRegistry,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info, warn};

const ACTION_QUEUE_CAPACITY: usize = 256;
const INPUT_QUEUE_CAPACITY: usize = 512;

/// Координатор, исполнитель эффектов и по одному репортёру на окно,
/// каждый в своей задаче.
pub struct DragRuntime {
    config: Arc<Config>,
    registry: Arc<dyn WindowRegistry>,
    actions: mpsc::Sender<DragAction>,
    bus: broadcast::Sender<DragAction>,
    session: watch::Receiver<Option<DragSession>>,
    inputs: HashMap<WindowId, mpsc::Sender<InputEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl DragRuntime {
    /// Вызывать только внутри tokio runtime.
    pub fn start(
        config: Arc<Config>,
        registry: Arc<dyn WindowRegistry>,
        windows: &[WindowId],
    ) -> Self {
        let (actions_tx, actions_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();

        // Подписываемся до того, как кто-то начнёт отправлять события.
        let window_events = registry.subscribe();
        let coordinator = DragCoordinator::new(config.clone(), registry.clone(), effects_tx);
        let bus = coordinator.bus();
        let session = coordinator.watch_session();

        let executor = EffectExecutor::new(registry.clone(), create_window_motion(&config.motion));

        let mut handles = Vec::with_capacity(windows.len() + 2);
        handles.push(tokio::spawn(async move {
            if let Err(e) = coordinator.run(actions_rx, window_events).await {
                error!("Ошибка DragCoordinator: {}", e);
            }
        }));
        handles.push(tokio::spawn(executor.run(effects_rx)));

        let mut runtime = Self {
            config,
            registry,
            actions: actions_tx,
            bus,
            session,
            inputs: HashMap::new(),
            handles,
        };
        for window_id in windows {
            runtime.attach_reporter(*window_id);
        }
        info!("Рантайм перетаскивания запущен, репортёров: {}", runtime.inputs.len());
        runtime
    }

    /// Запускает репортёр для окна. Ничего не делает, если он уже есть.
    pub fn attach_reporter(&mut self, window_id: WindowId) {
        if self.inputs.contains_key(&window_id) {
            return;
        }
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        let reporter = DragReporter::new(
            window_id,
            &self.config.reporter,
            self.registry.clone(),
            self.actions.clone(),
        );
        let bus = self.bus.subscribe();
        self.handles.push(tokio::spawn(async move {
            if let Err(e) = reporter.run(bus, input_rx).await {
                error!("Ошибка DragReporter окна {}: {}", window_id, e);
            }
        }));
        self.inputs.insert(window_id, input_tx);
    }

    pub async fn dispatch(&self, action: DragAction) -> Result<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| drag_error!(channel, "канал действий координатора закрыт"))
    }

    /// Передаёт сырой ввод репортёру окна `window_id`.
    pub async fn input(&self, window_id: WindowId, event: InputEvent) -> Result<()> {
        let Some(input) = self.inputs.get(&window_id) else {
            return Err(drag_error!(internal, "нет репортёра для окна {}", window_id));
        };
        input
            .send(event)
            .await
            .map_err(|_| drag_error!(channel, "канал ввода окна {} закрыт", window_id))
    }

    pub fn watch_session(&self) -> watch::Receiver<Option<DragSession>> {
        self.session.clone()
    }

    /// Закрывает все входы и ждёт завершения задач.
    pub async fn shutdown(self, timeout: Duration) {
        info!("Остановка рантайма перетаскивания...");
        let Self {
            actions,
            bus,
            inputs,
            handles,
            ..
        } = self;
        drop(inputs);
        drop(actions);
        drop(bus);

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let drained = tokio::time::timeout(timeout, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("Рантайм перетаскивания остановлен"),
            Err(_) => {
                warn!("Таймаут при остановке рантайма, прерываем задачи");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}
