use crate::error::Result;
use crate::events::{FrameDescriptor, TabDestination, TabId, WindowId};
use crate::services::window_motion::{MotionTarget, WindowMotion};
use crate::services::window_registry::WindowRegistry;
use crate::utils::window_geometry::{window_position_for_client_point_at_cursor, Bounds, Point};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Команда окну или вкладке, решённая редьюсером и выполняемая после.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    /// Переиспользовать или создать скрытое буферное окно с этими границами.
    PrepareBufferWindow { bounds: Bounds },
    HideBufferWindow,
    SetTabIndex { tab_id: TabId, index: usize },
    FocusWindow(WindowId),
    MarkDragBuffer(WindowId),
    ClearDragBuffer,
    MoveTab {
        tab_id: TabId,
        frame: FrameDescriptor,
        destination: TabDestination,
    },
    SetWindowPosition { window_id: WindowId, position: Point },
    /// Переместить или изменить размер буферного окна, не меняя видимость.
    AlignBufferWindow { bounds: Bounds },
    /// Показать окно и поставить его так, чтобы `client` был под курсором.
    RevealWindowAtCursor { window_id: WindowId, client: Point },
    AnimateWindow {
        window_id: WindowId,
        from: Point,
        target: MotionTarget,
    },
}

/// Выполняет эффекты в порядке очереди, после того как редьюсер
/// зафиксировал породившее их состояние.
pub struct EffectExecutor {
    registry: Arc<dyn WindowRegistry>,
    motion: Arc<dyn WindowMotion>,
}

impl EffectExecutor {
    pub fn new(registry: Arc<dyn WindowRegistry>, motion: Arc<dyn WindowMotion>) -> Self {
        info!("Инициализация EffectExecutor (перемещение: {})", motion.name());
        Self { registry, motion }
    }

    pub async fn run(self, mut effects: mpsc::UnboundedReceiver<DragEffect>) {
        while let Some(effect) = effects.recv().await {
            debug!("Применяем {:?}", effect);
            if let Err(e) = self.apply(effect) {
                error!("Не удалось применить эффект перетаскивания: {}", e);
            }
        }
        info!("Очередь эффектов закрыта");
    }

    pub fn apply(&self, effect: DragEffect) -> Result<()> {
        let registry = self.registry.as_ref();
        match effect {
            DragEffect::PrepareBufferWindow { bounds } => match registry.buffer_window() {
                Some(buffer) => {
                    debug!("Переиспользуем буферное окно {}", buffer);
                    registry.set_position(buffer, bounds.position, false)?;
                    registry.set_size(buffer, bounds.size)?;
                }
                None => {
                    let buffer = registry.create_window(bounds, false);
                    registry.set_buffer_window(buffer)?;
                    info!("Создано буферное окно {}", buffer);
                }
            },
            DragEffect::HideBufferWindow => {
                if let Some(buffer) = registry.buffer_window() {
                    if registry.window(buffer).is_some_and(|w| w.visible) {
                        registry.hide(buffer)?;
                    }
                }
            }
            DragEffect::SetTabIndex { tab_id, index } => registry.set_tab_index(tab_id, index)?,
            DragEffect::FocusWindow(window_id) => registry.focus(window_id)?,
            DragEffect::MarkDragBuffer(window_id) => {
                // Пустой старый буфер иначе навсегда останется скрытым.
                if let Some(previous) = registry.buffer_window().filter(|id| *id != window_id) {
                    if registry.tab_count(previous) == 0 {
                        info!("Закрываем неиспользуемое буферное окно {}", previous);
                        registry.close_window(previous)?;
                    }
                }
                registry.set_buffer_window(window_id)?
            }
            DragEffect::ClearDragBuffer => registry.clear_buffer_window(),
            DragEffect::MoveTab {
                tab_id,
                frame,
                destination,
            } => {
                registry.move_tab(tab_id, &frame, destination)?;
            }
            DragEffect::SetWindowPosition {
                window_id,
                position,
            } => registry.set_position(window_id, position, false)?,
            DragEffect::AlignBufferWindow { bounds } => {
                if let Some(buffer) = registry.buffer_window() {
                    registry.set_size(buffer, bounds.size)?;
                    registry.set_position(buffer, bounds.position, false)?;
                }
            }
            DragEffect::RevealWindowAtCursor { window_id, client } => {
                registry.show(window_id)?;
                let position = window_position_for_client_point_at_cursor(
                    registry.cursor_screen_point(),
                    client,
                );
                registry.set_position(window_id, position, false)?;
            }
            DragEffect::AnimateWindow {
                window_id,
                from,
                target,
            } => {
                // Опрос занимает время, очередь держать нельзя.
                let registry = Arc::clone(&self.registry);
                let motion = Arc::clone(&self.motion);
                tokio::spawn(async move {
                    match motion.move_window(registry, window_id, from, target).await {
                        Ok(outcome) => debug!("Перемещение окна {} завершено: {:?}", window_id, outcome),
                        Err(e) => error!("Ошибка перемещения окна {}: {}", window_id, e),
                    }
                });
            }
        }
        Ok(())
    }
}
