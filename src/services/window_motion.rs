use crate::config::MotionConfig;
use crate::error::{DragError, Result};
use crate::events::WindowId;
use crate::services::window_registry::WindowRegistry;
use crate::utils::window_geometry::{window_position_for_client_point_at_cursor, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// Куда должно попасть перемещаемое окно.
///
/// Пересчитывается на каждом шаге анимации, курсор может ещё двигаться.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionTarget {
    Fixed(Point),
    /// Позиция окна, при которой эта клиентская точка оказывается под курсором.
    ClientPointAtCursor(Point),
}

impl MotionTarget {
    pub fn resolve(&self, registry: &dyn WindowRegistry) -> Point {
        match self {
            MotionTarget::Fixed(point) => *point,
            MotionTarget::ClientPointAtCursor(client) => {
                window_position_for_client_point_at_cursor(registry.cursor_screen_point(), *client)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Поставлено сразу в конечную точку.
    Instant,
    /// Платформа дошла до стартовой точки и анимировала перемещение к цели.
    Animated { polls: u32 },
    /// Попытки кончились, окно поставлено в конечную точку.
    Snapped,
}

/// Стратегия перемещения окна из стартовой точки в конечную.
#[async_trait::async_trait]
pub trait WindowMotion: Send + Sync {
    fn name(&self) -> &'static str;

    async fn move_window(
        &self,
        registry: Arc<dyn WindowRegistry>,
        window_id: WindowId,
        from: Point,
        target: MotionTarget,
    ) -> Result<MotionOutcome>;
}

/// Выбирает стратегию один раз по флагу возможностей платформы.
pub fn create_window_motion(config: &MotionConfig) -> Arc<dyn WindowMotion> {
    if config.animated() {
        Arc::new(AnimatedMotion::new(config.step_interval(), config.max_attempts))
    } else {
        Arc::new(InstantMotion)
    }
}

pub struct InstantMotion;

#[async_trait::async_trait]
impl WindowMotion for InstantMotion {
    fn name(&self) -> &'static str {
        "instant"
    }

    async fn move_window(
        &self,
        registry: Arc<dyn WindowRegistry>,
        window_id: WindowId,
        _from: Point,
        target: MotionTarget,
    ) -> Result<MotionOutcome> {
        let destination = target.resolve(registry.as_ref());
        registry.set_position(window_id, destination, false)?;
        Ok(MotionOutcome::Instant)
    }
}

/// Ставит окно в `from`, ждёт, пока платформа сообщит, что оно там, и затем
/// запрашивает анимированное перемещение к (заново вычисленной) цели.
///
/// Не больше `max_attempts` опросов. Когда они кончаются, окно ставится в
/// конечную точку без анимации, так что итоговое положение гарантировано.
pub struct AnimatedMotion {
    step_interval: Duration,
    max_attempts: u32,
}

impl AnimatedMotion {
    pub fn new(step_interval: Duration, max_attempts: u32) -> Self {
        Self {
            step_interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait::async_trait]
impl WindowMotion for AnimatedMotion {
    fn name(&self) -> &'static str {
        "animated"
    }

    async fn move_window(
        &self,
        registry: Arc<dyn WindowRegistry>,
        window_id: WindowId,
        from: Point,
        target: MotionTarget,
    ) -> Result<MotionOutcome> {
        registry.set_position(window_id, from, false)?;

        let mut polls = 0;
        loop {
            sleep(self.step_interval).await;
            polls += 1;

            if polls >= self.max_attempts {
                let destination = target.resolve(registry.as_ref());
                info!(
                    "Окно {} не встало на место за {} опросов, ставим в {}",
                    window_id, polls, destination
                );
                registry.set_position(window_id, destination, false)?;
                return Ok(MotionOutcome::Snapped);
            }

            let window = registry
                .window(window_id)
                .ok_or(DragError::WindowNotFound(window_id))?;

            if window.visible && window.position == from {
                let destination = target.resolve(registry.as_ref());
                debug!("Анимация окна {} {} -> {}", window_id, from, destination);
                registry.set_position(window_id, destination, true)?;
                return Ok(MotionOutcome::Animated { polls });
            }
        }
    }
}
