//! Заскриптованные жесты перетаскивания на симулированном рабочем столе.
//!
//! Каждый сценарий прогоняет настоящий рантайм (координатор, исполнитель,
//! репортёры) через один жест и проверяет итоговую раскладку окон.

use crate::config::Config;
use crate::events::{
    DragAction, DragSourceData, FrameDescriptor, InputEvent, KeyCode, TabId, WindowId, WindowInfo,
};
use crate::runtime::DragRuntime;
use crate::services::{DragSession, InMemoryWindowRegistry, WindowRegistry};
use crate::utils::window_geometry::{Point, Size};
use anyhow::{anyhow, ensure, Result};
use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tracing::info;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const MAIN_WINDOW: WindowId = WindowId(1);
const OTHER_WINDOW: WindowId = WindowId(2);
const SINGLE_TAB_WINDOW: WindowId = WindowId(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Перетащить окно с одной вкладкой на полосу вкладок другого окна
    Attach,
    /// Вытащить вкладку в новое окно
    Detach,
    /// Вытащить вкладку в заранее созданное буферное окно
    DetachBuffer,
    /// Переставить вкладку внутри своей полосы
    Reorder,
    /// Начать перетаскивание и отменить его клавишей отмены
    Cancel,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::Attach => "attach",
            Scenario::Detach => "detach",
            Scenario::DetachBuffer => "detach-buffer",
            Scenario::Reorder => "reorder",
            Scenario::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Три окна: главное с несколькими вкладками (в фокусе), ещё одно справа
/// и окно с одной вкладкой снизу.
fn desktop() -> Arc<InMemoryWindowRegistry> {
    let registry = Arc::new(InMemoryWindowRegistry::new());
    registry.add_window(
        WindowInfo::new(MAIN_WINDOW, Point::ORIGIN, Size::new(800, 600)).focused(),
        &[TabId(1), TabId(2), TabId(3)],
    );
    registry.add_window(
        WindowInfo::new(OTHER_WINDOW, Point::new(1000, 100), Size::new(800, 600)),
        &[TabId(4)],
    );
    registry.add_window(
        WindowInfo::new(SINGLE_TAB_WINDOW, Point::new(200, 650), Size::new(400, 300)),
        &[TabId(5)],
    );
    registry
}

fn drag_of(tab: TabId, window: &WindowInfo, tab_client: Point, single_tab: bool) -> DragAction {
    // Указатель берёт вкладку в 20px от левого края и 10px от верхнего.
    let relative = Point::new(20, 10);
    let origin_client = tab_client + relative;
    DragAction::DragStarted {
        source: DragSourceData {
            source_tab_id: tab,
            original_window_id: window.id,
            current_window_id: window.id,
            origin_client,
            // Заголовок 30px над клиентской областью.
            origin_screen: window.position + origin_client + Point::new(0, 30),
            relative_drag_start: relative,
            originated_from_single_tab_window: single_tab,
            frame: FrameDescriptor::new(tab.0, format!("https://example.org/{}", tab.0)),
        },
    }
}

async fn wait_session<F>(
    session: &mut watch::Receiver<Option<DragSession>>,
    what: &str,
    mut check: F,
) -> Result<Option<DragSession>>
where
    F: FnMut(Option<&DragSession>) -> bool,
{
    let snapshot = timeout(STEP_TIMEOUT, session.wait_for(|s| check(s.as_ref())))
        .await
        .map_err(|_| anyhow!("истекло время ожидания: {}", what))??
        .clone();
    Ok(snapshot)
}

async fn wait_desktop<F>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    timeout(STEP_TIMEOUT, async {
        while !check() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("истекло время ожидания: {}", what))
}

fn log_desktop(registry: &InMemoryWindowRegistry) {
    for window in registry.all_windows() {
        info!("  {} tabs={:?}", window, registry.tabs_of(window.id));
    }
}

/// Прогоняет один сценарий до конца.
pub async fn run(scenario: Scenario, config: Arc<Config>) -> Result<()> {
    info!("Запуск сценария '{}'", scenario);
    let registry = desktop();

    let config = match scenario {
        Scenario::Detach if config.drag.prepare_buffer_window => {
            info!("Буферное окно отключено для этого сценария");
            let mut config = (*config).clone();
            config.drag.prepare_buffer_window = false;
            Arc::new(config)
        }
        Scenario::DetachBuffer if !config.drag.prepare_buffer_window => {
            let mut config = (*config).clone();
            config.drag.prepare_buffer_window = true;
            Arc::new(config)
        }
        _ => config,
    };

    let runtime = DragRuntime::start(
        config,
        registry.clone(),
        &[MAIN_WINDOW, OTHER_WINDOW, SINGLE_TAB_WINDOW],
    );

    let result = match scenario {
        Scenario::Attach => attach(&runtime, &registry).await,
        Scenario::Detach => detach(&runtime, &registry).await,
        Scenario::DetachBuffer => detach_buffer(&runtime, &registry).await,
        Scenario::Reorder => reorder(&runtime, &registry).await,
        Scenario::Cancel => cancel(&runtime, &registry).await,
    };

    info!("Рабочий стол после '{}':", scenario);
    log_desktop(&registry);
    runtime.shutdown(SHUTDOWN_TIMEOUT).await;

    result?;
    info!("Сценарий '{}' завершён", scenario);
    Ok(())
}

async fn attach(runtime: &DragRuntime, registry: &InMemoryWindowRegistry) -> Result<()> {
    let mut session = runtime.watch_session();
    let source = registry
        .window(SINGLE_TAB_WINDOW)
        .ok_or_else(|| anyhow!("нет окна с одной вкладкой"))?;

    runtime
        .dispatch(drag_of(TabId(5), &source, Point::new(10, 0), true))
        .await?;
    wait_session(&mut session, "начало перетаскивания", |s| s.is_some()).await?;

    // Свободное перемещение: под курсором ничего нет, окно следует за ним.
    registry.set_cursor(Point::new(500, 900));
    runtime
        .input(SINGLE_TAB_WINDOW, InputEvent::moved(500, 900))
        .await?;
    runtime
        .dispatch(DragAction::SingleTabMoved {
            window_id: SINGLE_TAB_WINDOW,
            tab_x: 10,
            tab_y: 0,
        })
        .await?;
    wait_desktop("окно с одной вкладкой следует за указателем", || {
        registry
            .window(SINGLE_TAB_WINDOW)
            .is_some_and(|w| w.position != source.position)
    })
    .await?;

    // Над полосой вкладок другого окна.
    registry.set_cursor(Point::new(1100, 120));
    runtime
        .dispatch(DragAction::SingleTabMoved {
            window_id: SINGLE_TAB_WINDOW,
            tab_x: 10,
            tab_y: 20,
        })
        .await?;
    let attached = wait_session(&mut session, "подтверждение присоединения", |s| {
        s.is_some_and(|s| s.current_window_id == OTHER_WINDOW && !s.is_busy())
    })
    .await?
    .ok_or_else(|| anyhow!("перетаскивание завершилось во время присоединения"))?;
    info!("Присоединено, указатель в клиентских координатах {:?}", attached.drag_window_client);

    ensure!(
        registry.tab_window(TabId(5)) == Some(OTHER_WINDOW),
        "вкладка 5 не в окне {}",
        OTHER_WINDOW
    );
    ensure!(
        registry.buffer_window() == Some(SINGLE_TAB_WINDOW),
        "опустевшее окно не стало буфером"
    );

    // Теперь указатель над окном, к которому присоединили вкладку.
    runtime
        .input(SINGLE_TAB_WINDOW, InputEvent::moved(1150, 130))
        .await?;
    wait_desktop("указатель передан целевому окну", || {
        registry
            .pointer_moves()
            .iter()
            .any(|(id, _)| *id == OTHER_WINDOW)
    })
    .await?;

    runtime
        .input(SINGLE_TAB_WINDOW, InputEvent::released(1150, 130))
        .await?;
    wait_session(&mut session, "конец перетаскивания", |s| s.is_none()).await?;
    ensure!(
        registry.window(SINGLE_TAB_WINDOW).is_some_and(|w| !w.visible),
        "буферное окно видно после отпускания"
    );
    Ok(())
}

async fn detach(runtime: &DragRuntime, registry: &InMemoryWindowRegistry) -> Result<()> {
    let mut session = runtime.watch_session();
    let source = registry
        .window(MAIN_WINDOW)
        .ok_or_else(|| anyhow!("нет главного окна"))?;

    runtime
        .dispatch(drag_of(TabId(1), &source, Point::new(100, 30), false))
        .await?;
    wait_session(&mut session, "начало перетаскивания", |s| s.is_some()).await?;

    registry.set_cursor(Point::new(400, 300));
    runtime
        .dispatch(DragAction::DetachRequested {
            tab_x: 100,
            tab_y: 30,
        })
        .await?;
    let detached = wait_session(&mut session, "новое окно", |s| {
        s.is_some_and(|s| s.drag_detached_window_id.is_some() && !s.is_busy())
    })
    .await?
    .ok_or_else(|| anyhow!("перетаскивание завершилось во время отсоединения"))?;

    let new_window = detached.current_window_id;
    ensure!(new_window != MAIN_WINDOW, "вкладка осталась в главном окне");
    ensure!(
        detached.is_window_detached(new_window),
        "окно {} не отмечено как отсоединённое",
        new_window
    );
    ensure!(
        registry.tab_window(TabId(1)) == Some(new_window),
        "вкладка 1 не в окне {}",
        new_window
    );

    let anchor = detached.detach_anchor();
    let expected = Point::new(400, 300) - anchor;
    wait_desktop("новое окно под указателем", || {
        registry
            .window(new_window)
            .is_some_and(|w| w.visible && w.position == expected)
    })
    .await?;

    // Свободное перемещение отсоединённого окна.
    registry.set_cursor(Point::new(450, 320));
    runtime
        .dispatch(DragAction::SingleTabMoved {
            window_id: new_window,
            tab_x: 0,
            tab_y: 0,
        })
        .await?;
    wait_desktop("отсоединённое окно следует за указателем", || {
        registry
            .window(new_window)
            .is_some_and(|w| w.position != expected)
    })
    .await?;

    runtime
        .input(MAIN_WINDOW, InputEvent::released(450, 320))
        .await?;
    wait_session(&mut session, "конец перетаскивания", |s| s.is_none()).await?;
    Ok(())
}

async fn detach_buffer(runtime: &DragRuntime, registry: &InMemoryWindowRegistry) -> Result<()> {
    let mut session = runtime.watch_session();
    let source = registry
        .window(MAIN_WINDOW)
        .ok_or_else(|| anyhow!("нет главного окна"))?;

    runtime
        .dispatch(drag_of(TabId(2), &source, Point::new(200, 30), false))
        .await?;
    wait_session(&mut session, "начало перетаскивания", |s| s.is_some()).await?;
    wait_desktop("буферное окно", || registry.buffer_window().is_some()).await?;
    let buffer = registry
        .buffer_window()
        .ok_or_else(|| anyhow!("буферное окно исчезло"))?;
    info!("Буферное окно {} подготовлено", buffer);

    registry.set_cursor(Point::new(600, 500));
    runtime
        .dispatch(DragAction::DetachRequested {
            tab_x: 200,
            tab_y: 30,
        })
        .await?;
    let detached = wait_session(&mut session, "отсоединение в буфер", |s| {
        s.is_some_and(|s| s.drag_detached_window_id == Some(buffer) && !s.is_busy())
    })
    .await?
    .ok_or_else(|| anyhow!("перетаскивание завершилось во время отсоединения"))?;

    let expected = Point::new(600, 500) - detached.detach_anchor();
    wait_desktop("буфер показан под указателем", || {
        registry
            .window(buffer)
            .is_some_and(|w| w.visible && w.position == expected)
    })
    .await?;
    ensure!(
        registry.buffer_window().is_none(),
        "метка буфера осталась после отсоединения"
    );

    runtime
        .input(MAIN_WINDOW, InputEvent::released(600, 500))
        .await?;
    wait_session(&mut session, "конец перетаскивания", |s| s.is_none()).await?;
    ensure!(
        registry.window(buffer).is_some_and(|w| w.visible),
        "отсоединённое окно скрыто после отпускания"
    );
    Ok(())
}

async fn reorder(runtime: &DragRuntime, registry: &InMemoryWindowRegistry) -> Result<()> {
    let mut session = runtime.watch_session();
    let source = registry
        .window(MAIN_WINDOW)
        .ok_or_else(|| anyhow!("нет главного окна"))?;

    runtime
        .dispatch(drag_of(TabId(1), &source, Point::new(100, 30), false))
        .await?;
    wait_session(&mut session, "начало перетаскивания", |s| s.is_some()).await?;

    for _ in 0..2 {
        runtime
            .dispatch(DragAction::ChangeWindowDisplayIndex {
                sender_window_id: MAIN_WINDOW,
                destination_display_index: 2,
                destination_frame_index: 2,
                requires_mouse_update: false,
            })
            .await?;
    }
    wait_session(&mut session, "перестановка", |s| {
        s.is_some_and(|s| s.display_index_requested == Some(2))
    })
    .await?;
    wait_desktop("порядок вкладок", || {
        registry.tabs_of(MAIN_WINDOW) == [TabId(2), TabId(3), TabId(1)]
    })
    .await?;

    runtime
        .input(MAIN_WINDOW, InputEvent::released(300, 40))
        .await?;
    wait_session(&mut session, "конец перетаскивания", |s| s.is_none()).await?;
    Ok(())
}

async fn cancel(runtime: &DragRuntime, registry: &InMemoryWindowRegistry) -> Result<()> {
    let mut session = runtime.watch_session();
    let source = registry
        .window(MAIN_WINDOW)
        .ok_or_else(|| anyhow!("нет главного окна"))?;

    runtime
        .dispatch(drag_of(TabId(3), &source, Point::new(300, 30), false))
        .await?;
    wait_session(&mut session, "начало перетаскивания", |s| s.is_some()).await?;

    for x in (300..400).step_by(10) {
        runtime.input(MAIN_WINDOW, InputEvent::moved(x, 40)).await?;
    }
    runtime
        .input(MAIN_WINDOW, InputEvent::key_down(KeyCode::ESCAPE))
        .await?;
    wait_session(&mut session, "отмена", |s| s.is_none()).await?;

    ensure!(
        registry.tabs_of(MAIN_WINDOW) == [TabId(1), TabId(2), TabId(3)],
        "отменённое перетаскивание изменило полосу вкладок"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_config() -> Arc<Config> {
        let mut config = Config::default();
        config.motion.mode = "instant".to_string();
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_attach_scenario() {
        run(Scenario::Attach, instant_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_scenario() {
        run(Scenario::Detach, instant_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_buffer_scenario() {
        run(Scenario::DetachBuffer, instant_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_reorder_scenario() {
        run(Scenario::Reorder, instant_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_scenario() {
        run(Scenario::Cancel, instant_config()).await.unwrap();
    }

    #[test]
    fn test_scenario_names_match_cli_values() {
        for scenario in Scenario::value_variants() {
            let value = scenario.to_possible_value().unwrap();
            assert_eq!(value.get_name(), scenario.to_string());
        }
    }
}
