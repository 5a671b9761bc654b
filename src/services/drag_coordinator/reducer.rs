//! Машина состояний перетаскивания.
//!
//! `reduce` синхронный и без побочных эффектов: читает оконный слой и
//! возвращает следующую сессию и команды для последующего выполнения. Фаза
//! определяется тем, какие ожидающие поля есть в сессии (см.
//! [`DragPhase`](super::session::DragPhase)).
//!
//! Каждый обработчик подтверждения заново сверяет условие с настоящим
//! владельцем вкладки. Устаревшие, ранние и повторные события сессию не меняют.

use crate::config::DragConfig;
use crate::debug_if_enabled;
use crate::drag_error;
use crate::error::Result;
use crate::events::{DragAction, DragSourceData, TabDestination, WindowId};
use crate::services::window_registry::WindowRegistry;
use crate::services::window_motion::MotionTarget;
use crate::utils::window_geometry::{
    client_point_at_cursor, client_size, is_within_attach_band, screen_point_at_client_point,
    window_position_for_tab_at_cursor, Bounds, FrameInsets, Point,
};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, info, warn};

use super::effects::DragEffect;
use super::session::{DetachOrigin, DragSession};

pub type Effects = SmallVec<[DragEffect; 4]>;

pub struct ReduceContext<'a> {
    pub registry: &'a dyn WindowRegistry,
    pub config: &'a DragConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: Option<DragSession>,
    pub effects: Effects,
}

impl Transition {
    fn unchanged(session: Option<&DragSession>) -> Self {
        Self {
            session: session.cloned(),
            effects: SmallVec::new(),
        }
    }

    fn to(session: DragSession, effects: Effects) -> Self {
        Self {
            session: Some(session),
            effects,
        }
    }

    fn ended(effects: Effects) -> Self {
        Self {
            session: None,
            effects,
        }
    }
}

/// Применяет одно действие к текущей сессии.
///
/// Ошибка возвращается, только если оконный слой нарушил гарантию (новое окно
/// пришло с id окна, из которого идёт отсоединение).
pub fn reduce(
    session: Option<&DragSession>,
    action: &DragAction,
    ctx: &ReduceContext<'_>,
) -> Result<Transition> {
    match action {
        DragAction::DragStarted { source } => Ok(drag_started(session, source, ctx)),
        DragAction::DragCancelled | DragAction::DragComplete => Ok(drag_ended(session, action)),
        DragAction::ChangeWindowDisplayIndex {
            sender_window_id,
            destination_display_index,
            destination_frame_index,
            requires_mouse_update,
        } => Ok(match session {
            Some(s) => change_display_index(
                s,
                *sender_window_id,
                *destination_display_index,
                *destination_frame_index,
                *requires_mouse_update,
                ctx,
            ),
            None => Transition::unchanged(None),
        }),
        DragAction::SingleTabMoved {
            window_id,
            tab_x,
            tab_y,
        } => Ok(match session {
            Some(s) => single_tab_moved(s, *window_id, Point::new(*tab_x, *tab_y), ctx),
            None => {
                debug!("SingleTabMoved до DragStarted, игнорируем");
                Transition::unchanged(None)
            }
        }),
        DragAction::TabAttached { window_id } => Ok(match session {
            Some(s) => tab_attached(s, *window_id, ctx),
            None => Transition::unchanged(None),
        }),
        DragAction::DetachRequested { tab_x, tab_y } => Ok(match session {
            Some(s) => detach_requested(s, Point::new(*tab_x, *tab_y), ctx),
            None => Transition::unchanged(None),
        }),
        DragAction::WindowReady { window_id } => match session {
            Some(s) => window_ready(s, *window_id, ctx),
            None => Ok(Transition::unchanged(None)),
        },
    }
}

fn drag_started(
    session: Option<&DragSession>,
    source: &DragSourceData,
    ctx: &ReduceContext<'_>,
) -> Transition {
    let Some(window) = ctx.registry.window(source.original_window_id) else {
        warn!(
            "Перетаскивание из неизвестного окна {}, игнорируем",
            source.original_window_id
        );
        return Transition::unchanged(session);
    };

    if let Some(previous) = session {
        warn!(
            "Перетаскивание вкладки {} заменяет незавершённое перетаскивание вкладки {}",
            source.source_tab_id, previous.source_tab_id
        );
    }

    let insets = FrameInsets::infer(source.origin_screen, source.origin_client, window.position);
    info!(
        "Начало перетаскивания: вкладка {} в окне {}, рамка left={} top={}",
        source.source_tab_id, window.id, insets.left, insets.top
    );

    let mut effects = Effects::new();
    if !source.originated_from_single_tab_window && ctx.config.prepare_buffer_window {
        effects.push(DragEffect::PrepareBufferWindow {
            bounds: Bounds::of(&window),
        });
    }

    Transition::to(DragSession::start(source, insets), effects)
}

fn drag_ended(session: Option<&DragSession>, action: &DragAction) -> Transition {
    match session {
        Some(s) => {
            info!("{}: вкладка {} остаётся в окне {}", action.name(), s.source_tab_id, s.current_window_id);
            Transition::ended(smallvec![DragEffect::HideBufferWindow])
        }
        None => Transition::unchanged(None),
    }
}

fn change_display_index(
    session: &DragSession,
    sender_window_id: WindowId,
    display_index: usize,
    frame_index: usize,
    requires_mouse_update: bool,
    ctx: &ReduceContext<'_>,
) -> Transition {
    if session.is_busy() {
        debug_if_enabled!("Перестановка игнорируется, пока {}", session.phase());
        return Transition::unchanged(Some(session));
    }
    if sender_window_id != session.current_window_id {
        debug_if_enabled!(
            "Перестановка из устаревшего окна {} (текущее {}), игнорируем",
            sender_window_id,
            session.current_window_id
        );
        return Transition::unchanged(Some(session));
    }
    if session.display_index_requested == Some(display_index) && !requires_mouse_update {
        debug_if_enabled!("Перестановка на {} уже запрошена", display_index);
        return Transition::unchanged(Some(session));
    }

    let mut next = session.clone();
    next.display_index_requested = Some(display_index);

    // Перемонтированной полосе вкладок нужно знать, где мышь.
    if requires_mouse_update {
        let owner = ctx
            .registry
            .tab_window(session.source_tab_id)
            .and_then(|id| ctx.registry.window(id));
        if let Some(window) = owner {
            next.drag_window_client = Some(client_point_at_cursor(
                &window,
                ctx.registry.cursor_screen_point(),
            ));
        }
    }

    let effects = if session.display_index_requested == Some(display_index) {
        Effects::new()
    } else {
        smallvec![DragEffect::SetTabIndex {
            tab_id: session.source_tab_id,
            index: frame_index,
        }]
    };
    Transition::to(next, effects)
}

fn single_tab_moved(
    session: &DragSession,
    event_window_id: WindowId,
    tab: Point,
    ctx: &ReduceContext<'_>,
) -> Transition {
    let current = session.current_window_id;

    if session.is_attach_pending() {
        return Transition::unchanged(Some(session));
    }
    if session.detach_requested_window_id.is_some() {
        // WindowReady снимает эту блокировку
        return Transition::unchanged(Some(session));
    }
    if session.detach_to_requested_window_id.is_some() {
        debug_if_enabled!("Не двигаем, идёт отсоединение");
        return Transition::unchanged(Some(session));
    }

    // Только что созданное окно может ещё не владеть вкладкой.
    let actual = ctx.registry.tab_window(session.source_tab_id);
    if actual != Some(current) {
        debug_if_enabled!("Вкладкой {} владеет {:?}, а в сессии {}", session.source_tab_id, actual, current);
        return Transition::unchanged(Some(session));
    }
    // Остаточные события от окна, которое вкладка только что покинула.
    if event_window_id != current {
        debug_if_enabled!("Движение из устаревшего окна {} (текущее {})", event_window_id, current);
        return Transition::unchanged(Some(session));
    }

    let cursor = ctx.registry.cursor_screen_point();
    let threshold = ctx.config.attach_y_threshold;

    let intersection = ctx
        .registry
        .all_windows()
        .into_iter()
        .filter(|w| w.id != current && w.visible)
        .find(|w| {
            let cursor_client = client_point_at_cursor(w, cursor);
            is_within_attach_band(cursor_client, client_size(w).width, tab.y, threshold)
        });

    if let Some(target) = intersection {
        info!("Вкладка {} над окном {}, запрашиваем присоединение", session.source_tab_id, target.id);

        let mut next = session.clone();
        next.drag_window_client = Some(client_point_at_cursor(&target, cursor));
        next.attach_requested_window_id = Some(target.id);

        let mut effects: Effects = smallvec![DragEffect::FocusWindow(target.id)];
        // Окно, которое покидает вкладка, остаётся: оно держит перетаскивание и примет следующее отсоединение.
        if ctx.registry.tab_count(current) <= 1 {
            effects.push(DragEffect::MarkDragBuffer(current));
        }
        effects.push(DragEffect::MoveTab {
            tab_id: session.source_tab_id,
            frame: session.frame.clone(),
            destination: TabDestination::Window(target.id),
        });

        if session.originated_from_single_tab_window && ctx.config.end_drag_on_single_tab_attach {
            info!("Исходное окно с одной вкладкой закроется, завершаем перетаскивание досрочно");
            return Transition::ended(effects);
        }
        return Transition::to(next, effects);
    }

    let position = window_position_for_tab_at_cursor(
        cursor,
        tab,
        session.frame_insets,
        session.relative_drag_start,
    );
    Transition::to(
        session.clone(),
        smallvec![DragEffect::SetWindowPosition {
            window_id: current,
            position,
        }],
    )
}

fn tab_attached(session: &DragSession, window_id: WindowId, ctx: &ReduceContext<'_>) -> Transition {
    let owner = ctx.registry.tab_window(session.source_tab_id);

    if let Some(requested) = session.attach_requested_window_id {
        if owner != Some(requested) {
            debug_if_enabled!(
                "TabAttached({}) во время ожидания {}, вкладкой владеет {:?}",
                window_id,
                requested,
                owner
            );
            return Transition::unchanged(Some(session));
        }

        info!("Вкладка {} присоединена к окну {}", session.source_tab_id, requested);
        let mut next = session.clone();
        next.attach_requested_window_id = None;
        next.display_index_requested = None;
        next.current_window_id = requested;

        let mut effects = Effects::new();
        if let Some(window) = ctx.registry.window(requested) {
            next.drag_window_client = Some(client_point_at_cursor(
                &window,
                ctx.registry.cursor_screen_point(),
            ));
            effects.push(DragEffect::AlignBufferWindow {
                bounds: Bounds::of(&window),
            });
        }
        return Transition::to(next, effects);
    }

    if let Some(requested) = session.detach_to_requested_window_id {
        // Фантомные события присоединения от прежнего окна случаются.
        if owner != Some(requested) {
            debug_if_enabled!(
                "TabAttached({}) во время отсоединения в {}, вкладкой владеет {:?}",
                window_id,
                requested,
                owner
            );
            return Transition::unchanged(Some(session));
        }

        info!("Вкладка {} отсоединена в буферное окно {}", session.source_tab_id, requested);
        let mut next = session.clone();
        next.detached_from = None;
        next.detach_to_requested_window_id = None;
        next.display_index_requested = None;
        next.current_window_id = requested;
        next.drag_detached_window_id = Some(requested);
        return Transition::to(next, Effects::new());
    }

    // Вкладка может появиться раньше, чем придёт событие о создании окна.
    if let Some(origin) = session.detached_from.filter(|_| session.is_awaiting_window_created()) {
        if owner == Some(window_id) && window_id != origin.window_id {
            return detached_into_new_window(session, origin, window_id, ctx);
        }
    }

    Transition::unchanged(Some(session))
}

fn detach_requested(session: &DragSession, tab: Point, ctx: &ReduceContext<'_>) -> Transition {
    if session.is_busy() {
        debug_if_enabled!("Отсоединение игнорируется, пока {}", session.phase());
        return Transition::unchanged(Some(session));
    }

    let current = ctx
        .registry
        .tab_window(session.source_tab_id)
        .unwrap_or(session.current_window_id);
    let buffer = ctx.registry.buffer_window().filter(|id| *id != current);

    let mut next = session.clone();
    next.detached_from = Some(DetachOrigin {
        window_id: current,
        tab,
    });

    // Буферное окно становится обычным, следующее присоединение может пометить другое.
    let mut effects: Effects = smallvec![DragEffect::ClearDragBuffer];
    match buffer {
        Some(buffer_id) => {
            info!("Отсоединяем вкладку {} в буферное окно {}", session.source_tab_id, buffer_id);
            next.detach_to_requested_window_id = Some(buffer_id);
            effects.push(DragEffect::MoveTab {
                tab_id: session.source_tab_id,
                frame: session.frame.clone(),
                destination: TabDestination::Window(buffer_id),
            });
            effects.push(DragEffect::RevealWindowAtCursor {
                window_id: buffer_id,
                client: session.detach_anchor(),
            });
        }
        None => {
            info!("Отсоединяем вкладку {} в новое окно", session.source_tab_id);
            next.detach_requested_window_id = Some(current);
            effects.push(DragEffect::MoveTab {
                tab_id: session.source_tab_id,
                frame: session.frame.clone(),
                destination: TabDestination::NewWindow,
            });
        }
    }

    Transition::to(next, effects)
}

fn window_ready(
    session: &DragSession,
    window_id: WindowId,
    ctx: &ReduceContext<'_>,
) -> Result<Transition> {
    if !session.is_awaiting_window_created() {
        return Ok(Transition::unchanged(Some(session)));
    }
    let Some(origin) = session.detached_from else {
        return Ok(Transition::unchanged(Some(session)));
    };

    if window_id == origin.window_id {
        return Err(drag_error!(
            invariant,
            "окно {} пришло как новое, хотя из него отсоединяется вкладка {}",
            window_id,
            session.source_tab_id
        ));
    }

    // Пока идёт отсоединение, может появиться другое окно.
    let owner = ctx.registry.tab_window(session.source_tab_id);
    if owner != Some(window_id) {
        debug_if_enabled!(
            "WindowReady({}) во время отсоединения вкладки {}, вкладкой владеет {:?}",
            window_id,
            session.source_tab_id,
            owner
        );
        return Ok(Transition::unchanged(Some(session)));
    }

    Ok(detached_into_new_window(session, origin, window_id, ctx))
}

fn detached_into_new_window(
    session: &DragSession,
    origin: DetachOrigin,
    window_id: WindowId,
    ctx: &ReduceContext<'_>,
) -> Transition {
    info!("Окно {} готово для отсоединённой вкладки {}", window_id, session.source_tab_id);

    let mut next = session.clone();
    next.detach_requested_window_id = None;
    next.detached_from = None;
    next.display_index_requested = None;
    next.current_window_id = window_id;
    next.drag_detached_window_id = Some(window_id);

    let from = match ctx.registry.window(origin.window_id) {
        Some(source) => screen_point_at_client_point(source.position, origin.tab),
        None => origin.tab,
    };

    Transition::to(
        next,
        smallvec![DragEffect::AnimateWindow {
            window_id,
            from,
            target: MotionTarget::ClientPointAtCursor(session.detach_anchor()),
        }],
    )
}
