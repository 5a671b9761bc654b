//! Чистая математика координат для координатора и репортёра перетаскивания.
//!
//! Экранные координаты абсолютны для дисплея. Клиентские отсчитываются от
//! области содержимого окна. Преобразования ниже считают внешнюю позицию окна
//! его клиентским началом координат. Рамка учитывается только там, где
//! вызывающий её измерил (см. [`FrameInsets::infer`]).

use crate::events::WindowInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Внешняя позиция и размер окна.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub position: Point,
    pub size: Size,
}

impl Bounds {
    pub fn of(window: &WindowInfo) -> Self {
        Self {
            position: window.position,
            size: window.size,
        }
    }
}

/// Размер неклиентской рамки (высота заголовка, ширина левой границы).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInsets {
    pub left: i32,
    pub top: i32,
}

impl FrameInsets {
    /// Выводит размер рамки из одного сэмпла указателя в обеих системах координат.
    ///
    /// Расхождение между экранной точкой по данным клиента и точкой от начала
    /// окна и есть заголовок или граница.
    pub fn infer(screen: Point, client: Point, window_origin: Point) -> Self {
        Self {
            left: screen.x - client.x - window_origin.x,
            top: screen.y - client.y - window_origin.y,
        }
    }

    pub fn as_offset(&self) -> Point {
        Point::new(self.left, self.top)
    }
}

pub fn screen_point_at_client_point(window_origin: Point, client: Point) -> Point {
    window_origin + client
}

pub fn client_point_at_screen_point(window_origin: Point, screen: Point) -> Point {
    screen - window_origin
}

pub fn client_size(window: &WindowInfo) -> Size {
    window.content_size
}

/// Клиентская позиция курсора внутри `window`.
pub fn client_point_at_cursor(window: &WindowInfo, cursor: Point) -> Point {
    client_point_at_screen_point(window.position, cursor)
}

/// Куда поставить окно, чтобы `client` оказался в `screen`.
pub fn window_position_for_client_point_at_screen_point(screen: Point, client: Point) -> Point {
    screen - client
}

pub fn window_position_for_client_point_at_cursor(cursor: Point, client: Point) -> Point {
    window_position_for_client_point_at_screen_point(cursor, client)
}

/// Позиция окна, при которой перетаскиваемая вкладка остаётся под курсором.
///
/// `tab` это клиентская позиция вкладки, `pointer_offset` смещение указателя
/// внутри вкладки в начале перетаскивания.
pub fn window_position_for_tab_at_cursor(
    cursor: Point,
    tab: Point,
    insets: FrameInsets,
    pointer_offset: Point,
) -> Point {
    cursor - tab - insets.as_offset() - pointer_offset
}

/// Проверка попадания для присоединения к одному окну-кандидату.
///
/// `cursor_client` это курсор в клиентских координатах кандидата. По горизонтали
/// курсор должен быть внутри `[0, client_width)`, по вертикали строго ближе
/// `threshold / 2` к клиентскому Y перетаскиваемой вкладки.
pub fn is_within_attach_band(cursor_client: Point, client_width: u32, tab_y: i32, threshold: u32) -> bool {
    let half = (threshold / 2) as i32;
    let inside_x = cursor_client.x >= 0 && i64::from(cursor_client.x) < i64::from(client_width);
    let inside_y = cursor_client.y > tab_y - half && cursor_client.y < tab_y + half;
    inside_x && inside_y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WindowId;

    #[test]
    fn test_frame_insets_from_literal_sample() {
        let insets = FrameInsets::infer(Point::new(500, 300), Point::new(120, 40), Point::new(370, 50));
        assert_eq!(insets.top, 210);
        assert_eq!(insets.left, 10);
    }

    #[test]
    fn test_screen_client_roundtrip() {
        let origin = Point::new(100, 200);
        let client = client_point_at_screen_point(origin, Point::new(150, 260));
        assert_eq!(client, Point::new(50, 60));
        assert_eq!(screen_point_at_client_point(origin, client), Point::new(150, 260));
    }

    #[test]
    fn test_window_position_for_client_point() {
        let pos = window_position_for_client_point_at_cursor(Point::new(400, 300), Point::new(30, 10));
        assert_eq!(pos, Point::new(370, 290));
    }

    #[test]
    fn test_window_position_for_tab_subtracts_everything() {
        let pos = window_position_for_tab_at_cursor(
            Point::new(600, 400),
            Point::new(100, 0),
            FrameInsets { left: 2, top: 30 },
            Point::new(15, 8),
        );
        assert_eq!(pos, Point::new(483, 362));
    }

    #[test]
    fn test_attach_band_horizontal_edges() {
        assert!(is_within_attach_band(Point::new(10, 12), 800, 10, 50));
        assert!(is_within_attach_band(Point::new(0, 12), 800, 10, 50));
        assert!(!is_within_attach_band(Point::new(-5, 10), 800, 10, 50));
        assert!(!is_within_attach_band(Point::new(800, 10), 800, 10, 50));
    }

    #[test]
    fn test_attach_band_vertical_tolerance() {
        assert!(is_within_attach_band(Point::new(10, 34), 800, 10, 50));
        assert!(!is_within_attach_band(Point::new(10, 35), 800, 10, 50));
        assert!(is_within_attach_band(Point::new(10, -14), 800, 10, 50));
        assert!(!is_within_attach_band(Point::new(10, -15), 800, 10, 50));
    }

    #[test]
    fn test_client_point_at_cursor_uses_window_origin() {
        let window = WindowInfo::new(WindowId(1), Point::new(50, 60), Size::new(300, 200))
            .with_content_size(Size::new(300, 180));
        assert_eq!(client_point_at_cursor(&window, Point::new(60, 70)), Point::new(10, 10));
        assert_eq!(client_size(&window), Size::new(300, 180));
    }
}
