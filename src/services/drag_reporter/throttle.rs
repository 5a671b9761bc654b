use crate::utils::window_geometry::Point;
use tokio::time::{Duration, Instant};

/// Троттлинг сэмплов указателя по переднему и заднему фронту.
///
/// Первый сэмпл в окне проходит сразу. Следующие внутри интервала
/// перезаписывают единственный отложенный слот, который отдаётся по истечении
/// интервала.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<Point>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    pub fn offer(&mut self, point: Point, now: Instant) -> Option<Point> {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.interval => {
                self.pending = Some(point);
                None
            }
            _ => {
                self.last_emit = Some(now);
                self.pending = None;
                Some(point)
            }
        }
    }

    /// Когда можно отдать отложенный сэмпл, если он есть.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending?;
        self.last_emit.map(|last| last + self.interval)
    }

    pub fn flush(&mut self, now: Instant) -> Option<Point> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_emit = Some(now);
        self.pending.take()
    }

    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_sample_passes() {
        let mut throttle = Throttle::new(Duration::from_millis(4));
        let now = Instant::now();
        assert_eq!(throttle.offer(Point::new(1, 1), now), Some(Point::new(1, 1)));
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn test_burst_keeps_only_latest_as_trailing() {
        let mut throttle = Throttle::new(Duration::from_millis(4));
        let start = Instant::now();
        throttle.offer(Point::new(1, 1), start);

        assert_eq!(throttle.offer(Point::new(2, 2), start + Duration::from_millis(1)), None);
        assert_eq!(throttle.offer(Point::new(3, 3), start + Duration::from_millis(2)), None);
        assert_eq!(throttle.deadline(), Some(start + Duration::from_millis(4)));

        assert_eq!(throttle.flush(start + Duration::from_millis(3)), None);
        assert_eq!(
            throttle.flush(start + Duration::from_millis(4)),
            Some(Point::new(3, 3))
        );
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn test_sample_after_interval_passes() {
        let mut throttle = Throttle::new(Duration::from_millis(4));
        let start = Instant::now();
        throttle.offer(Point::new(1, 1), start);
        assert_eq!(
            throttle.offer(Point::new(5, 5), start + Duration::from_millis(4)),
            Some(Point::new(5, 5))
        );
    }

    #[test]
    fn test_reset_drops_pending() {
        let mut throttle = Throttle::new(Duration::from_millis(4));
        let start = Instant::now();
        throttle.offer(Point::new(1, 1), start);
        throttle.offer(Point::new(2, 2), start);
        throttle.reset();
        assert_eq!(throttle.deadline(), None);
        assert_eq!(throttle.offer(Point::new(3, 3), start), Some(Point::new(3, 3)));
    }
}
