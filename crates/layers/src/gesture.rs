use foundation::math::Vec2;
use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Gesture {
    Click,
    Drag,
}

/// Tells a click from the end of an orbit/pan drag.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickDetector {
    max_distance_px: f64,
    max_elapsed_ms: f64,
    press: Option<(Vec2, Time)>,
}

impl ClickDetector {
    pub fn new(max_distance_px: f64, max_elapsed_ms: f64) -> Self {
        Self {
            max_distance_px,
            max_elapsed_ms,
            press: None,
        }
    }

    pub fn press(&mut self, at: Vec2, now: Time) {
        self.press = Some((at, now));
    }

    /// A release with no recorded press counts as a click.
    pub fn release(&mut self, at: Vec2, now: Time) -> Gesture {
        let Some((start, pressed)) = self.press.take() else {
            return Gesture::Click;
        };
        let moved = at.distance(start);
        let elapsed_ms = now.since(pressed) * 1000.0;
        if moved <= self.max_distance_px && elapsed_ms <= self.max_elapsed_ms {
            Gesture::Click
        } else {
            Gesture::Drag
        }
    }
}

impl Default for ClickDetector {
    fn default() -> Self {
        Self::new(5.0, 400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClickDetector, Gesture};
    use foundation::math::Vec2;
    use foundation::time::Time;

    #[test]
    fn still_and_quick_is_a_click() {
        let mut d = ClickDetector::default();
        d.press(Vec2::new(100.0, 100.0), Time(1.0));
        assert_eq!(d.release(Vec2::new(100.0, 100.0), Time(1.25)), Gesture::Click);

        d.press(Vec2::new(100.0, 100.0), Time(1.0));
        assert_eq!(d.release(Vec2::new(103.0, 104.0), Time(1.25)), Gesture::Click);
    }

    #[test]
    fn movement_or_hold_is_a_drag() {
        let mut d = ClickDetector::default();
        d.press(Vec2::new(100.0, 100.0), Time(1.0));
        assert_eq!(d.release(Vec2::new(200.0, 100.0), Time(1.1)), Gesture::Drag);

        d.press(Vec2::new(100.0, 100.0), Time(1.0));
        assert_eq!(d.release(Vec2::new(100.0, 100.0), Time(1.5)), Gesture::Drag);
    }

    #[test]
    fn release_without_press_is_a_click() {
        let mut d = ClickDetector::default();
        assert_eq!(d.release(Vec2::new(0.0, 0.0), Time(0.0)), Gesture::Click);
    }
}
