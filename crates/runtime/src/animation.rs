//! Camera flights: explicit interpolation tasks advanced once per tick.
//!
//! At most one flight is active. Starting a new one replaces the old one and
//! begins from wherever the camera currently is, so an interrupted flight
//! never snaps.

use foundation::math::Vec3;
use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadInOut,
    CubicInOut,
}

impl Easing {
    /// Maps progress `t` in `[0, 1]` to eased progress; inputs are clamped.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Camera eye position and look-at target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub const fn new(position: Vec3, target: Vec3) -> Self {
        Self { position, target }
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            target: self.target.lerp(other.target, t),
        }
    }

    pub fn distance(&self) -> f64 {
        self.position.distance(self.target)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Flight {
    pub from: CameraPose,
    pub to: CameraPose,
    pub start: Time,
    pub duration_s: f64,
    pub easing: Easing,
}

impl Flight {
    /// Un-eased progress in `[0, 1]`. Zero-length flights are complete immediately.
    pub fn progress(&self, now: Time) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (now.since(self.start) / self.duration_s).min(1.0)
    }

    pub fn pose_at(&self, now: Time) -> CameraPose {
        let e = self.easing.apply(self.progress(now));
        self.from.lerp(self.to, e)
    }

    pub fn is_finished(&self, now: Time) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Owns the current camera pose and the (single) active flight.
#[derive(Debug, Clone)]
pub struct FlightDirector {
    pose: CameraPose,
    active: Option<Flight>,
}

impl FlightDirector {
    pub fn new(pose: CameraPose) -> Self {
        Self { pose, active: None }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Direct pose change from user input. An active flight keeps control.
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.pose = pose;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&Flight> {
        self.active.as_ref()
    }

    /// Replace any active flight with one from the current pose to `to`.
    pub fn fly_to(&mut self, to: CameraPose, now: Time, duration_s: f64, easing: Easing) {
        self.start(Flight {
            from: self.pose,
            to,
            start: now,
            duration_s,
            easing,
        });
    }

    /// Replace any active flight with `flight` as given.
    pub fn start(&mut self, flight: Flight) {
        self.pose = flight.from;
        self.active = Some(flight);
    }

    /// Advance to `now`. Returns the pose to render with.
    pub fn tick(&mut self, now: Time) -> CameraPose {
        if let Some(flight) = self.active {
            self.pose = flight.pose_at(now);
            if flight.is_finished(now) {
                self.active = None;
            }
        }
        self.pose
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPose, Easing, Flight, FlightDirector};
    use foundation::math::Vec3;
    use foundation::time::Time;

    fn pose(p: (f64, f64, f64), t: (f64, f64, f64)) -> CameraPose {
        CameraPose::new(Vec3::new(p.0, p.1, p.2), Vec3::new(t.0, t.1, t.2))
    }

    #[test]
    fn easings_hit_endpoints_and_midpoint() {
        for e in [Easing::Linear, Easing::QuadInOut, Easing::CubicInOut] {
            assert_eq!(e.apply(0.0), 0.0);
            assert_eq!(e.apply(1.0), 1.0);
            assert_eq!(e.apply(0.5), 0.5);
            assert_eq!(e.apply(2.0), 1.0);
        }
        assert_eq!(Easing::QuadInOut.apply(0.25), 0.125);
        assert_eq!(Easing::CubicInOut.apply(0.25), 0.0625);
    }

    #[test]
    fn flight_reaches_target_and_deactivates() {
        let start = pose((0.0, 720.0, 0.1), (0.0, 0.0, 0.0));
        let end = pose((120.0, 240.0, 360.0), (0.0, 0.0, 0.0));
        let mut d = FlightDirector::new(start);
        d.fly_to(end, Time(10.0), 2.0, Easing::QuadInOut);
        assert!(d.is_active());

        let mid = d.tick(Time(11.0));
        assert_eq!(mid, start.lerp(end, 0.5));
        assert!(d.is_active());

        assert_eq!(d.tick(Time(12.0)), end);
        assert!(!d.is_active());
        assert_eq!(d.tick(Time(50.0)), end);
    }

    #[test]
    fn new_flight_replaces_active_from_current_pose() {
        let a = pose((0.0, 720.0, 60.0), (0.0, 0.0, 0.0));
        let b = pose((100.0, 100.0, 100.0), (50.0, 0.0, 50.0));
        let c = pose((-300.0, 200.0, 0.0), (-300.0, 0.0, -200.0));

        let mut d = FlightDirector::new(a);
        d.fly_to(b, Time(0.0), 1.0, Easing::Linear);
        let interrupted = d.tick(Time(0.25));

        d.fly_to(c, Time(0.25), 1.0, Easing::Linear);
        let flight = d.active().copied().expect("active flight");
        assert_eq!(flight.from, interrupted);
        assert_eq!(flight.to, c);
        assert_eq!(d.tick(Time(0.25)), interrupted);
        assert_eq!(d.tick(Time(1.25)), c);
    }

    #[test]
    fn zero_duration_completes_on_first_tick() {
        let f = Flight {
            from: pose((0.0, 1.0, 0.0), (0.0, 0.0, 0.0)),
            to: pose((5.0, 1.0, 0.0), (5.0, 0.0, 0.0)),
            start: Time(3.0),
            duration_s: 0.0,
            easing: Easing::CubicInOut,
        };
        assert!(f.is_finished(Time(3.0)));
        assert_eq!(f.pose_at(Time(3.0)), f.to);
    }
}
