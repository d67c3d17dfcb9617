use foundation::time::Time;

/// Per-tick metadata handed to everything that animates.
///
/// The host drives ticks from its own clock (`requestAnimationFrame` on the
/// web, a fixed step in tests), so `time` is whatever the host reports.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame.
    pub dt_s: f64,
    /// Host time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    /// Fixed-step frame, used by tests and headless runs.
    pub fn fixed(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    /// Next frame at host time `now`. A clock that runs backwards yields `dt_s == 0`.
    pub fn advance(self, now: Time) -> Self {
        Self {
            index: self.index + 1,
            dt_s: now.since(self.time),
            time: now,
        }
    }
}
