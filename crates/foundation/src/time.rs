/// Monotonic timestamp in seconds since an arbitrary host epoch.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    /// Seconds elapsed since `earlier`; never negative.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    pub fn after(self, seconds: f64) -> Time {
        Time(self.0 + seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn since_clamps_to_zero() {
        let a = Time(2.0);
        let b = Time(3.5);
        assert_eq!(b.since(a), 1.5);
        assert_eq!(a.since(b), 0.0);
    }

    #[test]
    fn millis_round_trip() {
        assert_eq!(Time::from_millis(1200.0), Time(1.2));
        assert_eq!(Time(0.4).as_millis(), 400.0);
    }
}
