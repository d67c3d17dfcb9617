//! Deterministic float ordering for nearest-hit selection and BVH splits.

use core::cmp::Ordering;

/// Total order where `-0.0 == 0.0` and every NaN compares equal to every other.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical(a).total_cmp(&canonical(b))
}

fn canonical(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}
