use foundation::color::Rgb;
use foundation::math::{GroundPoint, LatLng};
use serde::Serialize;

use crate::archetype::Shape;

/// Diameter at breast height, in inches, used when the record has none.
pub const DEFAULT_DBH_IN: f64 = 6.0;
/// Height range assumed when the record has none.
pub const DEFAULT_HEIGHT_RANGE: &str = "20-40";
/// Height used when the range string does not start with a usable number.
pub const DEFAULT_HEIGHT_FT: f64 = 20.0;

pub const UNKNOWN: &str = "Unknown";

/// Stable identifier: the tree's position in the catalog's load order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TreeId(pub u32);

impl TreeId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// One inventory record as it came off the wire. Nothing here is validated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeRecord {
    pub lat: f64,
    pub lng: f64,
    pub genus: Option<String>,
    pub common_name: Option<String>,
    pub species: Option<String>,
    pub diameter_in: Option<f64>,
    pub height_ft: Option<String>,
    pub condition: Option<String>,
    pub neighborhood: Option<String>,
}

/// A loaded tree. Immutable once the catalog is built; the displayed color
/// lives in the canopy batch, never here.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub id: TreeId,
    pub common_name: String,
    pub genus: String,
    pub species: String,
    pub condition: String,
    pub neighborhood: String,
    pub location: LatLng,
    pub position: GroundPoint,
    pub dbh: f64,
    pub height_ft: f64,
    pub canopy_scale: f64,
    pub height_scale: f64,
    pub shape: Shape,
    pub color: Rgb,
    /// Index within this tree's archetype bucket (and both of its batches).
    pub slot: u32,
}

impl Tree {
    /// Hover text: `"{common name} — {dbh}\" DBH"`.
    pub fn tooltip(&self) -> String {
        format!("{} — {}\" DBH", self.common_name, self.dbh)
    }

    pub fn info_card(&self) -> InfoCard {
        InfoCard {
            title: self.common_name.clone(),
            scientific_name: format!("{} {}", self.genus, self.species),
            diameter: format!("{}\" DBH", self.dbh),
            height: format!("{}+ ft", self.height_ft),
            condition: self.condition.clone(),
            neighborhood: self.neighborhood.clone(),
            coordinates: format!("{:.4}, {:.4}", self.location.lat, self.location.lng),
            map_url: format!(
                "https://www.google.com/maps?q={},{}",
                self.location.lat, self.location.lng
            ),
        }
    }
}

/// Display fields for the single-tree info surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoCard {
    pub title: String,
    pub scientific_name: String,
    pub diameter: String,
    pub height: String,
    pub condition: String,
    pub neighborhood: String,
    pub coordinates: String,
    pub map_url: String,
}

/// Longest numeric prefix of `s`, ignoring leading whitespace.
///
/// `"12.5in"` is `12.5`, `"60+"` is `60`, `"abc"` is `None`.
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits |= frac_end > frac_start;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

/// Missing, zero and non-finite diameters fall back to [`DEFAULT_DBH_IN`].
pub fn resolve_dbh(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => DEFAULT_DBH_IN,
    }
}

/// Lower bound of a `"min-max"` height range in feet.
pub fn resolve_height(raw: Option<&str>) -> f64 {
    let range = match raw {
        Some(s) if !s.is_empty() => s,
        _ => DEFAULT_HEIGHT_RANGE,
    };
    let low = range.split('-').next().unwrap_or_default();
    match leading_number(low) {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => DEFAULT_HEIGHT_FT,
    }
}

/// Empty strings count as missing.
pub(crate) fn text_or(raw: &Option<String>, fallback: &str) -> String {
    match raw.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}
