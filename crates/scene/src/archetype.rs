//! Genus → visual archetype tables.
//!
//! Classification never fails: an unmapped genus gets [`Shape::Round`] and
//! [`DEFAULT_CANOPY`] with no seasonal color.

use foundation::color::{Hsl, Rgb};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Conifer,
    Broad,
    Round,
    Columnar,
    Vase,
    Weeping,
    Small,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::Conifer,
        Shape::Broad,
        Shape::Round,
        Shape::Columnar,
        Shape::Vase,
        Shape::Weeping,
        Shape::Small,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Conifer => "conifer",
            Shape::Broad => "broad",
            Shape::Round => "round",
            Shape::Columnar => "columnar",
            Shape::Vase => "vase",
            Shape::Weeping => "weeping",
            Shape::Small => "small",
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_CANOPY: u32 = 0x4d7a44;
pub const TRUNK_COLOR: u32 = 0x3d2817;

/// Hash bytes below this pick the seasonal color (40/256, about 15.6%).
pub const SEASONAL_THRESHOLD: u8 = 40;

const SEASONAL_KEY: &[u8; 32] = b"city-canopy seasonal palette v1!";

const LIGHTNESS_JITTER: f32 = 0.03;
const HUE_JITTER: f32 = 0.01;
const MIN_LIGHTNESS: f32 = 0.08;
const MAX_LIGHTNESS: f32 = 0.55;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Archetype {
    pub shape: Shape,
    pub canopy: u32,
    pub seasonal: Option<u32>,
}

impl Archetype {
    const fn new(shape: Shape, canopy: u32, seasonal: Option<u32>) -> Self {
        Self {
            shape,
            canopy,
            seasonal,
        }
    }

    /// Canopy color before per-tree jitter.
    pub fn base_color(&self, lat: f64, lng: f64) -> u32 {
        match self.seasonal {
            Some(fall) if seasonal_byte(lat, lng) < SEASONAL_THRESHOLD => fall,
            _ => self.canopy,
        }
    }
}

pub const DEFAULT_ARCHETYPE: Archetype = Archetype::new(Shape::Round, DEFAULT_CANOPY, None);

pub fn classify(genus: &str) -> Archetype {
    use Shape::*;
    match genus {
        "Quercus" => Archetype::new(Broad, 0x3a6b35, Some(0x8b5e3c)),
        "Acer" => Archetype::new(Round, 0x4a7c42, Some(0xc44e28)),
        "Pinus" => Archetype::new(Conifer, 0x2b5233, None),
        "X Cupressocyparis" => Archetype::new(Columnar, 0x2d5a3a, None),
        "Juniperus" => Archetype::new(Columnar, 0x2d5a3a, None),
        "Thuja" => Archetype::new(Columnar, 0x2f5e3e, None),
        "Cedrus" => Archetype::new(Conifer, 0x2a5436, None),
        "Cornus" => Archetype::new(Small, 0x5c8a50, None),
        "Magnolia" => Archetype::new(Round, 0x3d6b3d, None),
        "Lagerstroemia" => Archetype::new(Small, 0x5a8a52, None),
        "Ulmus" => Archetype::new(Vase, 0x6b8f5e, None),
        "Prunus" => Archetype::new(Small, 0x5d8850, Some(0xa44a2a)),
        "Cercis" => Archetype::new(Small, 0x6b9060, None),
        "Betula" => Archetype::new(Round, 0x7da668, None),
        "Liquidambar" => Archetype::new(Round, 0x4a7848, Some(0xb84a28)),
        "Fraxinus" => Archetype::new(Round, 0x608a54, None),
        "Salix" => Archetype::new(Weeping, 0x7da86a, None),
        "Liriodendron" => Archetype::new(Round, 0x5a8850, None),
        "Ilex" => Archetype::new(Round, 0x2d5a2d, None),
        _ => DEFAULT_ARCHETYPE,
    }
}

/// Keyed BLAKE3 over the little-endian bit patterns of `lat` then `lng`.
///
/// Identical on every platform and across reloads.
pub fn seasonal_byte(lat: f64, lng: f64) -> u8 {
    let mut input = [0u8; 16];
    input[..8].copy_from_slice(&lat.to_bits().to_le_bytes());
    input[8..].copy_from_slice(&lng.to_bits().to_le_bytes());
    blake3::keyed_hash(SEASONAL_KEY, &input).as_bytes()[0]
}

/// Per-tree color variation: small hue and lightness offsets, lightness clamped.
pub fn jitter<R: Rng + ?Sized>(color: Rgb, rng: &mut R) -> Rgb {
    let hsl = color.to_hsl();
    let l = hsl.l + rng.gen_range(-LIGHTNESS_JITTER..LIGHTNESS_JITTER);
    let h = hsl.h + rng.gen_range(-HUE_JITTER..HUE_JITTER);
    Rgb::from_hsl(Hsl {
        h,
        s: hsl.s,
        l: l.clamp(MIN_LIGHTNESS, MAX_LIGHTNESS),
    })
}
