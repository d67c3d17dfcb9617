/// Linear RGB triple in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Hue, saturation, lightness, each in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(self) -> u32 {
        let channel = |v: f32| ((v.clamp(0.0, 1.0) * 255.0).round() as u32) & 0xff;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Multiply every channel by `k`.
    pub fn scaled(self, k: f32) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_hsl(self) -> Hsl {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let l = (min + max) / 2.0;

        if min == max {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let delta = max - min;
        let s = if l <= 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };
        let h = if max == self.r {
            (self.g - self.b) / delta + if self.g < self.b { 6.0 } else { 0.0 }
        } else if max == self.g {
            (self.b - self.r) / delta + 2.0
        } else {
            (self.r - self.g) / delta + 4.0
        };
        Hsl { h: h / 6.0, s, l }
    }

    /// Hue wraps; saturation and lightness clamp to `[0, 1]`.
    pub fn from_hsl(hsl: Hsl) -> Self {
        let h = hsl.h.rem_euclid(1.0);
        let s = hsl.s.clamp(0.0, 1.0);
        let l = hsl.l.clamp(0.0, 1.0);

        if s == 0.0 {
            return Self::new(l, l, l);
        }

        let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let q = 2.0 * l - p;
        Self::new(
            hue_to_rgb(q, p, h + 1.0 / 3.0),
            hue_to_rgb(q, p, h),
            hue_to_rgb(q, p, h - 1.0 / 3.0),
        )
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * 6.0 * (2.0 / 3.0 - t);
    }
    p
}

#[cfg(test)]
mod tests {
    use super::{Hsl, Rgb};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "expected {a} ~= {b}");
    }

    #[test]
    fn hex_round_trips() {
        for hex in [0x4d7a44, 0x3d2817, 0xffffff, 0x000000, 0xc1272d] {
            assert_eq!(Rgb::from_hex(hex).to_hex(), hex);
        }
    }

    #[test]
    fn hsl_of_primaries() {
        let red = Rgb::from_hex(0xff0000).to_hsl();
        assert_close(red.h, 0.0);
        assert_close(red.s, 1.0);
        assert_close(red.l, 0.5);

        let blue = Rgb::from_hex(0x0000ff).to_hsl();
        assert_close(blue.h, 2.0 / 3.0);
    }

    #[test]
    fn hsl_inverts() {
        let c = Rgb::from_hex(0x4d7a44);
        let back = Rgb::from_hsl(c.to_hsl());
        assert_close(back.r, c.r);
        assert_close(back.g, c.g);
        assert_close(back.b, c.b);
    }

    #[test]
    fn hue_wraps_and_grey_has_no_hue() {
        let a = Rgb::from_hsl(Hsl { h: 1.25, s: 1.0, l: 0.5 });
        let b = Rgb::from_hsl(Hsl { h: 0.25, s: 1.0, l: 0.5 });
        assert_eq!(a, b);
        assert_eq!(Rgb::from_hsl(Hsl { h: 0.3, s: 0.0, l: 0.2 }), Rgb::new(0.2, 0.2, 0.2));
    }

    #[test]
    fn scaled_dims_and_restores_from_the_base() {
        let base = Rgb::from_hex(0x6b8e23);
        let dimmed = base.scaled(0.15);
        assert_close(dimmed.g, base.g * 0.15);
        assert_eq!(base.scaled(1.0), base);
    }
}
