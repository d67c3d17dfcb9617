/// How a neighborhood filter shows matches and non-matches.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterStyle {
    /// Non-matching canopies are drawn at `base * dim_factor`.
    pub dim_factor: f32,
    /// Trunk opacity for a bucket holding at least one match.
    pub trunk_match_opacity: f32,
    pub trunk_dimmed_opacity: f32,
}

impl FilterStyle {
    pub const fn new(dim_factor: f32, trunk_match_opacity: f32, trunk_dimmed_opacity: f32) -> Self {
        Self {
            dim_factor,
            trunk_match_opacity,
            trunk_dimmed_opacity,
        }
    }
}

impl Default for FilterStyle {
    fn default() -> Self {
        Self::new(0.15, 0.9, 0.15)
    }
}
