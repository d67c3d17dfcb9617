use foundation::math::Vec3;
use gpu::{Camera3D, ndc_to_pixel};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub font_size_px: f32,
    pub color: [f32; 4],
    pub background: [f32; 4],
    pub padding_px: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size_px: 13.0,
            color: [0.784, 0.902, 1.0, 1.0],
            background: [0.031, 0.043, 0.078, 0.85],
            padding_px: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelAnchor {
    pub text: String,
    pub subtitle: Option<String>,
    pub position: Vec3,
    pub priority: f32,
    pub style: LabelStyle,
}

pub trait LabelProjector {
    fn project(&self, world: Vec3) -> Option<[f32; 2]>;
}

/// Projects through a camera into a pixel viewport (origin top-left).
#[derive(Debug, Copy, Clone)]
pub struct CameraProjector<'a> {
    pub camera: &'a Camera3D,
    pub viewport_px: [f64; 2],
}

impl LabelProjector for CameraProjector<'_> {
    fn project(&self, world: Vec3) -> Option<[f32; 2]> {
        let ndc = self.camera.project_to_ndc(world)?;
        let px = ndc_to_pixel(ndc, self.viewport_px[0], self.viewport_px[1]);
        Some([px[0] as f32, px[1] as f32])
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelLayoutConfig {
    pub viewport_px: [f32; 2],
    pub cell_px: f32,
    pub max_labels: usize,
}

impl Default for LabelLayoutConfig {
    fn default() -> Self {
        Self {
            viewport_px: [1.0, 1.0],
            cell_px: 32.0,
            max_labels: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel2D {
    pub text: String,
    pub subtitle: Option<String>,
    pub screen_pos_px: [f32; 2],
    pub size_px: [f32; 2],
    pub priority: f32,
    pub style: LabelStyle,
}

/// Greedy screen-space placement in priority order; a label whose padded box
/// touches an occupied grid cell is dropped.
pub fn layout_labels_2d<P: LabelProjector>(
    labels: &[LabelAnchor],
    projector: &P,
    config: LabelLayoutConfig,
) -> Vec<PlacedLabel2D> {
    let mut order: Vec<&LabelAnchor> = labels.iter().collect();
    order.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    let mut out = Vec::new();
    let mut occupied: HashSet<u64> = HashSet::new();

    for label in order {
        if out.len() >= config.max_labels {
            break;
        }

        let Some(screen) = projector.project(label.position) else {
            continue;
        };
        if !screen[0].is_finite() || !screen[1].is_finite() {
            continue;
        }

        let size = estimate_text_size(label);
        let half_w = size[0] * 0.5 + label.style.padding_px;
        let half_h = size[1] * 0.5 + label.style.padding_px;

        if screen[0] + half_w < 0.0
            || screen[1] + half_h < 0.0
            || screen[0] - half_w > config.viewport_px[0]
            || screen[1] - half_h > config.viewport_px[1]
        {
            continue;
        }

        if !try_place_label(&mut occupied, screen, [half_w, half_h], config.cell_px) {
            continue;
        }

        out.push(PlacedLabel2D {
            text: label.text.clone(),
            subtitle: label.subtitle.clone(),
            screen_pos_px: screen,
            size_px: size,
            priority: label.priority,
            style: label.style.clone(),
        });
    }

    out
}

fn estimate_text_size(label: &LabelAnchor) -> [f32; 2] {
    let font = label.style.font_size_px;
    let title = label.text.chars().count().max(1) as f32 * font * 0.6;
    match &label.subtitle {
        Some(sub) => {
            let sub_w = sub.chars().count() as f32 * font * 0.45;
            [title.max(sub_w), font * 1.8]
        }
        None => [title, font],
    }
}

fn try_place_label(
    occupied: &mut HashSet<u64>,
    screen: [f32; 2],
    half_size: [f32; 2],
    cell_px: f32,
) -> bool {
    let min_x = ((screen[0] - half_size[0]) / cell_px).floor() as i32;
    let max_x = ((screen[0] + half_size[0]) / cell_px).floor() as i32;
    let min_y = ((screen[1] - half_size[1]) / cell_px).floor() as i32;
    let max_y = ((screen[1] + half_size[1]) / cell_px).floor() as i32;

    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            if occupied.contains(&cell_key(cx, cy)) {
                return false;
            }
        }
    }

    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            occupied.insert(cell_key(cx, cy));
        }
    }

    true
}

fn cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u64) << 32) ^ (cy as u32 as u64)
}
