pub mod camera;
pub mod renderer;

pub use camera::{Camera3D, Mat4, ndc_to_pixel, pixel_to_ndc};
pub use renderer::*;
