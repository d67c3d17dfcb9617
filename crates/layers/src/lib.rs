pub mod gesture;
pub mod highlight;
pub mod instancing;
pub mod labels;
pub mod layer;
pub mod picking;
pub mod raster;
pub mod signposts;
pub mod symbology;
pub mod templates;

#[cfg(test)]
mod fixtures;

pub use gesture::{ClickDetector, Gesture};
pub use highlight::{FilterOutcome, HighlightEngine};
pub use instancing::{BatchError, BatchedDrawable, ForestLayer, InstanceTransform, TreeBatches};
pub use layer::*;
pub use picking::{PickTarget, ScenePicker};
pub use raster::{GroundOptions, RasterLayer};
pub use signposts::{Signpost, SignpostLayer, SignpostOptions};
pub use symbology::FilterStyle;
