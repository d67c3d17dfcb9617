pub mod archetype;
pub mod catalog;
pub mod picking;
pub mod selection;
pub mod spatial;
pub mod stats;
pub mod tree;

pub use archetype::{Archetype, Shape, classify};
pub use catalog::{ArchetypeBucket, EntityCatalog, NeighborhoodGroup, Tally};
pub use tree::{Tree, TreeId, TreeRecord};
