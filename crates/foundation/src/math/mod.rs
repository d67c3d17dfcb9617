pub mod precision;
pub mod projection;
pub mod tiles;
pub mod vec;

pub use precision::*;
pub use projection::*;
pub use tiles::*;
pub use vec::*;
