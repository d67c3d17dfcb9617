pub mod request;
pub mod residency;
pub mod tiles;

pub use request::*;
pub use residency::*;
pub use tiles::*;
