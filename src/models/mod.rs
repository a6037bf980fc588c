pub mod geometry;
pub mod media_item;

pub use geometry::*;
pub use media_item::*;
