pub mod assets;
pub mod build_info;
pub mod extent;
pub mod geometry;
pub mod response;
pub mod sampling;
pub mod wkt;
