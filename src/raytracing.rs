pub mod camera;
pub mod core;
pub mod math;
pub mod parser;
pub mod render;

pub use math::*;
