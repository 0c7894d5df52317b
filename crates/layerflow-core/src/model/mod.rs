//! データモデル

mod image;
mod platform;

pub use image::*;
pub use platform::*;
