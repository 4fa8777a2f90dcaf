//! Article content processing: HTML sanitizing and image re-hosting

pub mod cover;
pub mod html;
pub mod image_resolver;
pub mod sanitizer;
pub mod style;
pub mod tags;

pub use cover::remove_cover_image;
pub use image_resolver::{ImageResolver, ResolvedContent};
pub use sanitizer::sanitize;
