pub mod color;
pub mod draw;
pub mod html;
pub mod image;
pub mod zip;
