pub mod color;
pub mod document;
pub mod element;

pub use color::*;
pub use document::*;
pub use element::*;
