//! Converts EPUB and PDF documents into a normalized [`model::Book`]: metadata,
//! a navigation tree, an ordered spine of sanitized chapters and an image map.

pub mod chapters;
pub mod converter;
pub mod epub_reader;
pub mod error;
pub mod html;
pub mod image;
pub mod metadata;
pub mod model;
pub mod navigation;
pub mod outline;
pub mod package;
pub mod pdf_reader;
pub mod reader;
pub mod store;
pub mod text;
pub mod toc;
