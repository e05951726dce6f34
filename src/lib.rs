// Export modules for use in tests
pub mod document;
pub mod farm;
pub mod panic_handler;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the conversion entry point
pub use document::{Document, DocumentError, Page, PageIndex};
pub use farm::{CancelToken, ConvertError, ImageConverter, PageRenderer, RenderedImage};
pub use settings::FarmSettings;
