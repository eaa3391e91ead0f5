pub mod config;
pub mod element;
pub mod render_request;

pub use config::AppConfig;
pub use element::{Element, Frame, ImageElement, TextElement, WritingMode};
pub use render_request::{RenderRequest, DEFAULT_HEIGHT, DEFAULT_WIDTH};
