//! Boundary between the render pipeline and the browser driving it.
//!
//! A [`Launcher`] starts the expensive shared [`Renderer`]; each request then
//! opens its own [`Surface`], loads one document, captures it and closes it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{LaunchError, RenderError};

/// Pixel size of a surface and its device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

/// Starts a renderer instance
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Renderer>, LaunchError>;
}

/// Long-lived renderer shared by all requests
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh, isolated surface
    async fn open_surface(&self) -> Result<Box<dyn Surface>, RenderError>;
}

/// Per-request render target (a browser tab)
#[async_trait]
pub trait Surface: Send {
    /// Disable CSP and size the viewport
    async fn configure(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    /// Navigate to `url` and wait for the load event
    async fn load(&mut self, url: &str) -> Result<(), RenderError>;

    /// Wait until web fonts in the loaded document are ready
    async fn fonts_ready(&mut self) -> Result<(), RenderError>;

    /// PNG of the region `(0, 0, width, height)` at the viewport's scale
    async fn capture_png(&mut self, viewport: Viewport) -> Result<Vec<u8>, RenderError>;

    /// Close this surface. The renderer stays alive.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
