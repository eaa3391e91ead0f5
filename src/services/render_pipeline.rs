//! End-to-end render of one request: resources, document, surface, capture.
//!
//! The surface opened for a request is closed on every exit path, including
//! when the request future itself is dropped mid-render.

use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::error::{RenderError, RenderFailure};
use crate::models::{AppConfig, Element, RenderRequest};
use crate::rendering::{compose, ResolvedResources, Surface, Viewport};
use crate::services::asset_cache::file_url;
use crate::services::{AssetCache, FontIndex, RendererPool};

/// Download name suggested to clients
pub const OUTPUT_FILENAME: &str = "generated.png";

/// Timing and scale knobs for a render
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub load_timeout: Duration,
    pub fonts_ready_timeout: Duration,
    pub settle_delay: Duration,
    pub device_scale_factor: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
            fonts_ready_timeout: config.fonts_ready_timeout(),
            settle_delay: config.settle_delay(),
            device_scale_factor: config.device_scale_factor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub png: Vec<u8>,
    pub filename: &'static str,
    pub elapsed_ms: u64,
}

pub struct RenderPipeline {
    pool: Arc<RendererPool>,
    assets: Arc<AssetCache>,
    fonts: Arc<FontIndex>,
    options: PipelineOptions,
}

impl RenderPipeline {
    pub fn new(
        pool: Arc<RendererPool>,
        assets: Arc<AssetCache>,
        fonts: Arc<FontIndex>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            pool,
            assets,
            fonts,
            options,
        }
    }

    pub fn pool(&self) -> &Arc<RendererPool> {
        &self.pool
    }

    pub fn assets(&self) -> &Arc<AssetCache> {
        &self.assets
    }

    pub fn fonts(&self) -> &Arc<FontIndex> {
        &self.fonts
    }

    /// Render `request` to PNG bytes.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderFailure> {
        let start = Instant::now();
        let (images, texts, custom_fonts) = request.element_counts();
        tracing::info!(
            width = request.width,
            height = request.height,
            elements = request.elements.len(),
            images,
            texts,
            custom_fonts,
            "Render requested"
        );

        let result = self.run(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(png) => {
                tracing::info!(elapsed_ms, bytes = png.len(), "Render complete");
                Ok(RenderOutput {
                    png,
                    filename: OUTPUT_FILENAME,
                    elapsed_ms,
                })
            }
            Err(cause) => {
                tracing::error!(elapsed_ms, error = %cause, "Render failed");
                Err(RenderFailure { cause, elapsed_ms })
            }
        }
    }

    async fn run(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let renderer = self.pool.acquire().await?;

        let resources = self.resolve_resources(request).await;
        let html = compose(request, &resources);
        let document = self.write_document(html).await?;
        let url = file_url(document.path());

        let viewport = Viewport {
            width: request.pixel_width(),
            height: request.pixel_height(),
            device_scale_factor: self.options.device_scale_factor,
        };

        let mut surface = SurfaceGuard::new(renderer.open_surface().await?);
        tracing::debug!(width = viewport.width, height = viewport.height, "Surface opened");

        let result = match surface.get() {
            Ok(s) => self.drive(s, &url, viewport).await,
            Err(e) => Err(e),
        };
        surface.close().await;

        // Removes the document file
        drop(document);
        result
    }

    async fn drive(
        &self,
        surface: &mut dyn Surface,
        url: &str,
        viewport: Viewport,
    ) -> Result<Vec<u8>, RenderError> {
        surface.configure(viewport).await?;

        let load_timeout = self.options.load_timeout;
        match tokio::time::timeout(load_timeout, surface.load(url)).await {
            Ok(loaded) => loaded?,
            Err(_) => return Err(RenderError::LoadTimeout(load_timeout.as_millis() as u64)),
        }
        tracing::debug!("Document loaded");

        match tokio::time::timeout(self.options.fonts_ready_timeout, surface.fonts_ready()).await {
            Ok(Ok(())) => tracing::debug!("Fonts ready"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Font readiness check failed, continuing"),
            Err(_) => tracing::warn!(
                timeout_ms = self.options.fonts_ready_timeout.as_millis() as u64,
                "Fonts not ready in time, continuing"
            ),
        }
        tokio::time::sleep(self.options.settle_delay).await;

        let png = surface.capture_png(viewport).await?;
        tracing::debug!(bytes = png.len(), "Captured");
        Ok(png)
    }

    /// Look up every image and font the request references.
    ///
    /// Misses are not errors: images keep their original URL and text falls
    /// back to its declared family.
    async fn resolve_resources(&self, request: &RenderRequest) -> ResolvedResources {
        let mut image_srcs = HashSet::new();
        let mut families = HashSet::new();
        for element in &request.elements {
            match element {
                Element::Image(image) => {
                    if let Some(src) = image.src.as_deref().filter(|s| !s.is_empty()) {
                        image_srcs.insert(src);
                    }
                }
                Element::Text(text) => {
                    if let Some(family) = text.font_family.as_deref().filter(|f| !f.is_empty()) {
                        families.insert(family.to_string());
                    }
                }
                Element::Unknown => {}
            }
        }

        let lookups = image_srcs.into_iter().map(|src| async move {
            let resolved = self.assets.resolve(src).await;
            (src.to_string(), resolved.to_src())
        });
        let images: HashMap<String, String> = join_all(lookups).await.into_iter().collect();

        // Font files are read and base64-encoded; keep that off the runtime.
        let index = self.fonts.clone();
        let fonts = tokio::task::spawn_blocking(move || {
            families
                .into_iter()
                .filter_map(|family| index.embed(&family).map(|font| (family, font.data_uri)))
                .collect::<HashMap<_, _>>()
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!(%e, "Font resolution task failed");
            HashMap::new()
        });

        tracing::debug!(
            images = images.len(),
            embedded_fonts = fonts.len(),
            "Resources resolved"
        );
        ResolvedResources { fonts, images }
    }

    /// Write the document next to the cached images so `file://` loads of
    /// both share an origin.
    async fn write_document(&self, html: String) -> Result<NamedTempFile, RenderError> {
        let dir = self
            .assets
            .cache_dir()
            .await
            .unwrap_or_else(std::env::temp_dir);
        let file = tokio::task::spawn_blocking(move || write_document_in(&dir, &html))
            .await
            .map_err(|e| RenderError::Document(std::io::Error::other(e)))??;
        tracing::debug!(path = %file.path().display(), "Document written");
        Ok(file)
    }
}

fn write_document_in(dir: &Path, html: &str) -> std::io::Result<NamedTempFile> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix(".render-")
        .suffix(".html")
        .tempfile_in(dir)?;
    file.write_all(html.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Owns an open surface and closes it exactly once.
///
/// `close` is the normal path. If the guard is dropped with the surface still
/// open (the request was cancelled), closing is handed to a background task.
struct SurfaceGuard {
    surface: Option<Box<dyn Surface>>,
}

impl SurfaceGuard {
    fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface: Some(surface),
        }
    }

    fn get(&mut self) -> Result<&mut dyn Surface, RenderError> {
        match self.surface.as_mut() {
            Some(surface) => Ok(surface.as_mut()),
            None => Err(RenderError::Surface("surface already closed".to_string())),
        }
    }

    async fn close(&mut self) {
        if let Some(surface) = self.surface.take() {
            close_surface(surface).await;
        }
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_surface(surface));
            }
            Err(_) => tracing::warn!("No runtime to close abandoned surface"),
        }
    }
}

async fn close_surface(surface: Box<dyn Surface>) {
    match surface.close().await {
        Ok(()) => tracing::debug!("Surface closed"),
        Err(e) => tracing::warn!(error = %e, "Failed to close surface"),
    }
}
