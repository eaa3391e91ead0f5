//! In-process render engine for tests.
//!
//! Counts launches and open surfaces, records every document it loads and
//! produces real PNG bytes sized to the requested viewport.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pagesnap::error::{LaunchError, RenderError};
use pagesnap::rendering::{Launcher, Renderer, Surface, Viewport};

/// Knobs for how the fake engine misbehaves
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    /// Time each launch takes
    pub launch_delay: Duration,
    /// Number of initial launches that fail
    pub failing_launches: usize,
    /// Time each document load takes
    pub load_delay: Duration,
    /// Fail every document load
    pub fail_load: bool,
    /// Fail every capture
    pub fail_capture: bool,
}

/// Counters shared by the launcher, renderer and its surfaces
#[derive(Debug, Default)]
pub struct EngineStats {
    pub launches: AtomicUsize,
    pub surfaces_opened: AtomicUsize,
    pub surfaces_closed: AtomicUsize,
    pub documents: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<Viewport>>,
}

impl EngineStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn surfaces_opened(&self) -> usize {
        self.surfaces_opened.load(Ordering::SeqCst)
    }

    pub fn open_surfaces(&self) -> usize {
        self.surfaces_opened.load(Ordering::SeqCst) - self.surfaces_closed.load(Ordering::SeqCst)
    }

    /// HTML of every loaded document, in load order
    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }

    pub fn last_document(&self) -> Option<String> {
        self.documents.lock().unwrap().last().cloned()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.viewports.lock().unwrap().clone()
    }
}

pub struct FakeEngine {
    pub stats: Arc<EngineStats>,
    behavior: FakeBehavior,
}

impl FakeEngine {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            stats: Arc::new(EngineStats::default()),
            behavior,
        }
    }
}

#[async_trait]
impl Launcher for FakeEngine {
    async fn launch(&self) -> Result<Arc<dyn Renderer>, LaunchError> {
        let attempt = self.stats.launches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.behavior.launch_delay).await;

        if attempt < self.behavior.failing_launches {
            return Err(LaunchError::LaunchFailed(format!(
                "fake launch {attempt} failed"
            )));
        }

        Ok(Arc::new(FakeRenderer {
            stats: self.stats.clone(),
            behavior: self.behavior.clone(),
        }))
    }
}

struct FakeRenderer {
    stats: Arc<EngineStats>,
    behavior: FakeBehavior,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn open_surface(&self) -> Result<Box<dyn Surface>, RenderError> {
        self.stats.surfaces_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSurface {
            stats: self.stats.clone(),
            behavior: self.behavior.clone(),
        }))
    }
}

struct FakeSurface {
    stats: Arc<EngineStats>,
    behavior: FakeBehavior,
}

#[async_trait]
impl Surface for FakeSurface {
    async fn configure(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.stats.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        tokio::time::sleep(self.behavior.load_delay).await;
        if self.behavior.fail_load {
            return Err(RenderError::Load("net::ERR_FAILED".to_string()));
        }

        let path = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| RenderError::Load(format!("not a file URL: {url}")))?;
        let html = std::fs::read_to_string(&path)
            .map_err(|e| RenderError::Load(format!("{}: {e}", path.display())))?;
        self.stats.documents.lock().unwrap().push(html);
        Ok(())
    }

    async fn fonts_ready(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn capture_png(&mut self, viewport: Viewport) -> Result<Vec<u8>, RenderError> {
        if self.behavior.fail_capture {
            return Err(RenderError::Capture("fake capture failed".to_string()));
        }
        let scale = viewport.device_scale_factor;
        let width = (f64::from(viewport.width) * scale).round() as u32;
        let height = (f64::from(viewport.height) * scale).round() as u32;
        Ok(white_png(width.max(1), height.max(1)))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.stats.surfaces_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opaque white RGB image
pub fn white_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![255u8; (width * height * 3) as usize];
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    buf
}

/// Pixel dimensions of a PNG
pub fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    let decoder = png::Decoder::new(bytes);
    let reader = decoder.read_info().unwrap();
    let info = reader.info();
    (info.width, info.height)
}
