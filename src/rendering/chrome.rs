//! Headless Chrome backend driven over the DevTools protocol.
//!
//! `headless_chrome` is a blocking client, so every call runs on the Tokio
//! blocking pool. Launch and navigation are additionally capped with
//! `tokio::time::timeout`; a timeout reports failure but does not abort the
//! work already handed to the browser.

use async_trait::async_trait;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use serde_json::json;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::engine::{Launcher, Renderer, Surface, Viewport};
use crate::error::{LaunchError, RenderError};

/// Flags for running inside containers and loading cached local files
const CHROME_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-default-apps",
    "--disable-sync",
    "--metrics-recording-only",
    "--mute-audio",
    "--no-first-run",
    "--safebrowsing-disable-auto-update",
    "--disable-translate",
    "--disable-software-rasterizer",
    "--disable-web-security",
    "--allow-file-access-from-files",
];

// The driver closes a browser that sends no events for this long; the
// shared instance must outlive quiet periods between requests.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Well-known browser install locations for this platform, in search order
pub fn candidate_paths(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(target_os = "windows") {
        for var in ["LOCALAPPDATA", "PROGRAMFILES", "PROGRAMFILES(X86)"] {
            if let Some(base) = env(var) {
                paths.push(
                    PathBuf::from(base)
                        .join("Google")
                        .join("Chrome")
                        .join("Application")
                        .join("chrome.exe"),
                );
            }
        }
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
        paths.push(PathBuf::from(
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ));
    } else {
        for p in [
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome-beta",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ] {
            paths.push(PathBuf::from(p));
        }
    }

    paths
}

/// Pick the browser binary: explicit override, then platform search.
///
/// Returns `None` when neither yields an existing file; the caller then
/// asks the driver library for its own default.
pub fn find_browser_binary(
    override_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "Configured browser path does not exist, searching");
    }

    candidate_paths(env).into_iter().find(|p| p.is_file())
}

/// Launches a headless Chrome process
pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
    launch_timeout: Duration,
    /// Driver-side wait limit for navigation and evaluation in each tab
    tab_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(
        chrome_path: Option<PathBuf>,
        launch_timeout: Duration,
        tab_timeout: Duration,
    ) -> Self {
        Self {
            chrome_path,
            launch_timeout,
            tab_timeout,
        }
    }

    /// Binary that would be launched, or why none was found
    pub fn resolve_binary(&self) -> Result<PathBuf, LaunchError> {
        if let Some(path) = find_browser_binary(self.chrome_path.as_deref(), |k| {
            std::env::var(k).ok()
        }) {
            tracing::info!(path = %path.display(), "Found browser");
            return Ok(path);
        }

        tracing::warn!("No browser found in system paths, trying driver default");
        headless_chrome::browser::default_executable().map_err(LaunchError::BinaryNotFound)
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Renderer>, LaunchError> {
        let binary = self.resolve_binary().inspect_err(|e| {
            tracing::error!(
                error = %e,
                "No browser binary. Install chromium or google-chrome, or set CHROME_PATH"
            );
        })?;

        tracing::info!(
            executable = %binary.display(),
            timeout_secs = self.launch_timeout.as_secs(),
            platform = std::env::consts::OS,
            "Launching browser"
        );

        let launch = tokio::task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .path(Some(binary))
                .args(CHROME_ARGS.iter().map(OsStr::new).collect())
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .build()
                .map_err(|e| LaunchError::LaunchFailed(format!("invalid launch options: {e}")))?;

            Browser::new(options).map_err(|e| LaunchError::LaunchFailed(format!("{e:#}")))
        });

        let browser = match tokio::time::timeout(self.launch_timeout, launch).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LaunchError::LaunchFailed(format!(
                "launch task failed: {join_err}"
            ))),
            Err(_) => Err(LaunchError::Timeout(self.launch_timeout.as_secs())),
        }
        .inspect_err(|e| tracing::error!(error = %e, "Failed to launch browser"))?;

        tracing::info!("Browser launched");
        Ok(Arc::new(ChromeRenderer {
            browser: Arc::new(browser),
            tab_timeout: self.tab_timeout,
        }))
    }
}

/// A running Chrome instance
pub struct ChromeRenderer {
    browser: Arc<Browser>,
    tab_timeout: Duration,
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open_surface(&self) -> Result<Box<dyn Surface>, RenderError> {
        let browser = self.browser.clone();
        let timeout = self.tab_timeout;
        let tab = blocking(move || {
            let tab = browser.new_tab()?;
            tab.set_default_timeout(timeout);
            Ok(tab)
        })
        .await
        .map_err(RenderError::Surface)?;
        Ok(Box::new(ChromeSurface { tab }))
    }
}

/// One browser tab
pub struct ChromeSurface {
    tab: Arc<Tab>,
}

#[async_trait]
impl Surface for ChromeSurface {
    async fn configure(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        let tab = self.tab.clone();
        let metrics = device_metrics(viewport)
            .map_err(|e| RenderError::Surface(format!("invalid device metrics: {e}")))?;
        blocking(move || {
            tab.call_method(Page::SetBypassCSP { enabled: true })?;
            tab.call_method(metrics)?;
            Ok(())
        })
        .await
        .map_err(RenderError::Surface)
    }

    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        let tab = self.tab.clone();
        let url = url.to_string();
        blocking(move || {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(RenderError::Load)
    }

    async fn fonts_ready(&mut self) -> Result<(), RenderError> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.evaluate("document.fonts.ready.then(() => true)", true)?;
            Ok(())
        })
        .await
        .map_err(RenderError::Load)
    }

    async fn capture_png(&mut self, viewport: Viewport) -> Result<Vec<u8>, RenderError> {
        let tab = self.tab.clone();
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(viewport.width),
            height: f64::from(viewport.height),
            // Device pixels come from the emulated metrics
            scale: 1.0,
        };
        blocking(move || {
            tab.capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
        })
        .await
        .map_err(RenderError::Capture)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let tab = self.tab;
        blocking(move || tab.close(true).map(|_| ()))
            .await
            .map_err(RenderError::Surface)
    }
}

/// Per-tab viewport override in CSS pixels at the requested pixel density.
///
/// Built from JSON so optional protocol fields stay at their defaults.
fn device_metrics(
    viewport: Viewport,
) -> Result<Emulation::SetDeviceMetricsOverride, serde_json::Error> {
    serde_json::from_value(json!({
        "width": viewport.width,
        "height": viewport.height,
        "deviceScaleFactor": viewport.device_scale_factor,
        "mobile": false,
    }))
}

/// Run a blocking driver call off the async runtime, flattening errors to text
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(join_err) => Err(format!("driver task failed: {join_err}")),
    }
}
