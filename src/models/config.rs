use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from an optional YAML file.
///
/// Every field has a default; environment variables override the file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory scanned once at startup for font files
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,

    /// Preferred image cache directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache directory used when `cache_dir` is not writable
    #[serde(default = "default_fallback_cache_dir")]
    pub fallback_cache_dir: PathBuf,

    /// Explicit browser binary, skips the platform search
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,

    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Fixed delay between document load and capture
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound on waiting for `document.fonts.ready`
    #[serde(default = "default_fonts_ready_timeout_ms")]
    pub fonts_ready_timeout_ms: u64,

    #[serde(default = "default_device_scale_factor")]
    pub device_scale_factor: f64,

    /// Timeout for downloading a single image asset
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5174".to_string()
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("./fonts")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.image-cache")
}

fn default_fallback_cache_dir() -> PathBuf {
    std::env::temp_dir().join("pagesnap-image-cache")
}

fn default_launch_timeout_secs() -> u64 {
    60
}

fn default_load_timeout_secs() -> u64 {
    60
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_fonts_ready_timeout_ms() -> u64 {
    3000
}

fn default_device_scale_factor() -> f64 {
    2.0
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fonts_dir: default_fonts_dir(),
            cache_dir: default_cache_dir(),
            fallback_cache_dir: default_fallback_cache_dir(),
            chrome_path: None,
            launch_timeout_secs: default_launch_timeout_secs(),
            load_timeout_secs: default_load_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            fonts_ready_timeout_ms: default_fonts_ready_timeout_ms(),
            device_scale_factor: default_device_scale_factor(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults.
    ///
    /// A missing or unparsable file is logged and replaced by defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    tracing::warn!(%e, path = %path.display(), "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `CONFIG_FILE` (if set) and apply environment overrides.
    pub fn from_env() -> Self {
        let config_file = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
        let mut config = Self::load(config_file.as_deref());
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup (`BIND_ADDR`, `FONTS_DIR`,
    /// `CACHE_DIR`, `CHROME_PATH`). Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = get("FONTS_DIR") {
            self.fonts_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn fonts_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.fonts_ready_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
