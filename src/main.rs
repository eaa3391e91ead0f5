use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagesnap::models::{AppConfig, RenderRequest};
use pagesnap::rendering::ChromeLauncher;
use pagesnap::server;
use pagesnap::services::FontIndex;

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(about = "Render positioned text and image layouts to PNG with headless Chrome")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Render a layout file directly to a PNG file
    Render {
        /// JSON layout file (same body as POST /api/generate)
        #[arg(short, long)]
        input: PathBuf,

        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => run_server().await,
        Some(Commands::Render { input, output }) => run_render_command(&input, &output).await,
        None => {
            run_status_command();
            Ok(())
        }
    }
}

/// Render one layout through the same pipeline the server uses
async fn run_render_command(input: &Path, output: &Path) -> anyhow::Result<()> {
    // Minimal logging for CLI
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesnap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = AppConfig::from_env();

    let body = std::fs::read_to_string(input)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", input.display()))?;
    let request: RenderRequest = serde_json::from_str(&body)
        .map_err(|e| anyhow::anyhow!("Invalid layout in {}: {e}", input.display()))?;

    let state = server::create_app_state(&config)?;
    let rendered = state
        .pipeline
        .render(&request)
        .await
        .map_err(|e| anyhow::anyhow!("Render error after {}ms: {e}", e.elapsed_ms))?;

    std::fs::write(output, &rendered.png)?;
    println!(
        "Rendered {} ({} bytes, {}ms)",
        output.display(),
        rendered.png.len(),
        rendered.elapsed_ms
    );

    Ok(())
}

/// Display status and configuration information
fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let config = AppConfig::from_env();
    let config_file = std::env::var("CONFIG_FILE").ok();
    let chrome_path = std::env::var("CHROME_PATH").ok();

    println!("Pagesnap v{VERSION}");
    println!("Layout to PNG rendering with headless Chrome\n");

    println!("Environment Variables:");
    println!(
        "  BIND_ADDR   = {}",
        std::env::var("BIND_ADDR")
            .ok()
            .unwrap_or_else(|| format!("{} (default)", config.bind_addr))
    );
    println!(
        "  CONFIG_FILE = {}",
        config_file.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  CHROME_PATH = {}",
        chrome_path.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  FONTS_DIR   = {}",
        std::env::var("FONTS_DIR").as_deref().unwrap_or("(not set)")
    );
    println!(
        "  CACHE_DIR   = {}",
        std::env::var("CACHE_DIR").as_deref().unwrap_or("(not set)")
    );

    println!("\nRenderer:");
    let launcher = ChromeLauncher::new(
        config.chrome_path.clone(),
        config.launch_timeout(),
        config.load_timeout(),
    );
    match launcher.resolve_binary() {
        Ok(path) => println!("  Browser: {}", path.display()),
        Err(e) => println!("  Browser: not found ({e})"),
    }

    println!("\nResources:");
    let fonts = FontIndex::scan(&config.fonts_dir);
    let fonts_count = fonts.len();
    println!(
        "  Fonts:   {} ({fonts_count} {})",
        config.fonts_dir.display(),
        if fonts_count == 1 { "font" } else { "fonts" }
    );
    println!("  Cache:   {}", config.cache_dir.display());
    println!("  Fallback cache: {}", config.fallback_cache_dir.display());

    println!("\nCommands:");
    println!("  pagesnap serve    Start the HTTP server");
    println!("  pagesnap render   Render a layout JSON file to PNG");
    println!("\nRun 'pagesnap --help' for more details.");
}

/// Run the HTTP server
async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesnap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        fonts = %config.fonts_dir.display(),
        cache = %config.cache_dir.display(),
        chrome = ?config.chrome_path.as_ref().map(|p| p.display().to_string()),
        "Configuration loaded"
    );

    // Browser launches lazily on the first render request
    let state = server::create_app_state(&config)?;
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Pagesnap server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
