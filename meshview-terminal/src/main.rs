/// meshview - view STL and OBJ models in the terminal
///
/// Controls:
///   - WASD / Arrow Keys: Orbit around the model
///   - Shift + Arrow Keys: Pan
///   - +/-: Zoom
///   - M: Cycle display mode, C: Cycle color, F: Reframe
///   - Q/ESC: Quit
use anyhow::{Context, Result};
use clap::Parser;
use meshview_core::catalog::{HttpCatalog, ModelCatalog};
use meshview_core::session::ViewerContext;
use meshview_core::{Color, DisplayMode, HttpSource, ModelResource, SourceRouter, ViewerConfig};
use meshview_terminal::TerminalApp;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshview")]
#[command(about = "Terminal viewer for STL and OBJ models")]
struct Cli {
    /// File path or http(s) URL of the model
    #[arg(required_unless_present = "model_id")]
    resource: Option<String>,

    /// Format to assume when the resource has no usable extension (stl, obj)
    #[arg(long)]
    format: Option<String>,

    /// Initial display mode: normal, wireframe or x-ray
    #[arg(long)]
    mode: Option<DisplayMode>,

    /// Base color as #rrggbb
    #[arg(long)]
    color: Option<Color>,

    /// TOML file with viewer settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model catalog API root, e.g. http://localhost:8000/api
    #[arg(long, default_value = "http://localhost:8000/api")]
    api: String,

    /// Load a model by its catalog id instead of a path
    #[arg(long)]
    model_id: Option<String>,

    /// Write logs to this file (the terminal is busy rendering)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        init_logging(path)?;
    }

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.display_mode = mode;
    }
    if let Some(color) = cli.color {
        config.base_color = color;
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let client = reqwest::Client::new();

    let resource = match (&cli.model_id, &cli.resource) {
        (Some(id), _) => {
            let catalog = HttpCatalog::new(client.clone(), cli.api.clone());
            let record = runtime
                .block_on(catalog.fetch_model_record(id))
                .with_context(|| format!("failed to look up model {id}"))?;
            tracing::info!(id = record.id, name = %record.name, "resolved catalog model");
            record.resource()
        }
        (None, Some(locator)) => ModelResource::new(locator.clone()),
        (None, None) => anyhow::bail!("either a resource or --model-id is required"),
    };
    let resource = match &cli.format {
        Some(format) => resource.with_format_hint(format.clone()),
        None => resource,
    };

    let source = Arc::new(SourceRouter::new(HttpSource::new(client)));
    let context = ViewerContext::new(runtime.handle().clone(), source).with_config(config);

    let mut app = TerminalApp::open(resource, context)?;
    app.run()?;

    Ok(())
}
