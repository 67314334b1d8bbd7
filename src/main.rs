use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use pilgrim_map::bridge::BridgeProps;
use pilgrim_map::config::MapSettings;
use pilgrim_map::document::{DocumentInputs, GeneratorOptions, generate_document};
use pilgrim_map::host::sizing::{Viewport, container_size};
use pilgrim_map::location::LocationState;
use pilgrim_map::poi::PoiCatalog;
use pilgrim_map::server::{PREVIEW_VIEWPORT, PreviewOptions, run_preview_server};
use pilgrim_map::toggles::ToggleState;

const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Parser)]
#[command(name = "pilgrim_map", about = "Pilgrimage map document generator and preview host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate one map document.
    Render(RenderArgs),
    /// Serve a live preview of the mounted map.
    Serve(ServeArgs),
    /// Print the point-of-interest catalog as JSON.
    Pois,
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Trip origin. No route is requested without one.
    #[arg(long)]
    start: Option<String>,
    /// Trip destination. Defaults to MAP_DEFAULT_DESTINATION.
    #[arg(long)]
    end: Option<String>,
    /// Show the heatmap layer (the default).
    #[arg(long, overrides_with = "no_heatmap")]
    heatmap: bool,
    #[arg(long, overrides_with = "heatmap")]
    no_heatmap: bool,
    /// Show the live-conditions layer.
    #[arg(long)]
    traffic: bool,
    /// Explicit container height in pixels; clamped.
    #[arg(long)]
    height: Option<u32>,
    #[arg(long, default_value_t = PREVIEW_VIEWPORT.width)]
    viewport_width: u32,
    #[arg(long, default_value_t = PREVIEW_VIEWPORT.height)]
    viewport_height: u32,
    /// Write the document here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    height: Option<u32>,
    /// Leave the host toggle buttons out of the preview page.
    #[arg(long)]
    hide_toggles: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so the log settings below can come from it too.
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    let settings = MapSettings::from_env().context("failed to load configuration")?;
    if settings.api_key.is_none() {
        warn!("MAPS_API_KEY is not set; generated documents load the map script without a key");
    }

    match cli.command {
        Commands::Render(args) => render(&settings, args)?,
        Commands::Serve(args) => {
            let options = PreviewOptions {
                props: BridgeProps {
                    height: args.height,
                    show_toggle_controls: !args.hide_toggles,
                    ..BridgeProps::default()
                },
                start: args.start,
                ..PreviewOptions::default()
            };
            run_preview_server(&settings, options, &args.bind).await?;
        }
        Commands::Pois => print_pois(&settings)?,
    }

    Ok(())
}

fn render(settings: &MapSettings, args: RenderArgs) -> Result<()> {
    let location = LocationState {
        start: args.start,
        end: args
            .end
            .unwrap_or_else(|| settings.default_destination.clone()),
    };
    let toggles = ToggleState::new(args.heatmap || !args.no_heatmap, args.traffic);
    let size = container_size(
        Viewport::new(args.viewport_width, args.viewport_height),
        args.height,
    );

    let document = generate_document(
        &DocumentInputs {
            toggles,
            location: &location,
            size,
        },
        &GeneratorOptions::from_settings(settings),
    );
    info!(
        document_id = %document.id(),
        width = size.width,
        height = size.height,
        points = document.points().len(),
        route_requested = document.route().is_some(),
        "map document generated"
    );

    match args.out {
        Some(path) => std::fs::write(&path, document.html())
            .with_context(|| format!("failed to write document to `{}`", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.html().as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write document to stdout")?;
        }
    }
    Ok(())
}

fn print_pois(settings: &MapSettings) -> Result<()> {
    let catalog = PoiCatalog::load_or_default(settings.poi_file.as_deref())
        .context("failed to load point-of-interest catalog")?;
    let json = serde_json::to_string_pretty(catalog.points())
        .context("failed to serialize point-of-interest catalog")?;
    println!("{json}");
    Ok(())
}

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pilgrim_map=debug"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    let (file_layer, guard) = match std::env::var_os("PILGRIM_LOG_DIR") {
        Some(log_dir) => {
            let level = std::env::var("PILGRIM_FILE_LOG").unwrap_or_else(|_| "info".to_owned());
            let file_filter = EnvFilter::try_new(&level)
                .with_context(|| format!("invalid PILGRIM_FILE_LOG filter `{level}`"))?;
            let appender = tracing_appender::rolling::daily(log_dir, "pilgrim_map.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(guard)
}
