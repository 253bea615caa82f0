use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uploads_host::{index, routes, watch, AppState, Config, FileIndex};

#[derive(Parser, Debug)]
#[command(name = "uploads-host")]
#[command(about = "Read-only HTTP host for per-user upload directories")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "UPLOADS_HOST_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Uploads root, laid out as <root>/<user_id>/<file_name>
    #[arg(short, long, env = "UPLOADS_DIR", default_value = "uploads")]
    root: PathBuf,

    /// Public base URL used in file links
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Rebuild the index when the uploads tree changes
    #[arg(short, long, env = "UPLOADS_HOST_WATCH")]
    watch: bool,

    /// Enable verbose logging
    #[arg(short, long, env = "UPLOADS_HOST_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "UPLOADS_HOST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "uploads_host=debug,tower_http=debug"
    } else {
        "uploads_host=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if cli.base_url.is_some() {
        config.base_url = cli.base_url.clone();
    }

    index::ensure_root(&cli.root)?;
    let root_dir = cli.root.canonicalize()?;

    info!("Serving uploads from: {}", root_dir.display());

    let file_index = FileIndex::build(&root_dir)?;
    let debounce = config.watch_debounce();
    let state = AppState::with_config(root_dir, file_index, config);

    if cli.watch {
        watch::spawn_reindexer(state.clone(), debounce)?;
    }

    let app = routes::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting uploads-host on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
