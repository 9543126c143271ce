use clap::Parser;
use lke_bridge::{build_router, AppState, BridgeConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "lke-bridge",
    about = "OpenAI-compatible bridge for Tencent Cloud LKE bot SSE streams",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = "lke-bridge.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lke_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        println!("  1. lke-bridge.toml (current directory)");
        if cfg!(target_os = "macos") {
            println!("  2. ~/Library/Application Support/lke-bridge/config.toml");
        } else {
            println!("  2. $XDG_CONFIG_HOME/lke-bridge/config.toml");
            println!("     ~/.config/lke-bridge/config.toml");
        }
        println!("  3. ~/.lke-bridge.toml");
        return Ok(());
    }

    let mut config = BridgeConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    info!("lke-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", config.upstream.url);
    info!("  Timeout:   {}s", config.upstream.timeout_secs);
    info!("  Port:      {}", config.port);
    info!("  Models:    {} mapped", config.models.len());
    info!("  API keys:  {} allowed", config.api_keys.len());
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting lke-bridge upstream={} port={}",
            config.upstream.url, config.port
        ),
    );

    // A total-request timeout would cut long SSE streams short, so only the
    // connect and per-read waits are bounded.
    let client = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .read_timeout(std::time::Duration::from_secs(config.upstream.timeout_secs))
        .build()?;

    let state = Arc::new(AppState {
        config: config.clone(),
        client,
        logger: logger.clone(),
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
