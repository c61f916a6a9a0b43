// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vtb_backend::QdrantHttpBackend;
use vtb_config::{
    BridgeConfig, ConfigOverrides, LogFormat, load_config, merge_overrides, validate_config,
};
use vtb_server::{AppState, build_app};

#[derive(Parser, Debug)]
#[command(
    name = "vtb-server",
    version,
    about = "MCP tool bridge for a Qdrant vector store"
)]
struct Args {
    /// TOML configuration file.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Qdrant base URL.
    #[arg(long)]
    url: Option<String>,

    /// Bind host.
    #[arg(long)]
    host: Option<String>,

    /// Bind port.
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<FormatArg>,

    /// Print the tool catalog as JSON and exit.
    #[arg(long)]
    list_tools: bool,

    /// Print the effective configuration (secrets redacted) and exit.
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging for the bridge.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for LogFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => LogFormat::Text,
            FormatArg::Json => LogFormat::Json,
        }
    }
}

fn resolve_config(args: &Args) -> Result<BridgeConfig> {
    let base = load_config(args.config.as_deref()).context("load configuration")?;
    let overrides = ConfigOverrides {
        backend_url: args.url.clone(),
        host: args.host.clone(),
        port: args.port,
        log_level: args
            .debug
            .then(|| "debug".to_string())
            .or_else(|| args.log_level.clone()),
        log_format: args.log_format.map(LogFormat::from),
    };
    Ok(merge_overrides(base, overrides))
}

fn init_tracing(config: &BridgeConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,vtb={level},vtb_server={level}")));
    match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "vtb.server", error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(target: "vtb.server", error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: "vtb.server", "shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let warnings = validate_config(&config).context("validate configuration")?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }
    if args.list_tools {
        let registry = vtb_tools::builtin_registry(&config).context("build tool catalog")?;
        let tools: Vec<_> = registry.definitions().map(|d| d.to_mcp()).collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    init_tracing(&config);
    for w in &warnings {
        warn!(target: "vtb.server", "{w}");
    }

    let backend = QdrantHttpBackend::new(&config.backend).context("build backend client")?;
    let bind = config.server.bind_addr();
    let backend_url = config.backend.url.clone();
    let state = AppState::with_backend(Arc::new(backend), config).context("build tool catalog")?;
    let tools = state.dispatcher.registry().len();
    let app = build_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(target: "vtb.server", bind = %bind, backend = %backend_url, tools, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}
