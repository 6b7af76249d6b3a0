//! `vhubd`: the Volunteer Hub server binary.
//!
//! Usage:
//!   vhubd -c <context-name-or-path> [--listen <addr>] [-- --kv=PATH --sqlite=PATH]
//!
//! The context name resolves to `/etc/vhub/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use vhub_core::Module;

use config::ServerConfig;
use routes::AppState;

/// Volunteer Hub server.
#[derive(Parser, Debug)]
#[command(name = "vhubd", about = "Volunteer Hub server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Storage path overrides, `--kv=PATH` and `--sqlite=PATH`.
    #[arg(last = true)]
    storage: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let mut core_config = vhub_core::ServiceConfig::from_args(&cli.storage);
    core_config.data_dir.get_or_insert(data_dir);
    core_config.listen = cli.listen.clone();

    let kv: Arc<dyn vhub_kv::KVStore> = Arc::new(
        vhub_kv::RedbStore::open(&core_config.resolve_kv_path())
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let sql: Arc<dyn vhub_sql::SQLStore> = Arc::new(
        vhub_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let market_module = market::MarketModule::new(
        Arc::clone(&sql),
        Arc::clone(&kv),
        server_config.market_config(),
    )?;
    info!("Market module initialized");

    let app_state = AppState {
        market: market_module.service().clone(),
        server_config: Arc::new(server_config),
    };
    let module_routes = vec![(market_module.name(), market_module.routes())];
    let app = routes::build_router(app_state, module_routes);

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("Volunteer Hub listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
