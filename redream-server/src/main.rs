use std::sync::Arc;

use clap::Parser;
use redream_core::config::StoreBackend;
use redream_core::RedreamConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use redream_server::{bootstrap, http, server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "redream.toml")]
    config: String,

    /// Check the database connection and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match bootstrap::load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over service.log_level
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    if args.health {
        run_health_check(&config).await;
        return Ok(());
    }

    let store = match bootstrap::build_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open record store: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match bootstrap::build_pipeline(&config, store) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Failed to initialize pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.http.enabled {
        let http_pipeline = Arc::clone(&pipeline);
        let http_config = config.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                http::start_http_server(http_pipeline, &http_config, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, pipeline, tx.subscribe()).await?;

    Ok(())
}

async fn run_health_check(config: &RedreamConfig) {
    if config.store.backend == StoreBackend::Memory {
        println!("✅ In-memory record store configured; no database to check");
        return;
    }

    let pool = match redream_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            println!("❌ PostgreSQL connection failed: {}", e);
            std::process::exit(1);
        }
    };

    match redream_core::db::health_check(&pool).await {
        Ok(v) => println!("✅ PostgreSQL connected: {}", v),
        Err(e) => {
            println!("❌ PostgreSQL health check failed: {}", e);
            std::process::exit(1);
        }
    }

    println!("✅ RE:DREAM DB health check passed");
}
