//! Flood prediction API service.
//!
//! HTTP server exposing the bounding-box to flood-risk-image pipeline,
//! with startup loading of the model checkpoint and terrain dataset.

mod config;
mod handlers;
mod state;

use anyhow::Result;
use axum::{
    extract::Extension,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "predict-api")]
#[command(about = "Flood prediction API server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build tokio runtime with configurable worker threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        info!("Configuring tokio runtime with {} worker threads", threads);
        runtime_builder.worker_threads(threads);
    } else if let Ok(threads_str) = env::var("TOKIO_WORKER_THREADS") {
        if let Ok(threads) = threads_str.parse::<usize>() {
            info!("Configuring tokio runtime with {} worker threads (from env)", threads);
            runtime_builder.worker_threads(threads);
        }
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting flood prediction API server");

    // Load model, terrain, and weather client before serving.
    let settings = Settings::from_env();
    let state = Arc::new(AppState::new(&settings)?);
    info!("Startup complete, model loaded and ready");

    // Map clients read prediction metadata from these headers.
    let exposed_headers: Vec<HeaderName> = [
        "x-bounds-minlon",
        "x-bounds-minlat",
        "x-bounds-maxlon",
        "x-bounds-maxlat",
        "x-weather-minprecip",
        "x-weather-maxprecip",
        "x-weather-avgprecip",
        "x-weather-source",
        "x-estimator",
    ]
    .into_iter()
    .map(HeaderName::from_static)
    .collect();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(exposed_headers);

    // Build router
    let app = Router::new()
        .route("/api/v1/predict", post(handlers::predict_handler))
        .route("/health", get(handlers::health_handler))
        .route("/", get(handlers::root_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors);

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
