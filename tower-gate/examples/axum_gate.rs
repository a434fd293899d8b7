use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use clap::Parser;
use gate_limit::LimiterConfig;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_gate::GateLayer;
use tower_gate::ServiceBuilderExt;
use tower_gate::gate_middleware;
use tower_gate::handle_gate_error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// JSON limiter configuration (windowMs, maxRequests, whiteListedRoutes, blackListedRoutes)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identify clients by X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    behind_proxy: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    // 1. Load the limiter configuration
    let config = match &args.config {
        Some(path) => LimiterConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => LimiterConfig::default()
            .deny("/api/*")
            .allow("/api/health"),
    };

    // 2. One gate shared by everything below
    let gate = GateLayer::new(config)?.with_forwarded_for(args.behind_proxy);

    // 3. The middleware answers 429 itself; the tower layer needs HandleErrorLayer
    let app = Router::new()
        .route("/", get(|| async { "Hello, Gate!" }))
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/orders", get(|| async { "orders" }))
        .layer(from_fn_with_state(gate.clone(), gate_middleware))
        .nest(
            "/tower",
            Router::new()
                .route("/api/orders", get(|| async { "orders via tower layer" }))
                .layer(
                    ServiceBuilder::new()
                        .layer(HandleErrorLayer::new(handle_gate_error))
                        .rate_gate(gate)
                        .map_err(BoxError::from),
                ),
        );

    // 4. Serve with peer addresses available to the gate
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
