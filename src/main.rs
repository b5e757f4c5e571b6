use std::net::SocketAddr;

use coinrush_backend::api;
use coinrush_backend::config::Config;
use coinrush_backend::engine::server::GameServer;
use coinrush_backend::metrics;

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load();
    metrics::register_metrics();

    let game_server = GameServer::spawn(config.game_settings());
    let app = api::router(game_server, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", config.port));

    tracing::info!(
        %addr,
        static_dir = %config.static_dir.display(),
        "Coinrush backend listening"
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
