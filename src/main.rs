// ============================================================================
// Push Router Service
// ============================================================================
//
// Endpoints:
// - PUT|POST /wpush/:uaid/:channel_id - Submit a notification
// - POST /receipts/:uaid/:channel_id - Issue a receipt endpoint
// - DELETE /m/:message_id - Drop a stored message
// - GET /health
// - GET /metrics
//
// Backends:
// - Redis: subscriptions, node directory, message storage
// - HTTP: delivery to connection nodes
//
// ============================================================================

use anyhow::{Context, Result};
use push_router::config::Config;
use push_router::dead_nodes::DeadNodeCache;
use push_router::receipt::HmacReceiptCodec;
use push_router::redis_backend::RedisBackend;
use push_router::routes::{create_router, PushContext};
use push_router::transport::HttpNodeTransport;
use push_router::{RouterBackends, WebPushRouter};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    push_router::init_tracing(&config.rust_log);

    info!("=== Push Router Starting ===");
    info!("Port: {}", config.port);
    info!("Endpoint URL: {}", config.endpoint_url);

    // Initialize Redis
    info!("Connecting to Redis...");
    let redis = Arc::new(
        RedisBackend::connect(&config.redis_url, config.redis_key_prefix.clone())
            .await
            .context("Failed to connect to Redis")?,
    );
    info!("Connected to Redis");

    let transport = Arc::new(
        HttpNodeTransport::new(config.node_timeout())
            .context("Failed to initialize node transport")?,
    );

    let backends = RouterBackends {
        receipts: Arc::new(HmacReceiptCodec::new(
            config.receipts_url.clone(),
            config.receipt_secret_key.clone(),
        )),
        registry: redis.clone(),
        nodes: redis.clone(),
        transport,
        store: redis,
    };

    let router = WebPushRouter::web_push(backends)
        .with_dead_nodes(Arc::new(DeadNodeCache::new(config.dead_node_cache_size)))
        .with_log_salt(config.logging.hash_salt.clone());

    let context = Arc::new(PushContext {
        router,
        endpoint_url: config.endpoint_url.clone(),
        max_data_bytes: config.max_data_bytes,
    });

    let app = create_router(context);

    // Start server
    let addr: SocketAddr = format!("[::]:{}", config.port)
        .parse()
        .context("Failed to parse bind address")?;

    info!("Push Router listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    info!("Push Router stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
