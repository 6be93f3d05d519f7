// ============================================================================
// Push Router
// ============================================================================
//
// Accepts push notifications from application servers and routes each one
// either straight to the node holding the device's connection or into
// durable storage for later retrieval.
//
// ============================================================================

pub mod config;
pub mod dead_nodes;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod notification;
pub mod receipt;
pub mod redis_backend;
pub mod registry;
pub mod response;
pub mod router;
pub mod routes;
pub mod storage;
pub mod strategy;
pub mod transport;
pub mod utils;

pub use error::{RoutingError, RoutingResult};
pub use notification::{CryptoHeaders, Notification};
pub use response::RouterResponse;
pub use router::{Router, RouterBackends, WebPushRouter};
pub use strategy::{DeliveryStrategy, WebPush};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
pub fn init_tracing(rust_log: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
