use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter, Encoder, IntCounter, TextEncoder};

/// Delivered directly to a live node
pub static BROADCAST_HIT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "push_router_broadcast_hit_total",
        "Notifications delivered directly to a live node"
    ))
    .unwrap()
});

/// Stored with no node picking it up
pub static BROADCAST_MISS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "push_router_broadcast_miss_total",
        "Notifications stored for later retrieval"
    ))
    .unwrap()
});

/// Stored, then a node acknowledged the check request
pub static BROADCAST_SAVE_HIT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "push_router_broadcast_save_hit_total",
        "Stored notifications picked up by a node after storage"
    ))
    .unwrap()
});

pub static CLIENT_HOST_GONE_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "push_router_client_host_gone_total",
        "Delivery attempts to nodes that could not be reached"
    ))
    .unwrap()
});

pub static ROUTING_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "push_router_routing_errors_total",
        "Routing calls that ended in a failure"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
