//! msgrpc Metrics Collection
//!
//! Thread-safe call accounting for msgrpc servers: request counters, active
//! connection tracking and per-method latency percentiles.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: lock-free counters plus a method table behind an `RwLock`
//! - [`MetricsCollector`]: trait the server dispatcher talks to
//! - [`MetricsSnapshot`] / [`ServerInfo`]: point-in-time views, encodable as MessagePack maps
//!
//! # Usage Example
//!
//! ```rust
//! use msgrpc_metrics::{MetricsCollector, ServerMetricsCollector};
//! use std::time::Instant;
//!
//! let collector = ServerMetricsCollector::new();
//!
//! let start = Instant::now();
//! // ... execute RPC call ...
//! collector.record_call("add", start, true);
//!
//! let snapshot = collector.snapshot();
//! println!("Total requests: {}", snapshot.total_requests);
//! ```
//!
//! # Built-in Introspection Methods
//!
//! Servers answer two reserved method names without consulting their
//! function registry:
//!
//! - **`_metrics`**: the complete [`MetricsSnapshot`]
//! - **`_info`**: [`ServerInfo`] with version, uptime and the bound method names

mod collector;
mod registry;
mod snapshot;

pub use collector::{
    is_builtin_method, MetricsCollector, ServerMetricsCollector, INFO_METHOD, METRICS_METHOD,
};
pub use registry::{MetricsConfig, MetricsRegistry};
pub use snapshot::{MethodMetrics, MetricsSnapshot, ServerInfo};
