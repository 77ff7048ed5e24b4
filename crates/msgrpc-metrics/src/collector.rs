// Copyright 2025 msgrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::registry::{MetricsConfig, MetricsRegistry};
use crate::snapshot::{MetricsSnapshot, ServerInfo};
use msgrpc_common::{RemoteError, Value};
use std::sync::Arc;
use std::time::Instant;

/// Built-in method returning a [`MetricsSnapshot`].
pub const METRICS_METHOD: &str = "_metrics";

/// Built-in method returning a [`ServerInfo`].
pub const INFO_METHOD: &str = "_info";

/// Returns `true` if `method` names one of the built-in introspection methods.
pub fn is_builtin_method(method: &str) -> bool {
    method == METRICS_METHOD || method == INFO_METHOD
}

/// Trait for metrics collection in msgrpc servers.
///
/// Implementations answer the built-in introspection methods (`_metrics` and
/// `_info`) and track per-method call statistics.
///
/// # Built-in Methods
///
/// The dispatcher intercepts these before looking at the function registry:
///
/// - `_metrics`: a complete [`MetricsSnapshot`] as a MessagePack map
/// - `_info`: a [`ServerInfo`] map with version, uptime and bound methods
///
/// # Example
///
/// ```rust
/// use msgrpc_metrics::{MetricsCollector, ServerMetricsCollector};
/// use std::time::Instant;
///
/// let collector = ServerMetricsCollector::new();
///
/// if collector.is_builtin(msgrpc_metrics::INFO_METHOD) {
///     let info = collector.handle_builtin("_info", &["add".to_string()]).unwrap();
///     assert!(info.is_map());
/// }
///
/// let start = Instant::now();
/// // ... execute method ...
/// collector.record_call("add", start, true);
/// ```
pub trait MetricsCollector: Send + Sync {
    /// Checks if a method name is a built-in introspection method.
    fn is_builtin(&self, method: &str) -> bool {
        is_builtin_method(method)
    }

    /// Produces the result value for a built-in method.
    ///
    /// `methods` is the list of names currently bound on the server; it is
    /// reported by `_info`. Unknown names yield a `MethodNotFound` error.
    fn handle_builtin(&self, method: &str, methods: &[String]) -> Result<Value, RemoteError>;

    /// Records a completed call to a bound method.
    ///
    /// # Arguments
    /// * `method` - The name of the method that was called
    /// * `start_time` - When the call began, used for the latency sample
    /// * `success` - `false` if the call produced an error response
    fn record_call(&self, method: &str, start_time: Instant, success: bool);

    /// Records a call to a name that is not bound.
    fn record_unknown_method(&self, method: &str);

    /// Called when a connection is accepted.
    fn connection_opened(&self);

    /// Called when a connection is closed.
    fn connection_closed(&self);

    /// Takes a snapshot of the current metrics state.
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Default metrics collector, backed by a [`MetricsRegistry`].
///
/// # Example
///
/// ```rust
/// use msgrpc_metrics::{MetricsCollector, ServerMetricsCollector};
/// use std::time::Instant;
///
/// let collector = ServerMetricsCollector::new();
///
/// let start = Instant::now();
/// collector.record_call("add", start, true);
/// collector.record_call("add", start, false);
///
/// let snapshot = collector.snapshot();
/// assert_eq!(snapshot.total_requests, 2);
/// assert_eq!(snapshot.methods["add"].failure_count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct ServerMetricsCollector {
    registry: Arc<MetricsRegistry>,
}

impl ServerMetricsCollector {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::with_config(config)),
        }
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }
}

impl Default for ServerMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for ServerMetricsCollector {
    fn handle_builtin(&self, method: &str, methods: &[String]) -> Result<Value, RemoteError> {
        match method {
            METRICS_METHOD => Ok(self.snapshot().to_value()),
            INFO_METHOD => {
                Ok(ServerInfo::new(self.registry.uptime_ms(), methods.to_vec()).to_value())
            }
            _ => Err(RemoteError::method_not_found(method)),
        }
    }

    fn record_call(&self, method: &str, start_time: Instant, success: bool) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_method_call(method, latency_us, success);
    }

    fn record_unknown_method(&self, method: &str) {
        tracing::trace!("Counting call to unknown method '{}'", method);
        self.registry.record_unattributed_failure();
    }

    fn connection_opened(&self) {
        self.registry.increment_active_connections();
    }

    fn connection_closed(&self) {
        self.registry.decrement_active_connections();
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }
}
