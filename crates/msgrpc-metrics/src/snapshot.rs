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

use rmpv::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn entry(key: &str, value: impl Into<Value>) -> (Value, Value) {
    (Value::from(key), value.into())
}

/// Server information returned by the `_info` built-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerInfo {
    pub server_type: String,
    pub version: String,
    pub uptime_ms: u64,
    /// Names currently bound in the function registry, sorted
    pub methods: Vec<String>,
}

impl ServerInfo {
    pub fn new(uptime_ms: u64, methods: Vec<String>) -> Self {
        Self {
            server_type: "msgrpc".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
            methods,
        }
    }

    /// Encodes the info as a MessagePack map keyed by field name.
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            entry("server_type", self.server_type.as_str()),
            entry("version", self.version.as_str()),
            entry("uptime_ms", self.uptime_ms),
            entry(
                "methods",
                Value::Array(self.methods.iter().map(|m| Value::from(m.as_str())).collect()),
            ),
        ])
    }
}

/// Metrics for a specific RPC method
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodMetrics {
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_us: u64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
}

impl MethodMetrics {
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            entry("call_count", self.call_count),
            entry("success_count", self.success_count),
            entry("failure_count", self.failure_count),
            entry("avg_latency_us", self.avg_latency_us),
            entry("p50_latency_us", self.p50_latency_us),
            entry("p95_latency_us", self.p95_latency_us),
            entry("p99_latency_us", self.p99_latency_us),
        ])
    }
}

/// Complete metrics snapshot returned by the `_metrics` built-in
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub active_connections: u64,
    pub uptime_ms: u64,
    pub methods: BTreeMap<String, MethodMetrics>,
}

impl MetricsSnapshot {
    pub fn new(uptime_ms: u64) -> Self {
        Self {
            uptime_ms,
            ..Self::default()
        }
    }

    /// Encodes the snapshot as a MessagePack map keyed by field name.
    pub fn to_value(&self) -> Value {
        let methods = self
            .methods
            .iter()
            .map(|(name, metrics)| (Value::from(name.as_str()), metrics.to_value()))
            .collect();

        Value::Map(vec![
            entry("total_requests", self.total_requests),
            entry("successful_requests", self.successful_requests),
            entry("failed_requests", self.failed_requests),
            entry("active_connections", self.active_connections),
            entry("uptime_ms", self.uptime_ms),
            entry("methods", Value::Map(methods)),
        ])
    }
}
