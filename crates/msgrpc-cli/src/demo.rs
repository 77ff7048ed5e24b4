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

//! Demo functions bound by `msgrpc serve`.

use msgrpc_server::Server;
use std::collections::BTreeMap;
use std::time::Duration;

/// Simulated work time of `heavy_computation`.
pub const HEAVY_COMPUTATION_DELAY: Duration = Duration::from_secs(2);

pub fn foo() -> String {
    tracing::info!("foo was called!");
    "foo executed successfully".to_string()
}

pub fn greet(name: String) -> String {
    format!("Hello, {}!", name)
}

pub fn get_info() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("server".to_string(), "msgrpc demo server".to_string()),
        ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ("status".to_string(), "running".to_string()),
    ])
}

/// Sum of `i * i` for `i` in `0..n`, saturating at `u64::MAX`.
pub fn sum_of_squares(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    // n(n-1)(2n-1)/6; the first product always fits in u128
    let n = u128::from(n);
    (n * (n - 1))
        .checked_mul(2 * n - 1)
        .map(|product| product / 6)
        .and_then(|sum| u64::try_from(sum).ok())
        .unwrap_or(u64::MAX)
}

/// Binds every demo function on `server`.
pub fn bind_demo_methods(server: &Server) {
    server.bind("foo", foo);
    server.bind("add", |a: i64, b: i64| a.wrapping_add(b));
    server.bind("multiply", |x: i64, y: i64| x.wrapping_mul(y));
    server.bind("greet", greet);
    server.bind("get_info", get_info);
    server.bind("ping", || "pong");
    server.bind("heavy_computation", |n: u64| {
        tracing::info!("Starting heavy computation with n={}", n);
        std::thread::sleep(HEAVY_COMPUTATION_DELAY);
        let result = sum_of_squares(n);
        tracing::info!("Heavy computation completed: {}", result);
        result
    });
}
