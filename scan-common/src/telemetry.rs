// This file is part of canton-scan.
// Copyright (C) 2025 Canton Scan contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::info;
use logforth::{append::Stderr, filter::EnvFilter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "metrics", default)]
    pub metrics_config: MetricsConfig,
}

/// Metrics configuration. The Prometheus exporter is only installed if enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_address")]
    pub address: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_address(),
            port: default_port(),
        }
    }
}

/// Initialize logging to stderr, filtered via `RUST_LOG` with `info` as default. Stdout is
/// reserved for command output.
pub fn init_logging() {
    logforth::builder()
        .dispatch(|d| {
            d.filter(EnvFilter::from_default_env_or("info"))
                .append(Stderr::default())
        })
        .apply();
}

/// Initialize metrics, i.e. install a Prometheus exporter with an HTTP listener if enabled. Must
/// be called from within a Tokio runtime.
pub fn init_metrics(config: MetricsConfig) -> Result<(), BuildError> {
    let MetricsConfig {
        enabled,
        address,
        port,
    } = config;

    if enabled {
        let address = SocketAddr::new(address, port);
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()?;
        info!(address:%; "Prometheus exporter installed");
    }

    Ok(())
}

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    9000
}
