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

use scan_data::{application, infra};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run_migrations: bool,

    #[serde(rename = "application", default)]
    pub application_config: application::Config,

    #[serde(rename = "infra")]
    pub infra_config: infra::Config,

    #[serde(rename = "telemetry", default)]
    pub telemetry_config: scan_common::telemetry::Config,
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use figment::{
        Figment,
        providers::{Format, Yaml},
    };
    use scan_common::config::ConfigExt;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let figment = Figment::new().merge(Yaml::string(include_str!("../config.yaml")));
        let config = Config::load_from(figment).expect("default config can be loaded");

        assert!(config.run_migrations);
        assert_eq!(config.infra_config.storage_config.port, 5432);
        assert_eq!(config.infra_config.scan_api_config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.application_config.query_cache_config.stale_time,
            Duration::from_secs(30)
        );
        assert_eq!(config.application_config.round_range_config.chunk_size, 100);
        assert!(!config.telemetry_config.metrics_config.enabled);
    }
}
