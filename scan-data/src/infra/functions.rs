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

use crate::domain::{BackendFunctions, PurgeSummary, SvRewardsRequest, SvRewardsSummary};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,
    pub api_key: SecretString,

    #[serde(with = "humantime_serde", default = "timeout_default")]
    pub timeout: Duration,
}

/// [BackendFunctions] implementation invoking the backend's serverless functions over HTTP,
/// authenticated with a bearer API key.
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl FunctionsClient {
    pub fn new(config: Config) -> Result<Self, FunctionsError> {
        let Config {
            url,
            api_key,
            timeout,
        } = config;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FunctionsError::Client)?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    async fn invoke<T>(
        &self,
        function: &'static str,
        body: &(impl Serialize + ?Sized),
    ) -> Result<T, FunctionsError>
    where
        T: DeserializeOwned,
    {
        debug!(function; "invoking backend function");

        let response = self
            .client
            .post(format!("{}/{function}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|source| FunctionsError::Request { function, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FunctionsError::Request { function, source })?;

        if !status.is_success() {
            warn!(function, status:%; "backend function failed");
            return Err(FunctionsError::Status {
                function,
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| FunctionsError::Decode { function, source })
    }
}

impl BackendFunctions for FunctionsClient {
    type Error = FunctionsError;

    async fn purge_acs_storage(&self) -> Result<PurgeSummary, Self::Error> {
        self.invoke("purge-acs-storage", &json!({ "purge_all": true }))
            .await
    }

    async fn sv_rewards_summary(
        &self,
        request: SvRewardsRequest,
    ) -> Result<SvRewardsSummary, Self::Error> {
        self.invoke("sv-rewards-summary", &request).await
    }
}

#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot invoke {function}")]
    Request {
        function: &'static str,
        source: reqwest::Error,
    },

    #[error("{function} responded with status {status}: {body}")]
    Status {
        function: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("cannot decode response of {function}")]
    Decode {
        function: &'static str,
        source: serde_json::Error,
    },
}

fn timeout_default() -> Duration {
    Duration::from_secs(60)
}
