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

//! Scan API client on top of reqwest.

use crate::domain::{
    Amount, AnsEntry, DsoInfo, LatestRound, PartyRewards, RoundPartyTotals, RoundRange,
    RoundTotals, ScanApi, TransactionPage, ValidatorLiveness,
};
use log::debug;
use metrics::counter;
use reqwest::{Client, RequestBuilder, StatusCode};
use scan_common::domain::RoundNumber;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("scanton/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    #[serde(with = "humantime_serde", default = "timeout_default")]
    pub timeout: Duration,
}

/// [ScanApi] implementation talking to a Scan API over HTTP.
#[derive(Debug, Clone)]
pub struct ReqwestScanApi {
    client: Client,
    base_url: String,
}

impl ReqwestScanApi {
    pub fn new(config: Config) -> Result<Self, ScanApiError> {
        let Config { url, timeout } = config;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(ScanApiError::Client)?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
        })
    }

    async fn get<T>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, ScanApiError>
    where
        T: DeserializeOwned,
    {
        let request = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .query(query);
        self.send(endpoint, request).await
    }

    async fn post<T>(
        &self,
        endpoint: &'static str,
        body: &(impl Serialize + ?Sized),
    ) -> Result<T, ScanApiError>
    where
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(format!("{}{endpoint}", self.base_url))
            .json(body);
        self.send(endpoint, request).await
    }

    async fn send<T>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ScanApiError>
    where
        T: DeserializeOwned,
    {
        debug!(endpoint; "requesting Scan API");
        counter!("scan_api_requests_total", "endpoint" => endpoint).increment(1);

        let response = request
            .send()
            .await
            .map_err(|source| ScanApiError::Request { endpoint, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ScanApiError::Request { endpoint, source })?;

        if !status.is_success() {
            return Err(ScanApiError::Status {
                endpoint,
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ScanApiError::Decode { endpoint, source })
    }
}

impl ScanApi for ReqwestScanApi {
    type Error = ScanApiError;

    async fn latest_round(&self) -> Result<LatestRound, Self::Error> {
        self.get("/v0/round-of-latest-data", &[]).await
    }

    async fn total_balance(&self, as_of_end_of_round: RoundNumber) -> Result<Amount, Self::Error> {
        let response = self
            .get::<TotalBalanceResponse>(
                "/v0/total-amulet-balance",
                &[("asOfEndOfRound", as_of_end_of_round.to_string())],
            )
            .await?;
        Ok(response.total_balance)
    }

    async fn top_validators(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error> {
        let response = self
            .get::<TopValidatorsResponse>(
                "/v0/top-validators-by-validator-rewards",
                &[("round", round.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.validators_and_rewards)
    }

    async fn top_providers(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error> {
        let response = self
            .get::<TopProvidersResponse>(
                "/v0/top-providers-by-app-rewards",
                &[("round", round.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.providers_and_rewards)
    }

    async fn transactions(&self, page: TransactionPage) -> Result<Vec<Value>, Self::Error> {
        let response = self
            .post::<TransactionsResponse>("/v0/transactions", &page)
            .await?;
        Ok(response.transactions)
    }

    async fn round_totals(&self, range: RoundRange) -> Result<Vec<RoundTotals>, Self::Error> {
        let response = self
            .post::<EntriesResponse<RoundTotals>>("/v0/round-totals", &range)
            .await?;
        Ok(response.entries)
    }

    async fn round_party_totals(
        &self,
        range: RoundRange,
    ) -> Result<Vec<RoundPartyTotals>, Self::Error> {
        let response = self
            .post::<EntriesResponse<RoundPartyTotals>>("/v0/round-party-totals", &range)
            .await?;
        Ok(response.entries)
    }

    async fn dso(&self) -> Result<DsoInfo, Self::Error> {
        self.get("/v0/dso", &[]).await
    }

    async fn vote_requests(&self) -> Result<Vec<Value>, Self::Error> {
        let response = self
            .get::<VoteRequestsResponse>("/v0/admin/sv/voterequests", &[])
            .await?;
        Ok(response.dso_rules_vote_requests)
    }

    async fn ans_entries(
        &self,
        page_size: u32,
        name_prefix: Option<String>,
    ) -> Result<Vec<AnsEntry>, Self::Error> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(name_prefix) = name_prefix {
            query.push(("name_prefix", name_prefix));
        }

        let response = self
            .get::<EntriesResponse<AnsEntry>>("/v0/ans-entries", &query)
            .await?;
        Ok(response.entries)
    }

    async fn featured_apps(&self) -> Result<Vec<Value>, Self::Error> {
        let response = self
            .get::<FeaturedAppsResponse>("/v0/featured-apps", &[])
            .await?;
        Ok(response.featured_apps)
    }

    async fn validator_liveness(
        &self,
        validator_ids: Vec<String>,
    ) -> Result<Vec<ValidatorLiveness>, Self::Error> {
        if validator_ids.is_empty() {
            return Ok(vec![]);
        }

        let query = validator_ids
            .into_iter()
            .map(|id| ("validator_ids", id))
            .collect::<Vec<_>>();

        let response = self
            .get::<ValidatorFaucetsResponse>("/v0/validators/validator-faucets", &query)
            .await?;
        Ok(response.validators_received_faucets)
    }
}

#[derive(Debug, Error)]
pub enum ScanApiError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot request {endpoint}")]
    Request {
        endpoint: &'static str,
        source: reqwest::Error,
    },

    #[error("{endpoint} responded with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("cannot decode response of {endpoint}")]
    Decode {
        endpoint: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct TotalBalanceResponse {
    total_balance: Amount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopValidatorsResponse {
    validators_and_rewards: Vec<PartyRewards>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopProvidersResponse {
    providers_and_rewards: Vec<PartyRewards>,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    transactions: Vec<Value>,
}

#[derive(Deserialize)]
struct EntriesResponse<T> {
    entries: Vec<T>,
}

#[derive(Deserialize)]
struct VoteRequestsResponse {
    dso_rules_vote_requests: Vec<Value>,
}

#[derive(Deserialize)]
struct FeaturedAppsResponse {
    featured_apps: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorFaucetsResponse {
    validators_received_faucets: Vec<ValidatorLiveness>,
}

fn timeout_default() -> Duration {
    Duration::from_secs(30)
}
