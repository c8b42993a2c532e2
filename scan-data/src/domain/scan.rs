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

use crate::domain::{RoundPartyTotals, RoundRange, RoundTotals};
use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use scan_common::domain::{
    ContractId, RoundNumber,
    payload::{aliases, probe},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;

/// Read-only Scan API abstraction.
#[trait_variant::make(Send)]
pub trait ScanApi
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// The most recent round for which the Scan API has data.
    async fn latest_round(&self) -> Result<LatestRound, Self::Error>;

    async fn total_balance(&self, as_of_end_of_round: RoundNumber)
    -> Result<Amount, Self::Error>;

    async fn top_validators(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error>;

    async fn top_providers(
        &self,
        round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error>;

    /// A page of transactions, schema-less.
    async fn transactions(&self, page: TransactionPage) -> Result<Vec<Value>, Self::Error>;

    /// Round totals for the given range in a single request; callers chunk large ranges.
    async fn round_totals(&self, range: RoundRange) -> Result<Vec<RoundTotals>, Self::Error>;

    async fn round_party_totals(
        &self,
        range: RoundRange,
    ) -> Result<Vec<RoundPartyTotals>, Self::Error>;

    async fn dso(&self) -> Result<DsoInfo, Self::Error>;

    /// Open DSO vote requests, schema-less.
    async fn vote_requests(&self) -> Result<Vec<Value>, Self::Error>;

    async fn ans_entries(
        &self,
        page_size: u32,
        name_prefix: Option<String>,
    ) -> Result<Vec<AnsEntry>, Self::Error>;

    /// Featured app rights, schema-less.
    async fn featured_apps(&self) -> Result<Vec<Value>, Self::Error>;

    async fn validator_liveness(
        &self,
        validator_ids: Vec<String>,
    ) -> Result<Vec<ValidatorLiveness>, Self::Error>;
}

/// Decimal amount as transported by the Scan API.
#[derive(Debug, Display, Clone, PartialEq, Eq, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub String);

impl Amount {
    /// Lossy conversion, only meant for light client-side sums and charts.
    pub fn to_f64(&self) -> Option<f64> {
        self.0.trim().parse().ok()
    }
}

impl From<&str> for Amount {
    fn from(amount: &str) -> Self {
        Self(amount.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestRound {
    pub round: RoundNumber,

    #[serde(rename = "effectiveAt")]
    pub effective_at: DateTime<Utc>,
}

/// Rewards earned by a validator or an app provider party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRewards {
    pub provider: String,
    pub rewards: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsoInfo {
    pub dso_party_id: String,

    #[serde(default)]
    pub sv_party_id: Option<String>,

    pub voting_threshold: u64,

    #[serde(default)]
    pub latest_mining_round: Option<Value>,

    #[serde(default)]
    pub dso_rules: Value,
}

impl DsoInfo {
    /// Parties of the super validators listed in the DSO rules. Entries are either
    /// `[party, info]` pairs or objects carrying the party.
    pub fn sv_parties(&self) -> Vec<String> {
        let Some(Value::Array(svs)) = probe(&self.dso_rules, aliases::SVS) else {
            return vec![];
        };

        svs.iter()
            .filter_map(|sv| match sv {
                Value::Array(pair) => pair.first().and_then(Value::as_str),
                Value::Object(_) => probe(sv, &["party", "svParty", "sv"]).and_then(Value::as_str),
                Value::String(party) => Some(party.as_str()),
                _ => None,
            })
            .map(ToOwned::to_owned)
            .collect()
    }
}

/// Amulet Name Service entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsEntry {
    #[serde(default)]
    pub contract_id: Option<ContractId>,
    pub user: String,
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Faucet collection statistics of a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorLiveness {
    pub validator: String,
    pub num_rounds_collected: u64,
    pub num_rounds_missed: u64,
    pub first_collected_in_round: Option<RoundNumber>,
    pub last_collected_in_round: Option<RoundNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TransactionPage {
    pub page_end_event_id: Option<String>,
    pub sort_order: SortOrder,
    pub page_size: u32,
}

#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SortOrder {
    #[default]
    #[display("asc")]
    #[serde(rename = "asc")]
    Ascending,

    #[display("desc")]
    #[serde(rename = "desc")]
    Descending,
}
