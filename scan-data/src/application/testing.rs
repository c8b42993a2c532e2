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

//! Test doubles for the Scan API and the backend functions.

use crate::domain::{
    Amount, AnsEntry, BackendFunctions, DsoInfo, LatestRound, PartyRewards, PurgeSummary,
    RoundPartyTotals, RoundRange, RoundTotals, ScanApi, SvRewardsRequest, SvRewardsSummary,
    TransactionPage, ValidatorLiveness,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use scan_common::domain::RoundNumber;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("fake failure")]
pub struct FakeError;

/// Scan API serving rounds up to `latest_round`, counting calls per endpoint. The first
/// `failures` calls fail.
#[derive(Debug, Clone, Default)]
pub struct FakeScanApi {
    pub latest_round: RoundNumber,
    pub voting_threshold: u64,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    calls: HashMap<&'static str, usize>,
    failures: usize,
}

impl FakeScanApi {
    pub fn new(latest_round: RoundNumber, voting_threshold: u64) -> Self {
        Self {
            latest_round,
            voting_threshold,
            state: Default::default(),
        }
    }

    pub fn fail_next(&self, failures: usize) {
        self.state.lock().failures = failures;
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.state.lock().calls.get(endpoint).copied().unwrap_or_default()
    }

    fn call(&self, endpoint: &'static str) -> Result<(), FakeError> {
        let mut state = self.state.lock();
        *state.calls.entry(endpoint).or_default() += 1;
        if state.failures > 0 {
            state.failures -= 1;
            return Err(FakeError);
        }
        Ok(())
    }

    fn rounds(&self, range: RoundRange) -> impl Iterator<Item = RoundNumber> {
        range.start()..=range.end().min(self.latest_round)
    }
}

impl ScanApi for FakeScanApi {
    type Error = FakeError;

    async fn latest_round(&self) -> Result<LatestRound, Self::Error> {
        self.call("latest_round")?;
        Ok(LatestRound {
            round: self.latest_round,
            effective_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    async fn total_balance(&self, round: RoundNumber) -> Result<Amount, Self::Error> {
        self.call("total_balance")?;
        Ok(Amount(format!("{round}.0")))
    }

    async fn top_validators(
        &self,
        _round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error> {
        self.call("top_validators")?;
        Ok((0..limit)
            .map(|n| PartyRewards {
                provider: format!("validator-{n}"),
                rewards: "1.0".into(),
            })
            .collect())
    }

    async fn top_providers(
        &self,
        _round: RoundNumber,
        limit: u32,
    ) -> Result<Vec<PartyRewards>, Self::Error> {
        self.call("top_providers")?;
        Ok((0..limit)
            .map(|n| PartyRewards {
                provider: format!("provider-{n}"),
                rewards: "1.0".into(),
            })
            .collect())
    }

    async fn transactions(&self, page: TransactionPage) -> Result<Vec<Value>, Self::Error> {
        self.call("transactions")?;
        Ok((0..page.page_size)
            .map(|n| json!({ "event_id": n.to_string() }))
            .collect())
    }

    async fn round_totals(&self, range: RoundRange) -> Result<Vec<RoundTotals>, Self::Error> {
        self.call("round_totals")?;
        Ok(self
            .rounds(range)
            .map(|closed_round| RoundTotals {
                closed_round,
                closed_round_effective_at: None,
                app_rewards: Some("1.0".into()),
                validator_rewards: Some("2.0".into()),
                change_to_initial_amount_as_of_round_zero: None,
                change_to_holding_fees_rate: None,
                cumulative_app_rewards: None,
                cumulative_validator_rewards: None,
                total_amulet_balance: None,
            })
            .collect())
    }

    async fn round_party_totals(
        &self,
        range: RoundRange,
    ) -> Result<Vec<RoundPartyTotals>, Self::Error> {
        self.call("round_party_totals")?;
        Ok(self
            .rounds(range)
            .flat_map(|closed_round| {
                ["alice", "bob"].map(|party| RoundPartyTotals {
                    closed_round,
                    party: party.to_owned(),
                    app_rewards: None,
                    validator_rewards: None,
                    traffic_purchased: None,
                    traffic_purchased_cc_spent: None,
                    traffic_num_purchases: None,
                    cumulative_app_rewards: None,
                    cumulative_validator_rewards: None,
                })
            })
            .collect())
    }

    async fn dso(&self) -> Result<DsoInfo, Self::Error> {
        self.call("dso")?;
        Ok(DsoInfo {
            dso_party_id: "DSO::1220".to_owned(),
            sv_party_id: None,
            voting_threshold: self.voting_threshold,
            latest_mining_round: None,
            dso_rules: json!({ "svs": [] }),
        })
    }

    async fn vote_requests(&self) -> Result<Vec<Value>, Self::Error> {
        self.call("vote_requests")?;
        Ok(vec![])
    }

    async fn ans_entries(
        &self,
        _page_size: u32,
        _name_prefix: Option<String>,
    ) -> Result<Vec<AnsEntry>, Self::Error> {
        self.call("ans_entries")?;
        Ok(vec![])
    }

    async fn featured_apps(&self) -> Result<Vec<Value>, Self::Error> {
        self.call("featured_apps")?;
        Ok(vec![])
    }

    async fn validator_liveness(
        &self,
        validator_ids: Vec<String>,
    ) -> Result<Vec<ValidatorLiveness>, Self::Error> {
        self.call("validator_liveness")?;
        Ok(validator_ids
            .into_iter()
            .map(|validator| ValidatorLiveness {
                validator,
                num_rounds_collected: 1,
                num_rounds_missed: 0,
                first_collected_in_round: Some(1),
                last_collected_in_round: Some(1),
            })
            .collect())
    }
}

/// Backend functions counting purge invocations.
#[derive(Debug, Clone, Default)]
pub struct FakeFunctions {
    purges: Arc<Mutex<usize>>,
}

impl FakeFunctions {
    pub fn purges(&self) -> usize {
        *self.purges.lock()
    }
}

impl BackendFunctions for FakeFunctions {
    type Error = FakeError;

    async fn purge_acs_storage(&self) -> Result<PurgeSummary, Self::Error> {
        *self.purges.lock() += 1;
        Ok(PurgeSummary {
            deleted_snapshots: 2,
            ..Default::default()
        })
    }

    async fn sv_rewards_summary(
        &self,
        _request: SvRewardsRequest,
    ) -> Result<SvRewardsSummary, Self::Error> {
        Ok(SvRewardsSummary {
            claimed_count: 1,
            claimed_amount: "10.0".into(),
            expired_count: 0,
            expired_amount: "0.0".into(),
            unclaimed_count: 2,
            unclaimed_amount: "20.0".into(),
        })
    }
}
