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

use chrono::{DateTime, Utc};
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{collections::HashMap, str::FromStr};
use thiserror::Error;

/// Canton Improvement Proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Cip {
    pub id: String,
    pub number: Option<i64>,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CipVote {
    pub cip_id: String,
    pub voter: String,

    #[sqlx(rename = "vote_kind", try_from = "String")]
    pub kind: VoteKind,

    #[sqlx(rename = "vote", try_from = "String")]
    pub choice: VoteChoice,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    #[display("committee")]
    Committee,

    #[display("sv")]
    Sv,
}

impl TryFrom<String> for VoteKind {
    type Error = UnknownVariantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for VoteKind {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "committee" => Ok(Self::Committee),
            "sv" => Ok(Self::Sv),
            other => Err(UnknownVariantError("vote kind", other.to_owned())),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    #[display("yes")]
    Yes,

    #[display("no")]
    No,

    #[display("abstain")]
    Abstain,
}

impl TryFrom<String> for VoteChoice {
    type Error = UnknownVariantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for VoteChoice {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "abstain" => Ok(Self::Abstain),
            other => Err(UnknownVariantError("vote choice", other.to_owned())),
        }
    }
}

/// Vote on whether an app should be featured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FeaturedAppVote {
    pub app_name: String,

    #[sqlx(rename = "provider")]
    pub provider_party: String,

    pub voter: String,

    #[sqlx(rename = "vote", try_from = "String")]
    pub choice: VoteChoice,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display("admin")]
    Admin,

    #[display("user")]
    User,
}

impl TryFrom<String> for Role {
    type Error = UnknownVariantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for Role {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(UnknownVariantError("role", other.to_owned())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {0} {1}")]
pub struct UnknownVariantError(pub &'static str, pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
}

impl VoteCounts {
    pub fn add(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::Yes => self.yes += 1,
            VoteChoice::No => self.no += 1,
            VoteChoice::Abstain => self.abstain += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.yes + self.no + self.abstain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipTally {
    pub cip: Cip,
    pub sv: VoteCounts,
    pub committee: VoteCounts,
    pub voting_threshold: u64,
    pub threshold_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedAppTally {
    pub app_name: String,
    pub provider_party: String,
    pub votes: VoteCounts,
}

/// Tally the votes of each CIP, keeping the order of the given CIPs. Votes for unknown CIPs are
/// ignored.
pub fn tally_cips(cips: Vec<Cip>, votes: Vec<CipVote>, voting_threshold: u64) -> Vec<CipTally> {
    let mut votes = votes.into_iter().into_group_map_by(|vote| vote.cip_id.clone());

    cips.into_iter()
        .map(|cip| {
            let mut sv = VoteCounts::default();
            let mut committee = VoteCounts::default();
            for vote in votes.remove(&cip.id).unwrap_or_default() {
                match vote.kind {
                    VoteKind::Sv => sv.add(vote.choice),
                    VoteKind::Committee => committee.add(vote.choice),
                }
            }

            CipTally {
                cip,
                sv,
                committee,
                voting_threshold,
                threshold_reached: voting_threshold > 0 && sv.yes >= voting_threshold,
            }
        })
        .collect()
}

/// Tally featured app votes per app, i.e. per app name and provider party, ordered by app name.
pub fn tally_featured_apps(votes: Vec<FeaturedAppVote>) -> Vec<FeaturedAppTally> {
    votes
        .into_iter()
        .fold(
            HashMap::<(String, String), FeaturedAppTally>::new(),
            |mut tallies, vote| {
                tallies
                    .entry((vote.app_name.clone(), vote.provider_party.clone()))
                    .or_insert_with(|| FeaturedAppTally {
                        app_name: vote.app_name,
                        provider_party: vote.provider_party,
                        votes: VoteCounts::default(),
                    })
                    .votes
                    .add(vote.choice);
                tallies
            },
        )
        .into_values()
        .sorted_by(|a, b| {
            a.app_name
                .cmp(&b.app_name)
                .then_with(|| a.provider_party.cmp(&b.provider_party))
        })
        .collect()
}
