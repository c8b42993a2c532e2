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

use crate::domain::Amount;
use chrono::{DateTime, Utc};
use scan_common::domain::RoundNumber;
use serde::{Deserialize, Serialize};
use std::{fmt, iter, num::NonZeroU64};
use thiserror::Error;

/// Closed interval of rounds, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RoundRange {
    #[serde(rename = "start_round")]
    start: RoundNumber,

    #[serde(rename = "end_round")]
    end: RoundNumber,
}

impl RoundRange {
    pub fn new(start: RoundNumber, end: RoundNumber) -> Result<Self, InvalidRoundRangeError> {
        if start > end {
            return Err(InvalidRoundRangeError { start, end });
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> RoundNumber {
        self.start
    }

    pub fn end(&self) -> RoundNumber {
        self.end
    }

    /// Number of rounds in this range.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Always false, a range covers at least one round.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, round: RoundNumber) -> bool {
        (self.start..=self.end).contains(&round)
    }

    /// Partition into consecutive sub-ranges of at most `chunk_size` rounds, in ascending order.
    pub fn chunks(self, chunk_size: NonZeroU64) -> impl Iterator<Item = RoundRange> {
        let size = chunk_size.get();
        let end = self.end;

        iter::successors(Some(self.start), move |&start| {
            start.checked_add(size).filter(|&next| next <= end)
        })
        .map(move |start| RoundRange {
            start,
            end: start.saturating_add(size - 1).min(end),
        })
    }
}

impl fmt::Display for RoundRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Error)]
#[error("invalid round range: start {start} is after end {end}")]
pub struct InvalidRoundRangeError {
    pub start: RoundNumber,
    pub end: RoundNumber,
}

/// An entry keyed by round, as returned by the round based Scan API endpoints.
pub trait RoundEntry {
    fn round(&self) -> RoundNumber;
}

/// Network wide totals of one closed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTotals {
    pub closed_round: RoundNumber,
    pub closed_round_effective_at: Option<DateTime<Utc>>,
    pub app_rewards: Option<Amount>,
    pub validator_rewards: Option<Amount>,
    pub change_to_initial_amount_as_of_round_zero: Option<Amount>,
    pub change_to_holding_fees_rate: Option<Amount>,
    pub cumulative_app_rewards: Option<Amount>,
    pub cumulative_validator_rewards: Option<Amount>,
    pub total_amulet_balance: Option<Amount>,
}

impl RoundEntry for RoundTotals {
    fn round(&self) -> RoundNumber {
        self.closed_round
    }
}

/// Per party totals of one closed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPartyTotals {
    pub closed_round: RoundNumber,
    pub party: String,
    pub app_rewards: Option<Amount>,
    pub validator_rewards: Option<Amount>,
    pub traffic_purchased: Option<u64>,
    pub traffic_purchased_cc_spent: Option<Amount>,
    pub traffic_num_purchases: Option<u64>,
    pub cumulative_app_rewards: Option<Amount>,
    pub cumulative_validator_rewards: Option<Amount>,
}

impl RoundEntry for RoundPartyTotals {
    fn round(&self) -> RoundNumber {
        self.closed_round
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{InvalidRoundRangeError, RoundRange};
    use assert_matches::assert_matches;
    use std::num::NonZeroU64;

    fn chunks(start: u64, end: u64, size: u64) -> Vec<(u64, u64)> {
        let size = NonZeroU64::new(size).expect("chunk size is non-zero");
        RoundRange::new(start, end)
            .expect("range is valid")
            .chunks(size)
            .map(|r| (r.start(), r.end()))
            .collect()
    }

    #[test]
    fn test_new() {
        assert_matches!(
            RoundRange::new(10, 9),
            Err(InvalidRoundRangeError { start: 10, end: 9 })
        );
        assert_matches!(RoundRange::new(7, 7), Ok(r) if r.len() == 1);
        assert_matches!(RoundRange::new(0, 205), Ok(r) if r.len() == 206);
    }

    #[test]
    fn test_chunks() {
        assert_eq!(chunks(0, 205, 100), vec![(0, 99), (100, 199), (200, 205)]);
        assert_eq!(chunks(0, 199, 100), vec![(0, 99), (100, 199)]);
        assert_eq!(chunks(5, 5, 100), vec![(5, 5)]);
        assert_eq!(chunks(3, 6, 1), vec![(3, 3), (4, 4), (5, 5), (6, 6)]);
        assert_eq!(
            chunks(u64::MAX - 2, u64::MAX, 2),
            vec![(u64::MAX - 2, u64::MAX - 1), (u64::MAX, u64::MAX)]
        );
    }

    #[test]
    fn test_chunks_cover_range() {
        for size in 1..=12 {
            let covered = chunks(17, 60, size)
                .into_iter()
                .flat_map(|(start, end)| start..=end)
                .collect::<Vec<_>>();
            assert_eq!(covered, (17..=60).collect::<Vec<_>>());
        }
    }
}
