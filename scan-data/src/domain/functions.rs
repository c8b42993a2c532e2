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
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// Abstraction of the backend's serverless functions. Authorization of the caller is checked by
/// the functions themselves as well.
#[trait_variant::make(Send)]
pub trait BackendFunctions
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Delete all captured snapshot data.
    async fn purge_acs_storage(&self) -> Result<PurgeSummary, Self::Error>;

    async fn sv_rewards_summary(
        &self,
        request: SvRewardsRequest,
    ) -> Result<SvRewardsSummary, Self::Error>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeSummary {
    pub deleted_snapshots: u64,
    pub deleted_contracts: u64,
    pub deleted_template_stats: u64,
    pub deleted_logs: u64,
}

/// Request for a summary of the reward coupons of a super validator beneficiary within a record
/// time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvRewardsRequest {
    pub beneficiary: String,
    pub begin_record_time: DateTime<Utc>,
    pub end_record_time: DateTime<Utc>,
    pub begin_migration_id: u64,
    pub end_migration_id: u64,
    pub weight: f64,
    pub already_minted_weight: f64,
}

impl SvRewardsRequest {
    pub fn validate(&self) -> Result<(), InvalidSvRewardsRequestError> {
        if self.beneficiary.trim().is_empty() {
            return Err(InvalidSvRewardsRequestError::EmptyBeneficiary);
        }

        if self.end_record_time <= self.begin_record_time {
            return Err(InvalidSvRewardsRequestError::RecordTimeWindow {
                begin: self.begin_record_time,
                end: self.end_record_time,
            });
        }

        if self.end_migration_id < self.begin_migration_id {
            return Err(InvalidSvRewardsRequestError::MigrationIds {
                begin: self.begin_migration_id,
                end: self.end_migration_id,
            });
        }

        for (name, weight) in [
            ("weight", self.weight),
            ("already_minted_weight", self.already_minted_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(InvalidSvRewardsRequestError::Weight(name, weight));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum InvalidSvRewardsRequestError {
    #[error("beneficiary must not be empty")]
    EmptyBeneficiary,

    #[error("end record time {end} must be after begin record time {begin}")]
    RecordTimeWindow {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("end migration id {end} must not be before begin migration id {begin}")]
    MigrationIds { begin: u64, end: u64 },

    #[error("{0} must be a non-negative number, but was {1}")]
    Weight(&'static str, f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvRewardsSummary {
    pub claimed_count: u64,
    pub claimed_amount: Amount,
    pub expired_count: u64,
    pub expired_amount: Amount,
    pub unclaimed_count: u64,
    pub unclaimed_amount: Amount,
}

#[cfg(test)]
mod tests {
    use crate::domain::{InvalidSvRewardsRequestError, SvRewardsRequest};
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn request() -> SvRewardsRequest {
        SvRewardsRequest {
            beneficiary: "sv1::1220".to_owned(),
            begin_record_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end_record_time: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            begin_migration_id: 3,
            end_migration_id: 4,
            weight: 10.0,
            already_minted_weight: 0.0,
        }
    }

    #[test]
    fn test_validate() {
        assert_matches!(request().validate(), Ok(()));

        let invalid = SvRewardsRequest {
            beneficiary: " ".to_owned(),
            ..request()
        };
        assert_matches!(
            invalid.validate(),
            Err(InvalidSvRewardsRequestError::EmptyBeneficiary)
        );

        let invalid = SvRewardsRequest {
            end_record_time: request().begin_record_time,
            ..request()
        };
        assert_matches!(
            invalid.validate(),
            Err(InvalidSvRewardsRequestError::RecordTimeWindow { .. })
        );

        let invalid = SvRewardsRequest {
            end_migration_id: 2,
            ..request()
        };
        assert_matches!(
            invalid.validate(),
            Err(InvalidSvRewardsRequestError::MigrationIds { begin: 3, end: 2 })
        );

        let invalid = SvRewardsRequest {
            already_minted_weight: -1.0,
            ..request()
        };
        assert_matches!(
            invalid.validate(),
            Err(InvalidSvRewardsRequestError::Weight("already_minted_weight", _))
        );
    }
}
