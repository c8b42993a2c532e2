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

use crate::domain::{
    CipTally, FeaturedAppTally, ScanApi, storage::GovernanceStorage, tally_cips,
    tally_featured_apps,
};
use scan_common::error::BoxError;
use thiserror::Error;

/// All CIPs with their vote tallies against the current DSO voting threshold.
pub async fn cip_overview(
    storage: &impl GovernanceStorage,
    scan_api: &impl ScanApi,
) -> Result<Vec<CipTally>, GovernanceError> {
    let (cips, votes, dso) = tokio::try_join!(
        async { storage.get_cips().await.map_err(GovernanceError::Storage) },
        async { storage.get_cip_votes().await.map_err(GovernanceError::Storage) },
        async {
            scan_api
                .dso()
                .await
                .map_err(|error| GovernanceError::ScanApi(error.into()))
        },
    )?;

    Ok(tally_cips(cips, votes, dso.voting_threshold))
}

/// Yes/no counts per featured app.
pub async fn featured_app_tallies(
    storage: &impl GovernanceStorage,
) -> Result<Vec<FeaturedAppTally>, GovernanceError> {
    let votes = storage
        .get_featured_app_votes()
        .await
        .map_err(GovernanceError::Storage)?;

    Ok(tally_featured_apps(votes))
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("cannot read governance data")]
    Storage(#[source] sqlx::Error),

    #[error("cannot get DSO info")]
    ScanApi(#[source] BoxError),
}
