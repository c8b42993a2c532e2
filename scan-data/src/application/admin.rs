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
    BackendFunctions, InvalidSvRewardsRequestError, PurgeSummary, Role, SvRewardsRequest,
    SvRewardsSummary, storage::RoleStorage,
};
use log::{info, warn};
use scan_common::error::BoxError;
use thiserror::Error;

/// Purge all captured snapshot data on behalf of the given user, who must be an admin. For
/// non-admins the purge function is not invoked at all. The function enforces authorization on
/// its own as well.
pub async fn purge_all(
    storage: &impl RoleStorage,
    functions: &impl BackendFunctions,
    user_id: &str,
) -> Result<PurgeSummary, AdminError> {
    let roles = storage
        .get_roles(user_id)
        .await
        .map_err(AdminError::Roles)?;

    if !roles.contains(&Role::Admin) {
        warn!(user_id; "denied purge for non-admin user");
        return Err(AdminError::NotAdmin(user_id.to_owned()));
    }

    let summary = functions
        .purge_acs_storage()
        .await
        .map_err(|error| AdminError::Function(error.into()))?;
    info!(user_id, summary:?; "purged snapshot data");

    Ok(summary)
}

/// Validate the given request and forward it to the SV rewards summary function.
pub async fn sv_rewards_summary(
    functions: &impl BackendFunctions,
    request: SvRewardsRequest,
) -> Result<SvRewardsSummary, AdminError> {
    request.validate()?;

    functions
        .sv_rewards_summary(request)
        .await
        .map_err(|error| AdminError::Function(error.into()))
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("user {0} is not an admin")]
    NotAdmin(String),

    #[error("cannot read user roles")]
    Roles(#[source] sqlx::Error),

    #[error("invalid SV rewards request")]
    InvalidRequest(#[from] InvalidSvRewardsRequestError),

    #[error("cannot invoke backend function")]
    Function(#[source] BoxError),
}
