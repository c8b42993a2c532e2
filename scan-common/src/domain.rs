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

pub mod payload;

use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Number of a closed or open mining round.
pub type RoundNumber = u64;

/// Opaque snapshot identifier.
#[derive(
    Debug,
    Display,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deref,
    From,
    Into,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[deref(forward)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SnapshotId(pub String);

impl From<&str> for SnapshotId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Contract identifier.
#[derive(
    Debug,
    Display,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deref,
    From,
    Into,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[deref(forward)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ContractId(pub String);

impl From<&str> for ContractId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Template identifier made of an opaque package-hash prefix and a stable logical suffix, e.g.
/// `"<hash>:Splice.Round:OpenMiningRound"`. Different deployed package versions of the same
/// logical entity share the suffix but differ in the prefix.
#[derive(
    Debug,
    Display,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deref,
    From,
    Into,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[deref(forward)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// The package-hash prefix, i.e. everything before the first `:`, if any.
    pub fn package_hash(&self) -> Option<&str> {
        self.0.split_once(':').map(|(hash, _)| hash)
    }

    /// Whether this template identifier ends with the given logical suffix on a segment
    /// boundary, i.e. equals it or ends with `":" + suffix`.
    pub fn matches(&self, suffix: &LogicalSuffix) -> bool {
        match self.0.strip_suffix(suffix.as_str()) {
            Some("") => true,
            Some(prefix) => prefix.ends_with(':'),
            None => false,
        }
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Package-hash independent, non-empty part of a [TemplateId], used to group records of the same
/// logical entity type across package versions.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Deref, Into, Serialize, Deserialize)]
#[deref(forward)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalSuffix(String);

impl LogicalSuffix {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LogicalSuffix {
    type Error = InvalidLogicalSuffixError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim();

        if s.is_empty() {
            Err(InvalidLogicalSuffixError::Empty)
        } else if s.starts_with(':') {
            Err(InvalidLogicalSuffixError::LeadingSeparator(s.to_owned()))
        } else {
            Ok(Self(s.to_owned()))
        }
    }
}

impl TryFrom<&str> for LogicalSuffix {
    type Error = InvalidLogicalSuffixError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.to_owned().try_into()
    }
}

impl FromStr for LogicalSuffix {
    type Err = InvalidLogicalSuffixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

#[derive(Debug, Error)]
pub enum InvalidLogicalSuffixError {
    #[error("logical suffix must not be empty")]
    Empty,

    #[error("logical suffix {0} must not start with a separator")]
    LeadingSeparator(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::{InvalidLogicalSuffixError, LogicalSuffix, TemplateId};
    use assert_matches::assert_matches;

    #[test]
    fn test_template_id_matches() {
        let suffix = "Splice.Round:OpenMiningRound"
            .parse::<LogicalSuffix>()
            .expect("suffix is valid");

        let template_id = TemplateId::from("abc123:Splice.Round:OpenMiningRound");
        assert!(template_id.matches(&suffix));
        assert_eq!(template_id.package_hash(), Some("abc123"));

        assert!(TemplateId::from("Splice.Round:OpenMiningRound").matches(&suffix));
        assert!(!TemplateId::from("abc123:Splice.Round:ClosedMiningRound").matches(&suffix));
        assert!(!TemplateId::from("abc123:MySplice.Round:OpenMiningRound").matches(&suffix));
        assert!(!TemplateId::from("abc123:Splice.Round:OpenMiningRoundV2").matches(&suffix));
    }

    #[test]
    fn test_logical_suffix() {
        assert_matches!(
            LogicalSuffix::try_from(""),
            Err(InvalidLogicalSuffixError::Empty)
        );
        assert_matches!(
            LogicalSuffix::try_from("   "),
            Err(InvalidLogicalSuffixError::Empty)
        );
        assert_matches!(
            LogicalSuffix::try_from(":Splice.Amulet:Amulet"),
            Err(InvalidLogicalSuffixError::LeadingSeparator(_))
        );
        assert_matches!(
            LogicalSuffix::try_from(" Splice.Amulet:Amulet "),
            Ok(suffix) if suffix.as_str() == "Splice.Amulet:Amulet"
        );
    }
}
