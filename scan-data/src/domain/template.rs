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

use scan_common::domain::{
    ContractId, SnapshotId, TemplateId,
    payload::{probe, probe_f64},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::{collections::BTreeMap, fmt};

/// A single captured contract: template identifier, contract identifier and the schema-less
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TemplateRecord {
    pub template_id: TemplateId,
    pub contract_id: ContractId,
    pub payload: Value,
}

/// Contract count of one template within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TemplateStat {
    pub template_id: TemplateId,

    #[sqlx(try_from = "i64")]
    pub contract_count: u64,
}

/// Where template records are read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordSource {
    /// Records captured by the given snapshot.
    Snapshot(SnapshotId),

    /// The continuously updated live contract table.
    Live,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Snapshot(id) => write!(f, "snapshot {id}"),
            RecordSource::Live => write!(f, "live"),
        }
    }
}

/// All records of one logical entity type, merged across package versions. Computed on demand,
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub total_contracts: usize,
    pub template_count: usize,
    pub template_ids: Vec<TemplateId>,
    pub records: Vec<TemplateRecord>,
    pub baseline_snapshot_id: Option<SnapshotId>,
    pub incremental_snapshot_ids: Vec<SnapshotId>,
}

impl AggregationResult {
    /// Sum of the numeric payload field found at the first matching candidate path. Records
    /// without such a field contribute nothing.
    pub fn sum(&self, candidates: &[&str]) -> f64 {
        self.records
            .iter()
            .filter_map(|record| probe_f64(&record.payload, candidates))
            .sum()
    }

    /// Number of records per value of the payload field found at the first matching candidate
    /// path. Records without such a field are not counted.
    pub fn count_by(&self, candidates: &[&str]) -> BTreeMap<String, usize> {
        self.records
            .iter()
            .filter_map(|record| probe(&record.payload, candidates))
            .filter_map(|value| match value {
                Value::String(s) => Some(s.to_owned()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .fold(BTreeMap::new(), |mut counts, key| {
                *counts.entry(key).or_default() += 1;
                counts
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{AggregationResult, TemplateRecord};
    use scan_common::domain::payload::aliases;
    use serde_json::json;

    #[test]
    fn test_sum_and_count_by() {
        let records = [
            json!({ "owner": "alice", "amount": { "initialAmount": "10.5" } }),
            json!({ "owner": "bob", "amount": "4.5" }),
            json!({ "holder": "alice", "amount": 5 }),
            json!({ "note": "no amount, no owner" }),
        ]
        .into_iter()
        .enumerate()
        .map(|(n, payload)| TemplateRecord {
            template_id: "h1:Splice.Amulet:Amulet".into(),
            contract_id: format!("c{n}").as_str().into(),
            payload,
        })
        .collect::<Vec<_>>();
        let result = AggregationResult {
            total_contracts: records.len(),
            template_count: 1,
            template_ids: vec!["h1:Splice.Amulet:Amulet".into()],
            records,
            ..Default::default()
        };

        assert_eq!(result.sum(aliases::AMOUNT), 20.0);

        let counts = result.count_by(aliases::OWNER);
        assert_eq!(counts.get("alice"), Some(&2));
        assert_eq!(counts.get("bob"), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
