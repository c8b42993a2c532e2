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

//! Lookups in schema-less contract payloads.
//!
//! The field layout of a payload is only known at read time and legitimately differs between
//! package versions of the same template, hence fields are looked up via an ordered list of
//! candidate paths. A path is a dot-separated sequence of object keys or array indices, e.g.
//! `"amount.initialAmount"` or `"svs.0"`.

use serde_json::Value;

/// Commonly used candidate paths.
pub mod aliases {
    pub const ROUND_NUMBER: &[&str] = &["round.number", "roundNumber", "round"];
    pub const AMOUNT: &[&str] = &["amount.initialAmount", "amount", "initialAmount"];
    pub const OWNER: &[&str] = &["owner", "holder", "party"];
    pub const PROVIDER: &[&str] = &["provider", "providerParty", "beneficiary"];
    pub const VALIDATOR: &[&str] = &["validator", "validatorParty", "operator"];
    pub const SVS: &[&str] = &["contract.payload.svs", "payload.svs", "svs"];
}

/// Returns the value at the first candidate path that is present and not null.
pub fn probe<'a>(payload: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(payload, path))
        .find(|value| !value.is_null())
}

/// Returns the first candidate value that is a string.
pub fn probe_str<'a>(payload: &'a Value, candidates: &[&str]) -> Option<&'a str> {
    probe_map(payload, candidates, Value::as_str)
}

/// Returns the first candidate value that is a non-negative integer or a string holding one.
pub fn probe_u64(payload: &Value, candidates: &[&str]) -> Option<u64> {
    probe_map(payload, candidates, |value| match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Returns the first candidate value that is a number or a string holding a decimal number.
/// Amounts are transported as decimal strings, hence the conversion is lossy.
pub fn probe_f64(payload: &Value, candidates: &[&str]) -> Option<f64> {
    probe_map(payload, candidates, |value| match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn probe_map<'a, T>(
    payload: &'a Value,
    candidates: &[&str],
    f: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    candidates
        .iter()
        .filter_map(|path| lookup(payload, path))
        .find_map(f)
}

fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |value, segment| match value {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
