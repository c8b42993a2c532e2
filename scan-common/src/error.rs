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

use std::{error::Error as StdError, fmt::Write};

/// Type-erased error, e.g. used as `#[source]` of error variants wrapping arbitrary errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Extension methods for errors.
pub trait StdErrorExt
where
    Self: StdError,
{
    /// Format this error together with all of its sources, separated by ": ".
    fn as_chain(&self) -> String {
        let mut chain = self.to_string();

        let mut source = self.source();
        while let Some(s) = source {
            let _ = write!(chain, ": {s}");
            source = s.source();
        }

        chain
    }
}

impl<T> StdErrorExt for T where T: StdError {}
