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
    SnapshotLog,
    storage::{LogStorage, SnapshotStorage},
};
use async_stream::try_stream;
use futures::Stream;
use log::debug;
use scan_common::domain::SnapshotId;
use std::time::Duration;
use tokio::time::sleep;

/// Stream of the log lines of the given snapshot in ascending id order, polling for new lines
/// every `poll_interval`. The stream ends once the snapshot is terminal, or no longer exists, and
/// all of its lines have been yielded.
pub fn watch_snapshot_logs<S>(
    storage: S,
    snapshot_id: SnapshotId,
    poll_interval: Duration,
    batch_size: u32,
) -> impl Stream<Item = Result<SnapshotLog, sqlx::Error>>
where
    S: SnapshotStorage + LogStorage,
{
    let batch_size = batch_size.max(1);

    try_stream! {
        let mut after_id = None;

        loop {
            // Read the status before the lines, else lines written right before the snapshot
            // becomes terminal could be missed.
            let done = storage
                .get_snapshot(&snapshot_id)
                .await?
                .is_none_or(|snapshot| snapshot.status.is_terminal());

            loop {
                let logs = storage
                    .get_snapshot_logs(&snapshot_id, after_id, batch_size)
                    .await?;
                let len = logs.len();

                for log in logs {
                    after_id = Some(log.id);
                    yield log;
                }

                if len < batch_size as usize {
                    break;
                }
            }

            if done {
                debug!(snapshot_id:%; "snapshot terminal, log watch completed");
                break;
            }

            sleep(poll_interval).await;
        }
    }
}
