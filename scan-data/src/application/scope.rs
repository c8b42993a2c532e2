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

use futures::{Stream, StreamExt};
use log::debug;
use std::{
    future::Future,
    pin::{Pin, pin},
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinSet,
};
use tokio_stream::wrappers::ReceiverStream;

/// Owns the tasks started on behalf of a page: dropping or closing the scope aborts all of them,
/// including realtime subscriptions.
#[derive(Debug, Default)]
pub struct PageScope {
    tasks: JoinSet<()>,
}

impl PageScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the given future within this scope. The returned [Pending] resolves to its output or to
    /// [Cancelled] if the scope is closed first.
    pub fn spawn<F>(&mut self, future: F) -> Pending<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.reap();

        let (sender, receiver) = oneshot::channel();
        self.tasks.spawn(async move {
            let _ = sender.send(future.await);
        });

        Pending(receiver)
    }

    /// Forward the items of the given stream through a channel with the given capacity until
    /// either the stream ends, the returned stream is dropped or the scope is closed.
    pub fn subscribe<S>(&mut self, stream: S, capacity: usize) -> ReceiverStream<S::Item>
    where
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
    {
        self.reap();

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.tasks.spawn(async move {
            let mut stream = pin!(stream);
            while let Some(item) = stream.next().await {
                if sender.send(item).await.is_err() {
                    debug!("subscriber dropped");
                    break;
                }
            }
        });

        ReceiverStream::new(receiver)
    }

    /// Number of tasks not yet known to be finished.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort all tasks of this scope.
    pub fn close(mut self) {
        self.tasks.abort_all();
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }
}

/// Output of a task spawned in a [PageScope].
#[derive(Debug)]
pub struct Pending<T>(oneshot::Receiver<T>);

impl<T> Future for Pending<T> {
    type Output = Result<T, Cancelled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map_err(|_| Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task cancelled because its page scope was closed")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use crate::application::scope::{Cancelled, PageScope};
    use assert_matches::assert_matches;
    use futures::{StreamExt, stream};
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_spawn() {
        let mut scope = PageScope::new();
        let a = scope.spawn(async { 1 });
        let b = scope.spawn(async { "two" });

        assert_matches!(a.await, Ok(1));
        assert_matches!(b.await, Ok("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels() {
        let completed = Arc::new(AtomicBool::new(false));

        let mut scope = PageScope::new();
        let pending = scope.spawn({
            let completed = completed.clone();
            async move {
                sleep(Duration::from_secs(60)).await;
                completed.store(true, Ordering::SeqCst);
            }
        });
        scope.close();

        assert_matches!(pending.await, Err(Cancelled));
        sleep(Duration::from_secs(120)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_subscription() {
        let mut scope = PageScope::new();
        let ticks = stream::unfold(0u32, |n| async move {
            sleep(Duration::from_secs(1)).await;
            Some((n, n + 1))
        });
        let mut ticks = scope.subscribe(ticks, 4);

        assert_eq!(ticks.next().await, Some(0));
        assert_eq!(ticks.next().await, Some(1));

        drop(scope);
        // Buffered items may still arrive, but the stream ends.
        let rest = ticks.collect::<Vec<_>>().await;
        assert!(rest.len() <= 4);
    }
}
