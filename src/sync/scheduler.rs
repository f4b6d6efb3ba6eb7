// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Detached job execution
//!
//! Push sends and catch-up loops never run on the caller's path. They are
//! handed to a [`JobScheduler`], which runs them independently and swallows
//! their result.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use crate::error::{ExchangeError, Result};

/// A fallible unit of asynchronous work
pub type Job = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Executes jobs detached from the caller.
///
/// `schedule` returns immediately. Implementations may run jobs concurrently
/// with each other and never hand a job's outcome back to the caller.
pub trait JobScheduler: Send + Sync {
    fn schedule(&self, job: Job);
}

/// Spawns every job onto a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime the caller is running on
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| ExchangeError::Config(format!("No tokio runtime available: {}", e)))
    }
}

impl JobScheduler for TokioScheduler {
    fn schedule(&self, job: Job) {
        self.handle.spawn(async move {
            if let Err(e) = job.await {
                log::debug!("Background job failed: {}", e);
            }
        });
    }
}

/// Holds jobs until [`run_pending`](QueueScheduler::run_pending) drives them.
///
/// Jobs run one at a time in submission order, including jobs scheduled by
/// jobs. Useful wherever execution has to be observed deterministically.
#[derive(Default)]
pub struct QueueScheduler {
    pending: Mutex<VecDeque<Job>>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run queued jobs until the queue is empty. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(job) = next else { break };
            if let Err(e) = job.await {
                log::debug!("Queued job failed: {}", e);
            }
            ran += 1;
        }
        ran
    }
}

impl JobScheduler for QueueScheduler {
    fn schedule(&self, job: Job) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }
}

impl std::fmt::Debug for QueueScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
