/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! Durable activity submission.
//!
//! The engine abstraction is a queue an activity is submitted to, a retry
//! policy, a per-attempt timeout, and an idempotency discipline on the
//! callee. The in-process engine here provides at-least-once semantics with
//! a single-process retry loop; activities must tolerate re-execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use model::ids::TaskId;
use tokio::sync::RwLock;

/// An activity body. Retried as a whole, so it must be safe to run more
/// than once.
pub type Activity =
    Box<dyn Fn() -> BoxFuture<'static, Result<(), eyre::Report>> + Send + Sync + 'static>;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(5),
            backoff: 2.0,
            max_interval: Duration::from_secs(30),
            max_attempts: 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SubmitOptions {
    pub retry_policy: RetryPolicy,
    /// Per-attempt execution timeout.
    pub start_to_close_timeout: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        SubmitOptions {
            retry_policy: RetryPolicy::default(),
            start_to_close_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Failed(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub queue: String,
    pub state: TaskState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Submits an activity to a queue and returns immediately with its task
    /// ID. The activity runs in the background under the retry policy.
    async fn submit(&self, queue: &str, activity: Activity, options: SubmitOptions) -> TaskId;

    /// The current record for a task, or `None` for an unknown ID.
    async fn task(&self, task_id: TaskId) -> Option<TaskRecord>;
}

/// The single-process engine. Each submission becomes one tokio task that
/// retries the activity with exponential backoff and records the terminal
/// state for later polling.
#[derive(Default)]
pub struct InProcessEngine {
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl InProcessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test and shutdown helper: polls until the task reaches a terminal
    /// state.
    pub async fn wait(&self, task_id: TaskId) -> Option<TaskState> {
        loop {
            let state = self.tasks.read().await.get(&task_id).map(|t| t.state.clone())?;
            if state.is_terminal() {
                return Some(state);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait::async_trait]
impl WorkflowEngine for InProcessEngine {
    async fn submit(&self, queue: &str, activity: Activity, options: SubmitOptions) -> TaskId {
        let task_id = TaskId::new();
        let record = TaskRecord {
            task_id,
            queue: queue.to_string(),
            state: TaskState::Running,
            submitted_at: Utc::now(),
            finished_at: None,
        };
        self.tasks.write().await.insert(task_id, record);

        let tasks = Arc::clone(&self.tasks);
        let queue = queue.to_string();
        tokio::spawn(async move {
            let policy = options.retry_policy;
            let timeout = options.start_to_close_timeout;
            let attempt = move || {
                let fut = activity();
                async move {
                    tokio::time::timeout(timeout, fut)
                        .await
                        .map_err(|_| eyre::eyre!("activity timed out after {timeout:?}"))?
                }
            };

            let backoff = ExponentialBuilder::default()
                .with_min_delay(policy.initial_interval)
                .with_max_delay(policy.max_interval)
                .with_factor(policy.backoff as f32)
                .with_max_times(policy.max_attempts.saturating_sub(1));

            let result = attempt
                .retry(backoff)
                .notify(|err, delay| {
                    tracing::warn!(%queue, %task_id, ?delay, "activity failed, will retry: {err}");
                })
                .await;

            let state = match result {
                Ok(()) => TaskState::Completed,
                Err(err) => {
                    tracing::error!(%queue, %task_id, "activity exhausted retries: {err}");
                    TaskState::Failed(err.to_string())
                }
            };

            let mut tasks = tasks.write().await;
            if let Some(record) = tasks.get_mut(&task_id) {
                record.state = state;
                record.finished_at = Some(Utc::now());
            }
        });

        task_id
    }

    async fn task(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.tasks.read().await.get(&task_id).cloned()
    }
}
