//! Delayed-run scheduler.
//!
//! Keeps a min-heap of pending runs due within the lookahead window, sleeps
//! until the earliest one (or the poll interval), then claims and executes due
//! runs with at most `claim_limit` executions in flight.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use fieldflow_application::{DueWorkflowRun, RunSchedule, WorkflowRun, WorkflowService};
use fieldflow_core::AppResult;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Upper bound of runs pulled from storage per hydration pass.
const HYDRATE_BATCH: usize = 500;

type ExecutionResult = (DueWorkflowRun, AppResult<Option<WorkflowRun>>);

pub struct Scheduler {
    workflow_service: WorkflowService,
    worker_id: String,
    claim_limit: usize,
    poll_interval: Duration,
    lookahead: Duration,
    stale_run_after: Duration,
    schedule: RunSchedule,
    in_flight: JoinSet<ExecutionResult>,
}

impl Scheduler {
    pub fn new(
        workflow_service: WorkflowService,
        worker_id: impl Into<String>,
        claim_limit: usize,
        poll_interval: Duration,
        lookahead: Duration,
        stale_run_after: Duration,
    ) -> Self {
        Self {
            workflow_service,
            worker_id: worker_id.into(),
            claim_limit: claim_limit.max(1),
            poll_interval,
            lookahead,
            stale_run_after,
            schedule: RunSchedule::new(),
            in_flight: JoinSet::new(),
        }
    }

    /// Runs until `shutdown` resolves, then waits for in-flight executions.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut reaper =
            tokio::time::interval((self.stale_run_after / 4).max(Duration::from_secs(1)));

        loop {
            if let Err(error) = self.hydrate().await {
                warn!(worker_id = %self.worker_id, %error, "failed to load due workflow runs");
            }
            self.dispatch_due();

            let sleep_for = self.sleep_duration();
            tokio::select! {
                () = &mut shutdown => break,
                _ = reaper.tick() => self.reap_stale_runs().await,
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.record(joined);
                }
                () = tokio::time::sleep(sleep_for) => {}
            }
        }

        info!(
            worker_id = %self.worker_id,
            in_flight = self.in_flight.len(),
            "shutting down, waiting for in-flight workflow runs"
        );
        self.drain().await;
    }

    /// Loads pending runs due within the lookahead window into the heap.
    pub async fn hydrate(&mut self) -> AppResult<usize> {
        let horizon = Utc::now()
            + chrono::Duration::from_std(self.lookahead).unwrap_or(chrono::Duration::zero());
        let due = self
            .workflow_service
            .list_due_runs(horizon, HYDRATE_BATCH)
            .await?;

        let mut added = 0;
        for run in due {
            if self.schedule.insert(run) {
                added += 1;
            }
        }

        if added > 0 {
            debug!(worker_id = %self.worker_id, added, queued = self.schedule.len(), "hydrated run schedule");
        }
        Ok(added)
    }

    /// Spawns due runs up to the free execution capacity. Returns spawned count.
    pub fn dispatch_due(&mut self) -> usize {
        let capacity = self.claim_limit.saturating_sub(self.in_flight.len());
        if capacity == 0 {
            return 0;
        }

        let mut due = self.schedule.pop_due(Utc::now());
        for overflow in due.split_off(capacity.min(due.len())) {
            self.schedule.insert(overflow);
        }

        let spawned = due.len();
        for run in due {
            let workflow_service = self.workflow_service.clone();
            self.in_flight.spawn(async move {
                let result = workflow_service
                    .execute_pending_run(run.tenant_id, run.run_id)
                    .await;
                (run, result)
            });
        }

        spawned
    }

    /// Time until the earliest queued run, capped by the poll interval.
    ///
    /// With every execution slot busy the loop waits on completions instead.
    pub fn sleep_duration(&self) -> Duration {
        if self.in_flight.len() >= self.claim_limit {
            return self.poll_interval;
        }

        match self.schedule.next_due_at() {
            Some(due_at) => (due_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }

    /// Waits for every in-flight execution.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.record(joined);
        }
    }

    pub fn queued(&self) -> usize {
        self.schedule.len()
    }

    async fn reap_stale_runs(&self) {
        match self
            .workflow_service
            .reap_stale_runs(self.stale_run_after)
            .await
        {
            Ok(0) => {}
            Ok(reaped) => warn!(worker_id = %self.worker_id, reaped, "failed stale workflow runs"),
            Err(error) => {
                warn!(worker_id = %self.worker_id, %error, "failed to reap stale workflow runs");
            }
        }
    }

    fn record(&self, joined: Result<ExecutionResult, JoinError>) {
        match joined {
            Ok((run, Ok(Some(finished)))) => info!(
                worker_id = %self.worker_id,
                tenant_id = %run.tenant_id,
                run_id = %run.run_id,
                status = finished.status.as_str(),
                "workflow run executed"
            ),
            Ok((run, Ok(None))) => debug!(
                worker_id = %self.worker_id,
                run_id = %run.run_id,
                "workflow run claimed by another executor"
            ),
            Ok((run, Err(error))) => warn!(
                worker_id = %self.worker_id,
                tenant_id = %run.tenant_id,
                run_id = %run.run_id,
                %error,
                "workflow run execution failed"
            ),
            Err(error) => warn!(worker_id = %self.worker_id, %error, "workflow run task panicked"),
        }
    }
}
