use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use chrono::{DateTime, Utc};
use fieldflow_domain::WorkflowRunId;

use crate::workflow_ports::DueWorkflowRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledRun(DueWorkflowRun);

impl Ord for ScheduledRun {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .scheduled_for
            .cmp(&other.0.scheduled_for)
            .then_with(|| self.0.run_id.cmp(&other.0.run_id))
    }
}

impl PartialOrd for ScheduledRun {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending runs ordered by due time.
///
/// Each run id is queued at most once until it is popped.
#[derive(Debug, Default)]
pub struct RunSchedule {
    heap: BinaryHeap<Reverse<ScheduledRun>>,
    queued: HashSet<WorkflowRunId>,
}

impl RunSchedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one run. Returns `false` when it is already queued.
    pub fn insert(&mut self, run: DueWorkflowRun) -> bool {
        if !self.queued.insert(run.run_id) {
            return false;
        }

        self.heap.push(Reverse(ScheduledRun(run)));
        true
    }

    /// Returns the earliest due time.
    #[must_use]
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.heap
            .peek()
            .map(|Reverse(ScheduledRun(run))| run.scheduled_for)
    }

    /// Removes and returns every run due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<DueWorkflowRun> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(ScheduledRun(run))| run.scheduled_for <= now)
        {
            if let Some(Reverse(ScheduledRun(run))) = self.heap.pop() {
                self.queued.remove(&run.run_id);
                due.push(run);
            }
        }

        due
    }

    /// Returns queued run count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
