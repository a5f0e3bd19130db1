//! Build job queue items

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::BuildAgent;

/// Default priority for jobs submitted without one. Lower runs first.
pub const DEFAULT_PRIORITY: i32 = 2;

/// A build job waiting in `buildJobQueue` or running in `processingJobs`.
///
/// Ordered by priority (lower first), then submission time, then id, so the
/// priority queue hands out the most urgent, oldest job first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJobQueueItem {
    /// Unique job id
    pub id: String,
    /// Human-readable job name
    pub name: String,
    pub course_id: u64,
    pub participation_id: u64,
    pub priority: i32,
    /// When the job entered the queue
    pub submitted_at: DateTime<Utc>,
    /// Agent running the job; unset while queued
    pub build_agent: Option<BuildAgent>,
}

impl BuildJobQueueItem {
    /// Create a queued job submitted now
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        course_id: u64,
        participation_id: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            course_id,
            participation_id,
            priority: DEFAULT_PRIORITY,
            submitted_at: Utc::now(),
            build_agent: None,
        }
    }

    /// Set priority
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Copy of this job assigned to `agent`
    #[must_use]
    pub fn assigned_to(&self, agent: BuildAgent) -> Self {
        Self {
            build_agent: Some(agent),
            ..self.clone()
        }
    }

    /// Whether the job runs on the agent at `member_address`
    #[must_use]
    pub fn runs_on(&self, member_address: &str) -> bool {
        self.build_agent
            .as_ref()
            .is_some_and(|agent| agent.member_address == member_address)
    }
}

impl Ord for BuildJobQueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.submitted_at.cmp(&other.submitted_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for BuildJobQueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of a finished build, placed on `buildResultQueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultQueueItem {
    /// The job as it was when it finished
    pub build_job: BuildJobQueueItem,
    pub success: bool,
    /// Failure description when `success` is false
    pub error: Option<String>,
}

impl ResultQueueItem {
    #[must_use]
    pub const fn succeeded(build_job: BuildJobQueueItem) -> Self {
        Self {
            build_job,
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(build_job: BuildJobQueueItem, error: impl Into<String>) -> Self {
        Self {
            build_job,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Id of the finished job
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.build_job.id
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn job(id: &str, priority: i32, offset_secs: i64) -> BuildJobQueueItem {
        let mut job = BuildJobQueueItem::new(id, "build", 1, 1).with_priority(priority);
        job.submitted_at = DateTime::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap();
        job
    }

    #[test]
    fn lower_priority_value_sorts_first() {
        assert!(job("b", 1, 10) < job("a", 2, 0));
    }

    #[test]
    fn equal_priority_falls_back_to_submission_time_then_id() {
        assert!(job("z", 2, 0) < job("a", 2, 5));
        assert!(job("a", 2, 0) < job("b", 2, 0));
    }

    #[test]
    fn assignment_keeps_identity() {
        let queued = job("job-1", 2, 0);
        let running = queued.assigned_to(BuildAgent::new("agent-1", "node-a"));
        assert_eq!(running.id, queued.id);
        assert_eq!(running.cmp(&queued), Ordering::Equal);
        assert!(running.runs_on("node-a"));
        assert!(!running.runs_on("node-b"));
        assert!(!queued.runs_on("node-a"));
    }

    #[test]
    fn result_constructors() {
        let ok = ResultQueueItem::succeeded(job("job-1", 2, 0));
        assert!(ok.success);
        assert_eq!(ok.job_id(), "job-1");

        let failed = ResultQueueItem::failed(job("job-2", 2, 0), "compilation failed");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("compilation failed"));
    }

    #[test]
    fn serializes_with_optional_agent() {
        let queued = job("job-1", 2, 0);
        let json = serde_json::to_value(&queued).unwrap();
        assert!(json["build_agent"].is_null());
        let back: BuildJobQueueItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, queued);
    }

    proptest! {
        #[test]
        fn sorted_jobs_have_non_decreasing_priority(
            entries in prop::collection::vec((0i32..5, 0i64..100), 1..30)
        ) {
            let mut jobs: Vec<_> = entries
                .iter()
                .enumerate()
                .map(|(i, (priority, offset))| job(&format!("job-{i}"), *priority, *offset))
                .collect();
            jobs.sort();
            for pair in jobs.windows(2) {
                prop_assert!(pair[0].priority <= pair[1].priority);
                if pair[0].priority == pair[1].priority {
                    prop_assert!(pair[0].submitted_at <= pair[1].submitted_at);
                }
            }
        }
    }
}
