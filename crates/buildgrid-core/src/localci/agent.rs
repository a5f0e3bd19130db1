//! Build agent types

use serde::{Deserialize, Serialize};

/// Identity of a build agent: a display name plus the cluster member
/// address it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildAgent {
    /// Display name
    pub name: String,
    /// Member address the agent is reachable at
    pub member_address: String,
}

impl BuildAgent {
    #[must_use]
    pub fn new(name: impl Into<String>, member_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            member_address: member_address.into(),
        }
    }
}

impl std::fmt::Display for BuildAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.member_address)
    }
}

/// Lifecycle state reported by a build agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAgentStatus {
    /// Running no jobs
    Idle,
    /// Running at least one job
    Active,
    /// Paused by an administrator
    Paused,
    /// Paused itself after repeated failures
    SelfPaused,
}

impl BuildAgentStatus {
    /// Whether the agent may take new jobs from the queue
    #[must_use]
    pub const fn accepts_jobs(self) -> bool {
        matches!(self, Self::Idle | Self::Active)
    }
}

impl std::fmt::Display for BuildAgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::SelfPaused => write!(f, "self_paused"),
        }
    }
}

/// Published state of one agent, keyed by member address in the
/// `buildAgentInformation` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAgentInformation {
    pub agent: BuildAgent,
    pub status: BuildAgentStatus,
    /// Ids of the jobs currently running on the agent
    pub running_job_ids: Vec<String>,
    pub max_concurrent_builds: usize,
}

impl BuildAgentInformation {
    /// Freshly registered agent with nothing running.
    #[must_use]
    pub const fn new(agent: BuildAgent, max_concurrent_builds: usize) -> Self {
        Self {
            agent,
            status: BuildAgentStatus::Idle,
            running_job_ids: Vec::new(),
            max_concurrent_builds,
        }
    }

    /// Whether another job fits next to the running ones
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.status.accepts_jobs() && self.running_job_ids.len() < self.max_concurrent_builds
    }

    /// Record `job_id` as running and mark the agent active.
    pub fn start_job(&mut self, job_id: impl Into<String>) {
        self.running_job_ids.push(job_id.into());
        if self.status == BuildAgentStatus::Idle {
            self.status = BuildAgentStatus::Active;
        }
    }

    /// Drop `job_id` from the running set; an active agent with nothing left
    /// running goes back to idle.
    pub fn finish_job(&mut self, job_id: &str) {
        self.running_job_ids.retain(|id| id != job_id);
        if self.status == BuildAgentStatus::Active && self.running_job_ids.is_empty() {
            self.status = BuildAgentStatus::Idle;
        }
    }

    /// Stop taking jobs on an administrator's request. Running jobs stay
    /// recorded. Returns `false` if the agent was already paused.
    pub fn pause(&mut self) -> bool {
        self.halt(BuildAgentStatus::Paused)
    }

    /// Stop taking jobs on the agent's own initiative.
    pub fn self_pause(&mut self) -> bool {
        self.halt(BuildAgentStatus::SelfPaused)
    }

    fn halt(&mut self, status: BuildAgentStatus) -> bool {
        if !self.status.accepts_jobs() {
            return false;
        }
        self.status = status;
        true
    }

    /// Take jobs again after either kind of pause. Returns `false` if the
    /// agent was not paused.
    pub fn resume(&mut self) -> bool {
        if self.status.accepts_jobs() {
            return false;
        }
        self.status = if self.running_job_ids.is_empty() {
            BuildAgentStatus::Idle
        } else {
            BuildAgentStatus::Active
        };
        true
    }
}
