//! Typed access to the shared build-job structures
//!
//! Writers and listeners use the `*_queue`/`*_map`/`*_topic` handles
//! directly. Readers should prefer the snapshot helpers, which copy the
//! contents once instead of iterating a structure other members are
//! mutating.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use chrono::{DateTime, Utc};

use super::{
    agent::{BuildAgentInformation, BuildAgentStatus},
    job::{BuildJobQueueItem, ResultQueueItem},
};
use crate::{
    api::{DataProvider, DistributedMap, DistributedQueue, DistributedTopic},
    Result,
};

pub const BUILD_JOB_QUEUE: &str = "buildJobQueue";
pub const PROCESSING_JOBS: &str = "processingJobs";
pub const BUILD_RESULT_QUEUE: &str = "buildResultQueue";
pub const BUILD_AGENT_INFORMATION: &str = "buildAgentInformation";
pub const DOCKER_IMAGE_CLEANUP_INFO: &str = "dockerImageCleanupInfo";
pub const CANCELED_BUILD_JOBS_TOPIC: &str = "canceledBuildJobsTopic";
pub const PAUSE_BUILD_AGENT_TOPIC: &str = "pauseBuildAgentTopic";
pub const RESUME_BUILD_AGENT_TOPIC: &str = "resumeBuildAgentTopic";

pub type JobQueue = Arc<dyn DistributedQueue<BuildJobQueueItem>>;
pub type ResultQueue = Arc<dyn DistributedQueue<ResultQueueItem>>;
pub type JobMap = Arc<dyn DistributedMap<String, BuildJobQueueItem>>;
pub type AgentMap = Arc<dyn DistributedMap<String, BuildAgentInformation>>;
pub type ImageCleanupMap = Arc<dyn DistributedMap<String, DateTime<Utc>>>;
pub type CommandTopic = Arc<dyn DistributedTopic<String>>;

/// Resolve `cell` once; later calls reuse the stored handle.
///
/// The provider returns the same instance for a name, so two threads racing
/// through `resolve` end up storing equivalent handles.
fn memoized<H: Clone>(cell: &OnceLock<H>, resolve: impl FnOnce() -> Result<H>) -> Result<H> {
    if let Some(handle) = cell.get() {
        return Ok(handle.clone());
    }
    let handle = resolve()?;
    Ok(cell.get_or_init(|| handle).clone())
}

/// Build-job view over a [`DataProvider`].
pub struct BuildJobDataAccess<P> {
    provider: Arc<P>,
    build_job_queue: OnceLock<JobQueue>,
    processing_jobs: OnceLock<JobMap>,
    build_result_queue: OnceLock<ResultQueue>,
    build_agent_information: OnceLock<AgentMap>,
    docker_image_cleanup_info: OnceLock<ImageCleanupMap>,
    canceled_build_jobs_topic: OnceLock<CommandTopic>,
    pause_build_agent_topic: OnceLock<CommandTopic>,
    resume_build_agent_topic: OnceLock<CommandTopic>,
}

impl<P: DataProvider> BuildJobDataAccess<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            build_job_queue: OnceLock::new(),
            processing_jobs: OnceLock::new(),
            build_result_queue: OnceLock::new(),
            build_agent_information: OnceLock::new(),
            docker_image_cleanup_info: OnceLock::new(),
            canceled_build_jobs_topic: OnceLock::new(),
            pause_build_agent_topic: OnceLock::new(),
            resume_build_agent_topic: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Jobs waiting for an agent, most urgent first
    pub fn build_job_queue(&self) -> Result<JobQueue> {
        memoized(&self.build_job_queue, || {
            self.provider.get_priority_queue(BUILD_JOB_QUEUE)
        })
    }

    /// Jobs currently running, keyed by job id
    pub fn processing_jobs_map(&self) -> Result<JobMap> {
        memoized(&self.processing_jobs, || self.provider.get_map(PROCESSING_JOBS))
    }

    /// Finished builds awaiting result processing
    pub fn build_result_queue(&self) -> Result<ResultQueue> {
        memoized(&self.build_result_queue, || {
            self.provider.get_queue(BUILD_RESULT_QUEUE)
        })
    }

    /// Agent state keyed by member address
    pub fn build_agent_information_map(&self) -> Result<AgentMap> {
        memoized(&self.build_agent_information, || {
            self.provider.get_map(BUILD_AGENT_INFORMATION)
        })
    }

    /// Last use of each docker image, keyed by image name
    pub fn docker_image_cleanup_info_map(&self) -> Result<ImageCleanupMap> {
        memoized(&self.docker_image_cleanup_info, || {
            self.provider.get_map(DOCKER_IMAGE_CLEANUP_INFO)
        })
    }

    /// Carries ids of jobs to abort
    pub fn canceled_build_jobs_topic(&self) -> Result<CommandTopic> {
        memoized(&self.canceled_build_jobs_topic, || {
            self.provider.get_topic(CANCELED_BUILD_JOBS_TOPIC)
        })
    }

    /// Carries member addresses of agents to pause
    pub fn pause_build_agent_topic(&self) -> Result<CommandTopic> {
        memoized(&self.pause_build_agent_topic, || {
            self.provider.get_topic(PAUSE_BUILD_AGENT_TOPIC)
        })
    }

    /// Carries member addresses of agents to resume
    pub fn resume_build_agent_topic(&self) -> Result<CommandTopic> {
        memoized(&self.resume_build_agent_topic, || {
            self.provider.get_topic(RESUME_BUILD_AGENT_TOPIC)
        })
    }

    /// Ask the agent at `member_address` to stop taking jobs.
    pub fn pause_build_agent(&self, member_address: &str) -> Result<()> {
        self.pause_build_agent_topic()?
            .publish(member_address.to_string());
        Ok(())
    }

    pub fn resume_build_agent(&self, member_address: &str) -> Result<()> {
        self.resume_build_agent_topic()?
            .publish(member_address.to_string());
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Queued jobs in poll order
    pub fn queued_jobs(&self) -> Result<Vec<BuildJobQueueItem>> {
        Ok(self.build_job_queue()?.get_all())
    }

    pub fn queued_jobs_size(&self) -> Result<usize> {
        Ok(self.build_job_queue()?.size())
    }

    pub fn processing_jobs(&self) -> Result<Vec<BuildJobQueueItem>> {
        Ok(self.processing_jobs_map()?.values())
    }

    pub fn processing_jobs_size(&self) -> Result<usize> {
        Ok(self.processing_jobs_map()?.size())
    }

    pub fn processing_job_ids(&self) -> Result<Vec<String>> {
        Ok(self.processing_jobs_map()?.key_set().into_iter().collect())
    }

    pub fn build_results(&self) -> Result<Vec<ResultQueueItem>> {
        Ok(self.build_result_queue()?.get_all())
    }

    pub fn result_queue_size(&self) -> Result<usize> {
        Ok(self.build_result_queue()?.size())
    }

    /// Ids of the jobs whose results are waiting, in queue order
    pub fn result_queue_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .build_results()?
            .into_iter()
            .map(|result| result.build_job.id)
            .collect())
    }

    pub fn build_agent_information(&self) -> Result<Vec<BuildAgentInformation>> {
        Ok(self.build_agent_information_map()?.values())
    }

    pub fn build_agent_information_copy(&self) -> Result<HashMap<String, BuildAgentInformation>> {
        Ok(self.build_agent_information_map()?.map_copy())
    }

    pub fn build_agent_information_size(&self) -> Result<usize> {
        Ok(self.build_agent_information_map()?.size())
    }

    pub fn docker_image_cleanup_info(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        Ok(self.docker_image_cleanup_info_map()?.map_copy())
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn queued_jobs_for_course(&self, course_id: u64) -> Result<Vec<BuildJobQueueItem>> {
        Ok(filter(self.queued_jobs()?, |job| job.course_id == course_id))
    }

    pub fn processing_jobs_for_course(&self, course_id: u64) -> Result<Vec<BuildJobQueueItem>> {
        Ok(filter(self.processing_jobs()?, |job| job.course_id == course_id))
    }

    pub fn queued_jobs_for_participation(
        &self,
        participation_id: u64,
    ) -> Result<Vec<BuildJobQueueItem>> {
        Ok(filter(self.queued_jobs()?, |job| {
            job.participation_id == participation_id
        }))
    }

    pub fn processing_jobs_for_participation(
        &self,
        participation_id: u64,
    ) -> Result<Vec<BuildJobQueueItem>> {
        Ok(filter(self.processing_jobs()?, |job| {
            job.participation_id == participation_id
        }))
    }

    /// Running jobs assigned to the agent at `member_address`. Jobs without
    /// an agent never match.
    pub fn processing_jobs_for_agent(
        &self,
        member_address: &str,
    ) -> Result<Vec<BuildJobQueueItem>> {
        Ok(filter(self.processing_jobs()?, |job| job.runs_on(member_address)))
    }

    pub fn processing_job_ids_for_agent(&self, member_address: &str) -> Result<Vec<String>> {
        Ok(self
            .processing_jobs_for_agent(member_address)?
            .into_iter()
            .map(|job| job.id)
            .collect())
    }

    /// Status of this member's build agent, or `None` if this member never
    /// registered one.
    pub fn local_build_agent_status(&self) -> Result<Option<BuildAgentStatus>> {
        let address = self.provider.local_member_address();
        Ok(self
            .build_agent_information_map()?
            .get(&address)
            .map(|info| info.status))
    }

    // ========================================================================
    // Membership
    // ========================================================================

    #[must_use]
    pub fn is_instance_running(&self) -> bool {
        self.provider.is_instance_running()
    }

    #[must_use]
    pub fn local_member_address(&self) -> String {
        self.provider.local_member_address()
    }

    #[must_use]
    pub fn cluster_member_addresses(&self) -> HashSet<String> {
        self.provider.cluster_member_addresses()
    }

    #[must_use]
    pub fn no_data_member_in_cluster_available(&self) -> bool {
        self.provider.no_data_member_in_cluster_available()
    }
}

fn filter(
    jobs: Vec<BuildJobQueueItem>,
    keep: impl Fn(&BuildJobQueueItem) -> bool,
) -> Vec<BuildJobQueueItem> {
    jobs.into_iter().filter(|job| keep(job)).collect()
}
