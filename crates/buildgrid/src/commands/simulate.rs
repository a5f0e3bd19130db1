//! Simulate command implementation
//!
//! Runs the whole build-job flow in one process: a scheduler fills the
//! priority queue, agent workers claim jobs under their entry lock, and a
//! result processor drains the result queue as results arrive. Agents obey
//! pause and resume commands, and can pause themselves after repeated
//! failures.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use buildgrid_core::{
    connect,
    localci::{
        AgentControl, BuildAgent, BuildAgentInformation, BuildJobDataAccess,
        BuildJobQueueItem, ResultQueueItem,
    },
    DataProvider, GridConfig, ItemEvent, ListenerId, LocalDataProvider,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Set of agents currently online
pub const ONLINE_BUILD_AGENTS: &str = "onlineBuildAgents";

type Access = BuildJobDataAccess<LocalDataProvider>;

/// Simulate command options
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Jobs to submit
    pub jobs: usize,
    /// Agent workers to start
    pub agents: usize,
    /// Concurrent builds each agent accepts
    pub builds_per_agent: usize,
    /// Jobs canceled through the topic before agents start
    pub cancel: usize,
    /// Every n-th job fails; 0 disables failures
    pub fail_every: usize,
    /// Simulated build duration
    pub build_millis: u64,
    /// Agents (by name) paused through the topic before they start
    pub pause: Vec<String>,
    /// Consecutive failures after which an agent pauses itself; 0 disables
    pub pause_after_failures: usize,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            jobs: 20,
            agents: 3,
            builds_per_agent: 1,
            cancel: 0,
            fail_every: 0,
            build_millis: 5,
            pause: Vec::new(),
            pause_after_failures: 0,
        }
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub submitted: usize,
    pub canceled: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs built per agent name
    pub jobs_per_agent: BTreeMap<String, usize>,
    /// Agents that ended the run paused, by name
    pub paused_agents: Vec<String>,
    /// Jobs left in the queue or processing map afterwards
    pub left_over: usize,
}

impl SimulationSummary {
    /// Results consumed by the result processor
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Run the simulate command
///
/// # Errors
///
/// Returns an error if:
/// - Options are out of range (no agents, no capacity, unknown agent to pause)
/// - The data provider cannot be created from `config`
/// - An agent worker panics
pub async fn run(options: &SimulateOptions, config: &GridConfig) -> Result<SimulationSummary> {
    if options.agents == 0 || options.builds_per_agent == 0 {
        anyhow::bail!("At least one agent with one build slot is required");
    }

    let provider = connect(config).context("Failed to connect data provider")?;
    let access = Arc::new(BuildJobDataAccess::new(Arc::new(provider)));
    let started = Utc::now();

    let agents: Vec<_> = (0..options.agents)
        .map(|n| {
            BuildAgent::new(
                format!("agent-{n}"),
                format!("{}/agent-{n}", access.local_member_address()),
            )
        })
        .collect();
    if let Some(unknown) = options
        .pause
        .iter()
        .find(|name| !agents.iter().any(|agent| &agent.name == *name))
    {
        anyhow::bail!("Unknown agent to pause: {unknown}");
    }

    let results = ResultCounters::default();
    let result_listener = start_result_processor(&access, &results)?;
    let canceled = start_cancel_listener(&access)?;
    let online_listener = watch_online_agents(&access)?;

    let submitted = submit_jobs(&access, options)?;
    cancel_jobs(&access, &submitted, options.cancel)?;

    let controls = agents
        .iter()
        .map(|agent| register_agent(&access, agent, options.builds_per_agent))
        .collect::<Result<Vec<_>>>()?;
    for agent in agents.iter().filter(|agent| options.pause.contains(&agent.name)) {
        access.pause_build_agent(&agent.member_address)?;
    }

    let workers: Vec<_> = agents
        .into_iter()
        .map(|agent| {
            let access = Arc::clone(&access);
            let options = options.clone();
            tokio::task::spawn_blocking(move || run_agent(&access, &agent, &options))
        })
        .collect();

    let mut jobs_per_agent = BTreeMap::new();
    for worker in workers {
        let (name, built) = worker.await.context("Agent worker failed")??;
        jobs_per_agent.insert(name, built);
    }

    controls.into_iter().for_each(AgentControl::unsubscribe);
    access
        .build_result_queue()?
        .remove_listener(result_listener);
    access
        .canceled_build_jobs_topic()?
        .remove_message_listener(canceled.listener);
    access
        .provider()
        .get_set::<String>(ONLINE_BUILD_AGENTS)?
        .remove_listener(online_listener);

    let summary = SimulationSummary {
        submitted: submitted.len(),
        canceled: canceled.count.load(Ordering::SeqCst),
        succeeded: results.succeeded.load(Ordering::SeqCst),
        failed: results.failed.load(Ordering::SeqCst),
        jobs_per_agent,
        paused_agents: paused_agents(&access)?,
        left_over: access.queued_jobs_size()? + access.processing_jobs_size()?,
    };
    info!(
        submitted = summary.submitted,
        processed = summary.processed(),
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "simulation finished"
    );
    Ok(summary)
}

/// Print a human-readable summary
pub fn print_summary(summary: &SimulationSummary) {
    println!("Simulation Summary");
    println!("  Submitted:  {}", summary.submitted);
    println!("  Canceled:   {}", summary.canceled);
    println!("  Succeeded:  {}", summary.succeeded);
    println!("  Failed:     {}", summary.failed);
    println!("  Left over:  {}", summary.left_over);
    if !summary.paused_agents.is_empty() {
        println!("  Paused:     {}", summary.paused_agents.join(", "));
    }
    println!();
    println!("Jobs per agent:");
    for (agent, built) in &summary.jobs_per_agent {
        println!("  {agent}: {built}");
    }
}

#[derive(Default, Clone)]
struct ResultCounters {
    succeeded: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

struct CancelHandle {
    listener: ListenerId,
    count: Arc<AtomicUsize>,
}

/// Consume results as they are added, the way a result processing service
/// drains the queue on every `Added` notification.
fn start_result_processor(
    access: &Access,
    counters: &ResultCounters,
) -> Result<ListenerId> {
    let queue = access.build_result_queue()?;
    let consumer = Arc::clone(&queue);
    let counters = counters.clone();
    Ok(queue.add_item_listener(Arc::new(move |event: &ItemEvent<ResultQueueItem>| {
        if !matches!(event, ItemEvent::Added(_)) {
            return;
        }
        while let Some(result) = consumer.poll() {
            if result.success {
                counters.succeeded.fetch_add(1, Ordering::SeqCst);
            } else {
                warn!(
                    job = result.job_id(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "build failed"
                );
                counters.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    })))
}

/// Remove canceled jobs that are still queued.
fn start_cancel_listener(access: &Access) -> Result<CancelHandle> {
    let topic = access.canceled_build_jobs_topic()?;
    let queue = access.build_job_queue()?;
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let listener = topic.add_message_listener(Arc::new(move |job_id: &String| {
        let matching: Vec<_> = queue
            .get_all()
            .into_iter()
            .filter(|job| &job.id == job_id)
            .collect();
        if queue.remove_all(&matching) {
            debug!(job = %job_id, "canceled queued job");
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));
    Ok(CancelHandle { listener, count })
}

fn watch_online_agents(access: &Access) -> Result<ListenerId> {
    let online = access.provider().get_set::<String>(ONLINE_BUILD_AGENTS)?;
    Ok(online.add_item_listener(Arc::new(|event: &ItemEvent<String>| match event {
        ItemEvent::Added(agent) => info!(%agent, "agent online"),
        ItemEvent::Removed(agent) => info!(%agent, "agent offline"),
    })))
}

fn submit_jobs(access: &Access, options: &SimulateOptions) -> Result<Vec<BuildJobQueueItem>> {
    let jobs: Vec<_> = (0..options.jobs)
        .map(|i| {
            let index = u64::try_from(i).unwrap_or(u64::MAX);
            let priority = i32::try_from(i % 3).unwrap_or_default() + 1;
            BuildJobQueueItem::new(
                format!("job-{i:04}"),
                format!("build #{i}"),
                index % 4,
                index,
            )
            .with_priority(priority)
        })
        .collect();
    access.build_job_queue()?.add_all(jobs.clone());
    info!(count = jobs.len(), "jobs submitted");
    Ok(jobs)
}

fn cancel_jobs(access: &Access, submitted: &[BuildJobQueueItem], count: usize) -> Result<()> {
    let topic = access.canceled_build_jobs_topic()?;
    for job in submitted.iter().rev().take(count) {
        topic.publish(job.id.clone());
    }
    Ok(())
}

fn register_agent(access: &Access, agent: &BuildAgent, builds: usize) -> Result<AgentControl> {
    access.build_agent_information_map()?.put(
        agent.member_address.clone(),
        BuildAgentInformation::new(agent.clone(), builds),
    );
    access
        .provider()
        .get_set::<String>(ONLINE_BUILD_AGENTS)?
        .add(agent.name.clone());
    Ok(AgentControl::subscribe(access, agent)?)
}

fn paused_agents(access: &Access) -> Result<Vec<String>> {
    let mut paused: Vec<_> = access
        .build_agent_information()?
        .into_iter()
        .filter(|info| !info.status.accepts_jobs())
        .map(|info| info.agent.name)
        .collect();
    paused.sort();
    Ok(paused)
}

/// Agent worker: claim, build and report until the queue is empty or the
/// agent is paused.
fn run_agent(
    access: &Access,
    agent: &BuildAgent,
    options: &SimulateOptions,
) -> Result<(String, usize)> {
    let mut built = 0;
    let mut consecutive_failures = 0;
    while let Some(job) = claim_job(access, agent)? {
        std::thread::sleep(Duration::from_millis(options.build_millis));
        let fails = options.fail_every > 0
            && job.participation_id % options.fail_every as u64 == 0;
        finish_job(access, agent, job, fails)?;
        built += 1;

        consecutive_failures = if fails { consecutive_failures + 1 } else { 0 };
        if options.pause_after_failures > 0
            && consecutive_failures >= options.pause_after_failures
        {
            self_pause(access, agent)?;
        }
    }
    access
        .provider()
        .get_set::<String>(ONLINE_BUILD_AGENTS)?
        .remove(&agent.name);
    debug!(agent = %agent, built, "agent drained queue");
    Ok((agent.name.clone(), built))
}

/// Poll one job and record it as running, holding the agent's entry lock so
/// a concurrent pause cannot interleave with the assignment.
fn claim_job(access: &Access, agent: &BuildAgent) -> Result<Option<BuildJobQueueItem>> {
    let agents = access.build_agent_information_map()?;
    let queue = access.build_job_queue()?;
    let processing = access.processing_jobs_map()?;

    let guard = agents.lock(&agent.member_address);
    let Some(mut info) = agents.get(&agent.member_address) else {
        return Ok(None);
    };
    if !info.has_capacity() {
        return Ok(None);
    }
    let Some(job) = queue.poll() else {
        return Ok(None);
    };
    let running = job.assigned_to(agent.clone());
    processing.put(running.id.clone(), running.clone());
    info.start_job(running.id.clone());
    agents.put(agent.member_address.clone(), info);
    agents.unlock(guard);

    debug!(agent = %agent.name, job = %running.id, priority = running.priority, "claimed job");
    Ok(Some(running))
}

fn self_pause(access: &Access, agent: &BuildAgent) -> Result<()> {
    let agents = access.build_agent_information_map()?;
    let guard = agents.lock(&agent.member_address);
    if let Some(mut info) = agents.get(&agent.member_address) {
        if info.self_pause() {
            agents.put(agent.member_address.clone(), info);
            warn!(agent = %agent, "build agent paused itself after repeated failures");
        }
    }
    agents.unlock(guard);
    Ok(())
}

fn finish_job(
    access: &Access,
    agent: &BuildAgent,
    job: BuildJobQueueItem,
    fails: bool,
) -> Result<()> {
    let agents = access.build_agent_information_map()?;
    let guard = agents.lock(&agent.member_address);
    if let Some(mut info) = agents.get(&agent.member_address) {
        info.finish_job(&job.id);
        agents.put(agent.member_address.clone(), info);
    }
    agents.unlock(guard);

    access.processing_jobs_map()?.remove(&job.id);
    let result = if fails {
        ResultQueueItem::failed(job, "simulated build failure")
    } else {
        ResultQueueItem::succeeded(job)
    };
    access.build_result_queue()?.add(result);
    Ok(())
}
