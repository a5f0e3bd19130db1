//! Build-job lifecycle across the shared structures
//!
//! Jobs move from the priority queue, through the processing map, to the
//! result queue, while agents publish their state and obey topic commands.

#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use buildgrid_core::{
    connect,
    localci::{
        AgentControl, BuildAgent, BuildAgentInformation, BuildAgentStatus, BuildJobDataAccess,
        BuildJobQueueItem, ResultQueueItem,
    },
    GridConfig, ItemEvent, LocalDataProvider,
};

fn access(member_address: &str) -> BuildJobDataAccess<LocalDataProvider> {
    let config = GridConfig {
        member_address: member_address.to_string(),
        ..GridConfig::default()
    };
    BuildJobDataAccess::new(Arc::new(connect(&config).unwrap()))
}

/// Take one job for `agent`: move it to the processing map and record it on
/// the agent's entry while holding that entry's lock.
fn claim_job(
    access: &BuildJobDataAccess<LocalDataProvider>,
    agent: &BuildAgent,
) -> Option<BuildJobQueueItem> {
    let agents = access.build_agent_information_map().unwrap();
    let guard = agents.lock(&agent.member_address);
    let mut info = agents.get(&agent.member_address)?;
    if !info.has_capacity() {
        return None;
    }
    let job = access.build_job_queue().unwrap().poll()?;
    let running = job.assigned_to(agent.clone());
    access
        .processing_jobs_map()
        .unwrap()
        .put(running.id.clone(), running.clone());
    info.start_job(running.id.clone());
    agents.put(agent.member_address.clone(), info);
    agents.unlock(guard);
    Some(running)
}

fn finish_job(
    access: &BuildJobDataAccess<LocalDataProvider>,
    agent: &BuildAgent,
    job: BuildJobQueueItem,
) {
    let agents = access.build_agent_information_map().unwrap();
    let guard = agents.lock(&agent.member_address);
    if let Some(mut info) = agents.get(&agent.member_address) {
        info.finish_job(&job.id);
        agents.put(agent.member_address.clone(), info);
    }
    agents.unlock(guard);
    access.processing_jobs_map().unwrap().remove(&job.id);
    access
        .build_result_queue()
        .unwrap()
        .add(ResultQueueItem::succeeded(job));
}

// ════════════════════════════════════════════════════════════════════════
// Single agent
// ════════════════════════════════════════════════════════════════════════

/// GIVEN: an idle agent and jobs of mixed priority
/// WHEN: the agent claims a job
/// THEN: the most urgent job runs, the agent turns active, the job is visible
///       in the processing map under the agent's address
#[test]
fn agent_claims_most_urgent_job() {
    let access = access("node-a");
    let agent = BuildAgent::new("agent-a", "node-a");
    access
        .build_agent_information_map()
        .unwrap()
        .put("node-a".to_string(), BuildAgentInformation::new(agent.clone(), 1));

    let queue = access.build_job_queue().unwrap();
    queue.add(BuildJobQueueItem::new("routine", "routine", 1, 1).with_priority(3));
    queue.add(BuildJobQueueItem::new("exam", "exam", 1, 2).with_priority(1));

    let running = claim_job(&access, &agent).unwrap();
    assert_eq!(running.id, "exam");
    assert_eq!(access.local_build_agent_status().unwrap(), Some(BuildAgentStatus::Active));
    assert_eq!(access.processing_job_ids_for_agent("node-a").unwrap(), vec!["exam"]);

    // At capacity: the routine job stays queued.
    assert!(claim_job(&access, &agent).is_none());
    assert_eq!(access.queued_jobs_size().unwrap(), 1);

    finish_job(&access, &agent, running);
    assert_eq!(access.local_build_agent_status().unwrap(), Some(BuildAgentStatus::Idle));
    assert_eq!(access.processing_jobs_size().unwrap(), 0);
    assert_eq!(access.result_queue_ids().unwrap(), vec!["exam"]);
}

/// GIVEN: an agent subscribed to the pause and resume topics
/// WHEN: it is paused through `pauseBuildAgentTopic` and later resumed
/// THEN: it claims nothing while paused and the waiting job after resuming
#[test]
fn paused_agent_claims_nothing_until_resumed() {
    let access = access("node-a");
    let agent = BuildAgent::new("agent-a", "node-a");
    access
        .build_agent_information_map()
        .unwrap()
        .put("node-a".to_string(), BuildAgentInformation::new(agent.clone(), 2));
    let control = AgentControl::subscribe(&access, &agent).unwrap();

    access.pause_build_agent("node-a").unwrap();
    access
        .build_job_queue()
        .unwrap()
        .add(BuildJobQueueItem::new("job-1", "job", 1, 1));
    assert!(claim_job(&access, &agent).is_none());
    assert_eq!(access.queued_jobs_size().unwrap(), 1);
    assert_eq!(access.local_build_agent_status().unwrap(), Some(BuildAgentStatus::Paused));

    access.resume_build_agent("node-a").unwrap();
    let running = claim_job(&access, &agent).unwrap();
    assert_eq!(running.id, "job-1");
    assert_eq!(access.local_build_agent_status().unwrap(), Some(BuildAgentStatus::Active));
    control.unsubscribe();
}

// ════════════════════════════════════════════════════════════════════════
// Many agents
// ════════════════════════════════════════════════════════════════════════

/// GIVEN: 50 queued jobs and 4 agent threads
/// WHEN: agents claim and finish jobs until the queue drains
/// THEN: every job is processed exactly once and a result-queue listener
///       consumes every result
#[test]
fn concurrent_agents_process_each_job_once() {
    let access = Arc::new(access("node-0"));
    let processed = Arc::new(AtomicUsize::new(0));

    let results = access.build_result_queue().unwrap();
    let consumer_queue = Arc::clone(&results);
    let counter = Arc::clone(&processed);
    results.add_item_listener(Arc::new(move |event: &ItemEvent<ResultQueueItem>| {
        if matches!(event, ItemEvent::Added(_)) && consumer_queue.poll().is_some() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let queue = access.build_job_queue().unwrap();
    for i in 0..50 {
        let job = BuildJobQueueItem::new(format!("job-{i:02}"), "job", i % 3, i)
            .with_priority(i32::try_from(i % 4).unwrap());
        queue.add(job);
    }

    let agents: Vec<_> = (0..4)
        .map(|n| {
            let agent = BuildAgent::new(format!("agent-{n}"), format!("node-{n}"));
            access.build_agent_information_map().unwrap().put(
                agent.member_address.clone(),
                BuildAgentInformation::new(agent.clone(), 2),
            );
            let access = Arc::clone(&access);
            thread::spawn(move || {
                let mut handled = Vec::new();
                while let Some(job) = claim_job(&access, &agent) {
                    handled.push(job.id.clone());
                    finish_job(&access, &agent, job);
                }
                handled
            })
        })
        .collect();

    let mut handled: Vec<String> = agents
        .into_iter()
        .flat_map(|agent| agent.join().unwrap())
        .collect();
    handled.sort();
    handled.dedup();

    assert_eq!(handled.len(), 50);
    assert_eq!(processed.load(Ordering::SeqCst), 50);
    assert!(access.queued_jobs().unwrap().is_empty());
    assert_eq!(access.processing_jobs_size().unwrap(), 0);
    assert_eq!(access.result_queue_size().unwrap(), 0);
    assert!(access
        .build_agent_information()
        .unwrap()
        .iter()
        .all(|info| info.status == BuildAgentStatus::Idle));
}
