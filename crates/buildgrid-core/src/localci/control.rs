//! Pause and resume commands for a single agent

use std::sync::Arc;

use tracing::{debug, info};

use super::{
    access::{AgentMap, BuildJobDataAccess, CommandTopic},
    agent::{BuildAgent, BuildAgentInformation},
};
use crate::{
    api::{DataProvider, DistributedMap, DistributedTopic},
    listener::{ListenerId, MessageListener},
    Result,
};

/// Subscription of one agent to the pause and resume topics.
///
/// Commands carry the member address of the agent they target; commands for
/// other agents are ignored. The status is changed under the agent's entry
/// lock in the agent map, the same lock a job claim holds, so a claim either
/// completes before the pause or sees the paused status.
pub struct AgentControl {
    pause_topic: CommandTopic,
    resume_topic: CommandTopic,
    pause_listener: ListenerId,
    resume_listener: ListenerId,
}

impl AgentControl {
    pub fn subscribe<P: DataProvider>(
        access: &BuildJobDataAccess<P>,
        agent: &BuildAgent,
    ) -> Result<Self> {
        let agents = access.build_agent_information_map()?;
        let pause_topic = access.pause_build_agent_topic()?;
        let resume_topic = access.resume_build_agent_topic()?;
        let pause_listener = pause_topic.add_message_listener(command_listener(
            &agents,
            agent,
            BuildAgentInformation::pause,
            "paused",
        ));
        let resume_listener = resume_topic.add_message_listener(command_listener(
            &agents,
            agent,
            BuildAgentInformation::resume,
            "resumed",
        ));
        Ok(Self {
            pause_topic,
            resume_topic,
            pause_listener,
            resume_listener,
        })
    }

    /// Stop reacting to commands.
    pub fn unsubscribe(self) {
        self.pause_topic.remove_message_listener(self.pause_listener);
        self.resume_topic
            .remove_message_listener(self.resume_listener);
    }
}

fn command_listener(
    agents: &AgentMap,
    agent: &BuildAgent,
    apply: fn(&mut BuildAgentInformation) -> bool,
    action: &'static str,
) -> MessageListener<String> {
    let agents = Arc::clone(agents);
    let agent = agent.clone();
    Arc::new(move |address: &String| {
        if *address != agent.member_address {
            return;
        }
        let guard = agents.lock(address);
        match agents.get(address) {
            Some(mut state) => {
                if apply(&mut state) {
                    agents.put(address.clone(), state);
                    info!(agent = %agent, "build agent {action}");
                } else {
                    debug!(agent = %agent, "build agent already {action}");
                }
            }
            None => debug!(agent = %agent, "command for unregistered build agent"),
        }
        agents.unlock(guard);
    })
}
