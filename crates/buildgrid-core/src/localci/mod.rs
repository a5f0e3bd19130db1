//! Build-job coordination on top of the data provider
//!
//! Jobs wait in a priority queue, move to a processing map while an agent
//! runs them, and finish on a FIFO result queue. Agents publish their state
//! to a map keyed by member address and react to commands on three topics.

pub mod access;
pub mod agent;
pub mod control;
pub mod job;

pub use access::BuildJobDataAccess;
pub use agent::{BuildAgent, BuildAgentInformation, BuildAgentStatus};
pub use control::AgentControl;
pub use job::{BuildJobQueueItem, ResultQueueItem, DEFAULT_PRIORITY};
