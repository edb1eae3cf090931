use crate::mq::publisher::Publisher;
use crate::protocol::{HeartbeatMessage, LogMessage, RobotResult};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A message captured by [`MemoryPublisher`]
#[derive(Clone, Debug, PartialEq)]
pub enum Published {
    Result(RobotResult),
    Log(LogMessage),
    Heartbeat(HeartbeatMessage),
}

/// Publisher that keeps everything in memory, in publish order.
///
/// Used to run the simulator without a broker.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<Published>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn messages(&self) -> Vec<Published> {
        self.lock().clone()
    }

    pub fn results(&self) -> Vec<RobotResult> {
        self.lock()
            .iter()
            .filter_map(|m| match m {
                Published::Result(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<LogMessage> {
        self.lock()
            .iter()
            .filter_map(|m| match m {
                Published::Log(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn heartbeats(&self) -> Vec<HeartbeatMessage> {
        self.lock()
            .iter()
            .filter_map(|m| match m {
                Published::Heartbeat(h) => Some(h.clone()),
                _ => None,
            })
            .collect()
    }

    /// Logs and results for one task, in order
    pub fn for_task(&self, task_id: &str) -> Vec<Published> {
        self.lock()
            .iter()
            .filter(|m| match m {
                Published::Result(r) => r.task_id == task_id,
                Published::Log(l) => l.task_id == task_id,
                Published::Heartbeat(_) => false,
            })
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Published>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish_result(&self, result: &RobotResult) -> Result<()> {
        self.lock().push(Published::Result(result.clone()));
        Ok(())
    }

    async fn publish_log(&self, log: &LogMessage) -> Result<()> {
        self.lock().push(Published::Log(log.clone()));
        Ok(())
    }

    async fn publish_heartbeat(&self, heartbeat: &HeartbeatMessage) -> Result<()> {
        self.lock().push(Published::Heartbeat(heartbeat.clone()));
        Ok(())
    }
}
