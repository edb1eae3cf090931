// NATS transport: command consumer, result/log publisher, heartbeat

mod client;
mod consumer;
mod heartbeat;
mod memory;
mod publisher;

pub use client::{NatsClient, NatsConfig, Subjects};
pub use consumer::{run_consumer, CONSUMER_NAME};
pub use heartbeat::{current_heartbeat, run_heartbeat};
pub use memory::{MemoryPublisher, Published};
pub use publisher::{NatsPublisher, Publisher};
