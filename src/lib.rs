// Configuration (TOML file + MOCK_* environment overrides)
pub mod config;

// Command handling and long-running task tracking
pub mod dispatcher;

// NATS transport
pub mod mq;

// Precondition checks against the world state
pub mod precondition;

// Wire protocol: commands, results, entity updates
pub mod protocol;

// Fault injection
pub mod scenario;

// Task simulators
pub mod simulator;

// Entity state store
pub mod state;
