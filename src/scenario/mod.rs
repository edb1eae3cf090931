// Scenario injection: random timeouts and hardware faults

mod failures;

pub use failures::{failure_code_base, failure_messages};

use crate::config::{ScenarioConfig, ScenarioKind};
use crate::protocol::{RobotResult, TaskType};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// RNG shared by the injector and the simulators
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Build the shared RNG, seeded when a seed is configured
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}

pub(crate) fn lock_rng(rng: &SharedRng) -> MutexGuard<'_, StdRng> {
    rng.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decides whether a task times out, fails, or runs normally.
///
/// Timeout is always evaluated before failure.
pub struct ScenarioInjector {
    config: ScenarioConfig,
    rng: SharedRng,
}

impl ScenarioInjector {
    pub fn new(config: ScenarioConfig, rng: SharedRng) -> Self {
        Self { config, rng }
    }

    /// True when the task should be swallowed without any reply
    pub fn should_timeout(&self, task_type: TaskType) -> bool {
        if self.config.timeout_rate > 0.0 && self.roll() < self.config.timeout_rate {
            info!(task_type = %task_type, "Scenario: timeout injected");
            return true;
        }
        false
    }

    pub fn should_fail(&self, task_type: TaskType) -> bool {
        if self.config.failure_rate > 0.0 && self.roll() < self.config.failure_rate {
            info!(task_type = %task_type, "Scenario: failure injected");
            return true;
        }
        if self.config.default_scenario == ScenarioKind::Failure {
            info!(task_type = %task_type, "Scenario: failure (default)");
            return true;
        }
        false
    }

    /// Failure result with a task-specific code and message; never touches state
    pub fn failure_result(&self, task_id: &str, task_type: TaskType) -> RobotResult {
        let (code, msg) = {
            let mut rng = lock_rng(&self.rng);
            let code = failure_code_base(task_type) + rng.gen_range(0..=9);
            let msg = failure_messages(task_type)
                .choose(&mut *rng)
                .copied()
                .unwrap_or("Unexpected hardware fault");
            (code, msg)
        };

        warn!(
            task_id = %task_id,
            task_type = %task_type,
            code = code,
            msg = %msg,
            "Generated failure result"
        );

        RobotResult::error(task_id, code, msg)
    }

    fn roll(&self) -> f64 {
        lock_rng(&self.rng).gen::<f64>()
    }
}
