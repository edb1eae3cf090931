use super::{ScenarioKind, SimConfig};
use std::str::FromStr;
use tracing::warn;

/// Apply `MOCK_*` environment overrides on top of file/default values.
///
/// `lookup` returns the raw value for a variable name; values that fail to
/// parse are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut SimConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("MOCK_ROBOT_ID") {
        config.robot.robot_id = v;
    }
    if let Some(v) = lookup("MOCK_IMAGE_BASE_URL") {
        config.robot.image_base_url = v;
    }
    if let Some(n) = parsed::<f64, _>(&lookup, "MOCK_BASE_DELAY_MULTIPLIER") {
        config.timing.speed_multiplier = n;
    }
    if let Some(n) = parsed::<f64, _>(&lookup, "MOCK_MIN_DELAY_SECONDS") {
        config.timing.min_delay_seconds = n;
    }
    if let Some(kind) = parsed::<ScenarioKind, _>(&lookup, "MOCK_DEFAULT_SCENARIO") {
        config.scenario.default_scenario = kind;
    }
    if let Some(n) = parsed::<f64, _>(&lookup, "MOCK_FAILURE_RATE") {
        config.scenario.failure_rate = n;
    }
    if let Some(n) = parsed::<f64, _>(&lookup, "MOCK_TIMEOUT_RATE") {
        config.scenario.timeout_rate = n;
    }
    if let Some(n) = parsed::<u64, _>(&lookup, "MOCK_SCENARIO_SEED") {
        config.scenario.seed = Some(n);
    }
    if let Some(n) = parsed::<f64, _>(&lookup, "MOCK_HEARTBEAT_INTERVAL") {
        config.heartbeat.interval_seconds = n;
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = SimConfig::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("MOCK_ROBOT_ID", "talos.009"),
                ("MOCK_BASE_DELAY_MULTIPLIER", "0.01"),
                ("MOCK_DEFAULT_SCENARIO", "failure"),
                ("MOCK_TIMEOUT_RATE", "0.5"),
                ("MOCK_SCENARIO_SEED", "7"),
            ]),
        );

        assert_eq!(config.robot.robot_id, "talos.009");
        assert_eq!(config.timing.speed_multiplier, 0.01);
        assert_eq!(config.scenario.default_scenario, ScenarioKind::Failure);
        assert_eq!(config.scenario.timeout_rate, 0.5);
        assert_eq!(config.scenario.seed, Some(7));
        assert_eq!(config.timing.min_delay_seconds, 0.5);
    }

    #[test]
    fn test_unparsable_override_ignored() {
        let mut config = SimConfig::default();
        apply_env_overrides(&mut config, lookup_from(&[("MOCK_FAILURE_RATE", "often")]));
        assert_eq!(config.scenario.failure_rate, 0.0);
    }
}
