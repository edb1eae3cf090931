use crate::protocol::{EvaporationProfile, EvaporationProfiles};
use rand::Rng;
use std::time::Duration;

/// Intermediate progress updates emitted for a long-running task
pub const MIN_PROGRESS_UPDATES: u32 = 3;

/// Randomized delay: `max(uniform(base_min, base_max) * multiplier, min_delay)`
pub fn calculate_delay<R: Rng + ?Sized>(
    rng: &mut R,
    base_min: f64,
    base_max: f64,
    multiplier: f64,
    min_delay: f64,
) -> f64 {
    let base = if base_max > base_min {
        rng.gen_range(base_min..=base_max)
    } else {
        base_min
    };
    (base * multiplier).max(min_delay)
}

/// Column chromatography run length in (scaled) seconds
pub fn cc_duration(run_minutes: u32, multiplier: f64) -> f64 {
    f64::from(run_minutes) * 60.0 * multiplier
}

/// Unscaled evaporation run length and the update profile that set it.
///
/// The first `time_in_sec` among `updates[*].trigger` wins, then the legacy
/// `stop.trigger`, then 30 minutes.
pub fn evaporation_schedule(profiles: &EvaporationProfiles) -> (f64, Option<&EvaporationProfile>) {
    for profile in &profiles.updates {
        if let Some(secs) = profile.trigger.as_ref().and_then(|t| t.time_in_sec) {
            return (secs as f64, Some(profile));
        }
    }

    if let Some(secs) = profiles
        .stop
        .as_ref()
        .and_then(|s| s.trigger.as_ref())
        .and_then(|t| t.time_in_sec)
    {
        return (secs as f64, None);
    }

    (30.0 * 60.0, None)
}

/// Spacing between progress updates, never below one second
pub fn intermediate_interval(total: f64) -> f64 {
    if total <= 0.0 {
        return 1.0;
    }
    (total / f64::from(MIN_PROGRESS_UPDATES + 1)).max(1.0)
}

/// Drives the progress phase of a long-running task.
///
/// Each `tick` sleeps one interval (clamped to the remaining time) and
/// yields the elapsed seconds while the run is still in progress; the
/// final sleep yields `None`.
pub struct ProgressTicker {
    total: f64,
    interval: f64,
    elapsed: f64,
}

impl ProgressTicker {
    pub fn new(total: f64) -> Self {
        Self {
            total,
            interval: intermediate_interval(total),
            elapsed: 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Completed fraction in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.total <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.total).min(1.0)
        }
    }

    pub async fn tick(&mut self) -> Option<f64> {
        if self.elapsed >= self.total {
            return None;
        }
        let step = self.interval.min(self.total - self.elapsed);
        tokio::time::sleep(Duration::from_secs_f64(step)).await;
        self.elapsed += step;

        if self.elapsed < self.total {
            Some(self.elapsed)
        } else {
            None
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EvaporationTrigger, LegacyStopProfile, TriggerKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(secs: Option<u64>, temp: f64) -> EvaporationProfile {
        EvaporationProfile {
            lower_height: 60.0,
            rpm: 120,
            target_temperature: temp,
            target_pressure: 200.0,
            trigger: secs.map(|s| EvaporationTrigger {
                kind: TriggerKind::TimeFromStart,
                time_in_sec: Some(s),
                event_name: None,
            }),
        }
    }

    #[test]
    fn test_delay_respects_floor_and_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = calculate_delay(&mut rng, 15.0, 30.0, 0.1, 0.5);
            assert!((1.5..=3.0).contains(&d));
        }
        assert_eq!(calculate_delay(&mut rng, 3.0, 5.0, 0.1, 0.5), 0.5);
    }

    #[test]
    fn test_cc_duration() {
        assert_eq!(cc_duration(30, 0.1), 180.0);
        assert_eq!(cc_duration(0, 1.0), 0.0);
    }

    #[test]
    fn test_evaporation_schedule_prefers_updates() {
        let profiles = EvaporationProfiles {
            start: profile(None, 40.0),
            updates: vec![profile(None, 45.0), profile(Some(900), 50.0)],
            stop: Some(LegacyStopProfile {
                trigger: profile(Some(600), 0.0).trigger,
            }),
        };
        let (secs, from) = evaporation_schedule(&profiles);
        assert_eq!(secs, 900.0);
        assert_eq!(from.map(|p| p.target_temperature), Some(50.0));
    }

    #[test]
    fn test_evaporation_schedule_fallbacks() {
        let mut profiles = EvaporationProfiles {
            start: profile(None, 40.0),
            updates: Vec::new(),
            stop: Some(LegacyStopProfile {
                trigger: profile(Some(600), 0.0).trigger,
            }),
        };
        assert_eq!(evaporation_schedule(&profiles).0, 600.0);
        assert!(evaporation_schedule(&profiles).1.is_none());

        profiles.stop = None;
        assert_eq!(evaporation_schedule(&profiles).0, 1800.0);
    }

    #[test]
    fn test_intermediate_interval() {
        assert_eq!(intermediate_interval(180.0), 45.0);
        assert_eq!(intermediate_interval(2.0), 1.0);
        assert_eq!(intermediate_interval(0.0), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_yields_three_ticks() {
        let start = tokio::time::Instant::now();
        let mut ticker = ProgressTicker::new(180.0);
        let mut ticks = Vec::new();
        while let Some(elapsed) = ticker.tick().await {
            ticks.push(elapsed);
        }
        assert_eq!(ticks, vec![45.0, 90.0, 135.0]);
        assert!(start.elapsed() >= Duration::from_secs(180));
        assert!(start.elapsed() < Duration::from_secs(181));
        assert_eq!(ticker.progress(), 1.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(32.549), 32.5);
        assert_eq!(round1(606.56), 606.6);
    }
}
