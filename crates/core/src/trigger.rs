//! Pure decisions behind the watch/reveal state machine.

use std::fmt;

use crate::player::PlayerInstance;

/// One reading of the player's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSample {
    pub current_time: f64,
    pub autoplay_pending: bool,
}

impl PlaybackSample {
    /// Missing or non-finite times read as 0.
    #[must_use]
    pub fn new(current_time: Option<f64>, autoplay_pending: bool) -> Self {
        let current_time = current_time.filter(|t| t.is_finite()).unwrap_or(0.0);
        Self {
            current_time,
            autoplay_pending,
        }
    }

    #[must_use]
    pub fn read(instance: &dyn PlayerInstance) -> Self {
        Self::new(instance.current_time(), instance.autoplay_pending())
    }

    /// Muted autoplay previews report a frozen zero; those samples are ignored.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_stalled_autoplay(&self) -> bool {
        self.autoplay_pending && self.current_time == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickDecision {
    AlreadyRevealed,
    StalledAutoplay,
    Waiting { remaining: f64 },
    Reached { at: f64 },
}

#[must_use]
pub fn evaluate_tick(revealed: bool, sample: PlaybackSample, threshold: f64) -> TickDecision {
    if revealed {
        return TickDecision::AlreadyRevealed;
    }
    if sample.is_stalled_autoplay() {
        return TickDecision::StalledAutoplay;
    }
    if sample.current_time >= threshold {
        TickDecision::Reached {
            at: sample.current_time,
        }
    } else {
        TickDecision::Waiting {
            remaining: remaining_seconds(sample.current_time, threshold),
        }
    }
}

/// Seconds left until the threshold, never negative.
#[must_use]
pub fn remaining_seconds(current_time: f64, threshold: f64) -> f64 {
    (threshold - current_time).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStep {
    Attach,
    Retry { attempt: u32 },
    Exhausted,
}

/// What a discovery pass should do given whether an instance turned up.
#[must_use]
pub fn next_discovery_step(found: bool, attempts: u32, max_attempts: u32) -> DiscoveryStep {
    if found {
        DiscoveryStep::Attach
    } else if attempts < max_attempts {
        DiscoveryStep::Retry {
            attempt: attempts + 1,
        }
    } else {
        DiscoveryStep::Exhausted
    }
}

/// Why the one-shot latch closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RevealReason {
    PersistedFlag,
    ThresholdReached { at: f64 },
    DiscoveryExhausted { attempts: u32 },
    Manual,
}

impl fmt::Display for RevealReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersistedFlag => f.write_str("persisted flag"),
            Self::ThresholdReached { at } => write!(f, "threshold reached at {at:.1}s"),
            Self::DiscoveryExhausted { attempts } => {
                write!(f, "no player after {attempts} retries")
            }
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_time_reads_as_zero() {
        assert_eq!(PlaybackSample::new(None, false).current_time, 0.0);
        assert_eq!(PlaybackSample::new(Some(f64::NAN), false).current_time, 0.0);
    }

    #[test]
    fn stalled_autoplay_is_skipped_even_at_zero_threshold() {
        let sample = PlaybackSample::new(Some(0.0), true);
        assert_eq!(evaluate_tick(false, sample, 0.0), TickDecision::StalledAutoplay);
    }

    #[test]
    fn autoplay_with_progress_still_triggers() {
        let sample = PlaybackSample::new(Some(0.5), true);
        assert_eq!(
            evaluate_tick(false, sample, 0.5),
            TickDecision::Reached { at: 0.5 }
        );
    }

    #[test]
    fn revealed_short_circuits() {
        let sample = PlaybackSample::new(Some(100.0), false);
        assert_eq!(evaluate_tick(true, sample, 5.0), TickDecision::AlreadyRevealed);
    }

    #[test]
    fn remaining_is_clamped() {
        assert_eq!(remaining_seconds(10.0, 5.0), 0.0);
        assert_eq!(remaining_seconds(2.0, 5.0), 3.0);
    }

    #[test]
    fn discovery_steps() {
        assert_eq!(next_discovery_step(true, 0, 0), DiscoveryStep::Attach);
        assert_eq!(next_discovery_step(false, 0, 0), DiscoveryStep::Exhausted);
        assert_eq!(
            next_discovery_step(false, 2, 3),
            DiscoveryStep::Retry { attempt: 3 }
        );
        assert_eq!(next_discovery_step(false, 3, 3), DiscoveryStep::Exhausted);
    }

    proptest! {
        #[test]
        fn reveal_iff_time_meets_threshold(
            threshold in 0.0f64..5000.0,
            time in 0.0f64..5000.0,
            autoplay in any::<bool>(),
        ) {
            let sample = PlaybackSample::new(Some(time), autoplay);
            let reached = matches!(
                evaluate_tick(false, sample, threshold),
                TickDecision::Reached { .. }
            );
            let stalled = autoplay && time == 0.0;
            prop_assert_eq!(reached, time >= threshold && !stalled);
        }

        #[test]
        fn zero_time_autoplay_never_reveals(threshold in 0.0f64..5000.0) {
            let sample = PlaybackSample::new(Some(0.0), true);
            prop_assert_eq!(
                evaluate_tick(false, sample, threshold),
                TickDecision::StalledAutoplay
            );
        }

        #[test]
        fn retries_never_exceed_budget(attempts in 0u32..100, max in 0u32..100) {
            match next_discovery_step(false, attempts, max) {
                DiscoveryStep::Retry { attempt } => prop_assert!(attempt <= max),
                DiscoveryStep::Exhausted => prop_assert!(attempts >= max),
                DiscoveryStep::Attach => prop_assert!(false, "nothing was found"),
            }
        }
    }
}
