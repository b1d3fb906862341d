// src/recognition/state_machine.rs
//
// Debounce for raw classifier labels. Overlapping windows make consecutive
// predictions highly correlated, so a label is only reported once it has
// been predicted `confirmation_threshold` times in a row.

use tracing::debug;

/// Confidence added per consecutive agreeing prediction.
pub const CONFIDENCE_STEP: u32 = 30;
/// Upper bound of the reported confidence.
pub const CONFIDENCE_CAP: u32 = 95;

/// Heuristic confidence for a confirmed gesture: `min(count * 30, 95)`.
///
/// This is a monotonic mapping of the agreement count to a capped
/// percentage, not a calibrated probability.
pub fn confidence_for(count: u32) -> u8 {
    count.saturating_mul(CONFIDENCE_STEP).min(CONFIDENCE_CAP) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Candidate { label: String, count: u32 },
}

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    pub confirmation_threshold: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedGesture {
    pub label: String,
    pub confidence: u8,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct GestureDebouncer {
    config: DebounceConfig,
    state: DebounceState,
}

impl GestureDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            state: DebounceState::Idle,
        }
    }

    /// Feed one classifier prediction. Returns the gesture when the
    /// prediction streak has reached the threshold.
    pub fn observe(&mut self, label: &str) -> Option<ConfirmedGesture> {
        let count = match &mut self.state {
            DebounceState::Candidate {
                label: current,
                count,
            } if current.as_str() == label => {
                *count = count.saturating_add(1);
                *count
            }
            _ => {
                self.state = DebounceState::Candidate {
                    label: label.to_string(),
                    count: 1,
                };
                1
            }
        };

        if count >= self.config.confirmation_threshold {
            let confidence = confidence_for(count);
            debug!(label, count, confidence, "gesture confirmed");
            Some(ConfirmedGesture {
                label: label.to_string(),
                confidence,
                count,
            })
        } else {
            debug!(label, count, "gesture candidate");
            None
        }
    }

    pub fn reset(&mut self) {
        self.state = DebounceState::Idle;
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    /// Last predicted label (confirmed or not).
    pub fn last_label(&self) -> Option<&str> {
        match &self.state {
            DebounceState::Idle => None,
            DebounceState::Candidate { label, .. } => Some(label),
        }
    }

    /// Consecutive agreeing predictions for the current label.
    pub fn confirmations(&self) -> u32 {
        match &self.state {
            DebounceState::Idle => 0,
            DebounceState::Candidate { count, .. } => *count,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.config.confirmation_threshold
    }
}

impl Default for GestureDebouncer {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer(threshold: u32) -> GestureDebouncer {
        GestureDebouncer::new(DebounceConfig {
            confirmation_threshold: threshold,
        })
    }

    #[test]
    fn test_confirms_exactly_at_threshold() {
        for threshold in 1..=6 {
            let mut sm = debouncer(threshold);
            for i in 1..threshold {
                assert!(sm.observe("sim").is_none(), "confirmed early at {}", i);
            }
            let confirmed = sm.observe("sim").expect("should confirm at threshold");
            assert_eq!(confirmed.label, "sim");
            assert_eq!(confirmed.count, threshold);
        }
    }

    #[test]
    fn test_alternating_labels_never_confirm() {
        let mut sm = debouncer(2);
        for i in 0..100 {
            let label = if i % 2 == 0 { "sim" } else { "nao" };
            assert!(sm.observe(label).is_none());
            assert_eq!(sm.confirmations(), 1);
        }
    }

    #[test]
    fn test_label_change_restarts_count() {
        let mut sm = debouncer(2);
        sm.observe("ola");
        assert!(sm.observe("ola").is_some());
        assert!(sm.observe("sim").is_none());
        assert_eq!(
            sm.state(),
            &DebounceState::Candidate {
                label: "sim".to_string(),
                count: 1
            }
        );
        assert_eq!(sm.observe("sim").unwrap().confidence, 60);
    }

    #[test]
    fn test_confidence_formula() {
        assert_eq!(confidence_for(0), 0);
        assert_eq!(confidence_for(1), 30);
        assert_eq!(confidence_for(2), 60);
        assert_eq!(confidence_for(3), 90);
        assert_eq!(confidence_for(4), 95);
        assert_eq!(confidence_for(u32::MAX), 95);
    }

    #[test]
    fn test_confidence_stays_in_range_over_long_streak() {
        let mut sm = debouncer(2);
        for _ in 0..1000 {
            if let Some(confirmed) = sm.observe("ola") {
                assert!(confirmed.confidence <= 95);
            }
        }
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut sm = debouncer(2);
        sm.observe("ola");
        sm.reset();
        assert_eq!(sm.state(), &DebounceState::Idle);
        assert!(sm.last_label().is_none());
        assert!(sm.observe("ola").is_none());
    }
}
