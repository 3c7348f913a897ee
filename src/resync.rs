use crate::cue::{Cue, CueStore};
use log::{debug, trace};

/// Shift every cue by `delta_ms`, clamping times at zero.
pub fn resync(store: &CueStore, delta_ms: i64) -> CueStore {
    if delta_ms == 0 {
        return store.clone();
    }
    trace!("Offsetting {} cues by {}ms", store.len(), delta_ms);

    let cues = store
        .iter()
        .map(|cue| Cue {
            start: cue.start.saturating_add_signed(delta_ms),
            end: cue.end.saturating_add_signed(delta_ms),
            text: cue.text.clone(),
        })
        .collect();
    CueStore::from_cues(cues)
}

/// User-controlled subtitle delay.
///
/// The target moves freely; it only reaches the cues when a resync folds the
/// not-yet-applied part into the raw store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsDelay {
    target_ms: i64,
    applied_ms: i64,
    step_ms: i64,
}

impl SubsDelay {
    pub fn new(initial_ms: i64, step_ms: i64) -> Self {
        Self {
            target_ms: initial_ms,
            applied_ms: 0,
            step_ms: step_ms.abs().max(1),
        }
    }

    pub fn target_ms(&self) -> i64 {
        self.target_ms
    }

    pub fn applied_ms(&self) -> i64 {
        self.applied_ms
    }

    pub fn set(&mut self, delay_ms: i64) {
        debug!("Subtitle delay set to {}ms", delay_ms);
        self.target_ms = delay_ms;
    }

    pub fn step_forward(&mut self) {
        self.set(self.target_ms.saturating_add(self.step_ms));
    }

    pub fn step_backward(&mut self) {
        self.set(self.target_ms.saturating_sub(self.step_ms));
    }

    /// Offset still to be folded into the cues; marks it applied.
    pub fn take_pending(&mut self) -> i64 {
        let pending = self.target_ms.saturating_sub(self.applied_ms);
        self.applied_ms = self.target_ms;
        pending
    }

    /// A freshly fetched store carries no offset yet.
    pub fn rebase(&mut self) {
        self.applied_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(cues: &[(u64, u64, &str)]) -> CueStore {
        CueStore::from_cues(cues.iter().map(|&(s, e, t)| Cue::new(s, e, t)).collect())
    }

    #[test]
    fn test_resync_shifts_forward() {
        let shifted = resync(&store(&[(0, 1_000, "Hi")]), 500);
        assert_eq!(shifted, store(&[(500, 1_500, "Hi")]));
    }

    #[test]
    fn test_resync_clamps_at_zero() {
        let shifted = resync(&store(&[(200, 1_000, "a"), (2_000, 3_000, "b")]), -500);
        assert_eq!(shifted, store(&[(0, 500, "a"), (1_500, 2_500, "b")]));

        let shifted = resync(&store(&[(200, 400, "a")]), -1_000);
        assert_eq!(shifted, store(&[(0, 0, "a")]));
    }

    #[test]
    fn test_resync_composes_without_clamping() {
        let original = store(&[(1_000, 2_000, "a"), (5_000, 6_500, "b")]);
        for (d1, d2) in [(300, 200), (-400, 900), (250, -750), (-1_000, 1_000)] {
            assert_eq!(
                resync(&resync(&original, d1), d2),
                resync(&original, d1 + d2),
                "d1={d1} d2={d2}"
            );
        }
    }

    #[test]
    fn test_resync_composition_after_clamp_loses_offset() {
        let original = store(&[(100, 300, "a")]);
        let clamped = resync(&resync(&original, -200), 200);
        assert_eq!(clamped, store(&[(200, 300, "a")]));
        assert_ne!(clamped, resync(&original, 0));
    }

    #[test]
    fn test_delay_only_applies_pending_part() {
        let mut delay = SubsDelay::new(0, 250);
        delay.set(500);
        assert_eq!(delay.take_pending(), 500);
        assert_eq!(delay.take_pending(), 0);

        delay.step_backward();
        delay.step_backward();
        assert_eq!(delay.target_ms(), 0);
        assert_eq!(delay.take_pending(), -500);
        assert_eq!(delay.applied_ms(), 0);
    }

    #[test]
    fn test_rebase_reapplies_full_delay() {
        let mut delay = SubsDelay::new(750, 250);
        assert_eq!(delay.take_pending(), 750);
        delay.rebase();
        assert_eq!(delay.take_pending(), 750);
    }
}
