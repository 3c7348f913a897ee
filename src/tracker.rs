use crate::cue::{Cue, CueStore};
use log::trace;
use std::sync::Arc;

/// Auto-pause fires when the first visible cue ends within this many ms.
pub const AUTO_PAUSE_WINDOW_MS: i64 = 250;

/// Cues visible at one instant. Shared so unchanged selections keep their identity.
pub type CueSelection = Arc<[Cue]>;

pub fn empty_selection() -> CueSelection {
    Arc::from(Vec::<Cue>::new())
}

/// All cues with `start <= time_ms < end`, in store order.
pub fn current_cues(store: &CueStore, time_ms: u64) -> Vec<Cue> {
    store
        .iter()
        .filter(|cue| cue.contains(time_ms))
        .cloned()
        .collect()
}

/// Keep `previous` when `next` holds the same cues.
pub fn stabilize(previous: &CueSelection, next: Vec<Cue>) -> CueSelection {
    if previous[..] == next[..] {
        Arc::clone(previous)
    } else {
        Arc::from(next)
    }
}

/// Whether playback should pause ahead of the first visible cue's end.
pub fn should_auto_pause(selection: &[Cue], time_ms: u64, enabled: bool) -> bool {
    if !enabled {
        return false;
    }
    let Some(cue) = selection.first() else {
        return false;
    };
    let time_diff = i128::from(cue.end) - i128::from(time_ms);
    time_diff > 0 && time_diff < i128::from(AUTO_PAUSE_WINDOW_MS)
}

/// The current selection of one track.
#[derive(Debug, Clone)]
pub struct SelectionState {
    current: CueSelection,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            current: empty_selection(),
        }
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &CueSelection {
        &self.current
    }

    /// Recompute against `store` at `time_ms`. Returns the new selection only
    /// when it differs from the previous one.
    pub fn update(&mut self, store: &CueStore, time_ms: u64) -> Option<CueSelection> {
        let next = stabilize(&self.current, current_cues(store, time_ms));
        if Arc::ptr_eq(&next, &self.current) {
            return None;
        }
        trace!("Selection at {}ms now has {} cues", time_ms, next.len());
        self.current = next;
        Some(Arc::clone(&self.current))
    }

    /// Empty the selection. Returns true if it was not already empty.
    pub fn clear(&mut self) -> bool {
        if self.current.is_empty() {
            return false;
        }
        self.current = empty_selection();
        true
    }
}
