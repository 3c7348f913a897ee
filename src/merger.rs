use crate::cue::{Cue, CueStore};
use log::{trace, warn};

/// How an incoming fragment was joined onto the existing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The store was empty; the fragment became the store.
    Replaced,
    /// The fragment re-sent the still-open last cue (same text, starting at
    /// its start or where it ended), which was dropped in favour of the new copy.
    Overlap,
    /// The last cue was closed by collapsing its end onto its start.
    Sealed,
    /// The boundary cues share exactly one of text/start. Appended unchanged.
    Ambiguous,
    /// The fragment carried no cues.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub store: CueStore,
    pub outcome: MergeOutcome,
}

/// Join a live-transcript fragment onto the cues received so far.
///
/// Only the last existing cue is ever touched; everything before it is final.
pub fn merge(existing: &CueStore, incoming: &[Cue]) -> Merged {
    let Some(first_incoming) = incoming.first() else {
        return Merged {
            store: existing.clone(),
            outcome: MergeOutcome::Empty,
        };
    };

    let mut cues = existing.as_slice().to_vec();
    let outcome = match cues.last() {
        None => MergeOutcome::Replaced,
        Some(last) => boundary_outcome(last, first_incoming),
    };

    match outcome {
        MergeOutcome::Overlap => {
            cues.pop();
        }
        MergeOutcome::Sealed => {
            if let Some(last) = cues.last_mut() {
                last.end = last.start;
            }
        }
        MergeOutcome::Ambiguous => {
            warn!(
                "Fragment boundary differs in only one of text/start (incoming {}); appending",
                first_incoming
            );
        }
        MergeOutcome::Replaced | MergeOutcome::Empty => {}
    }

    cues.extend_from_slice(incoming);
    trace!(
        "Merged fragment of {} cues ({:?}), store now {} cues",
        incoming.len(),
        outcome,
        cues.len()
    );

    Merged {
        store: CueStore::from_cues(cues),
        outcome,
    }
}

fn boundary_outcome(last: &Cue, first_incoming: &Cue) -> MergeOutcome {
    let same_text = last.text == first_incoming.text;
    let same_start = last.start == first_incoming.start;
    // A same-text cue picking up exactly where the last one stopped is the
    // same open cue being extended.
    let continues = last.end == first_incoming.start;

    match (same_text, same_start) {
        (true, true) => MergeOutcome::Overlap,
        (true, false) if continues => MergeOutcome::Overlap,
        (false, false) => MergeOutcome::Sealed,
        _ => MergeOutcome::Ambiguous,
    }
}
