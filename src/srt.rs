use crate::cue::{Cue, CueStore};
use crate::error::{DualSubsError, Result};
use log::{debug, trace};
use srtlib::{Subtitle, Subtitles, Timestamp};
use std::path::Path;

/// A user-supplied SRT file, loaded in place of a fetched track.
pub struct SrtFile {
    pub cues: Vec<Cue>,
}

impl SrtFile {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        trace!("Parsing SRT file: {}", path.as_ref().display());
        let subs = Subtitles::parse_from_file(path.as_ref(), None)
            .map_err(|e| DualSubsError::InvalidSrt(e.to_string()))?;

        let cues = Self::collect(subs);
        debug!("Parsed SRT file with {} entries", cues.len());
        Ok(Self { cues })
    }

    pub fn parse_content(content: &str) -> Result<Self> {
        let subs = Subtitles::parse_from_str(content.to_string())
            .map_err(|e| DualSubsError::InvalidSrt(e.to_string()))?;

        Ok(Self {
            cues: Self::collect(subs),
        })
    }

    pub fn into_store(self) -> CueStore {
        CueStore::from_cues(self.cues)
    }

    fn collect(subs: Subtitles) -> Vec<Cue> {
        subs.to_vec().into_iter().map(cue_from_srtlib).collect()
    }
}

fn cue_from_srtlib(sub: Subtitle) -> Cue {
    let start = timestamp_to_millis(sub.start_time);
    let end = timestamp_to_millis(sub.end_time).max(start);
    Cue {
        start,
        end,
        text: sub.text,
    }
}

fn timestamp_to_millis(ts: Timestamp) -> u64 {
    let (h, m, s, ms) = ts.get();
    u64::from(Timestamp::convert_to_milliseconds(h, m, s, ms))
}
