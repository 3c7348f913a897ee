use crate::cue::Cue;
use crate::engine::Event;
use crate::error::Result;
use crate::resolver::FetchRequest;
use crate::track_cache::{Locator, VideoId};
use async_trait::async_trait;

pub mod youtube;

pub use youtube::YoutubeAdapter;

/// Site-specific source of subtitle tracks.
///
/// Exactly one adapter is active per session; the host picks it.
#[async_trait]
pub trait StreamingAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the complete cue list behind `request`.
    async fn fetch_track(&self, request: &FetchRequest) -> Result<Vec<Cue>>;
}

/// A subtitle locator the adapter saw the page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorObservation {
    pub video: VideoId,
    pub language: String,
    pub locator: Locator,
}

impl LocatorObservation {
    pub fn into_event(self) -> Event {
        Event::LocatorObserved {
            video: self.video,
            language: self.language,
            locator: self.locator,
        }
    }
}
