use super::{LocatorObservation, StreamingAdapter};
use crate::cue::Cue;
use crate::error::{DualSubsError, Result};
use crate::resolver::FetchRequest;
use crate::track_cache::{Locator, VideoId};
use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use url::Url;

const VIDEO_ID_LEN: usize = 11;

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    segs: Option<Vec<TimedTextSegment>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextSegment {
    #[serde(default)]
    utf8: String,
    #[serde(default)]
    t_offset_ms: u64,
}

impl TimedTextEvent {
    fn into_cue(self) -> Cue {
        let start = self.t_start_ms;
        let segs = match self.segs {
            Some(segs) if !segs.is_empty() => segs,
            // Events without segments only carry window/timing info.
            _ => return Cue::new(start, start, ""),
        };

        let end = match segs.last() {
            Some(last) if last.t_offset_ms > 0 => start.saturating_add(last.t_offset_ms),
            _ => start.saturating_add(self.d_duration_ms),
        };
        let text = segs.into_iter().map(|seg| seg.utf8).collect::<String>();
        Cue::new(start, end, text)
    }
}

/// Decode a YouTube `json3` timedtext document.
pub fn parse_timedtext(json: &str) -> Result<Vec<Cue>> {
    let doc: TimedText = serde_json::from_str(json)?;
    Ok(doc.events.into_iter().map(TimedTextEvent::into_cue).collect())
}

/// Interpret a timedtext URL the player requested.
pub fn observe_caption_url(href: &str) -> Result<LocatorObservation> {
    let locator = Locator::parse(href)?;
    let video = locator
        .video_id()
        .ok_or_else(|| DualSubsError::InvalidLocator(format!("{}: missing video id", href)))?;
    let language = locator.effective_language().unwrap_or_default();
    trace!("Observed {} caption locator for video {}", language, video);

    Ok(LocatorObservation {
        video,
        language,
        locator,
    })
}

/// Extract the video id from a watch, short-link, embed or `/v/` page URL.
pub fn video_id_from_page_url(page_url: &str) -> Option<VideoId> {
    let url = Url::parse(page_url).ok()?;

    let candidate = if url.host_str().is_some_and(|host| host.ends_with("youtu.be")) {
        url.path_segments()?.next().map(str::to_string)
    } else if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        Some(id.into_owned())
    } else {
        let segments: Vec<&str> = url.path_segments()?.collect();
        segments
            .windows(2)
            .find(|pair| matches!(pair[0], "embed" | "v" | "shorts" | "live"))
            .map(|pair| pair[1].to_string())
    };

    candidate
        .filter(|id| id.len() == VIDEO_ID_LEN)
        .map(VideoId::new)
}

pub struct YoutubeAdapter {
    client: reqwest::Client,
}

impl Default for YoutubeAdapter {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl YoutubeAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamingAdapter for YoutubeAdapter {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn fetch_track(&self, request: &FetchRequest) -> Result<Vec<Cue>> {
        debug!(
            "Fetching {} timedtext (translation: {})",
            request.effective_language, request.translation
        );
        let body = self
            .client
            .get(request.locator.url().clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| DualSubsError::FetchFailed(e.to_string()))?
            .text()
            .await
            .map_err(|e| DualSubsError::FetchFailed(e.to_string()))?;

        let cues = parse_timedtext(&body)?;
        debug!("Decoded {} timedtext events", cues.len());
        Ok(cues)
    }
}
