use crate::error::{DualSubsError, Result};
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use url::Url;

const LANG_PARAM: &str = "lang";
const TRANSLATION_PARAM: &str = "tlang";
const VIDEO_PARAM: &str = "v";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// The track as published by the source.
    Base,
    /// A machine translation of a base track requested from the source.
    Translated,
}

/// Opaque subtitle source reference. Language information lives in the
/// `lang` (base track) and `tlang` (translation target) query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    href: Url,
}

impl Locator {
    pub fn parse(href: &str) -> Result<Self> {
        let href = Url::parse(href)
            .map_err(|e| DualSubsError::InvalidLocator(format!("{}: {}", href, e)))?;
        Ok(Self { href })
    }

    pub fn as_str(&self) -> &str {
        self.href.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.href
    }

    pub fn base_language(&self) -> Option<String> {
        self.param(LANG_PARAM)
    }

    pub fn translation_language(&self) -> Option<String> {
        self.param(TRANSLATION_PARAM)
    }

    /// Language of the text this locator yields.
    pub fn effective_language(&self) -> Option<String> {
        self.translation_language().or_else(|| self.base_language())
    }

    pub fn video_id(&self) -> Option<VideoId> {
        self.param(VIDEO_PARAM).map(VideoId::new)
    }

    pub fn kind(&self) -> LocatorKind {
        if self.translation_language().is_some() {
            LocatorKind::Translated
        } else {
            LocatorKind::Base
        }
    }

    pub fn with_translation(&self, language: &str) -> Self {
        self.with_param(TRANSLATION_PARAM, Some(language))
    }

    pub fn without_translation(&self) -> Self {
        self.with_param(TRANSLATION_PARAM, None)
    }

    pub fn with_base_language(&self, language: &str) -> Self {
        self.with_param(LANG_PARAM, Some(language))
    }

    fn param(&self, name: &str) -> Option<String> {
        self.href
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// Rewrites one query parameter, keeping the others in their original order.
    fn with_param(&self, name: &str, value: Option<&str>) -> Self {
        let mut pairs: Vec<(String, String)> = self
            .href
            .query_pairs()
            .filter(|(key, _)| key != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if let Some(value) = value {
            let position = self
                .href
                .query_pairs()
                .position(|(key, _)| key == name)
                .unwrap_or(pairs.len())
                .min(pairs.len());
            pairs.insert(position, (name.to_string(), value.to_string()));
        }

        let mut href = self.href.clone();
        if pairs.is_empty() {
            href.set_query(None);
        } else {
            href.query_pairs_mut().clear().extend_pairs(pairs);
        }
        Self { href }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.href)
    }
}

/// Locators observed for a single video, in first-recorded order.
#[derive(Debug, Default, Clone)]
struct VideoTracks {
    entries: Vec<(String, Locator)>,
}

/// Per-video, per-language locators observed from the streaming adapter.
#[derive(Debug, Default)]
pub struct TrackCache {
    videos: HashMap<VideoId, VideoTracks>,
}

impl TrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the locator for `language`. An overwrite keeps the
    /// language's original position so `any_locator` stays stable.
    pub fn record(&mut self, video: &VideoId, language: &str, locator: Locator) {
        let tracks = self.videos.entry(video.clone()).or_default();
        match tracks.entries.iter_mut().find(|(lang, _)| lang == language) {
            Some((_, existing)) => {
                trace!("Overwriting {} locator for video {}", language, video);
                *existing = locator;
            }
            None => {
                debug!("Recorded {} locator for video {}", language, video);
                tracks.entries.push((language.to_string(), locator));
            }
        }
    }

    pub fn resolve(&self, video: &VideoId, language: &str) -> Option<&Locator> {
        self.videos
            .get(video)?
            .entries
            .iter()
            .find(|(lang, _)| lang == language)
            .map(|(_, locator)| locator)
    }

    /// The earliest recorded locator for the video.
    pub fn any_locator(&self, video: &VideoId) -> Option<&Locator> {
        self.videos
            .get(video)?
            .entries
            .first()
            .map(|(_, locator)| locator)
    }

    pub fn locators(&self, video: &VideoId) -> impl Iterator<Item = &Locator> {
        self.videos
            .get(video)
            .into_iter()
            .flat_map(|tracks| tracks.entries.iter().map(|(_, locator)| locator))
    }

    pub fn languages_known(&self, video: &VideoId) -> BTreeSet<String> {
        self.videos
            .get(video)
            .map(|tracks| tracks.entries.iter().map(|(lang, _)| lang.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self, video: &VideoId) {
        if self.videos.remove(video).is_some() {
            debug!("Cleared track cache for video {}", video);
        }
    }

    pub fn reset(&mut self) {
        self.videos.clear();
    }

    /// Drop every video except `video`.
    pub fn retain_only(&mut self, video: &VideoId) {
        self.videos.retain(|id, _| id == video);
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(query: &str) -> Locator {
        Locator::parse(&format!("https://www.youtube.com/api/timedtext?{}", query)).unwrap()
    }

    #[test]
    fn test_locator_languages() {
        let base = locator("v=abc&lang=en");
        assert_eq!(base.base_language().as_deref(), Some("en"));
        assert_eq!(base.translation_language(), None);
        assert_eq!(base.effective_language().as_deref(), Some("en"));
        assert_eq!(base.kind(), LocatorKind::Base);
        assert_eq!(base.video_id(), Some(VideoId::new("abc")));

        let translated = locator("v=abc&lang=en&tlang=es");
        assert_eq!(translated.effective_language().as_deref(), Some("es"));
        assert_eq!(translated.kind(), LocatorKind::Translated);
    }

    #[test]
    fn test_empty_param_is_missing() {
        let loc = locator("v=abc&lang=&tlang=");
        assert_eq!(loc.base_language(), None);
        assert_eq!(loc.effective_language(), None);
        assert_eq!(loc.kind(), LocatorKind::Base);
    }

    #[test]
    fn test_param_rewrites_keep_other_params() {
        let loc = locator("v=abc&lang=en&fmt=json3");
        let translated = loc.with_translation("de");
        assert_eq!(translated.translation_language().as_deref(), Some("de"));
        assert_eq!(translated.base_language().as_deref(), Some("en"));
        assert!(translated.as_str().contains("fmt=json3"));

        let stripped = translated.without_translation();
        assert_eq!(stripped, loc);

        let rebased = loc.with_base_language("fr");
        assert_eq!(rebased.base_language().as_deref(), Some("fr"));
        assert!(rebased.as_str().starts_with("https://www.youtube.com/api/timedtext?v=abc&lang=fr"));
    }

    #[test]
    fn test_invalid_locator() {
        assert!(matches!(
            Locator::parse("not a url"),
            Err(DualSubsError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_record_overwrite_keeps_position() {
        let video = VideoId::new("abc");
        let mut cache = TrackCache::new();
        cache.record(&video, "en", locator("v=abc&lang=en"));
        cache.record(&video, "es", locator("v=abc&lang=en&tlang=es"));
        cache.record(&video, "en", locator("v=abc&lang=en&kind=asr"));

        assert_eq!(cache.any_locator(&video), Some(&locator("v=abc&lang=en&kind=asr")));
        assert_eq!(
            cache.languages_known(&video).into_iter().collect::<Vec<_>>(),
            vec!["en".to_string(), "es".to_string()]
        );
        assert_eq!(cache.locators(&video).count(), 2);
    }

    #[test]
    fn test_videos_are_isolated() {
        let mut cache = TrackCache::new();
        let a = VideoId::new("a");
        let b = VideoId::new("b");
        cache.record(&a, "en", locator("v=a&lang=en"));

        assert!(cache.resolve(&a, "en").is_some());
        assert!(cache.resolve(&b, "en").is_none());
        assert!(cache.any_locator(&b).is_none());

        cache.clear(&a);
        assert!(cache.resolve(&a, "en").is_none());
        assert!(cache.is_empty());
    }
}
