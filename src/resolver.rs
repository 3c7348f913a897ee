use crate::error::{DualSubsError, Result};
use crate::track_cache::{Locator, LocatorKind, TrackCache, VideoId};
use log::{debug, trace};
use std::fmt;

pub const AUTO_LANGUAGE: &str = "auto";

/// A user's language selection for one track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LanguageRequest {
    /// Subtitles off.
    None,
    /// The video's original-language track.
    Auto,
    Language(String),
}

impl LanguageRequest {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "" => LanguageRequest::None,
            AUTO_LANGUAGE => LanguageRequest::Auto,
            code => LanguageRequest::Language(code.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, LanguageRequest::None)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, LanguageRequest::Auto)
    }
}

impl fmt::Display for LanguageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageRequest::None => write!(f, "none"),
            LanguageRequest::Auto => write!(f, "{AUTO_LANGUAGE}"),
            LanguageRequest::Language(code) => write!(f, "{code}"),
        }
    }
}

/// What the adapter should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub locator: Locator,
    pub effective_language: String,
    /// The source is asked for machine-translated text.
    pub translation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No subtitles requested; the track should be emptied.
    Clear,
    Fetch(FetchRequest),
}

/// Decide which concrete track to fetch for `request`.
///
/// `ResolutionFailed` is soft: the caller keeps the request and tries again
/// once the cache learns about new locators for the video.
pub fn resolve(cache: &TrackCache, video: &VideoId, request: &LanguageRequest) -> Result<Resolution> {
    let fetch = match request {
        LanguageRequest::None => return Ok(Resolution::Clear),
        LanguageRequest::Auto => resolve_original(cache, video)?,
        LanguageRequest::Language(code) => resolve_language(cache, video, code)?,
    };

    debug!(
        "Resolved {} for video {} -> {} (translation: {})",
        request, video, fetch.effective_language, fetch.translation
    );
    Ok(Resolution::Fetch(fetch))
}

fn resolve_language(cache: &TrackCache, video: &VideoId, language: &str) -> Result<FetchRequest> {
    if let Some(locator) = cache.resolve(video, language) {
        trace!("Cache hit for {} on video {}", language, video);
        return Ok(FetchRequest {
            locator: locator.clone(),
            effective_language: language.to_string(),
            translation: false,
        });
    }

    let fallback = cache.any_locator(video).ok_or_else(|| {
        DualSubsError::ResolutionFailed(format!("no locators known for video {}", video))
    })?;
    let current = fallback.effective_language().ok_or_else(|| {
        DualSubsError::ResolutionFailed(format!(
            "fallback locator for video {} carries no language",
            video
        ))
    })?;

    if current != language {
        Ok(FetchRequest {
            locator: fallback.with_translation(language),
            effective_language: language.to_string(),
            translation: true,
        })
    } else {
        Ok(FetchRequest {
            locator: fallback.without_translation(),
            effective_language: language.to_string(),
            translation: false,
        })
    }
}

/// Find the untranslated track of the video's original language.
fn resolve_original(cache: &TrackCache, video: &VideoId) -> Result<FetchRequest> {
    let (seed, original) = cache
        .locators(video)
        .find_map(|locator| locator.base_language().map(|lang| (locator, lang)))
        .ok_or_else(|| {
            DualSubsError::ResolutionFailed(format!(
                "no original language recoverable for video {}",
                video
            ))
        })?;

    let found = cache.locators(video).find(|locator| {
        locator.kind() == LocatorKind::Base
            && locator.base_language().as_deref() == Some(original.as_str())
    });

    if let Some(locator) = found {
        trace!("Using cached original track {} for video {}", original, video);
        return Ok(FetchRequest {
            locator: locator.clone(),
            effective_language: original,
            translation: false,
        });
    }

    trace!("Synthesizing original {} track for video {}", original, video);
    Ok(FetchRequest {
        locator: seed.without_translation().with_base_language(&original),
        effective_language: original,
        translation: false,
    })
}
