pub mod adapter;
pub mod config;
pub mod cue;
pub mod engine;
pub mod error;
pub mod logging;
pub mod merger;
pub mod resolver;
pub mod resync;
pub mod session;
pub mod srt;
pub mod track_cache;
pub mod tracker;
pub mod translate;

// Re-export main types for convenience
pub use adapter::{LocatorObservation, StreamingAdapter, YoutubeAdapter};
pub use config::{Config, Settings};
pub use cue::{Cue, CueItem, CueItemTag, CueStore};
pub use engine::{DelayStep, Effect, Engine, Event, FetchTicket, Track};
pub use error::{DualSubsError, Result};
pub use merger::{MergeOutcome, Merged};
pub use resolver::{FetchRequest, LanguageRequest, Resolution};
pub use resync::SubsDelay;
pub use session::{Notification, PlaybackClock, SelectionSnapshot, Session, SessionHandle};
pub use srt::SrtFile;
pub use track_cache::{Locator, LocatorKind, TrackCache, VideoId};
pub use tracker::CueSelection;
pub use translate::{
    GoogleTranslationBackend, TranslationBackend, TranslationQueue, TranslationResult,
    TranslationTask, TranslatorConfig,
};
