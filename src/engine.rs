use crate::config::{Config, Settings};
use crate::cue::{Cue, CueStore};
use crate::error::Result;
use crate::merger::{self, MergeOutcome};
use crate::resolver::{self, FetchRequest, LanguageRequest, Resolution};
use crate::resync::{self, SubsDelay};
use crate::track_cache::{Locator, TrackCache, VideoId};
use crate::tracker::{self, CueSelection, SelectionState};
use log::{debug, info, trace, warn};
use std::fmt;

/// Title given to a user-supplied subtitle file. Selecting it never fetches.
pub const CUSTOM_SUBS_LABEL: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Primary,
    Dual,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Primary => write!(f, "primary"),
            Track::Dual => write!(f, "dual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStep {
    Forward,
    Backward,
}

/// Identifies the context a fetch was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub track: Track,
    pub video: VideoId,
    pub language: String,
    pub generation: u64,
}

#[derive(Debug)]
pub enum Event {
    VideoChanged(VideoId),
    LocatorObserved {
        video: VideoId,
        language: String,
        locator: Locator,
    },
    /// The primary track's language token changed.
    LanguageSelected(String),
    FragmentReceived {
        video: VideoId,
        cues: Vec<Cue>,
    },
    FetchCompleted {
        ticket: FetchTicket,
        result: Result<Vec<Cue>>,
    },
    TimeUpdate(u64),
    DelayChanged(i64),
    DelayStepped(DelayStep),
    ResyncRequested,
    ReloadRequested,
    CustomSubsLoaded(Vec<Cue>),
    AutoPauseToggled(bool),
    DualSubToggled(bool),
    DualLanguageSelected(String),
    TranslateLanguageChanged(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch {
        ticket: FetchTicket,
        request: FetchRequest,
    },
    Pause,
    SelectionChanged {
        track: Track,
        cues: CueSelection,
    },
}

#[derive(Debug, Default)]
struct TrackState {
    raw: CueStore,
    selection: SelectionState,
    request: Option<LanguageRequest>,
    /// The request could not be resolved yet; retried on new locators.
    pending: bool,
    generation: u64,
}

impl TrackState {
    /// Forget the cues and invalidate any in-flight fetch.
    fn clear(&mut self, track: Track) -> Option<Effect> {
        self.raw.clear();
        self.pending = false;
        self.generation += 1;
        self.selection.clear().then(|| Effect::SelectionChanged {
            track,
            cues: tracker::empty_selection(),
        })
    }
}

/// Folds each [`Event`] into the subtitle state and returns the [`Effect`]s
/// the host must carry out. Fetches carry a [`FetchTicket`] so completions for
/// a superseded video or language are dropped.
pub struct Engine {
    video: Option<VideoId>,
    cache: TrackCache,
    primary: TrackState,
    dual: TrackState,
    settings: Settings,
    delay: SubsDelay,
    time_ms: u64,
    subs_title: String,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        let delay = SubsDelay::new(settings.subs_delay_ms, settings.delay_step_ms);
        Self {
            video: None,
            cache: TrackCache::new(),
            primary: TrackState::default(),
            dual: TrackState::default(),
            settings,
            delay,
            time_ms: 0,
            subs_title: String::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.settings())
    }

    pub fn video(&self) -> Option<&VideoId> {
        self.video.as_ref()
    }

    pub fn cache(&self) -> &TrackCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn delay(&self) -> &SubsDelay {
        &self.delay
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    pub fn subs_title(&self) -> &str {
        &self.subs_title
    }

    pub fn raw_store(&self, track: Track) -> &CueStore {
        &self.track(track).raw
    }

    pub fn selection(&self, track: Track) -> &CueSelection {
        self.track(track).selection.current()
    }

    pub fn is_pending(&self, track: Track) -> bool {
        self.track(track).pending
    }

    fn track(&self, track: Track) -> &TrackState {
        match track {
            Track::Primary => &self.primary,
            Track::Dual => &self.dual,
        }
    }

    fn track_mut(&mut self, track: Track) -> &mut TrackState {
        match track {
            Track::Primary => &mut self.primary,
            Track::Dual => &mut self.dual,
        }
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            Event::VideoChanged(video) => self.on_video_changed(video, &mut effects),
            Event::LocatorObserved {
                video,
                language,
                locator,
            } => self.on_locator_observed(video, language, locator, &mut effects),
            Event::LanguageSelected(token) => self.on_language_selected(token, &mut effects),
            Event::FragmentReceived { video, cues } => {
                self.on_fragment_received(video, cues, &mut effects)
            }
            Event::FetchCompleted { ticket, result } => {
                self.on_fetch_completed(ticket, result, &mut effects)
            }
            Event::TimeUpdate(time_ms) => self.on_time_update(time_ms, &mut effects),
            Event::DelayChanged(delay_ms) => {
                self.delay.set(delay_ms);
                self.settings.subs_delay_ms = delay_ms;
            }
            Event::DelayStepped(step) => {
                match step {
                    DelayStep::Forward => self.delay.step_forward(),
                    DelayStep::Backward => self.delay.step_backward(),
                }
                self.settings.subs_delay_ms = self.delay.target_ms();
            }
            Event::ResyncRequested => self.on_resync_requested(&mut effects),
            Event::ReloadRequested => {
                if !self.subs_title.is_empty() && !self.primary.raw.is_empty() {
                    debug!("Reloading {} subtitles", self.subs_title);
                    let title = self.subs_title.clone();
                    self.on_language_selected(title, &mut effects);
                }
            }
            Event::CustomSubsLoaded(cues) => self.on_custom_subs_loaded(cues, &mut effects),
            Event::AutoPauseToggled(enabled) => self.settings.auto_pause = enabled,
            Event::DualSubToggled(enabled) => {
                self.settings.dual_sub_enabled = enabled;
                if enabled {
                    self.request_dual(&mut effects);
                } else {
                    debug!("Dual subtitles disabled, clearing dual track");
                    self.dual.request = None;
                    effects.extend(self.dual.clear(Track::Dual));
                }
            }
            Event::DualLanguageSelected(language) => {
                self.settings.dual_sub_language = language;
                self.request_dual(&mut effects);
            }
            Event::TranslateLanguageChanged(language) => {
                self.settings.translate_language = language;
                self.request_dual(&mut effects);
            }
        }
        effects
    }

    fn on_video_changed(&mut self, video: VideoId, effects: &mut Vec<Effect>) {
        if self.video.as_ref() == Some(&video) {
            return;
        }
        info!("Video changed to {}", video);

        self.cache.retain_only(&video);
        self.video = Some(video);
        self.time_ms = 0;
        self.subs_title.clear();
        self.delay.rebase();

        self.primary.request = None;
        effects.extend(self.primary.clear(Track::Primary));
        effects.extend(self.dual.clear(Track::Dual));

        // The dual track follows settings, so it is wanted again for the new video.
        self.request_dual(effects);
    }

    fn on_locator_observed(
        &mut self,
        video: VideoId,
        language: String,
        locator: Locator,
        effects: &mut Vec<Effect>,
    ) {
        self.cache.record(&video, &language, locator);
        if self.video.as_ref() != Some(&video) {
            return;
        }

        for track in [Track::Primary, Track::Dual] {
            if self.track(track).pending {
                debug!("Retrying {} track resolution after new {} locator", track, language);
                self.issue_request(track, effects);
            }
        }
    }

    fn on_language_selected(&mut self, token: String, effects: &mut Vec<Effect>) {
        debug!("Primary subtitles language selected: {:?}", token);
        self.subs_title = token.clone();

        if token != CUSTOM_SUBS_LABEL {
            self.primary.request = Some(LanguageRequest::from_token(&token));
            self.issue_request(Track::Primary, effects);
        }

        let dual_auto = self.dual_request() == Some(LanguageRequest::Auto);
        if dual_auto {
            self.request_dual(effects);
        }
    }

    fn on_fragment_received(&mut self, video: VideoId, cues: Vec<Cue>, effects: &mut Vec<Effect>) {
        if self.video.as_ref() != Some(&video) {
            debug!("Dropping transcript fragment for inactive video {}", video);
            return;
        }

        let merged = merger::merge(&self.primary.raw, &cues);
        if merged.outcome == MergeOutcome::Empty {
            return;
        }
        self.primary.raw = merged.store;
        effects.extend(self.refresh(Track::Primary));
    }

    fn on_fetch_completed(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Cue>>,
        effects: &mut Vec<Effect>,
    ) {
        let current_video = self.video.clone();
        let state = self.track_mut(ticket.track);
        if current_video.as_ref() != Some(&ticket.video) || state.generation != ticket.generation {
            debug!(
                "Dropping stale {} fetch for {} on video {}",
                ticket.track, ticket.language, ticket.video
            );
            return;
        }

        match result {
            Ok(cues) => {
                debug!(
                    "Loaded {} {} cues for {} on video {}",
                    cues.len(),
                    ticket.track,
                    ticket.language,
                    ticket.video
                );
                state.raw = CueStore::from_cues(cues);
                if ticket.track == Track::Primary {
                    self.delay.rebase();
                }
                effects.extend(self.refresh(ticket.track));
            }
            Err(err) => {
                warn!(
                    "Failed to fetch {} subtitles ({}), keeping current cues: {}",
                    ticket.track, ticket.language, err
                );
            }
        }
    }

    fn on_time_update(&mut self, time_ms: u64, effects: &mut Vec<Effect>) {
        trace!("Playback time {}ms", time_ms);
        self.time_ms = time_ms;

        effects.extend(self.refresh(Track::Primary));
        if tracker::should_auto_pause(self.primary.selection.current(), time_ms, self.settings.auto_pause)
        {
            debug!("Auto-pausing at {}ms", time_ms);
            effects.push(Effect::Pause);
        }
        effects.extend(self.refresh(Track::Dual));
    }

    fn on_resync_requested(&mut self, effects: &mut Vec<Effect>) {
        let delta_ms = self.delay.take_pending();
        if delta_ms == 0 {
            trace!("Resync requested with no pending delay");
            return;
        }
        info!("Resyncing subtitles by {}ms", delta_ms);
        self.primary.raw = resync::resync(&self.primary.raw, delta_ms);
        effects.extend(self.refresh(Track::Primary));
    }

    fn on_custom_subs_loaded(&mut self, cues: Vec<Cue>, effects: &mut Vec<Effect>) {
        info!("Loaded {} custom subtitle cues", cues.len());
        self.primary.generation += 1;
        self.primary.pending = false;
        self.primary.request = None;
        self.primary.raw = CueStore::from_cues(cues);
        self.subs_title = CUSTOM_SUBS_LABEL.to_string();
        self.delay.rebase();
        effects.extend(self.refresh(Track::Primary));
    }

    /// The dual track's wanted language, if the feature is on.
    fn dual_request(&self) -> Option<LanguageRequest> {
        let language = self.settings.dual_sub_language.trim();
        (self.settings.dual_sub_enabled && !language.is_empty())
            .then(|| LanguageRequest::from_token(language))
    }

    fn request_dual(&mut self, effects: &mut Vec<Effect>) {
        let Some(request) = self.dual_request() else {
            return;
        };
        self.dual.request = Some(request);
        self.issue_request(Track::Dual, effects);
    }

    fn issue_request(&mut self, track: Track, effects: &mut Vec<Effect>) {
        let Some(video) = self.video.clone() else {
            self.track_mut(track).pending = true;
            return;
        };
        let Some(request) = self.track(track).request.clone() else {
            return;
        };

        match resolver::resolve(&self.cache, &video, &request) {
            Ok(Resolution::Clear) => {
                debug!("No {} subtitles selected, clearing track", track);
                effects.extend(self.track_mut(track).clear(track));
            }
            Ok(Resolution::Fetch(fetch)) => {
                let state = self.track_mut(track);
                state.pending = false;
                state.generation += 1;
                let ticket = FetchTicket {
                    track,
                    video,
                    language: fetch.effective_language.clone(),
                    generation: state.generation,
                };
                debug!("Fetching {} track {} from {}", track, ticket.language, fetch.locator);
                effects.push(Effect::Fetch {
                    ticket,
                    request: fetch,
                });
            }
            Err(err) => {
                debug!("Deferring {} track resolution: {}", track, err);
                // The previous request is superseded even though nothing is fetched yet.
                let state = self.track_mut(track);
                state.generation += 1;
                state.pending = true;
            }
        }
    }

    fn refresh(&mut self, track: Track) -> Option<Effect> {
        if track == Track::Dual && !self.settings.dual_sub_enabled {
            return None;
        }
        let time_ms = self.time_ms;
        let state = self.track_mut(track);
        state
            .selection
            .update(&state.raw, time_ms)
            .map(|cues| Effect::SelectionChanged { track, cues })
    }
}
