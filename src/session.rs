use crate::adapter::StreamingAdapter;
use crate::engine::{Effect, Engine, Event, FetchTicket, Track};
use crate::error::{DualSubsError, Result};
use crate::resolver::FetchRequest;
use crate::tracker::{self, CueSelection};
use log::{debug, info, trace};
use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Playback position shared between the player and the session.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock(Arc<AtomicU64>);

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, time_ms: u64) {
        self.0.store(time_ms, Ordering::Relaxed);
    }

    pub fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Pause,
    Cues { track: Track, cues: CueSelection },
}

/// The latest selection of both tracks.
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    pub primary: CueSelection,
    pub dual: CueSelection,
}

impl Default for SelectionSnapshot {
    fn default() -> Self {
        Self {
            primary: tracker::empty_selection(),
            dual: tracker::empty_selection(),
        }
    }
}

impl SelectionSnapshot {
    pub fn get(&self, track: Track) -> &CueSelection {
        match track {
            Track::Primary => &self.primary,
            Track::Dual => &self.dual,
        }
    }
}

#[derive(Debug)]
enum Command {
    Event(Event),
    Tick,
    Shutdown,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    clock: PlaybackClock,
    snapshot: Arc<RwLock<SelectionSnapshot>>,
}

impl SessionHandle {
    pub fn send(&self, event: Event) -> Result<()> {
        self.command(Command::Event(event))
    }

    /// Re-evaluate the selection at the clock's current position.
    pub fn tick(&self) -> Result<()> {
        self.command(Command::Tick)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown)
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.snapshot.read().clone()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| DualSubsError::SessionClosed)
    }
}

/// Async host loop around [`Engine`]. Events and clock ticks are handled one
/// at a time; fetches run on spawned tasks and re-enter as
/// [`Event::FetchCompleted`].
pub struct Session<A: StreamingAdapter + 'static> {
    engine: Engine,
    adapter: Arc<A>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions: mpsc::UnboundedReceiver<Event>,
    notifications: mpsc::UnboundedSender<Notification>,
    clock: PlaybackClock,
    snapshot: Arc<RwLock<SelectionSnapshot>>,
}

impl<A: StreamingAdapter + 'static> Session<A> {
    pub fn new(
        engine: Engine,
        adapter: A,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<Notification>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let clock = PlaybackClock::new();
        let snapshot = Arc::new(RwLock::new(SelectionSnapshot::default()));

        let handle = SessionHandle {
            commands: commands_tx,
            clock: clock.clone(),
            snapshot: Arc::clone(&snapshot),
        };
        let session = Self {
            engine,
            adapter: Arc::new(adapter),
            commands,
            completions_tx,
            completions,
            notifications,
            clock,
            snapshot,
        };
        (session, handle, notifications_rx)
    }

    pub fn spawn(self) -> JoinHandle<Engine> {
        tokio::spawn(self.run())
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> Engine {
        info!("Subtitle session started ({} adapter)", self.adapter.name());

        loop {
            // Finished fetches go first so a queued shutdown never skips them.
            let command = tokio::select! {
                biased;
                Some(event) = self.completions.recv() => Command::Event(event),
                command = self.commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Event(event) => self.dispatch(event),
                Command::Tick => {
                    let time_ms = self.clock.now_ms();
                    self.dispatch(Event::TimeUpdate(time_ms));
                }
                Command::Shutdown => break,
            }
        }

        info!("Subtitle session stopped");
        self.engine
    }

    fn dispatch(&mut self, event: Event) {
        for effect in self.engine.handle(event) {
            match effect {
                Effect::Fetch { ticket, request } => self.spawn_fetch(ticket, request),
                Effect::Pause => self.notify(Notification::Pause),
                Effect::SelectionChanged { track, cues } => {
                    {
                        let mut snapshot = self.snapshot.write();
                        match track {
                            Track::Primary => snapshot.primary = Arc::clone(&cues),
                            Track::Dual => snapshot.dual = Arc::clone(&cues),
                        }
                    }
                    self.notify(Notification::Cues { track, cues });
                }
            }
        }
    }

    fn spawn_fetch(&self, ticket: FetchTicket, request: FetchRequest) {
        let adapter = Arc::clone(&self.adapter);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = adapter.fetch_track(&request).await;
            if completions
                .send(Event::FetchCompleted { ticket, result })
                .is_err()
            {
                debug!("Session gone before fetch completed");
            }
        });
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            trace!("No notification subscriber");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::cue::Cue;
    use crate::track_cache::{Locator, VideoId};
    use async_trait::async_trait;

    struct FakeAdapter {
        fail: bool,
        fetched: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl StreamingAdapter for FakeAdapter {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_track(&self, request: &FetchRequest) -> Result<Vec<Cue>> {
            let _ = self.fetched.send(request.effective_language.clone());
            if self.fail {
                return Err(DualSubsError::FetchFailed("offline".to_string()));
            }
            Ok(vec![
                Cue::new(0, 1_000, format!("Hello {}", request.effective_language)),
                Cue::new(1_000, 2_000, "World"),
            ])
        }
    }

    struct Harness {
        handle: SessionHandle,
        notifications: mpsc::UnboundedReceiver<Notification>,
        fetched: mpsc::UnboundedReceiver<String>,
        session: JoinHandle<Engine>,
    }

    fn start(fail: bool) -> Harness {
        let (fetched_tx, fetched) = mpsc::unbounded_channel();
        let engine = Engine::new(Settings::default());
        let adapter = FakeAdapter {
            fail,
            fetched: fetched_tx,
        };
        let (session, handle, notifications) = Session::new(engine, adapter);
        Harness {
            handle,
            notifications,
            fetched,
            session: session.spawn(),
        }
    }

    fn select_english(handle: &SessionHandle) {
        handle.send(Event::VideoChanged(VideoId::new("abc"))).unwrap();
        handle
            .send(Event::LocatorObserved {
                video: VideoId::new("abc"),
                language: "en".to_string(),
                locator: Locator::parse("https://www.youtube.com/api/timedtext?v=abc&lang=en")
                    .unwrap(),
            })
            .unwrap();
        handle.send(Event::LanguageSelected("en".to_string())).unwrap();
    }

    #[test]
    fn test_playback_clock_is_shared() {
        let clock = PlaybackClock::new();
        let other = clock.clone();
        clock.set(1_234);
        assert_eq!(other.now_ms(), 1_234);
    }

    #[tokio::test]
    async fn test_fetched_cues_are_published() {
        let Harness {
            handle,
            mut notifications,
            ..
        } = start(false);
        select_english(&handle);

        let first = notifications.recv().await.unwrap();
        assert!(matches!(
            &first,
            Notification::Cues { track: Track::Primary, cues } if cues[0].text == "Hello en"
        ));
        assert_eq!(handle.snapshot().primary[0].text, "Hello en");

        handle.clock().set(1_500);
        handle.tick().unwrap();
        let second = notifications.recv().await.unwrap();
        assert!(matches!(
            &second,
            Notification::Cues { track: Track::Primary, cues } if cues[0].text == "World"
        ));
        assert!(handle.snapshot().get(Track::Dual).is_empty());
    }

    #[tokio::test]
    async fn test_auto_pause_notification() {
        let Harness {
            handle,
            mut notifications,
            ..
        } = start(false);
        select_english(&handle);
        notifications.recv().await.unwrap();

        handle.send(Event::AutoPauseToggled(true)).unwrap();
        handle.clock().set(800);
        handle.tick().unwrap();
        assert_eq!(notifications.recv().await.unwrap(), Notification::Pause);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_loaded_cues() {
        let Harness {
            handle,
            mut notifications,
            mut fetched,
            session,
        } = start(true);
        handle.send(Event::VideoChanged(VideoId::new("abc"))).unwrap();
        handle
            .send(Event::CustomSubsLoaded(vec![Cue::new(0, 1_000, "mine")]))
            .unwrap();
        let loaded = notifications.recv().await.unwrap();
        assert!(matches!(
            &loaded,
            Notification::Cues { cues, .. } if cues[0].text == "mine"
        ));

        // This fetch is current when it fails, so the failure is not dropped as stale.
        handle
            .send(Event::LocatorObserved {
                video: VideoId::new("abc"),
                language: "en".to_string(),
                locator: Locator::parse("https://www.youtube.com/api/timedtext?v=abc&lang=en")
                    .unwrap(),
            })
            .unwrap();
        handle.send(Event::LanguageSelected("en".to_string())).unwrap();
        assert_eq!(fetched.recv().await.as_deref(), Some("en"));

        handle.shutdown().unwrap();
        let engine = session.await.unwrap();
        assert_eq!(engine.subs_title(), "en");
        assert!(!engine.is_pending(Track::Primary));
        assert_eq!(engine.raw_store(Track::Primary).as_slice(), &[Cue::new(0, 1_000, "mine")]);
        assert!(notifications.try_recv().is_err());

        assert!(matches!(handle.tick(), Err(DualSubsError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_shutdown_returns_engine() {
        let Harness {
            handle, session, ..
        } = start(false);
        handle.send(Event::VideoChanged(VideoId::new("abc"))).unwrap();
        handle.shutdown().unwrap();

        let engine = session.await.unwrap();
        assert_eq!(engine.video(), Some(&VideoId::new("abc")));
        assert!(matches!(handle.tick(), Err(DualSubsError::SessionClosed)));
    }
}
