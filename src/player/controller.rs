//! Playback controller
//!
//! Mediates every interaction with one [`PlaybackSurface`] and keeps the
//! [`PlaybackSession`] consistent with it. All operations are synchronous
//! and return immediately. Work that completes later (play and fullscreen
//! requests, surface events, the two timers) is collected by
//! [`PlaybackController::next_wakeup`] and applied with
//! [`PlaybackController::handle_wakeup`].
//!
//! Two timers run while a source is bound:
//! - the progress-save debounce, re-armed by every position update, pushes
//!   a save once playback has run for a full period without another save
//!   superseding it;
//! - the controls countdown, re-armed by pointer activity, hides the
//!   controls on expiry but only while playing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::progress::ProgressSink;
use crate::types::WholeSeconds;

use super::session::{PlaybackSession, PlayerPhase};
use super::surface::{PlaybackSurface, SurfaceError, SurfaceEvent};
use super::timer::Debounce;

/// Timer intervals and step sizes of a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTimings {
    pub save_debounce: Duration,
    pub controls_hide: Duration,
    /// Step of [`PlaybackController::skip_forward`] / [`PlaybackController::skip_back`]
    pub skip_seconds: f64,
}

impl Default for PlayerTimings {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_secs(10),
            controls_hide: Duration::from_secs(5),
            skip_seconds: 10.0,
        }
    }
}

/// A playable source with its display metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSource {
    pub url: String,
    pub poster_url: Option<String>,
    pub title: Option<String>,
}

impl MediaSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_poster(mut self, poster_url: Option<String>) -> Self {
        self.poster_url = poster_url;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// The viewer's answer to the resume prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Continue from the saved position
    Resume,
    /// Restart from zero and drop the saved position
    StartOver,
}

/// Notifications for the page hosting the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback actually started (once per successful start)
    Started,
    /// Every play, pause and end transition
    PlayingChanged(bool),
    /// The resume prompt should be shown
    ResumePromptShown { saved: WholeSeconds },
    /// The surface refused to play; the player is paused again
    PlaybackFailed(String),
    /// The source could not be loaded; the host should render a fallback
    SourceFailed(String),
    FullscreenChanged(bool),
}

/// A surface request that has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Play(Result<(), SurfaceError>),
    Fullscreen(Result<(), SurfaceError>),
}

/// Something the controller has to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Wakeup {
    Surface(SurfaceEvent),
    Settled(Settled),
    SaveDue,
    ControlsDue,
}

/// Owns one playback surface and the session state on top of it.
pub struct PlaybackController<S: PlaybackSurface> {
    surface: S,
    session: PlaybackSession,
    source: Option<MediaSource>,
    saved_progress: WholeSeconds,
    sink: Arc<dyn ProgressSink>,
    notifier: mpsc::UnboundedSender<PlayerEvent>,
    events: Option<mpsc::UnboundedReceiver<SurfaceEvent>>,
    pending: FuturesUnordered<BoxFuture<'static, Settled>>,
    save_timer: Debounce,
    controls_timer: Debounce,
    skip_seconds: f64,
    /// A play request is outstanding and no pause has overridden it.
    play_pending: bool,
    disposed: bool,
}

impl<S: PlaybackSurface> PlaybackController<S> {
    /// Attach to `surface` and start listening to its events.
    ///
    /// Returns the controller and the receiver of its [`PlayerEvent`]s.
    pub fn new(
        mut surface: S,
        sink: Arc<dyn ProgressSink>,
        timings: PlayerTimings,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let events = surface.subscribe();
        let (notifier, notifications) = mpsc::unbounded_channel();

        let controller = Self {
            surface,
            session: PlaybackSession::default(),
            source: None,
            saved_progress: WholeSeconds::default(),
            sink,
            notifier,
            events: Some(events),
            pending: FuturesUnordered::new(),
            save_timer: Debounce::new(timings.save_debounce),
            controls_timer: Debounce::new(timings.controls_hide),
            skip_seconds: timings.skip_seconds,
            play_pending: false,
            disposed: false,
        };
        (controller, notifications)
    }

    #[must_use]
    pub const fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[must_use]
    pub const fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    #[must_use]
    pub const fn saved_progress(&self) -> WholeSeconds {
        self.saved_progress
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether a debounced progress save is waiting to fire.
    #[must_use]
    pub const fn save_pending(&self) -> bool {
        self.save_timer.is_pending()
    }

    /// Whether the controls countdown is running.
    #[must_use]
    pub const fn controls_countdown_pending(&self) -> bool {
        self.controls_timer.is_pending()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Bind a new source.
    ///
    /// An empty URL leaves the controller untouched.
    pub fn load_source(&mut self, source: MediaSource) {
        if self.disposed {
            return;
        }
        if source.url.trim().is_empty() {
            debug!("Ignoring empty source URL");
            return;
        }

        let was_playing = self.session.is_playing();
        self.save_timer.cancel();
        self.controls_timer.cancel();
        self.pending = FuturesUnordered::new();
        self.play_pending = false;
        // Events queued for the old source must not reach the new session
        self.events = Some(self.surface.subscribe());

        self.surface
            .set_source(&source.url, source.poster_url.as_deref());
        self.session.reset_for_source();
        if was_playing {
            self.notify(PlayerEvent::PlayingChanged(false));
        }

        info!(
            "Loaded source: {}",
            source.title.as_deref().unwrap_or(&source.url)
        );
        self.source = Some(source);
    }

    /// Position to offer in the resume prompt; zero means none.
    pub fn set_saved_progress(&mut self, seconds: WholeSeconds) {
        self.saved_progress = seconds.max(WholeSeconds::default());
    }

    /// Start playback, or show the resume prompt first if one is due.
    pub fn request_play(&mut self) {
        if self.disposed {
            return;
        }
        match self.session.phase {
            PlayerPhase::Idle => {
                debug!("No source loaded, ignoring play request");
                return;
            }
            PlayerPhase::ResumePrompt | PlayerPhase::Playing => return,
            _ if self.play_pending => return,
            PlayerPhase::Loading | PlayerPhase::Paused | PlayerPhase::Ended => {}
        }

        if !self.saved_progress.is_zero() && !self.session.resume_dialog_shown {
            self.session.resume_dialog_shown = true;
            self.session.phase = PlayerPhase::ResumePrompt;
            self.show_controls_until_playing();
            debug!("Offering to resume at {}", self.saved_progress);
            self.notify(PlayerEvent::ResumePromptShown {
                saved: self.saved_progress,
            });
            return;
        }

        self.start_playback();
    }

    /// The play/pause button.
    pub fn toggle_play(&mut self) {
        if self.session.is_playing() || self.play_pending {
            self.pause();
        } else {
            self.request_play();
        }
    }

    /// Answer the resume prompt; anything else is ignored.
    pub fn resolve_resume_prompt(&mut self, choice: ResumeChoice) {
        if self.session.phase != PlayerPhase::ResumePrompt {
            debug!("No resume prompt open, ignoring {:?}", choice);
            return;
        }

        self.session.phase = if self.session.has_duration() {
            PlayerPhase::Paused
        } else {
            PlayerPhase::Loading
        };

        match choice {
            ResumeChoice::Resume => {
                let saved = self.saved_progress.as_secs_f64();
                // Metadata may still be pending; the surface clamps on its own
                let target = if self.session.has_duration() {
                    self.session.clamp_time(saved)
                } else {
                    saved
                };
                self.seek_surface(target);
            }
            ResumeChoice::StartOver => {
                self.seek_surface(0.0);
                self.sink.clear();
            }
        }

        self.start_playback();
    }

    /// Close the resume prompt without playing.
    ///
    /// The prompt is not offered again for this source; the next play
    /// request starts from the current position.
    pub fn dismiss_resume_prompt(&mut self) {
        if self.session.phase != PlayerPhase::ResumePrompt {
            return;
        }
        self.session.phase = if self.session.has_duration() {
            PlayerPhase::Paused
        } else {
            PlayerPhase::Loading
        };
        debug!("Resume prompt dismissed");
    }

    /// Stop playback and push the position right away.
    ///
    /// Also wins over a play request that has not settled yet.
    pub fn pause(&mut self) {
        if !self.session.is_playing() && !self.play_pending {
            return;
        }
        self.play_pending = false;
        self.surface.pause();
        self.enter_paused();
    }

    /// Jump to `seconds`, clamped to `[0, duration]`.
    pub fn seek(&mut self, seconds: f64) {
        if self.session.phase == PlayerPhase::Idle {
            return;
        }
        let target = self.session.clamp_time(seconds);
        self.seek_surface(target);
    }

    /// Relative seek.
    pub fn skip(&mut self, delta_seconds: f64) {
        self.seek(self.session.current_time + delta_seconds);
    }

    pub fn skip_forward(&mut self) {
        self.skip(self.skip_seconds);
    }

    pub fn skip_back(&mut self) {
        self.skip(-self.skip_seconds);
    }

    /// Set the volume; zero also mutes, anything else unmutes.
    pub fn set_volume(&mut self, volume: f64) {
        if let Some(applied) = self.session.set_volume(volume) {
            self.surface.set_volume(applied);
            self.surface.set_muted(self.session.is_muted);
        }
    }

    /// Flip mute; the stored volume is kept for unmuting.
    pub fn toggle_mute(&mut self) {
        let muted = self.session.toggle_mute();
        self.surface.set_muted(muted);
    }

    /// Enter or leave fullscreen. No-op until the container exists.
    pub fn toggle_fullscreen(&mut self) {
        if self.disposed {
            return;
        }
        if !self.surface.container_mounted() {
            debug!("Player container not mounted, ignoring fullscreen toggle");
            return;
        }

        let request = if self.surface.is_fullscreen() {
            self.surface.exit_fullscreen()
        } else {
            self.surface.request_fullscreen()
        };
        self.pending
            .push(async move { Settled::Fullscreen(request.await) }.boxed());
    }

    /// Pointer or touch activity over the player.
    pub fn interact(&mut self) {
        self.session.controls_visible = true;
        self.controls_timer.arm();
    }

    /// Pointer left the player: hide the controls at once while playing.
    pub fn pointer_left(&mut self) {
        if self.session.is_playing() {
            self.session.controls_visible = false;
            self.controls_timer.cancel();
        }
    }

    /// The page is going away; push the position without waiting.
    pub fn before_unload(&mut self) {
        self.push_progress();
    }

    /// Release the surface.
    ///
    /// Cancels both timers, pushes a final save through the same path as
    /// [`pause`](Self::pause) when anything was watched, drops outstanding
    /// requests and unsubscribes from the surface. Runs at most once; also
    /// called on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.save_timer.cancel();
        self.controls_timer.cancel();
        if self.session.current_time > 0.0 {
            self.push_progress();
        }

        self.pending = FuturesUnordered::new();
        self.play_pending = false;
        self.surface.unsubscribe();
        self.events = None;
        debug!("Player disposed");
    }

    // ------------------------------------------------------------------
    // Wake-ups
    // ------------------------------------------------------------------

    /// Wait for the next surface event, settled request or timer expiry.
    ///
    /// Cancel-safe: nothing is lost if the returned future is dropped.
    pub async fn next_wakeup(&mut self) -> Wakeup {
        let events = &mut self.events;
        let pending = &mut self.pending;
        let save_timer = &self.save_timer;
        let controls_timer = &self.controls_timer;

        tokio::select! {
            Some(event) = next_event(events) => Wakeup::Surface(event),
            Some(settled) = pending.next(), if !pending.is_empty() => Wakeup::Settled(settled),
            () = save_timer.expired() => Wakeup::SaveDue,
            () = controls_timer.expired() => Wakeup::ControlsDue,
        }
    }

    pub fn handle_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::Surface(event) => self.handle_surface_event(event),
            Wakeup::Settled(settled) => self.handle_settled(settled),
            Wakeup::SaveDue => {
                if self.save_timer.take_expired() {
                    self.push_progress();
                }
            }
            Wakeup::ControlsDue => {
                if self.controls_timer.take_expired() && self.session.is_playing() {
                    self.session.controls_visible = false;
                }
            }
        }
    }

    /// Wait for and apply one wake-up.
    pub async fn step(&mut self) {
        let wakeup = self.next_wakeup().await;
        self.handle_wakeup(wakeup);
    }

    /// Apply a lifecycle event reported by the surface.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        if self.disposed {
            return;
        }
        match event {
            SurfaceEvent::TimeUpdate(seconds) => {
                self.session.observe_time(seconds);
                self.save_timer.arm();
            }
            SurfaceEvent::LoadedMetadata { duration } => {
                self.session.observe_duration(duration);
                if self.session.phase == PlayerPhase::Loading {
                    self.session.phase = PlayerPhase::Paused;
                }
                debug!("Metadata loaded, duration {:.1}s", self.session.duration);
            }
            SurfaceEvent::Play => {
                if self.session.phase != PlayerPhase::Idle {
                    self.enter_playing();
                }
            }
            SurfaceEvent::Pause => {
                if self.session.is_playing() {
                    self.enter_paused();
                }
            }
            SurfaceEvent::Ended => self.on_ended(),
            SurfaceEvent::FullscreenChange(fullscreen) => {
                if self.session.is_fullscreen != fullscreen {
                    self.session.is_fullscreen = fullscreen;
                    self.notify(PlayerEvent::FullscreenChanged(fullscreen));
                }
            }
            SurfaceEvent::Error(message) => {
                warn!("Video source error: {}", message);
                self.notify(PlayerEvent::SourceFailed(message));
            }
        }
    }

    fn handle_settled(&mut self, settled: Settled) {
        match settled {
            Settled::Play(Ok(())) => {
                if !std::mem::take(&mut self.play_pending) {
                    debug!("Play settled after a pause, staying paused");
                    return;
                }
                self.enter_playing();
                self.notify(PlayerEvent::Started);
            }
            Settled::Play(Err(e)) => {
                if !std::mem::take(&mut self.play_pending) {
                    debug!("Play request dropped after a pause: {}", e);
                    return;
                }
                warn!("Video play error: {}", e);
                let was_playing = self.session.is_playing();
                if self.session.phase != PlayerPhase::Ended {
                    self.session.phase = PlayerPhase::Paused;
                }
                self.show_controls_until_playing();
                if was_playing {
                    self.notify(PlayerEvent::PlayingChanged(false));
                }
                self.notify(PlayerEvent::PlaybackFailed(e.to_string()));
            }
            Settled::Fullscreen(Ok(())) => {}
            Settled::Fullscreen(Err(e)) => warn!("Fullscreen request failed: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn start_playback(&mut self) {
        let request = self.surface.play();
        self.play_pending = true;
        self.pending
            .push(async move { Settled::Play(request.await) }.boxed());
    }

    fn enter_playing(&mut self) {
        if self.session.is_playing() {
            return;
        }
        self.session.phase = PlayerPhase::Playing;
        self.controls_timer.arm();
        self.notify(PlayerEvent::PlayingChanged(true));
    }

    fn enter_paused(&mut self) {
        let was_playing = self.session.is_playing();
        self.session.phase = PlayerPhase::Paused;
        self.show_controls_until_playing();
        if was_playing {
            self.notify(PlayerEvent::PlayingChanged(false));
        }
        self.push_progress();
    }

    fn on_ended(&mut self) {
        self.session.phase = PlayerPhase::Ended;
        self.save_timer.cancel();
        self.show_controls_until_playing();
        self.notify(PlayerEvent::PlayingChanged(false));
        // Reaching the end always clears, whatever the thresholds say
        self.sink.clear();
    }

    fn show_controls_until_playing(&mut self) {
        self.session.controls_visible = true;
        self.controls_timer.cancel();
    }

    fn seek_surface(&mut self, seconds: f64) {
        self.surface.seek(seconds);
        self.session.current_time = seconds;
    }

    fn push_progress(&mut self) {
        self.save_timer.cancel();
        self.sink
            .save(self.session.current_time, self.session.duration);
    }

    fn notify(&self, event: PlayerEvent) {
        // Nobody listening is fine
        let _ = self.notifier.send(event);
    }
}

impl<S: PlaybackSurface> Drop for PlaybackController<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<SurfaceEvent>>,
) -> Option<SurfaceEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
