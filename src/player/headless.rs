//! Playback surface without any output
//!
//! Simulates a media element for a title of known length: position advances
//! on a tokio interval, scaled by a speed factor, and the usual lifecycle
//! events are emitted. Used by the `watch` command and in tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::surface::{PlaybackSurface, SurfaceError, SurfaceEvent, SurfaceRequest};

#[derive(Debug)]
struct HeadlessState {
    source: Option<String>,
    media_length: f64,
    position: f64,
    paused: bool,
    fullscreen: bool,
    volume: f64,
    muted: bool,
    subscriber: Option<mpsc::UnboundedSender<SurfaceEvent>>,
}

impl HeadlessState {
    fn emit(&self, event: SurfaceEvent) {
        if let Some(tx) = &self.subscriber {
            let _ = tx.send(event);
        }
    }
}

#[derive(Debug)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
    tick: Duration,
    speed: f64,
    ticker: Option<JoinHandle<()>>,
}

impl HeadlessSurface {
    /// A surface for media `media_length` seconds long, reporting the
    /// position every `tick`.
    #[must_use]
    pub fn new(media_length: f64, tick: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState {
                source: None,
                media_length: media_length.max(0.0),
                position: 0.0,
                paused: true,
                fullscreen: false,
                volume: 1.0,
                muted: false,
                subscriber: None,
            })),
            tick,
            speed: 1.0,
            ticker: None,
        }
    }

    /// Advance `speed` media seconds per wall-clock second.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
        self
    }

    #[must_use]
    pub fn volume(&self) -> (f64, bool) {
        let state = self.state();
        (state.volume, state.muted)
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        lock(&self.state)
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();

        let shared = Arc::clone(&self.state);
        let tick = self.tick;
        let step = tick.as_secs_f64() * self.speed;

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut state = lock(&shared);
                if state.paused {
                    break;
                }
                state.position = (state.position + step).min(state.media_length);
                trace!("headless position {:.2}", state.position);
                state.emit(SurfaceEvent::TimeUpdate(state.position));

                if state.position >= state.media_length {
                    state.paused = true;
                    state.emit(SurfaceEvent::Pause);
                    state.emit(SurfaceEvent::Ended);
                    break;
                }
            }
        }));
    }
}

fn lock(state: &Mutex<HeadlessState>) -> MutexGuard<'_, HeadlessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlaybackSurface for HeadlessSurface {
    fn set_source(&mut self, url: &str, _poster_url: Option<&str>) {
        self.stop_ticker();
        let mut state = self.state();
        state.source = Some(url.to_string());
        state.position = 0.0;
        state.paused = true;

        if state.media_length > 0.0 {
            let duration = state.media_length;
            state.emit(SurfaceEvent::LoadedMetadata { duration });
        } else {
            state.emit(SurfaceEvent::Error(format!("no media length for {url}")));
        }
    }

    fn play(&mut self) -> SurfaceRequest {
        {
            let mut state = self.state();
            if state.source.is_none() || state.media_length <= 0.0 {
                return future::ready(Err(SurfaceError::NoSource)).boxed();
            }
            if state.position >= state.media_length {
                state.position = 0.0;
            }
            if state.paused {
                state.paused = false;
                state.emit(SurfaceEvent::Play);
            }
        }
        debug!("Headless playback started");
        self.start_ticker();
        future::ready(Ok(())).boxed()
    }

    fn pause(&mut self) {
        self.stop_ticker();
        let mut state = self.state();
        if !state.paused {
            state.paused = true;
            state.emit(SurfaceEvent::Pause);
        }
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = self.state();
        state.position = seconds.clamp(0.0, state.media_length);
        let position = state.position;
        state.emit(SurfaceEvent::TimeUpdate(position));
    }

    fn set_volume(&mut self, volume: f64) {
        self.state().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state().muted = muted;
    }

    fn current_time(&self) -> f64 {
        self.state().position
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn container_mounted(&self) -> bool {
        true
    }

    fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }

    fn request_fullscreen(&mut self) -> SurfaceRequest {
        let mut state = self.state();
        state.fullscreen = true;
        state.emit(SurfaceEvent::FullscreenChange(true));
        future::ready(Ok(())).boxed()
    }

    fn exit_fullscreen(&mut self) -> SurfaceRequest {
        let mut state = self.state();
        state.fullscreen = false;
        state.emit(SurfaceEvent::FullscreenChange(false));
        future::ready(Ok(())).boxed()
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SurfaceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscriber = Some(tx);
        rx
    }

    fn unsubscribe(&mut self) {
        self.stop_ticker();
        self.state().subscriber = None;
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
