//! Test doubles for the player

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;

use super::surface::{PlaybackSurface, SurfaceError, SurfaceEvent, SurfaceRequest};
use crate::progress::ProgressSink;

#[derive(Debug)]
struct FakeState {
    sources: Vec<String>,
    seeks: Vec<f64>,
    plays: usize,
    pauses: usize,
    volume: Option<f64>,
    muted: Option<bool>,
    fullscreen_requests: usize,
    fullscreen_exits: usize,
    fullscreen: bool,
    container_mounted: bool,
    paused: bool,
    position: f64,
    reject_next_play: Option<String>,
    subscriber: Option<mpsc::UnboundedSender<SurfaceEvent>>,
}

/// Surface that records every call and settles requests immediately.
///
/// Clones share state, so a test keeps one to inspect what the controller
/// did with the other.
#[derive(Debug, Clone)]
pub struct FakeSurface {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                sources: Vec::new(),
                seeks: Vec::new(),
                plays: 0,
                pauses: 0,
                volume: None,
                muted: None,
                fullscreen_requests: 0,
                fullscreen_exits: 0,
                fullscreen: false,
                container_mounted: true,
                paused: true,
                position: 0.0,
                reject_next_play: None,
                subscriber: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reject_next_play(&self, reason: &str) {
        self.state().reject_next_play = Some(reason.to_string());
    }

    pub fn set_container_mounted(&self, mounted: bool) {
        self.state().container_mounted = mounted;
    }

    pub fn sources(&self) -> Vec<String> {
        self.state().sources.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state().seeks.clone()
    }

    pub fn plays(&self) -> usize {
        self.state().plays
    }

    pub fn pauses(&self) -> usize {
        self.state().pauses
    }

    pub fn volume(&self) -> Option<f64> {
        self.state().volume
    }

    pub fn muted(&self) -> Option<bool> {
        self.state().muted
    }

    /// `(requests, exits)`
    pub fn fullscreen_requests(&self) -> (usize, usize) {
        let state = self.state();
        (state.fullscreen_requests, state.fullscreen_exits)
    }

    pub fn subscribed(&self) -> bool {
        self.state().subscriber.is_some()
    }

    /// Queue `event` on the current subscription, as the media element would.
    ///
    /// Returns false when nobody is subscribed.
    pub fn emit(&self, event: SurfaceEvent) -> bool {
        self.state()
            .subscriber
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}

impl PlaybackSurface for FakeSurface {
    fn set_source(&mut self, url: &str, _poster_url: Option<&str>) {
        let mut state = self.state();
        state.sources.push(url.to_string());
        state.position = 0.0;
        state.paused = true;
    }

    fn play(&mut self) -> SurfaceRequest {
        let mut state = self.state();
        state.plays += 1;
        let result = match state.reject_next_play.take() {
            Some(reason) => Err(SurfaceError::Rejected(reason)),
            None => {
                state.paused = false;
                Ok(())
            }
        };
        future::ready(result).boxed()
    }

    fn pause(&mut self) {
        let mut state = self.state();
        state.pauses += 1;
        state.paused = true;
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = self.state();
        state.seeks.push(seconds);
        state.position = seconds;
    }

    fn set_volume(&mut self, volume: f64) {
        self.state().volume = Some(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.state().muted = Some(muted);
    }

    fn current_time(&self) -> f64 {
        self.state().position
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn container_mounted(&self) -> bool {
        self.state().container_mounted
    }

    fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }

    fn request_fullscreen(&mut self) -> SurfaceRequest {
        let mut state = self.state();
        state.fullscreen_requests += 1;
        state.fullscreen = true;
        future::ready(Ok(())).boxed()
    }

    fn exit_fullscreen(&mut self) -> SurfaceRequest {
        let mut state = self.state();
        state.fullscreen_exits += 1;
        state.fullscreen = false;
        future::ready(Ok(())).boxed()
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SurfaceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscriber = Some(tx);
        rx
    }

    fn unsubscribe(&mut self) {
        self.state().subscriber = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Save(f64, f64),
    Clear,
}

/// Progress sink that only remembers what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: SinkCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl ProgressSink for RecordingSink {
    fn save(&self, progress_seconds: f64, duration_seconds: f64) {
        self.record(SinkCall::Save(progress_seconds, duration_seconds));
    }

    fn clear(&self) {
        self.record(SinkCall::Clear);
    }
}

/// Everything queued on `rx` right now.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
