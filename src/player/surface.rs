//! Playback surface capability
//!
//! The surface is whatever actually renders media: a native video element,
//! an mpv handle, or [`super::HeadlessSurface`]. The controller only issues
//! requests and listens to lifecycle events; it never inspects internals.

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

/// Faults reported by a surface for asynchronous requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface refused to start playback
    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("no source loaded")]
    NoSource,

    #[error("fullscreen unavailable: {0}")]
    FullscreenUnavailable(String),
}

/// Lifecycle notifications emitted by a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Position advanced or jumped, in seconds
    TimeUpdate(f64),
    /// Media length became known, in seconds
    LoadedMetadata { duration: f64 },
    Play,
    Pause,
    Ended,
    /// The surface's container entered (`true`) or left fullscreen
    FullscreenChange(bool),
    /// The source failed to load or decode
    Error(String),
}

/// Pending result of an asynchronous surface request.
pub type SurfaceRequest = BoxFuture<'static, Result<(), SurfaceError>>;

/// Media control capability driven by the playback controller.
pub trait PlaybackSurface: Send {
    /// Bind a new source; metadata arrives later as an event.
    fn set_source(&mut self, url: &str, poster_url: Option<&str>);

    /// Ask the surface to start playing. Completion or rejection arrives
    /// through the returned future; the caller must not block on it.
    fn play(&mut self) -> SurfaceRequest;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    /// Position as the surface currently sees it
    fn current_time(&self) -> f64;

    fn is_paused(&self) -> bool;

    /// Whether the container that can go fullscreen exists yet
    fn container_mounted(&self) -> bool;

    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> SurfaceRequest;

    fn exit_fullscreen(&mut self) -> SurfaceRequest;

    /// Start delivering events to a new receiver, replacing any previous one.
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SurfaceEvent>;

    /// Stop delivering events.
    fn unsubscribe(&mut self);
}
