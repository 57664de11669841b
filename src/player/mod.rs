//! Video player state machine
//!
//! [`PlaybackController`] drives a [`PlaybackSurface`] and keeps a
//! [`PlaybackSession`] in step with it. [`spawn_player`] runs one on its own
//! task behind a [`PlayerHandle`].

mod controller;
mod driver;
mod headless;
mod session;
mod surface;
mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    MediaSource, PlaybackController, PlayerEvent, PlayerTimings, ResumeChoice, Settled, Wakeup,
};
pub use driver::{spawn_player, PlayerCommand, PlayerHandle};
pub use headless::HeadlessSurface;
pub use session::{PlaybackSession, PlayerPhase};
pub use surface::{PlaybackSurface, SurfaceError, SurfaceEvent, SurfaceRequest};
pub use timer::Debounce;
