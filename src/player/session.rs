//! Observable state of one mounted player

use serde::{Deserialize, Serialize};

/// Where the player is in its lifecycle.
///
/// Mute and fullscreen are independent flags on [`PlaybackSession`] and can
/// be toggled in any phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerPhase {
    /// No source bound
    #[default]
    Idle,
    /// Source bound, metadata pending
    Loading,
    /// Waiting for the viewer to pick resume or start over
    ResumePrompt,
    Paused,
    Playing,
    Ended,
}

/// Playback state owned by one controller instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub phase: PlayerPhase,
    pub is_muted: bool,
    pub is_fullscreen: bool,
    /// Position in seconds
    pub current_time: f64,
    /// Media length in seconds; 0 until metadata loads
    pub duration: f64,
    /// Volume in `[0, 1]`; kept while muted so unmuting restores it
    pub volume: f64,
    pub controls_visible: bool,
    /// Set once the resume prompt has been offered for the current source
    pub resume_dialog_shown: bool,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Idle,
            is_muted: false,
            is_fullscreen: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            controls_visible: true,
            resume_dialog_shown: false,
        }
    }
}

impl PlaybackSession {
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.phase == PlayerPhase::Playing
    }

    /// Whether the media length is known yet.
    #[must_use]
    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }

    /// Clamp a position into `[0, duration]`.
    ///
    /// Before metadata arrives the upper bound is the unknown duration of
    /// zero, so every target collapses to the start.
    #[must_use]
    pub fn clamp_time(&self, seconds: f64) -> f64 {
        if seconds.is_nan() {
            return 0.0;
        }
        seconds.max(0.0).min(self.duration)
    }

    /// Record a position reported by the surface.
    ///
    /// Reports are only capped at the duration once it is known.
    pub fn observe_time(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.current_time = if self.has_duration() {
            self.clamp_time(seconds)
        } else {
            seconds.max(0.0)
        };
    }

    /// Record the media length from loaded metadata.
    pub fn observe_duration(&mut self, seconds: f64) {
        self.duration = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        if self.has_duration() {
            self.current_time = self.clamp_time(self.current_time);
        }
    }

    /// Set the volume; zero mutes, anything louder unmutes.
    ///
    /// Returns the applied value, or `None` for NaN.
    pub fn set_volume(&mut self, volume: f64) -> Option<f64> {
        if volume.is_nan() {
            return None;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        self.is_muted = volume == 0.0;
        Some(volume)
    }

    /// Flip mute without touching the stored volume.
    pub fn toggle_mute(&mut self) -> bool {
        self.is_muted = !self.is_muted;
        self.is_muted
    }

    /// Reset everything tied to the previous source.
    ///
    /// Volume, mute and fullscreen belong to the player, not the media, and
    /// survive a source change.
    pub fn reset_for_source(&mut self) {
        self.phase = PlayerPhase::Loading;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.controls_visible = true;
        self.resume_dialog_shown = false;
    }
}
