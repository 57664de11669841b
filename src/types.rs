//! Domain-specific newtypes for type safety.
//!
//! Viewer and movie identities are both plain strings in storage; wrapping
//! them keeps a `(viewer, movie)` key from being built the wrong way round.
//! `WholeSeconds` is the integer-second unit used for persisted progress.

use std::fmt;
use std::ops::{Sub, SubAssign};

use derive_more::{Add as DeriveAdd, Display, From, Into};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identities
// ============================================================================

/// Generates `From<&str>` and `as_str` for string identity newtypes.
macro_rules! impl_identity {
    ($type:ident) => {
        impl $type {
            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $type {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

/// Identity of a signed-in viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl_identity!(ViewerId);

/// Identity of a catalog title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl_identity!(MovieId);

impl MovieId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ============================================================================
// WholeSeconds
// ============================================================================

/// A playback position or length truncated to whole seconds.
///
/// Persisted progress always goes through this type, so sub-second precision
/// is dropped before any threshold comparison against stored values.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    DeriveAdd,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct WholeSeconds(pub i64);

impl WholeSeconds {
    /// Create a new instance.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the inner value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Check if the value is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Floor a fractional number of seconds.
    ///
    /// Returns `None` for NaN and infinities.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn floor(seconds: f64) -> Option<Self> {
        seconds.is_finite().then(|| Self(seconds.floor() as i64))
    }

    /// Convert to seconds as a floating point value.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_secs_f64(self) -> f64 {
        self.0 as f64
    }
}

impl Sub for WholeSeconds {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for WholeSeconds {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// Clock-style rendering: `M:SS` below an hour, `H:MM:SS` above.
impl fmt::Display for WholeSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.max(0);
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{minutes}:{seconds:02}")
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
