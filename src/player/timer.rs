//! Cancel-and-restart single-shot timer

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// A single-shot timer that re-arming pushes back.
///
/// At most one deadline is pending. Arming replaces it, cancelling clears
/// it, and [`expired`](Self::expired) resolves when the current deadline
/// passes. The owner clears the timer after handling an expiry with
/// [`take_expired`](Self::take_expired).
#[derive(Debug, Clone)]
pub struct Debounce {
    period: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Start the countdown from now, dropping any pending one.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve once the pending deadline passes; never resolves when idle.
    ///
    /// Cancel-safe: dropping the future leaves the timer armed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Clear the timer if its deadline has passed.
    ///
    /// Returns whether it fired.
    pub fn take_expired(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
