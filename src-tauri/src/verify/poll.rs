//! Bounded polling
//!
//! Waits for a condition by checking it once per fixed interval, up to a
//! fixed number of attempts. When the context publishes state changes each
//! change triggers an extra check, so a ready context is noticed without
//! sleeping out the interval. Only elapsed intervals count as attempts.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::context::ContextState;

/// Polling limits for one validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Attempts waiting for the snapshot to load
    pub snapshot_attempts: u32,
    /// Attempts waiting for the verifier to become ready
    pub verifier_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            snapshot_attempts: 20,
            verifier_attempts: 40,
        }
    }
}

/// Answer of one readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Done,
    Pending,
    /// Stop waiting; the result is no longer wanted
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Ready { attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled,
}

impl PollResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Check up to `max_attempts` intervals. `check` receives the 1-based attempt
/// number; checks triggered by a state change reuse the current one.
pub async fn poll_bounded<F>(
    mut signal: Option<watch::Receiver<ContextState>>,
    interval: Duration,
    max_attempts: u32,
    mut check: F,
) -> PollResult
where
    F: FnMut(u32) -> Probe,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    let mut next_tick = Instant::now() + interval;

    loop {
        match check(attempt) {
            Probe::Done => return PollResult::Ready { attempts: attempt },
            Probe::Cancel => return PollResult::Cancelled,
            Probe::Pending => {}
        }
        if attempt == max_attempts {
            return PollResult::Exhausted { attempts: max_attempts };
        }

        let woke_early = match signal.as_mut() {
            Some(rx) => match tokio::time::timeout_at(next_tick, rx.changed()).await {
                Ok(Ok(())) => true,
                Ok(Err(_)) => {
                    // Sender gone; nothing will wake us early again
                    signal = None;
                    false
                }
                Err(_) => false,
            },
            None => false,
        };
        if !woke_early {
            tokio::time::sleep_until(next_tick).await;
            attempt += 1;
            next_tick += interval;
        }
    }
}
