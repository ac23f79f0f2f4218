//! Cancellable pre-recording countdown

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::error::{ClipError, Result};

/// Longest accepted countdown in whole seconds
pub const MAX_COUNTDOWN_SECS: u32 = 10;

/// Interval between ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after reaching zero so the surface can show the recording indicator
pub const TERMINAL_DELAY: Duration = Duration::from_millis(500);

/// Progress notification for the countdown surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountdownEvent {
    /// Counter value after a one-second tick
    Tick { remaining: u32 },
    /// Counter hit zero; recording is about to start
    Recording,
}

/// Result of one countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Completed,
    Cancelled,
}

/// One countdown invocation
#[derive(Debug, Clone)]
pub struct CountdownController {
    duration: u32,
    tick: Duration,
    terminal_delay: Duration,
}

impl CountdownController {
    /// Create a countdown of `duration` whole seconds (0–10)
    pub fn new(duration: u32) -> Result<Self> {
        if duration > MAX_COUNTDOWN_SECS {
            return Err(ClipError::config(format!(
                "Countdown of {}s exceeds maximum of {}s",
                duration, MAX_COUNTDOWN_SECS
            )));
        }
        Ok(Self {
            duration,
            tick: TICK_INTERVAL,
            terminal_delay: TERMINAL_DELAY,
        })
    }

    /// Override tick interval and terminal delay
    pub fn with_timing(mut self, tick: Duration, terminal_delay: Duration) -> Self {
        self.tick = tick;
        self.terminal_delay = terminal_delay;
        self
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Run the countdown
    ///
    /// `cancelled` completing at any point, including during the terminal
    /// delay, resolves as [`CountdownOutcome::Cancelled`] and suppresses the
    /// pending completion. `on_event` sees each tick and the final
    /// [`CountdownEvent::Recording`].
    pub async fn run<F, E>(self, cancelled: F, mut on_event: E) -> CountdownOutcome
    where
        F: Future<Output = ()>,
        E: FnMut(CountdownEvent),
    {
        tokio::pin!(cancelled);

        let mut remaining = self.duration;
        let mut deadline = Instant::now();
        debug!("Countdown started at {}s", remaining);

        while remaining > 0 {
            deadline += self.tick;
            tokio::select! {
                biased;
                _ = &mut cancelled => {
                    info!("Countdown cancelled with {}s remaining", remaining);
                    return CountdownOutcome::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    remaining -= 1;
                    on_event(CountdownEvent::Tick { remaining });
                }
            }
        }

        on_event(CountdownEvent::Recording);
        tokio::select! {
            biased;
            _ = &mut cancelled => {
                info!("Countdown cancelled during terminal delay");
                CountdownOutcome::Cancelled
            }
            _ = sleep(self.terminal_delay) => {
                debug!("Countdown complete");
                CountdownOutcome::Completed
            }
        }
    }
}
