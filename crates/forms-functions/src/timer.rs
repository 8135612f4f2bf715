//! Countdown timers for OTP-style "resend in N seconds" fields.
//!
//! Timers belong to the `CountdownTimers` value that started them: starting a
//! countdown on a field that already has one replaces it, and dropping the
//! registry cancels everything it still runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use n0_future::task::{self, JoinHandle};
use n0_future::time::{self, Duration};
use smol_str::SmolStr;

/// Length of the stock OTP countdown.
pub const DEFAULT_COUNTDOWN_SECS: u32 = 21;

/// Formats the remaining seconds for display.
pub type TickFormat = Arc<dyn Fn(u32) -> String + Send + Sync>;

#[derive(Clone)]
pub struct CountdownOptions {
    pub seconds: u32,
    pub format: TickFormat,
}

impl Default for CountdownOptions {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_COUNTDOWN_SECS,
            format: Arc::new(|s| format!("{s} sec")),
        }
    }
}

impl CountdownOptions {
    pub fn with_seconds(mut self, seconds: u32) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn with_format(mut self, format: impl Fn(u32) -> String + Send + Sync + 'static) -> Self {
        self.format = Arc::new(format);
        self
    }
}

/// One update for the field a countdown drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub field: SmolStr,
    pub remaining: u32,
    /// Display text produced by the countdown's format.
    pub text: String,
    /// While set, the field is read-only and its resend control disabled.
    pub locked: bool,
}

struct Countdown {
    task: Option<JoinHandle<()>>,
    done: Arc<AtomicBool>,
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Registry of running countdowns, keyed by field name.
#[derive(Default)]
pub struct CountdownTimers {
    timers: HashMap<SmolStr, Countdown>,
}

impl CountdownTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown on `field`, replacing any countdown already running there.
    ///
    /// The first tick is delivered before this returns; the rest arrive once a
    /// second until the final, unlocked tick at zero.
    pub fn start<F>(&mut self, field: impl Into<SmolStr>, options: CountdownOptions, mut on_tick: F)
    where
        F: FnMut(Tick) + Send + 'static,
    {
        let field = field.into();
        if self.stop(&field) {
            tracing::debug!(%field, "restarting countdown");
        }

        let CountdownOptions { seconds, format } = options;
        let done = Arc::new(AtomicBool::new(seconds == 0));
        on_tick(Tick {
            field: field.clone(),
            remaining: seconds,
            text: format(seconds),
            locked: seconds > 0,
        });

        let task = if seconds == 0 {
            None
        } else {
            let done = done.clone();
            let field = field.clone();
            Some(task::spawn(async move {
                let mut remaining = seconds;
                while remaining > 0 {
                    time::sleep(Duration::from_secs(1)).await;
                    remaining -= 1;
                    on_tick(Tick {
                        field: field.clone(),
                        remaining,
                        text: format(remaining),
                        locked: remaining > 0,
                    });
                }
                done.store(true, Ordering::Release);
            }))
        };

        self.timers.insert(field, Countdown { task, done });
    }

    /// Cancel the countdown on `field`. Returns whether one was still running.
    pub fn stop(&mut self, field: &str) -> bool {
        self.timers
            .remove(field)
            .is_some_and(|countdown| !countdown.done.load(Ordering::Acquire))
    }

    pub fn is_active(&self, field: &str) -> bool {
        self.timers
            .get(field)
            .is_some_and(|countdown| !countdown.done.load(Ordering::Acquire))
    }

    /// Number of countdowns still running.
    pub fn active(&self) -> usize {
        self.timers
            .values()
            .filter(|countdown| !countdown.done.load(Ordering::Acquire))
            .count()
    }
}
