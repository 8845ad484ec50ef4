//! Cancellable polling task
//!
//! Runs a cycle future on a fixed interval until the cycle asks to stop,
//! a cycle limit is reached, or the cancellation token fires. Cancellation
//! is checked while waiting for a tick and while a cycle is in flight.
//!
//! Cycles never overlap: the next tick is awaited only after the previous
//! cycle finished. A cycle that overruns the interval delays the following
//! ticks instead of bursting to catch up.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Decision returned by each poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// How a polling task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A cycle returned [`PollControl::Stop`]
    Stopped { cycles: u64 },
    /// The cancellation token fired
    Cancelled { cycles: u64 },
    /// The cycle limit was reached without a stop
    Exhausted { cycles: u64 },
}

impl PollOutcome {
    pub fn cycles(&self) -> u64 {
        match self {
            PollOutcome::Stopped { cycles }
            | PollOutcome::Cancelled { cycles }
            | PollOutcome::Exhausted { cycles } => *cycles,
        }
    }
}

/// Fixed-interval polling loop with a stop predicate and cancellation
#[derive(Debug, Clone)]
pub struct PollingTask {
    interval: Duration,
    immediate: bool,
    max_cycles: Option<u64>,
    cancel: CancellationToken,
}

impl PollingTask {
    /// First cycle runs immediately, then one per `interval`
    pub fn repeating(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            immediate: true,
            max_cycles: None,
            cancel,
        }
    }

    /// First cycle runs after `delay`, then one per `delay`
    pub fn delayed(delay: Duration, cancel: CancellationToken) -> Self {
        Self {
            immediate: false,
            ..Self::repeating(delay, cancel)
        }
    }

    pub fn max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles.max(1));
        self
    }

    /// Drive `cycle` until stop, exhaustion or cancellation
    ///
    /// `cycle` receives the 1-based cycle number.
    pub async fn run<F, Fut>(self, mut cycle: F) -> PollOutcome
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = PollControl>,
    {
        let first_tick = if self.immediate {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PollOutcome::Cancelled { cycles },
                _ = ticker.tick() => {}
            }

            cycles += 1;
            let control = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PollOutcome::Cancelled { cycles },
                control = cycle(cycles) => control,
            };

            if control == PollControl::Stop {
                return PollOutcome::Stopped { cycles };
            }
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                return PollOutcome::Exhausted { cycles };
            }
        }
    }
}
