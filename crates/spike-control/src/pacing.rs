//! Loop pacing between controller iterations.

use std::time::Duration;

use spin_sleep::SpinSleeper;

/// Waits out the gap between two control iterations.
pub trait Ticker {
    /// Block for `period`.
    fn wait(&mut self, period: Duration);
}

/// Real-time pacing backed by a spin sleeper for sub-millisecond accuracy.
#[derive(Debug, Clone, Copy)]
pub struct SpinTicker {
    sleeper: SpinSleeper,
}

impl SpinTicker {
    /// `native_accuracy_ns` is the OS sleep accuracy the sleeper spins to cover.
    pub fn new(native_accuracy_ns: u32) -> Self {
        Self {
            sleeper: SpinSleeper::new(native_accuracy_ns),
        }
    }
}

impl Default for SpinTicker {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl Ticker for SpinTicker {
    fn wait(&mut self, period: Duration) {
        self.sleeper.sleep(period);
    }
}

/// Returns immediately. For simulated hubs whose state advances per command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Ticker for Immediate {
    fn wait(&mut self, _period: Duration) {}
}
