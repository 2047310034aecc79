//! HW-Time: a single shared monotonic µs counter (spec §4.1).
//!
//! Every scheduled event in the core reads its "now" from the same tick
//! source. On real hardware this would be a free-running 1 MHz timer
//! peripheral; on this host build it is an `AtomicU32` advanced by a
//! background ticker thread (sim) or read straight off `CLOCK_MONOTONIC`
//! (the `rt` feature) — the same dual-build split the teacher uses for
//! `evo_control_unit::cycle::{run_rt_loop, run_sim_loop}`.
//!
//! All elapsed-time math is modular 32-bit subtraction (`wrapping_sub`);
//! callers never compare absolute ticks beyond a short horizon.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

/// Shared handle to the HW-Time tick counter.
///
/// Cheap to clone (an `Arc<AtomicU32>` underneath) — every context that
/// needs "now" holds one of these rather than passing a raw pointer.
#[derive(Clone)]
pub struct HwClock {
    ticks: Arc<AtomicU32>,
}

impl HwClock {
    /// Create a new clock starting at tick 0.
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Current tick [µs]. Wraps every ~71 minutes (`u32::MAX` µs).
    #[inline]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// The counter view used to arm absolute compares on `channel`.
    ///
    /// Identical domain as [`Self::now`] — spec §4.1 deliberately does not
    /// distinguish per-channel clocks, so this is a thin alias kept for
    /// call-site clarity at the scheduler boundary.
    #[inline]
    pub fn scheduler_now(&self, _channel: u8) -> u32 {
        self.now()
    }

    /// Advance the counter by `delta_us`. Used by the sim ticker thread
    /// and directly by tests that want deterministic time control.
    #[inline]
    pub fn advance(&self, delta_us: u32) {
        self.ticks.fetch_add(delta_us, Ordering::AcqRel);
    }

    /// Force the counter to an exact value. Test-only: production code
    /// only ever moves time forward via [`Self::advance`] or the ticker.
    #[cfg(test)]
    pub fn set(&self, value: u32) {
        self.ticks.store(value, Ordering::Release);
    }
}

impl Default for HwClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed time from `earlier` to `later`, wraparound-safe.
#[inline]
pub fn elapsed_us(later: u32, earlier: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Signed delta `target - now`, used by the scheduler's "has this tick
/// already passed" check (spec §4.3: "interpreted as a signed 32-bit
/// delta").
#[inline]
pub fn signed_delta(target: u32, now: u32) -> i32 {
    target.wrapping_sub(now) as i32
}

/// Background thread that advances an [`HwClock`] at wall-clock rate in
/// the non-`rt` (simulation/bench/test) build, mirroring
/// `evo_control_unit::cycle::run_sim_loop`'s `std::thread::sleep` pacing
/// rather than a real hardware timer interrupt.
pub struct SimTicker {
    stop: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SimTicker {
    /// Spawn a ticker advancing `clock` by `period_us` every `period_us`
    /// of wall-clock time (i.e. real-time rate, not accelerated).
    pub fn spawn(clock: HwClock, period_us: u32) -> Self {
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop_inner = stop.clone();
        let handle = thread::spawn(move || {
            let period = Duration::from_micros(period_us as u64);
            while !stop_inner.load(Ordering::Acquire) {
                thread::sleep(period);
                clock.advance(period_us);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SimTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
