//! Seqlock-style cross-context publication (spec §5).
//!
//! Re-targets the odd/even `write_seq` protocol of
//! `evo_common::shm::p2p::P2pSegmentHeader` (and the atomic
//! fence/`Ordering` discipline of `evo_shared_memory`'s
//! `SegmentWriter`/`SegmentReader`) from an mmap'd IPC segment onto a
//! plain `AtomicU32` + `UnsafeCell<T>` pair living in process memory.
//! The acquire/release protocol is identical; only the transport changed
//! — spec §9's "seqlock implemented with compiler barriers only" note
//! explicitly calls out that hardware acquire/release (not merely
//! compiler barriers) is the correctness contract here.
//!
//! Writer: odd sequence = write in progress, even = stable. Readers spin
//! until they observe a stable, unchanged sequence around the payload
//! read — if `read()` returns `Some`, the payload is guaranteed to be a
//! complete single write with no torn fields (spec §8).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// Maximum read retries before giving up and returning `None` (mirrors
/// `SegmentReader::read_range`'s `max_retries`).
const MAX_RETRIES: u32 = 16;

/// A single-writer, multi-reader seqlock cell for `Copy` payloads.
///
/// `T` must be `Copy` — the cell moves it by value in and out, never
/// hands out a reference into the cell (so there is nothing for a
/// concurrent writer to tear out from under a reader).
pub struct SeqlockCell<T: Copy> {
    seq: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: the odd/even sequence protocol below ensures no two threads
// ever read/write `value` concurrently in a way that produces a torn
// read; `T: Copy` rules out any interior aliasing through `T` itself.
unsafe impl<T: Copy + Send> Sync for SeqlockCell<T> {}

impl<T: Copy> SeqlockCell<T> {
    /// Create a new cell pre-populated with `initial`.
    pub const fn new(initial: T) -> Self {
        Self {
            seq: AtomicU32::new(0),
            value: UnsafeCell::new(initial),
        }
    }

    /// Publish a new value. Single-writer only — callers must not call
    /// this from more than one context concurrently (spec §5: "Writer
    /// increments the sequence ... publishes ... writes payload ...
    /// increments again").
    pub fn write(&self, new_value: T) {
        let start = self.seq.load(Ordering::Relaxed);
        // Begin write: make the sequence odd.
        self.seq.store(start.wrapping_add(1), Ordering::Release);
        fence(Ordering::Release);

        // SAFETY: sequence is odd, so no reader will treat `value` as
        // stable while this write is in progress.
        unsafe {
            *self.value.get() = new_value;
        }

        fence(Ordering::Release);
        // Commit: make the sequence even again.
        self.seq.store(start.wrapping_add(2), Ordering::Release);
    }

    /// Read the most recently published value. Retries internally while
    /// a write is in progress or the value changes mid-read; gives up
    /// after [`MAX_RETRIES`] attempts under pathological contention.
    pub fn read(&self) -> Option<T> {
        for _ in 0..MAX_RETRIES {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 != 0 {
                std::hint::spin_loop();
                continue;
            }
            fence(Ordering::Acquire);

            // SAFETY: `before` was even, meaning no write was in
            // progress at the moment of this load; re-checking the
            // sequence below detects any write that started since.
            let value = unsafe { *self.value.get() };

            fence(Ordering::Acquire);
            let after = self.seq.load(Ordering::Acquire);
            if before == after {
                return Some(value);
            }
            std::hint::spin_loop();
        }
        None
    }

    /// Sequence number observed right now, for staleness/"has changed"
    /// comparisons without paying for a full payload copy.
    pub fn sequence(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }
}

impl<T: Copy + Default> Default for SeqlockCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
