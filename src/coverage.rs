//! Process-wide coverage bitmap (spec.md §4.8).
//!
//! Grounded on the original `coverage.c`: a global `uint8_t[]` bitmap,
//! per-thread bitmaps merged into it under `commit_thread`, and an
//! `is_complete` flag latched once every bit is set. The global state here
//! is an `OnceLock`-backed struct of atomics in place of C's file-scope
//! static plus `_Atomic` qualifiers.
//!
//! `coverage_global_count` in the original rescans the whole bitmap on every
//! call. This port instead maintains a running [`AtomicUsize`] counter,
//! incremented inside `commit_thread` by exactly the number of newly-set
//! bits it already has to compute to return its own result — the scan is
//! already paid for there, so keeping a running total turns every other
//! caller's `global_count()` into an `O(1)` load instead of an `O(n)` rescan.
//! The fuzzer orchestrator polls this on every iteration to decide whether
//! to keep running, so paying for the O(n) scan there would dominate the
//! loop.
//!
//! This module never reads a clock itself (no `Instant::now()`/
//! `SystemTime::now()` inside it): every timestamp is a `u64` microsecond
//! value threaded in by the caller, so the bitmap/latch logic stays
//! deterministic and testable without a wall clock. [`crate::fuzz::orchestrator`]
//! is the one caller that owns a real clock.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// Consider fuzzing complete if no new coverage appears for this long.
pub const STALE_COVERAGE_TIMEOUT_US: u64 = 1_000_000;

struct CoverageState {
    global_bits: Mutex<Vec<u8>>,
    num_bits: usize,
    is_complete: AtomicBool,
    last_new_coverage_time_us: AtomicU64,
    global_count: AtomicUsize,
}

static COVERAGE: OnceLock<CoverageState> = OnceLock::new();

/// Initializes the global coverage bitmap to `size` instrumented sites.
/// Mirrors `coverage_init`'s "already initialized" guard: a second call is a
/// no-op returning `false`. `now_us` is the caller's clock reading at
/// init time, used as the initial "last new coverage" timestamp.
pub fn init(size: usize, now_us: u64) -> bool {
    if size == 0 {
        return false;
    }
    COVERAGE
        .set(CoverageState {
            global_bits: Mutex::new(vec![0; size]),
            num_bits: size,
            is_complete: AtomicBool::new(false),
            last_new_coverage_time_us: AtomicU64::new(now_us),
            global_count: AtomicUsize::new(0),
        })
        .is_ok()
}

fn state() -> Option<&'static CoverageState> {
    COVERAGE.get()
}

/// A fresh, zeroed per-thread bitmap the same size as the global one.
pub fn create_thread_bitmap() -> Vec<u8> {
    match state() {
        Some(s) => vec![0; s.num_bits],
        None => Vec::new(),
    }
}

pub fn reset_thread(bitmap: &mut [u8]) {
    bitmap.iter_mut().for_each(|b| *b = 0);
}

pub fn mark_thread(bitmap: &mut [u8], pc: usize) {
    if let Some(slot) = bitmap.get_mut(pc) {
        *slot = 1;
    }
}

/// Merges a thread-local bitmap into the global one, returning the number
/// of newly-covered sites. `now_us` is the caller's clock reading, recorded
/// as the new "last new coverage" timestamp when any bit was newly set.
pub fn commit_thread(bitmap: &[u8], now_us: u64) -> usize {
    let Some(s) = state() else { return 0 };
    let mut global = s.global_bits.lock().unwrap();

    let mut new_bits = 0;
    let limit = bitmap.len().min(global.len());
    for i in 0..limit {
        if bitmap[i] != 0 && global[i] == 0 {
            global[i] = 1;
            new_bits += 1;
        }
    }

    if new_bits > 0 {
        s.global_count.fetch_add(new_bits, Ordering::Relaxed);
        s.last_new_coverage_time_us.store(now_us, Ordering::Relaxed);
        if global.iter().all(|&b| b != 0) {
            s.is_complete.store(true, Ordering::Release);
        }
    }

    new_bits
}

/// Counts bits set in `bitmap` that are not yet set globally, without
/// mutating anything (spec.md §4.8's "dry-run" check before committing).
pub fn check_bits(bitmap: &[u8]) -> usize {
    let Some(s) = state() else { return 0 };
    let global = s.global_bits.lock().unwrap();
    let limit = bitmap.len().min(global.len());
    (0..limit).filter(|&i| bitmap[i] == 1 && global[i] != 1).count()
}

/// The running count of globally-covered sites (see module docs for why
/// this is `O(1)` rather than a rescan).
pub fn global_count() -> usize {
    state().map(|s| s.global_count.load(Ordering::Relaxed)).unwrap_or(0)
}

pub fn total_bits() -> usize {
    state().map(|s| s.num_bits).unwrap_or(0)
}

pub fn is_complete() -> bool {
    state().map(|s| s.is_complete.load(Ordering::Acquire)).unwrap_or(false)
}

/// Microseconds elapsed between `now_us` (the caller's current clock
/// reading) and the last newly-covered site, used by the orchestrator's
/// stale-coverage termination check.
pub fn micros_since_last_new_coverage(now_us: u64) -> u64 {
    match state() {
        Some(s) => now_us.saturating_sub(s.last_new_coverage_time_us.load(Ordering::Relaxed)),
        None => 0,
    }
}

/// Tears down global coverage state, for use between independent analyzer
/// runs within one process (the design notes' explicit-teardown guidance).
pub fn reset_all() {
    if let Some(s) = state() {
        s.global_bits.lock().unwrap().iter_mut().for_each(|b| *b = 0);
        s.global_count.store(0, Ordering::Relaxed);
        s.is_complete.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // The coverage bitmap is a process-wide singleton sized on first use;
    // every test shares one 4-bit map and resets it before asserting.
    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    fn with_fresh_bitmap(f: impl FnOnce()) {
        let _guard = TEST_LOCK.lock().unwrap();
        init(4, 0);
        reset_all();
        f();
    }

    #[test]
    fn commit_reports_only_newly_covered_bits() {
        with_fresh_bitmap(|| {
            let mut local = create_thread_bitmap();
            mark_thread(&mut local, 0);
            mark_thread(&mut local, 1);
            assert_eq!(commit_thread(&local, 10), 2);

            let mut local2 = create_thread_bitmap();
            mark_thread(&mut local2, 1);
            mark_thread(&mut local2, 2);
            assert_eq!(commit_thread(&local2, 20), 1);
            assert_eq!(global_count(), 3);
        });
    }

    #[test]
    fn complete_once_every_bit_set() {
        with_fresh_bitmap(|| {
            assert!(!is_complete());

            let mut local = create_thread_bitmap();
            mark_thread(&mut local, 0);
            mark_thread(&mut local, 1);
            mark_thread(&mut local, 2);
            mark_thread(&mut local, 3);
            commit_thread(&local, 10);
            assert!(is_complete());
        });
    }

    #[test]
    fn micros_since_last_new_coverage_uses_threaded_clock() {
        with_fresh_bitmap(|| {
            let mut local = create_thread_bitmap();
            mark_thread(&mut local, 0);
            commit_thread(&local, 100);
            assert_eq!(micros_since_last_new_coverage(150), 50);
        });
    }
}
