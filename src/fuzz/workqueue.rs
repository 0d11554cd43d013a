//! Bounded MPMC ring buffer carrying work items to the fuzzer's worker
//! pool (spec.md §4.9).
//!
//! A one-to-one port of the original `workqueue.c`'s Vyukov-style
//! bounded queue: a power-of-two-capacity ring of `(sequence, data)` cells,
//! where `sequence` both protects a cell from concurrent claims and encodes
//! which lap of the ring currently owns it. `CachePadded` replaces the
//! original's implicit reliance on `malloc` alignment to keep producer and
//! consumer indices off the same cache line.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use super::corpus::TestCase;
use std::sync::Arc;

const EXTRA_CAPACITY: usize = 65_536;

fn next_power_of_two(x: usize) -> usize {
    if x < 2 {
        return 2;
    }
    x.next_power_of_two()
}

struct Cell {
    sequence: AtomicUsize,
    data: std::sync::Mutex<Option<Arc<TestCase>>>,
}

pub struct WorkQueue {
    mask: usize,
    buffer: Vec<CachePadded<Cell>>,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

impl WorkQueue {
    /// Sized to comfortably exceed the corpus it starts from, per the
    /// original's `n + WORKQUEUE_EXTRA_CAPACITY` headroom.
    pub fn with_capacity_hint(seed_count: usize) -> WorkQueue {
        let capacity = next_power_of_two(seed_count + EXTRA_CAPACITY);
        let buffer = (0..capacity)
            .map(|i| CachePadded::new(Cell { sequence: AtomicUsize::new(i), data: std::sync::Mutex::new(None) }))
            .collect();

        WorkQueue {
            mask: capacity - 1,
            buffer,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Drops the item if the queue is full, mirroring the original's
    /// fire-and-forget `workqueue_push`.
    pub fn push(&self, tc: Arc<TestCase>) {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let dif = seq as isize - pos as isize;

            if dif == 0 {
                if self
                    .enqueue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    *cell.data.lock().unwrap() = Some(tc);
                    cell.sequence.store(pos + 1, Ordering::Release);
                    return;
                }
            } else if dif < 0 {
                return;
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    pub fn pop(&self) -> Option<Arc<TestCase>> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let dif = seq as isize - (pos + 1) as isize;

            if dif == 0 {
                if self
                    .dequeue_pos
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    let tc = cell.data.lock().unwrap().take();
                    cell.sequence.store(pos + self.mask + 1, Ordering::Release);
                    return tc;
                }
            } else if dif < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }
}
