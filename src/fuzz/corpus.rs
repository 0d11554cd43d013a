//! Test case corpus (spec.md §4.9 / original `testCaseCorpus.c`).
//!
//! The original protects a fixed-capacity `TestCase*[]` array with one
//! global `pthread_mutex_t`; this port keeps the same "single lock, whole
//! corpus" shape with a `Mutex<Vec<Arc<TestCase>>>`, since `Vec` already
//! gives growth without a pre-sized capacity ceiling to maintain.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// One fuzz input: its bytes, the coverage bitmap it produced, and how many
/// times it has been chosen as a mutation parent.
pub struct TestCase {
    pub data: Vec<u8>,
    pub coverage_bitmap: Vec<u8>,
    pub fuzz_count: AtomicU32,
}

impl TestCase {
    pub fn new(data: Vec<u8>, coverage_bitmap: Vec<u8>) -> TestCase {
        TestCase { data, coverage_bitmap, fuzz_count: AtomicU32::new(0) }
    }

    /// A fresh copy of `self` with the same bytes, a zeroed coverage map
    /// sized like the parent's, and its own fuzz counter — mirrors
    /// `testCase_copy`, which the orchestrator uses before mutating a
    /// chosen parent in place.
    pub fn child(&self) -> TestCase {
        TestCase {
            data: self.data.clone(),
            coverage_bitmap: vec![0; self.coverage_bitmap.len()],
            fuzz_count: AtomicU32::new(0),
        }
    }
}

#[derive(Default)]
pub struct Corpus {
    items: Mutex<Vec<Arc<TestCase>>>,
}

impl Corpus {
    pub fn new() -> Corpus {
        Corpus::default()
    }

    pub fn add(&self, tc: Arc<TestCase>) {
        self.items.lock().unwrap().push(tc);
    }

    pub fn size(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn get(&self, index: usize) -> Option<Arc<TestCase>> {
        self.items.lock().unwrap().get(index).cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<TestCase>> {
        self.items.lock().unwrap().clone()
    }

    /// Picks a random existing member, or `None` for an empty corpus (the
    /// orchestrator falls back to its seed inputs in that case).
    pub fn choose(&self, rng: &mut impl rand::Rng) -> Option<Arc<TestCase>> {
        let items = self.items.lock().unwrap();
        if items.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..items.len());
        Some(Arc::clone(&items[idx]))
    }
}
