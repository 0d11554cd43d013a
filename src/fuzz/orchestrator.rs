//! Fuzzer orchestrator: worker pool driving the corpus/work-queue/coverage
//! loop (spec.md §4.10).
//!
//! The original `fuzzer.c` is pseudocode — `while(not_done)`,
//! `if parse(child) = fail` — rather than compilable C; it fixes the loop's
//! shape (choose → copy → mutate → decode → run → check_bits → commit →
//! conditionally requeue) but not its termination or threading, which this
//! port fills in from spec.md §4.10/§5 directly: a fixed worker pool
//! busy-polling the work queue, stopping on coverage completion or a
//! stale-coverage timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::cache::{CacheEntry, CacheResolver};
use crate::coverage;
use crate::ir::method::MethodId;
use crate::types::TypeId;
use crate::vm::outcome::RuntimeOutcome;
use crate::vm::{self, VmContext};

use super::corpus::{Corpus, TestCase};
use super::mutate;
use super::seed;
use super::workqueue::WorkQueue;

/// Default stale-coverage timeout (spec.md §4.10 step 7, §5).
pub const STALE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct FuzzReport {
    pub outcomes: Vec<RuntimeOutcome>,
    pub corpus_size: usize,
    pub coverage_covered: usize,
    pub coverage_total: usize,
}

/// Runs the fuzzer to completion against `method`'s entry point.
pub fn run(
    decompiled_path: &str,
    method: &MethodId,
    entry: Arc<CacheEntry>,
    arg_types: Vec<TypeId>,
    seed_state: Option<&crate::interval::domain::IntervalState>,
    num_workers: usize,
) -> FuzzReport {
    let clock_start = Instant::now();

    let num_instructions = entry.ir.len();
    let cov_bytes = (num_instructions / 7) + 8;
    coverage::init(cov_bytes, clock_start.elapsed().as_micros() as u64);

    let corpus = Arc::new(Corpus::new());
    corpus.add(Arc::new(TestCase::new(vec![0], vec![0; cov_bytes])));
    if let Some(state) = seed_state {
        for tc in seed::generate(state, &arg_types, cov_bytes) {
            corpus.add(Arc::new(tc));
        }
    }

    let queue = Arc::new(WorkQueue::with_capacity_hint(corpus.size()));
    for tc in corpus.snapshot() {
        queue.push(tc);
    }

    let resolver = Arc::new(CacheResolver { decompiled_path: decompiled_path.to_string() });
    let outcomes = Arc::new(std::sync::Mutex::new(Vec::new()));

    std::thread::scope(|scope| {
        for worker_id in 0..num_workers.max(1) {
            let corpus = Arc::clone(&corpus);
            let queue = Arc::clone(&queue);
            let resolver = Arc::clone(&resolver);
            let entry = Arc::clone(&entry);
            let arg_types = arg_types.clone();
            let outcomes = Arc::clone(&outcomes);
            scope.spawn(move || {
                worker_loop(worker_id, &corpus, &queue, resolver.as_ref(), &entry, &arg_types, &outcomes, clock_start);
            });
        }
    });

    FuzzReport {
        outcomes: Arc::try_unwrap(outcomes).map(|m| m.into_inner().unwrap()).unwrap_or_default(),
        corpus_size: corpus.size(),
        coverage_covered: coverage::global_count(),
        coverage_total: coverage::total_bits(),
    }
}

fn should_stop(clock_start: Instant) -> bool {
    let now_us = clock_start.elapsed().as_micros() as u64;
    coverage::is_complete() || coverage::micros_since_last_new_coverage(now_us) > STALE_TIMEOUT.as_micros() as u64
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    corpus: &Corpus,
    queue: &WorkQueue,
    resolver: &CacheResolver,
    entry: &Arc<CacheEntry>,
    arg_types: &[TypeId],
    outcomes: &std::sync::Mutex<Vec<RuntimeOutcome>>,
    clock_start: Instant,
) {
    let mut rng = StdRng::seed_from_u64(0x5eed_0000 + worker_id as u64);
    let mut local_coverage = coverage::create_thread_bitmap();
    let cov_bytes = local_coverage.len();
    let start = Instant::now();
    debug!(worker_id, cov_bytes, "worker starting");

    loop {
        if should_stop(clock_start) {
            debug!(worker_id, elapsed = ?start.elapsed(), "worker stopping");
            return;
        }

        let Some(parent) = queue.pop() else {
            std::thread::yield_now();
            continue;
        };

        let mut data = parent.data.clone();
        mutate::mutate(&mut data, &mut rng);

        let mut heap = crate::heap::Heap::new();
        let Ok(locals) = vm::decode_locals(arg_types, &data, &mut heap) else {
            queue.push(parent);
            continue;
        };

        coverage::reset_thread(&mut local_coverage);
        let mut ctx = VmContext::new(Arc::clone(&entry.ir), locals, cov_bytes, resolver);
        ctx.heap = heap;
        let outcome = vm::run(&mut ctx);
        local_coverage.copy_from_slice(&ctx.local_coverage);

        outcomes.lock().unwrap().push(outcome);

        let new_bits = coverage::check_bits(&local_coverage);
        coverage::commit_thread(&local_coverage, clock_start.elapsed().as_micros() as u64);

        if new_bits > 0 {
            let child = Arc::new(TestCase::new(data, local_coverage.clone()));
            corpus.add(Arc::clone(&child));
            queue.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::IrFunction;
    use crate::ir::instruction::{BinaryOp, Instruction, Payload};
    use crate::value::Value;

    fn divide_by_zero_method() -> Arc<CacheEntry> {
        let instructions = vec![
            Instruction::new(0, Payload::Load { index: 0, ty: TypeId::INT }),
            Instruction::new(1, Payload::Push { value: Value::Int(0) }),
            Instruction::new(2, Payload::Binary { op: BinaryOp::Div, ty: TypeId::INT }),
            Instruction::new(3, Payload::Return { ty: TypeId::INT }),
        ];
        let ir = IrFunction::new(instructions);
        let cfg = crate::cfg::Cfg::build(&ir).unwrap();
        Arc::new(CacheEntry { ir: Arc::new(ir), cfg, num_locals: 1 })
    }

    #[test]
    fn fuzzing_a_guaranteed_divide_by_zero_finds_it_immediately() {
        let entry = divide_by_zero_method();
        let method = MethodId::parse("jpamb/cases/Simple.divByZero:(I)I").unwrap();
        let report = run("/nonexistent", &method, entry, vec![TypeId::INT], None, 2);
        assert!(report.outcomes.iter().any(|o| *o == RuntimeOutcome::DivideByZero));
    }
}
