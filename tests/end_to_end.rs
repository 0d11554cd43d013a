//! The six literal end-to-end scenarios from the analyzer's testable
//! properties: hand-built IR functions run through the concrete VM, the
//! abstract interpreter, and the fuzzer, checked against their expected
//! outcomes.

use std::sync::Arc;

use bytecode_analyzer::cfg::Cfg;
use bytecode_analyzer::fuzz::orchestrator;
use bytecode_analyzer::graph::Graph;
use bytecode_analyzer::heap::Heap;
use bytecode_analyzer::interval::domain::{Interval, IntervalState};
use bytecode_analyzer::interval::interpreter;
use bytecode_analyzer::ir::function::IrFunction;
use bytecode_analyzer::ir::instruction::{BinaryOp, Condition, Instruction, Payload};
use bytecode_analyzer::ir::method::MethodId;
use bytecode_analyzer::types::TypeId;
use bytecode_analyzer::value::Value;
use bytecode_analyzer::vm::outcome::RuntimeOutcome;
use bytecode_analyzer::vm::{self, VmContext};
use bytecode_analyzer::wpo::Wpo;

struct NoResolver;
impl vm::MethodResolver for NoResolver {
    fn resolve(&self, _class_path: &str, _method_name: &str) -> Option<Arc<bytecode_analyzer::cache::CacheEntry>> {
        None
    }
}

fn push(seq: usize, v: i32) -> Instruction {
    Instruction::new(seq, Payload::Push { value: Value::Int(v) })
}

/// Scenario 1: `{ PUSH 1; PUSH 0; BINARY DIV; RETURN I }` with no
/// parameters under `-i` faults with `DIVIDE_BY_ZERO`.
#[test]
fn divide_by_zero_literal_is_caught_concretely() {
    let func = IrFunction::new(vec![
        push(0, 1),
        push(1, 0),
        Instruction::new(2, Payload::Binary { op: BinaryOp::Div, ty: TypeId::INT }),
        Instruction::new(3, Payload::Return { ty: TypeId::INT }),
    ]);
    let resolver = NoResolver;
    let mut ctx = VmContext::new(Arc::new(func), Vec::new(), 4, &resolver);
    let outcome = vm::run(&mut ctx);
    assert_eq!(outcome, RuntimeOutcome::DivideByZero);
}

/// Scenario 2: `{ LOAD 0 I; IFZ EQ -> 4; PUSH 1; RETURN I; PUSH 0; RETURN I }`
/// under `-a` with one INT parameter narrows slot 0 to `[0,0]` on the taken
/// edge and leaves it `TOP` on fall-through and at the entry block.
#[test]
fn ifz_branch_narrows_interval_on_taken_edge() {
    let func = IrFunction::new(vec![
        Instruction::new(0, Payload::Load { index: 0, ty: TypeId::INT }),
        Instruction::new(1, Payload::IfZ { cond: Condition::Eq, target: 4 }),
        push(2, 1),
        Instruction::new(3, Payload::Return { ty: TypeId::INT }),
        push(4, 0),
        Instruction::new(5, Payload::Return { ty: TypeId::INT }),
    ]);
    let cfg = Cfg::build(&func).unwrap();
    let graph = Graph::from_cfg(&cfg);
    let wpo = Wpo::build(&graph);

    let result = interpreter::analyze(&func, &cfg, &wpo, 1, &[0]);

    assert_eq!(result.block_states[0].vars[0], Interval::TOP);
    let fallthrough = cfg.block(0).successors[1];
    let target = cfg.block(0).successors[0];
    assert_eq!(result.block_states[fallthrough].vars[0], Interval::TOP);
    assert_eq!(result.block_states[target].vars[0], Interval { lower: 0, upper: 0 });
}

/// Scenario 3: `{ LOAD 0 I; LOAD 1 I; BINARY DIV; RETURN I }` fuzzed with 2
/// INT parameters, seeded from TOP intervals, finds a `DIVIDE_BY_ZERO`.
#[test]
fn fuzzer_seeded_from_top_intervals_finds_divide_by_zero() {
    let func = IrFunction::new(vec![
        Instruction::new(0, Payload::Load { index: 0, ty: TypeId::INT }),
        Instruction::new(1, Payload::Load { index: 1, ty: TypeId::INT }),
        Instruction::new(2, Payload::Binary { op: BinaryOp::Div, ty: TypeId::INT }),
        Instruction::new(3, Payload::Return { ty: TypeId::INT }),
    ]);
    let cfg = Cfg::build(&func).unwrap();
    let entry = Arc::new(bytecode_analyzer::cache::CacheEntry { ir: Arc::new(func), cfg, num_locals: 2 });
    let method = MethodId::parse("jpamb/cases/Simple.divByZero:(II)I").unwrap();
    let seed_state = IntervalState { vars: vec![Interval::TOP, Interval::TOP] };

    let report = orchestrator::run("/nonexistent", &method, entry, vec![TypeId::INT, TypeId::INT], Some(&seed_state), 2);

    assert!(report.outcomes.iter().any(|&o| o == RuntimeOutcome::DivideByZero));
}

/// Scenario 4: `{ NEW_ARRAY INT; PUSH -1; NEW_ARRAY INT }` with a negative
/// size faults `OUT_OF_BOUNDS` under `-i`.
#[test]
fn negative_array_size_is_out_of_bounds() {
    let func = IrFunction::new(vec![
        push(0, -1),
        Instruction::new(1, Payload::NewArray { elem_type: TypeId::INT, dim: 1 }),
        Instruction::new(2, Payload::Return { ty: TypeId::INT }),
    ]);
    let resolver = NoResolver;
    let mut ctx = VmContext::new(Arc::new(func), Vec::new(), 3, &resolver);
    let outcome = vm::run(&mut ctx);
    assert_eq!(outcome, RuntimeOutcome::OutOfBounds);
}

/// Scenario 5: a self-loop `{ GOTO 0 }` under `-i` reports `INFINITE_LOOP`
/// once the step cap is exceeded.
#[test]
fn self_loop_exhausts_step_cap_as_infinite_loop() {
    let func = IrFunction::new(vec![Instruction::new(0, Payload::Goto { target: 0 })]);
    let resolver = NoResolver;
    let mut ctx = VmContext::new(Arc::new(func), Vec::new(), 1, &resolver);
    let outcome = vm::run(&mut ctx);
    assert_eq!(outcome, RuntimeOutcome::InfiniteLoop);
}

/// Scenario 6: WPO construction for the two-node cycle `{0->1, 1->0}`
/// produces nodes {0, 1, exit=2}, head 0, scheduling edges {0->1, 1->2},
/// and a stabilizing edge back to the head.
#[test]
fn two_node_cycle_wpo_matches_literal_shape() {
    use bytecode_analyzer::graph::Node;
    let g = Graph { nodes: vec![Node { successors: vec![1] }, Node { successors: vec![0] }], not_valid: vec![false, false] };
    let wpo = Wpo::build(&g);

    assert_eq!(wpo.num_nodes, 3);
    assert_eq!(wpo.heads, vec![0]);
    assert_eq!(wpo.exits, vec![2]);
    let mut scheduling_edges = wpo.scheduling_edges.clone();
    scheduling_edges.sort_unstable();
    assert_eq!(scheduling_edges, vec![(0, 1), (1, 2)]);
    assert_eq!(wpo.stabilizing_edges, vec![(2, 0)]);
}

#[test]
fn interpreter_mode_decodes_byte_parameters_and_runs() {
    let func = IrFunction::new(vec![
        Instruction::new(0, Payload::Load { index: 0, ty: TypeId::INT }),
        Instruction::new(1, Payload::Return { ty: TypeId::INT }),
    ]);
    let resolver = NoResolver;
    let mut heap = Heap::new();
    let locals = vm::decode_locals(&[TypeId::INT], &[7], &mut heap).unwrap();
    let mut ctx = VmContext::new(Arc::new(func), locals, 2, &resolver);
    ctx.heap = heap;
    let outcome = vm::run(&mut ctx);
    assert_eq!(outcome, RuntimeOutcome::Ok);
}
