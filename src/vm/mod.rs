//! The concrete VM: call-stack frames, operand stack, locals, and the
//! opcode dispatch table (spec.md §4.7).
//!
//! Grounded on the original `interpreter_concrete.c`'s `Frame`/`VMContext`/
//! `CallStack` structs and its `step()`/`opcode_table` dispatch loop, with
//! the manual `malloc`'d `CallStackNode` linked list replaced by a `Vec`.

pub mod dispatch;
pub mod outcome;

use crate::cache::CacheEntry;
use crate::error::StepFault;
use crate::heap::Heap;
use crate::ir::function::IrFunction;
use crate::types::{TypeId, TypeShape};
use crate::value::{ObjectValue, Value};
use std::sync::Arc;

/// Hard cap on concrete execution steps; exceeding it is classified as
/// non-termination (spec.md §4.7, "a hard iteration cap... INFINITE_LOOP").
pub const MAX_STEPS: usize = 100_000;

/// The project namespace whose methods are actually entered by `INVOKE`;
/// calls elsewhere are treated as external and skipped (spec.md §4.7).
pub const INTERNAL_NAMESPACE: &str = "jpamb";

pub struct Frame {
    pub pc: usize,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
    pub ir: Arc<IrFunction>,
}

impl Frame {
    pub fn new(ir: Arc<IrFunction>, locals: Vec<Value>) -> Frame {
        Frame { pc: 0, locals, stack: Vec::new(), ir }
    }

    pub fn locals_count(&self) -> usize {
        self.locals.len()
    }
}

#[derive(Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Why locals-from-bytes decoding failed (spec.md §4.7 Setup): the byte
/// stream was exhausted before every argument was read, or an argument's
/// type has no byte encoding defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Exhausted,
    UnsupportedType,
}

/// Builds a method's initial locals by walking its argument types and
/// consuming bytes from `input` (spec.md §4.7 Setup): one byte each for
/// INT (sign-extended), BOOLEAN (low bit) and CHAR (raw); ARRAY reads a
/// one-byte length then that many element bytes recursively, allocating the
/// backing array in `heap`.
pub fn decode_locals(arg_types: &[TypeId], input: &[u8], heap: &mut Heap) -> Result<Vec<Value>, DecodeError> {
    let mut cursor = 0usize;
    let mut locals = Vec::with_capacity(arg_types.len());
    for &ty in arg_types {
        locals.push(decode_one(ty, input, &mut cursor, heap)?);
    }
    Ok(locals)
}

fn decode_one(ty: TypeId, input: &[u8], cursor: &mut usize, heap: &mut Heap) -> Result<Value, DecodeError> {
    match ty.shape() {
        TypeShape::Int => {
            let b = *input.get(*cursor).ok_or(DecodeError::Exhausted)?;
            *cursor += 1;
            Ok(Value::Int(b as i8 as i32))
        }
        TypeShape::Boolean => {
            let b = *input.get(*cursor).ok_or(DecodeError::Exhausted)?;
            *cursor += 1;
            Ok(Value::Bool(b & 1 != 0))
        }
        TypeShape::Char => {
            let b = *input.get(*cursor).ok_or(DecodeError::Exhausted)?;
            *cursor += 1;
            Ok(Value::Char(b))
        }
        TypeShape::Array(elem) => {
            let len = *input.get(*cursor).ok_or(DecodeError::Exhausted)? as usize;
            *cursor += 1;
            let mut elements = Vec::with_capacity(len);
            for _ in 0..len {
                elements.push(decode_one(elem, input, cursor, heap)?);
            }
            let reference = heap.insert(ObjectValue::Array { element_type: elem, elements });
            Ok(Value::Reference(reference))
        }
        TypeShape::Reference | TypeShape::Void => Err(DecodeError::UnsupportedType),
    }
}

/// Resolves and caches method IR for `INVOKE`, so the VM doesn't need a
/// direct dependency on the filesystem-backed cache during a hot loop.
pub trait MethodResolver {
    fn resolve(&self, class_path: &str, method_name: &str) -> Option<Arc<CacheEntry>>;
}

pub struct VmContext<'r> {
    pub call_stack: CallStack,
    pub heap: Heap,
    pub local_coverage: Vec<u8>,
    resolver: &'r dyn MethodResolver,
}

impl<'r> VmContext<'r> {
    pub fn new(entry_ir: Arc<IrFunction>, locals: Vec<Value>, num_instructions: usize, resolver: &'r dyn MethodResolver) -> VmContext<'r> {
        let mut call_stack = CallStack::default();
        call_stack.push(Frame::new(entry_ir, locals));
        VmContext { call_stack, heap: Heap::new(), local_coverage: vec![0; num_instructions], resolver }
    }

    /// Resets the VM for reuse between fuzz iterations (spec.md §4.7,
    /// "Reset"): clears child frames down to a single fresh frame, resets
    /// pc/operand stack, and clears the heap back to the null slot.
    pub fn reset(&mut self, entry_ir: Arc<IrFunction>, locals: Vec<Value>) {
        self.call_stack = CallStack::default();
        self.call_stack.push(Frame::new(entry_ir, locals));
        self.heap.reset();
        self.local_coverage.iter_mut().for_each(|b| *b = 0);
    }

    pub fn resolver(&self) -> &dyn MethodResolver {
        self.resolver
    }
}

/// Runs the VM to completion, a fault, or the step cap. `StepFault` maps
/// 1:1 onto a [`outcome::RuntimeOutcome`]; reaching the cap is reported as
/// [`outcome::RuntimeOutcome::InfiniteLoop`] directly, since it isn't a
/// `StepFault` variant (spec.md draws the line between "the VM stepped
/// wrongly" and "the VM never stopped").
pub fn run(vm: &mut VmContext) -> outcome::RuntimeOutcome {
    for _ in 0..MAX_STEPS {
        match dispatch::step(vm) {
            Ok(true) => continue,
            Ok(false) => return outcome::RuntimeOutcome::Ok,
            Err(fault) => return fault.outcome(),
        }
    }
    outcome::RuntimeOutcome::InfiniteLoop
}
