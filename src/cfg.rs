//! Control-flow graph construction: basic-block partitioning and RPO.
//!
//! Grounded on spec.md §3 ("CFG") and §4.2, and on the original `cfg.c`'s
//! leader-based partitioning. The design notes direct "arena + integer
//! indices" over raw pointer graphs with back-edges; blocks here are a flat
//! `Vec<BasicBlock>` addressed by index, and RPO is computed with an
//! explicit work stack (not host-stack recursion), per the design notes'
//! guidance to tolerate methods with thousands of blocks.

use tracing::debug;

use crate::ir::function::IrFunction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: usize,
    pub ip_start: usize,
    pub ip_end: usize,
    pub successors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    /// Reverse postorder over block ids, computed once at construction.
    rpo: Vec<usize>,
    /// Maps an instruction pointer to the id of its owning block.
    block_of_ip: Vec<usize>,
}

impl Cfg {
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: usize) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn rpo(&self) -> &[usize] {
        &self.rpo
    }

    pub fn block_containing(&self, ip: usize) -> usize {
        self.block_of_ip[ip]
    }

    /// Builds a CFG from an IR function (spec.md §4.2).
    pub fn build(func: &IrFunction) -> Result<Cfg, String> {
        if func.is_empty() {
            return Ok(Cfg { blocks: Vec::new(), rpo: Vec::new(), block_of_ip: Vec::new() });
        }

        let n = func.len();
        let mut is_leader = vec![false; n];
        is_leader[0] = true;

        for instr in func.iter() {
            for target in instr.branch_targets() {
                if target >= n {
                    return Err(format!("branch target {target} out of range (function has {n} instructions)"));
                }
                is_leader[target] = true;
            }
            if instr.is_terminator() && instr.seq + 1 < n {
                is_leader[instr.seq + 1] = true;
            }
        }

        // Flush into [ip_start, ip_end] ranges at leader boundaries.
        let mut ranges = Vec::new();
        let mut start = 0usize;
        for ip in 1..n {
            if is_leader[ip] {
                ranges.push((start, ip - 1));
                start = ip;
            }
        }
        ranges.push((start, n - 1));

        let mut block_of_ip = vec![0usize; n];
        for (id, &(s, e)) in ranges.iter().enumerate() {
            for ip in s..=e {
                block_of_ip[ip] = id;
            }
        }

        let mut blocks = Vec::with_capacity(ranges.len());
        for (id, &(ip_start, ip_end)) in ranges.iter().enumerate() {
            let last = func.get(ip_end).expect("block end within range");
            let mut successors = Vec::new();
            match &last.payload {
                crate::ir::instruction::Payload::Return { .. } | crate::ir::instruction::Payload::Throw => {}
                crate::ir::instruction::Payload::Goto { target } => {
                    successors.push(block_of_ip[*target]);
                }
                crate::ir::instruction::Payload::If { target, .. }
                | crate::ir::instruction::Payload::IfZ { target, .. } => {
                    successors.push(block_of_ip[*target]);
                    if ip_end + 1 < n {
                        successors.push(block_of_ip[ip_end + 1]);
                    }
                }
                _ => {
                    if ip_end + 1 < n {
                        successors.push(block_of_ip[ip_end + 1]);
                    }
                }
            }
            blocks.push(BasicBlock { id, ip_start, ip_end, successors });
        }

        let rpo = reverse_postorder(&blocks);

        debug!(num_blocks = blocks.len(), num_instructions = n, "built CFG");
        Ok(Cfg { blocks, rpo, block_of_ip })
    }
}

/// Computes reverse postorder from block 0 using an explicit work stack.
fn reverse_postorder(blocks: &[BasicBlock]) -> Vec<usize> {
    if blocks.is_empty() {
        return Vec::new();
    }

    #[derive(Clone, Copy)]
    enum Frame {
        Enter(usize),
        Leave(usize),
    }

    let mut visited = vec![false; blocks.len()];
    let mut postorder = Vec::with_capacity(blocks.len());
    let mut stack = vec![Frame::Enter(0)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                stack.push(Frame::Leave(node));
                for &succ in blocks[node].successors.iter().rev() {
                    if !visited[succ] {
                        stack.push(Frame::Enter(succ));
                    }
                }
            }
            Frame::Leave(node) => postorder.push(node),
        }
    }

    postorder.reverse();
    postorder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::{BinaryOp, Instruction, Payload};
    use crate::types::TypeId;
    use crate::value::Value;

    fn push(seq: usize, v: i32) -> Instruction {
        Instruction::new(seq, Payload::Push { value: Value::Int(v) })
    }

    #[test]
    fn empty_function_yields_zero_blocks() {
        let func = IrFunction::new(vec![]);
        let cfg = Cfg::build(&func).unwrap();
        assert_eq!(cfg.len(), 0);
    }

    #[test]
    fn straight_line_is_one_block() {
        let func = IrFunction::new(vec![
            push(0, 1),
            push(1, 0),
            Instruction::new(2, Payload::Binary { ty: TypeId::INT, op: BinaryOp::Div }),
            Instruction::new(3, Payload::Return { ty: TypeId::INT }),
        ]);
        let cfg = Cfg::build(&func).unwrap();
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.block(0).ip_start, 0);
        assert_eq!(cfg.block(0).ip_end, 3);
        assert!(cfg.block(0).successors.is_empty());
    }

    #[test]
    fn ifz_example_makes_three_blocks() {
        use crate::ir::instruction::Condition;
        let func = IrFunction::new(vec![
            Instruction::new(0, Payload::Load { index: 0, ty: TypeId::INT }),
            Instruction::new(1, Payload::IfZ { cond: Condition::Eq, target: 4 }),
            push(2, 1),
            Instruction::new(3, Payload::Return { ty: TypeId::INT }),
            push(4, 0),
            Instruction::new(5, Payload::Return { ty: TypeId::INT }),
        ]);
        let cfg = Cfg::build(&func).unwrap();
        assert_eq!(cfg.len(), 3);
        assert_eq!(cfg.block(0).successors, vec![2, 1]);
        assert_eq!(cfg.rpo()[0], 0);
    }

    #[test]
    fn self_loop_has_entry_as_own_successor() {
        let func = IrFunction::new(vec![Instruction::new(0, Payload::Goto { target: 0 })]);
        let cfg = Cfg::build(&func).unwrap();
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.block(0).successors, vec![0]);
    }

    #[test]
    fn dangling_target_is_fatal() {
        let func = IrFunction::new(vec![Instruction::new(0, Payload::Goto { target: 99 })]);
        assert!(Cfg::build(&func).is_err());
    }
}
