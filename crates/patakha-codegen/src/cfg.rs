//! Basic-block construction over the flat instruction list.
//!
//! Leaders are the first instruction, every label, and every instruction
//! after a terminator. Construction normalizes the function so that every
//! block ends in exactly one terminator (fall-through edges become explicit
//! jumps) and drops blocks unreachable from the entry. Blocks refer to each
//! other by index; labels survive only as block metadata and are
//! re-materialized by [`Cfg::linearize`].

use rustc_hash::FxHashMap;

use crate::ir::{Function, Instr, Label};

/// Index of a basic block within its function's CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

/// One basic block: straight-line instructions ending in a terminator.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// The label this block carries in the instruction stream, if any.
    pub label: Option<Label>,
    pub instrs: Vec<Instr>,
    pub succs: Vec<BlockId>,
    pub preds: Vec<BlockId>,
}

impl BasicBlock {
    pub fn terminator(&self) -> &Instr {
        self.instrs.last().expect("blocks are never empty")
    }
}

/// A function's control-flow graph. Entry is always block 0.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
    /// The label allocator position carried over from the function, so
    /// passes that need fresh labels (LICM pre-headers) can mint them.
    pub next_label: u32,
}

impl Cfg {
    pub const ENTRY: BlockId = BlockId(0);

    /// Build the CFG for a function.
    pub fn build(func: &Function) -> Cfg {
        let mut builder = Builder {
            next_label: func.next_label,
            blocks: Vec::new(),
            current: Vec::new(),
            current_label: None,
        };
        builder.run(&func.instrs);
        let mut cfg = Cfg {
            blocks: builder.blocks,
            next_label: builder.next_label,
        };
        cfg.connect();
        cfg.remove_unreachable();
        cfg
    }

    /// Recompute successor/predecessor lists from block terminators.
    pub fn connect(&mut self) {
        let by_label: FxHashMap<Label, BlockId> = self
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.label.map(|l| (l, BlockId(i as u32))))
            .collect();

        for block in &mut self.blocks {
            block.succs.clear();
            block.preds.clear();
        }
        for i in 0..self.blocks.len() {
            let succs: Vec<BlockId> = match self.blocks[i].terminator() {
                Instr::Jump { target } => vec![by_label[target]],
                Instr::Branch { then_, else_, .. } => {
                    let mut out = vec![by_label[then_]];
                    if then_ != else_ {
                        out.push(by_label[else_]);
                    }
                    out
                }
                Instr::Ret { .. } => Vec::new(),
                other => unreachable!("block must end in a terminator, found {other}"),
            };
            for succ in &succs {
                self.blocks[succ.0 as usize].preds.push(BlockId(i as u32));
            }
            self.blocks[i].succs = succs;
        }
    }

    /// Drop blocks unreachable from the entry, then reconnect.
    pub fn remove_unreachable(&mut self) {
        let reachable = self.reachable_from(Self::ENTRY);
        if reachable.iter().all(|r| *r) {
            return;
        }
        // Blocks address each other by label, so dropping is safe and
        // `connect` rebuilds the edges over the new indices.
        let mut kept = Vec::new();
        for (i, block) in self.blocks.drain(..).enumerate() {
            if reachable[i] {
                kept.push(block);
            }
        }
        self.blocks = kept;
        self.connect();
    }

    fn reachable_from(&self, start: BlockId) -> Vec<bool> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![start];
        while let Some(block) = stack.pop() {
            if std::mem::replace(&mut seen[block.0 as usize], true) {
                continue;
            }
            stack.extend(self.blocks[block.0 as usize].succs.iter().copied());
        }
        seen
    }

    /// Flatten the CFG back into an instruction list, re-emitting labels.
    pub fn linearize(&self) -> (Vec<Instr>, u32) {
        let mut out = Vec::new();
        for block in &self.blocks {
            if let Some(label) = block.label {
                out.push(Instr::Label(label));
            }
            out.extend(block.instrs.iter().cloned());
        }
        (out, self.next_label)
    }

    /// Write the optimized instruction stream back into the function.
    pub fn store_into(&self, func: &mut Function) {
        let (instrs, next_label) = self.linearize();
        func.instrs = instrs;
        func.next_label = next_label;
    }

    /// Blocks in reverse postorder from the entry.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut seen = vec![false; self.blocks.len()];
        self.postorder(Self::ENTRY, &mut seen, &mut order);
        order.reverse();
        order
    }

    fn postorder(&self, block: BlockId, seen: &mut Vec<bool>, out: &mut Vec<BlockId>) {
        if std::mem::replace(&mut seen[block.0 as usize], true) {
            return;
        }
        for succ in self.blocks[block.0 as usize].succs.clone() {
            self.postorder(succ, seen, out);
        }
        out.push(block);
    }

    /// Dominator sets: `dom[b]` contains every block that dominates `b`
    /// (including itself). Iterative dataflow over reverse postorder.
    pub fn dominators(&self) -> Vec<Vec<bool>> {
        let n = self.blocks.len();
        let all = vec![true; n];
        let mut dom: Vec<Vec<bool>> = vec![all; n];
        let mut entry_only = vec![false; n];
        entry_only[0] = true;
        dom[0] = entry_only;

        let order = self.reverse_postorder();
        let mut changed = true;
        while changed {
            changed = false;
            for &b in &order {
                if b == Self::ENTRY {
                    continue;
                }
                let preds = &self.blocks[b.0 as usize].preds;
                let mut new: Vec<bool> = vec![true; n];
                let mut any_pred = false;
                for pred in preds {
                    any_pred = true;
                    for (i, bit) in new.iter_mut().enumerate() {
                        *bit = *bit && dom[pred.0 as usize][i];
                    }
                }
                if !any_pred {
                    new = vec![false; n];
                }
                new[b.0 as usize] = true;
                if new != dom[b.0 as usize] {
                    dom[b.0 as usize] = new;
                    changed = true;
                }
            }
        }
        dom
    }
}

struct Builder {
    next_label: u32,
    blocks: Vec<BasicBlock>,
    current: Vec<Instr>,
    current_label: Option<Label>,
}

impl Builder {
    fn run(&mut self, instrs: &[Instr]) {
        for instr in instrs {
            match instr {
                Instr::Label(label) => {
                    if self.current.is_empty() && self.current_label.is_none() {
                        self.current_label = Some(*label);
                    } else if self.current.is_empty() {
                        // Two labels back to back: end the first block with a
                        // fall-through jump to the second.
                        self.current.push(Instr::Jump { target: *label });
                        self.flush();
                        self.current_label = Some(*label);
                    } else {
                        // Fall-through into a labeled block becomes explicit.
                        if !self.current.last().is_some_and(Instr::is_terminator) {
                            self.current.push(Instr::Jump { target: *label });
                        }
                        self.flush();
                        self.current_label = Some(*label);
                    }
                }
                other => {
                    self.current.push(other.clone());
                    if other.is_terminator() {
                        self.flush();
                    }
                }
            }
        }
        if !self.current.is_empty() || self.current_label.is_some() {
            // A trailing open block (lowering always ends with ret, but be
            // safe when passes synthesize code).
            if !self.current.last().is_some_and(Instr::is_terminator) {
                self.current.push(Instr::Ret { value: None });
            }
            self.flush();
        }
    }

    fn flush(&mut self) {
        let instrs = std::mem::take(&mut self.current);
        let label = self.current_label.take();
        if instrs.is_empty() {
            return;
        }
        self.blocks.push(BasicBlock {
            label,
            instrs,
            succs: Vec::new(),
            preds: Vec::new(),
        });
    }
}

/// Render the CFG as text (`--dump-cfg`).
pub fn dump_cfg(name: &str, cfg: &Cfg) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "fn {name}:");
    for (i, block) in cfg.blocks.iter().enumerate() {
        let label = block
            .label
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        let _ = writeln!(out, "  bb{i}{label}:");
        for instr in &block.instrs {
            let _ = writeln!(out, "    {instr}");
        }
        let succs: Vec<String> = block.succs.iter().map(|s| format!("bb{}", s.0)).collect();
        let _ = writeln!(out, "    succs: [{}]", succs.join(", "));
    }
    out
}

/// Render the CFG as a Graphviz digraph (`--dump-cfg-dot`).
pub fn dump_cfg_dot(name: &str, cfg: &Cfg) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{name}\" {{");
    let _ = writeln!(out, "  node [shape=box, fontname=\"monospace\"];");
    for (i, block) in cfg.blocks.iter().enumerate() {
        let mut body = format!("bb{i}\\n");
        for instr in &block.instrs {
            let line = instr
                .to_string()
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            body.push_str(&line);
            body.push_str("\\l");
        }
        let _ = writeln!(out, "  \"{name}_bb{i}\" [label=\"{body}\"];");
        for succ in &block.succs {
            let _ = writeln!(out, "  \"{name}_bb{i}\" -> \"{name}_bb{}\";", succ.0);
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Function;
    use patakha_common::{Diagnostics, FileId};

    fn build_main(source: &str) -> Cfg {
        let mut diags = Diagnostics::new();
        let ast = patakha_parser::parse_source(source, FileId(0), &mut diags);
        let analysis = patakha_sema::check_program(ast, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.records());
        let program = crate::lower::lower_program(&analysis);
        Cfg::build(program.function("main").expect("main"))
    }

    #[test]
    fn straight_line_is_one_block() {
        let cfg = build_main("shuru\nbhai x = 1\nbol(x)\nnikal 0\nbass");
        assert_eq!(cfg.blocks.len(), 1);
        assert!(matches!(cfg.blocks[0].terminator(), Instr::Ret { .. }));
    }

    #[test]
    fn every_block_ends_in_exactly_one_terminator() {
        let cfg = build_main(
            "shuru\nbhai i = 0\ntabtak (i < 3) {\nagar (i == 1) { bol(1) } warna { bol(2) }\ni += 1\n}\nbass",
        );
        for block in &cfg.blocks {
            let terminators = block
                .instrs
                .iter()
                .filter(|i| i.is_terminator())
                .count();
            assert_eq!(terminators, 1);
            assert!(block.instrs.last().unwrap().is_terminator());
        }
    }

    #[test]
    fn branch_targets_exist_and_edges_are_consistent() {
        let cfg = build_main("shuru\nbhai i = 0\ntabtak (i < 3) { i += 1 }\nbol(i)\nbass");
        for (i, block) in cfg.blocks.iter().enumerate() {
            for succ in &block.succs {
                assert!((succ.0 as usize) < cfg.blocks.len());
                assert!(cfg.blocks[succ.0 as usize]
                    .preds
                    .contains(&BlockId(i as u32)));
            }
        }
    }

    #[test]
    fn unreachable_blocks_are_removed() {
        // Code after nikal is unreachable and never even lowered; build a
        // diamond where one side is cut off by constant folding later. Here
        // just confirm entry reachability holds.
        let cfg = build_main("shuru\nagar (sahi) { bol(1) } warna { bol(2) }\nbass");
        let n = cfg.blocks.len();
        let reach = {
            let mut seen = vec![false; n];
            let mut stack = vec![Cfg::ENTRY];
            while let Some(b) = stack.pop() {
                if std::mem::replace(&mut seen[b.0 as usize], true) {
                    continue;
                }
                stack.extend(cfg.blocks[b.0 as usize].succs.iter().copied());
            }
            seen
        };
        assert!(reach.into_iter().all(|r| r));
    }

    #[test]
    fn dominators_of_a_loop() {
        let cfg = build_main("shuru\nbhai i = 0\ntabtak (i < 3) { i += 1 }\nbol(i)\nbass");
        let dom = cfg.dominators();
        // Entry dominates everything.
        for sets in &dom {
            assert!(sets[0]);
        }
    }

    #[test]
    fn linearize_round_trips() {
        let cfg = build_main("shuru\nbhai i = 0\ntabtak (i < 3) { i += 1 }\nbol(i)\nbass");
        let (instrs, _) = cfg.linearize();
        // Rebuilding from the linearized stream yields the same block count.
        let func = Function {
            name: "main".into(),
            params: Vec::new(),
            ret: patakha_common::Ty::Int,
            temp_tys: Vec::new(),
            temp_names: Vec::new(),
            instrs,
            next_label: cfg.next_label,
            is_main: true,
        };
        let rebuilt = Cfg::build(&func);
        assert_eq!(rebuilt.blocks.len(), cfg.blocks.len());
    }
}
