//! The CFG-based optimizer.
//!
//! Passes run in a fixed order -- constant propagation (with branch folding
//! and unreachable-block cleanup), dead-store elimination, local common
//! subexpression elimination, then conservative loop-invariant code motion
//! -- and the whole sequence repeats until a pass stops changing anything
//! (bounded, in case two passes ever disagree).
//!
//! Everything here must preserve observable behavior: the sequence of
//! prints, the inputs consumed, and the exit value. The interpreter in
//! [`crate::interp`] is the reference for that contract and the tests hold
//! the two sides together.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cfg::{BasicBlock, BlockId, Cfg};
use crate::ir::{BinOp, Const, Function, Instr, Label, Operand, Program, Temp};

/// Optimize every function of a program in place.
pub fn optimize_program(program: &mut Program) {
    for func in &mut program.functions {
        optimize_function(func);
    }
}

/// Run the pass pipeline over one function until nothing changes.
pub fn optimize_function(func: &mut Function) {
    let mut cfg = Cfg::build(func);
    // The bound is a safety net; the pipeline settles in two or three
    // rounds on realistic input.
    for _ in 0..8 {
        let mut changed = const_propagation(&mut cfg);

        let before = cfg.blocks.len();
        cfg.connect();
        cfg.remove_unreachable();
        changed |= cfg.blocks.len() != before;

        changed |= dead_store_elimination(&mut cfg);
        changed |= local_cse(&mut cfg);
        changed |= licm(&mut cfg);
        if !changed {
            break;
        }
    }
    cfg.store_into(func);
}

// ── Constant propagation ───────────────────────────────────────────────

/// Propagate constants into operands, fold pure instructions whose inputs
/// are all constant, and collapse conditional branches with constant
/// conditions into jumps.
///
/// A temp with exactly one definition in the whole function necessarily
/// dominates all of its uses, so such constants propagate across blocks;
/// everything else is tracked block-locally.
fn const_propagation(cfg: &mut Cfg) -> bool {
    let mut def_counts: FxHashMap<Temp, u32> = FxHashMap::default();
    for block in &cfg.blocks {
        for instr in &block.instrs {
            if let Some(dst) = instr.dst() {
                *def_counts.entry(dst).or_insert(0) += 1;
            }
        }
    }
    let mut global: FxHashMap<Temp, Const> = FxHashMap::default();
    for block in &cfg.blocks {
        for instr in &block.instrs {
            if let Instr::Const { dst, value } = instr {
                if def_counts.get(dst) == Some(&1) {
                    global.insert(*dst, value.clone());
                }
            }
        }
    }

    let mut changed = false;
    for block in &mut cfg.blocks {
        let mut local: FxHashMap<Temp, Const> = FxHashMap::default();
        for instr in &mut block.instrs {
            // Substitute known-constant operands.
            let before = instr.clone();
            instr.map_operands(|op| {
                if let Operand::Temp(t) = op {
                    let known = local.get(t).or_else(|| global.get(t));
                    if let Some(value) = known {
                        *op = Operand::Const(value.clone());
                    }
                }
            });

            // Fold pure all-constant instructions.
            if let Some(folded) = fold_instr(instr) {
                *instr = folded;
            }

            // A constant condition decides the branch at compile time.
            if let Instr::Branch { cond: Operand::Const(Const::Bool(b)), then_, else_ } = instr {
                let target = if *b { *then_ } else { *else_ };
                *instr = Instr::Jump { target };
            }

            if *instr != before {
                changed = true;
            }

            // Track the local constant environment.
            match instr {
                Instr::Const { dst, value } => {
                    local.insert(*dst, value.clone());
                }
                other => {
                    if let Some(dst) = other.dst() {
                        local.remove(&dst);
                    }
                }
            }
        }
    }
    changed
}

/// Fold one instruction to a constant load, when every input is constant.
fn fold_instr(instr: &Instr) -> Option<Instr> {
    let (dst, value) = match instr {
        Instr::Copy {
            dst,
            src: Operand::Const(value),
        } => (*dst, value.clone()),
        Instr::Neg {
            dst,
            src: Operand::Const(value),
        } => (*dst, fold_neg(value)?),
        Instr::Not {
            dst,
            src: Operand::Const(Const::Bool(b)),
        } => (*dst, Const::Bool(!b)),
        Instr::Bin {
            op,
            dst,
            lhs: Operand::Const(l),
            rhs: Operand::Const(r),
        } => (*dst, fold_bin(*op, l, r)?),
        Instr::Cast {
            dst,
            src: Operand::Const(value),
            to,
            ..
        } => (*dst, fold_cast(value, to)?),
        _ => return None,
    };
    Some(Instr::Const { dst, value })
}

fn fold_neg(value: &Const) -> Option<Const> {
    match value {
        Const::Int(v) => v.checked_neg().map(Const::Int),
        Const::Float(v) => Some(Const::Float(-v)),
        _ => None,
    }
}

/// Fold a binary operation. Anything that could trap at run time (zero
/// divisor, overflow) is left unfolded.
pub(crate) fn fold_bin(op: BinOp, l: &Const, r: &Const) -> Option<Const> {
    use Const::{Bool, Float, Int};
    Some(match (op, l, r) {
        (BinOp::Add, Int(a), Int(b)) => Int(a.checked_add(*b)?),
        (BinOp::Sub, Int(a), Int(b)) => Int(a.checked_sub(*b)?),
        (BinOp::Mul, Int(a), Int(b)) => Int(a.checked_mul(*b)?),
        (BinOp::Div, Int(a), Int(b)) => Int(a.checked_div(*b)?),
        (BinOp::Mod, Int(a), Int(b)) => Int(a.checked_rem(*b)?),
        (BinOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinOp::Div, Float(a), Float(b)) => Float(a / b),
        (BinOp::Eq, a, b) => Bool(const_eq(a, b)?),
        (BinOp::Ne, a, b) => Bool(!const_eq(a, b)?),
        (BinOp::Lt, a, b) => Bool(const_lt(a, b)?),
        (BinOp::Gt, a, b) => Bool(const_lt(b, a)?),
        (BinOp::Le, a, b) => Bool(!const_lt(b, a)?),
        (BinOp::Ge, a, b) => Bool(!const_lt(a, b)?),
        _ => return None,
    })
}

fn const_eq(l: &Const, r: &Const) -> Option<bool> {
    use Const::{Bool, Float, Int, Str};
    match (l, r) {
        (Int(a), Int(b)) => Some(a == b),
        (Float(a), Float(b)) => Some(a == b),
        (Bool(a), Bool(b)) => Some(a == b),
        (Str(a), Str(b)) => Some(a == b),
        _ => None,
    }
}

fn const_lt(l: &Const, r: &Const) -> Option<bool> {
    use Const::{Float, Int};
    match (l, r) {
        (Int(a), Int(b)) => Some(a < b),
        (Float(a), Float(b)) => Some(a < b),
        _ => None,
    }
}

pub(crate) fn fold_cast(value: &Const, to: &patakha_common::Ty) -> Option<Const> {
    use patakha_common::Ty;
    use Const::{Bool, Float, Int};
    Some(match (value, to) {
        (Int(v), Ty::Int) => Int(*v),
        (Int(v), Ty::Float) => Float(*v as f64),
        (Int(v), Ty::Bool) => Bool(*v != 0),
        (Float(v), Ty::Int) => Int(*v as i64),
        (Float(v), Ty::Float) => Float(*v),
        (Float(v), Ty::Bool) => Bool(*v != 0.0),
        (Bool(v), Ty::Int) => Int(*v as i64),
        (Bool(v), Ty::Float) => Float(if *v { 1.0 } else { 0.0 }),
        (Bool(v), Ty::Bool) => Bool(*v),
        _ => return None,
    })
}

// ── Dead-store elimination ─────────────────────────────────────────────

/// Remove instructions whose result is never used and that have no side
/// effect. Liveness is block-local plus a conservative inter-block
/// live-out: any temp read anywhere in a transitively reachable successor
/// is considered live, with no kill information.
fn dead_store_elimination(cfg: &mut Cfg) -> bool {
    let n = cfg.blocks.len();

    let use_sets: Vec<FxHashSet<Temp>> = cfg
        .blocks
        .iter()
        .map(|b| b.instrs.iter().flat_map(Instr::uses).collect())
        .collect();

    // live_beyond[b] = union of uses in every block reachable from b.
    let mut live_beyond: Vec<FxHashSet<Temp>> = Vec::with_capacity(n);
    for start in 0..n {
        let mut live = FxHashSet::default();
        let mut seen = vec![false; n];
        let mut stack: Vec<usize> = cfg.blocks[start]
            .succs
            .iter()
            .map(|s| s.0 as usize)
            .collect();
        while let Some(b) = stack.pop() {
            if std::mem::replace(&mut seen[b], true) {
                continue;
            }
            live.extend(use_sets[b].iter().copied());
            stack.extend(cfg.blocks[b].succs.iter().map(|s| s.0 as usize));
        }
        live_beyond.push(live);
    }

    let mut changed = false;
    for (i, block) in cfg.blocks.iter_mut().enumerate() {
        let mut live = live_beyond[i].clone();
        let mut kept: Vec<Instr> = Vec::with_capacity(block.instrs.len());
        for instr in block.instrs.iter().rev() {
            if let Some(dst) = instr.dst() {
                if !instr.has_side_effect() && !live.contains(&dst) {
                    changed = true;
                    continue;
                }
                live.remove(&dst);
            }
            live.extend(instr.uses());
            kept.push(instr.clone());
        }
        kept.reverse();
        block.instrs = kept;
    }
    changed
}

// ── Local common subexpression elimination ─────────────────────────────

/// Within each block, identical pure computations are replaced by a copy
/// from the first occurrence. The available-expression map is invalidated
/// at calls and stores, and entries die when any temp they mention is
/// redefined.
fn local_cse(cfg: &mut Cfg) -> bool {
    let mut changed = false;
    for block in &mut cfg.blocks {
        let mut avail: FxHashMap<String, Temp> = FxHashMap::default();
        for instr in &mut block.instrs {
            if matches!(
                instr,
                Instr::Call { .. } | Instr::IndexStore { .. } | Instr::FieldStore { .. }
            ) {
                avail.clear();
            }

            if let Some(key) = cse_key(instr) {
                let dst = instr.dst().expect("keyed instructions define a temp");
                match avail.get(&key).copied() {
                    Some(prev) if prev != dst => {
                        *instr = Instr::Copy {
                            dst,
                            src: Operand::Temp(prev),
                        };
                        changed = true;
                    }
                    _ => {
                        avail.insert(key, dst);
                    }
                }
            }

            if let Some(dst) = instr.dst() {
                let marker = format!("|{dst}|");
                avail.retain(|key, value| *value != dst && !key.contains(&marker));
            }
        }
    }
    changed
}

/// The value-number key of a pure computation, or `None` when the
/// instruction is not eligible. Commutative operators canonicalize their
/// operand order. Operands are delimited so `t3` can never match `t31`.
fn cse_key(instr: &Instr) -> Option<String> {
    match instr {
        Instr::Bin { op, lhs, rhs, .. } => {
            let (a, b) = (lhs.to_string(), rhs.to_string());
            let (a, b) = if matches!(op, BinOp::Add | BinOp::Mul | BinOp::Eq | BinOp::Ne) && b < a
            {
                (b, a)
            } else {
                (a, b)
            };
            Some(format!("{op:?}|{a}|{b}|"))
        }
        Instr::Neg { src, .. } => Some(format!("Neg|{src}|")),
        Instr::Not { src, .. } => Some(format!("Not|{src}|")),
        Instr::Cast { src, to, .. } => Some(format!("Cast:{to}|{src}|")),
        _ => None,
    }
}

// ── Loop-invariant code motion ─────────────────────────────────────────

/// Conservative LICM over natural loops.
///
/// A back edge is an edge whose target dominates its source; the natural
/// loop is the header plus everything that reaches the latch without
/// passing the header. An instruction hoists to a fresh pre-header only
/// when (a) it is pure and cannot trap, (b) its temp has a single
/// definition in the whole function, (c) every operand is defined outside
/// the loop or was itself hoisted, and (d) its block dominates the back
/// edge source. Loops with side entries are skipped.
///
/// Transforms one loop per call; the optimizer's fixpoint loop picks up
/// the rest.
fn licm(cfg: &mut Cfg) -> bool {
    let dom = cfg.dominators();

    // Back edges, deterministic order.
    let mut back_edges: Vec<(BlockId, BlockId)> = Vec::new();
    for (u, block) in cfg.blocks.iter().enumerate() {
        for succ in &block.succs {
            if dom[u][succ.0 as usize] {
                back_edges.push((BlockId(u as u32), *succ));
            }
        }
    }
    back_edges.sort_by_key(|(u, h)| (h.0, u.0));

    for (latch, header) in back_edges {
        if try_hoist_loop(cfg, &dom, latch, header) {
            return true;
        }
    }
    false
}

fn try_hoist_loop(cfg: &mut Cfg, dom: &[Vec<bool>], latch: BlockId, header: BlockId) -> bool {
    // Natural loop membership.
    let mut in_loop = FxHashSet::default();
    in_loop.insert(header);
    let mut stack = vec![latch];
    while let Some(b) = stack.pop() {
        if !in_loop.insert(b) {
            continue;
        }
        stack.extend(cfg.blocks[b.0 as usize].preds.iter().copied());
    }

    // The header must be the sole way in.
    for &b in &in_loop {
        if b == header {
            continue;
        }
        if cfg.blocks[b.0 as usize]
            .preds
            .iter()
            .any(|p| !in_loop.contains(p))
        {
            return false;
        }
    }

    // Definition counts, in the loop and function-wide.
    let mut defs_in_loop: FxHashMap<Temp, u32> = FxHashMap::default();
    let mut defs_total: FxHashMap<Temp, u32> = FxHashMap::default();
    for (i, block) in cfg.blocks.iter().enumerate() {
        for instr in &block.instrs {
            if let Some(dst) = instr.dst() {
                *defs_total.entry(dst).or_insert(0) += 1;
                if in_loop.contains(&BlockId(i as u32)) {
                    *defs_in_loop.entry(dst).or_insert(0) += 1;
                }
            }
        }
    }

    // Grow the hoisted set to a fixpoint; discovery order is emission
    // order, which keeps hoisted instructions ahead of their dependents.
    let mut hoisted_temps: FxHashSet<Temp> = FxHashSet::default();
    let mut hoisted: Vec<Instr> = Vec::new();
    let mut taken: FxHashSet<(BlockId, usize)> = FxHashSet::default();
    loop {
        let mut grew = false;
        let mut loop_blocks: Vec<BlockId> = in_loop.iter().copied().collect();
        loop_blocks.sort();
        for b in loop_blocks {
            if !dom[b.0 as usize][latch.0 as usize] {
                continue;
            }
            for (idx, instr) in cfg.blocks[b.0 as usize].instrs.iter().enumerate() {
                if taken.contains(&(b, idx)) || !instr.licm_hoistable() {
                    continue;
                }
                let Some(dst) = instr.dst() else { continue };
                if defs_total.get(&dst) != Some(&1) {
                    continue;
                }
                let invariant = instr.uses().iter().all(|t| {
                    defs_in_loop.get(t).copied().unwrap_or(0) == 0 || hoisted_temps.contains(t)
                });
                if !invariant {
                    continue;
                }
                taken.insert((b, idx));
                hoisted_temps.insert(dst);
                hoisted.push(instr.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    if hoisted.is_empty() {
        return false;
    }

    // Remove the hoisted instructions from their blocks.
    let mut by_block: FxHashMap<BlockId, Vec<usize>> = FxHashMap::default();
    for (b, idx) in &taken {
        by_block.entry(*b).or_default().push(*idx);
    }
    for (b, mut idxs) in by_block {
        idxs.sort_unstable();
        let block = &mut cfg.blocks[b.0 as usize];
        for idx in idxs.into_iter().rev() {
            block.instrs.remove(idx);
        }
    }

    // Build the pre-header and retarget the loop's outside predecessors.
    let header_label = cfg.blocks[header.0 as usize]
        .label
        .expect("loop headers are branch targets and always labeled");
    let pre_label = Label(cfg.next_label);
    cfg.next_label += 1;

    let mut pre_instrs = hoisted;
    pre_instrs.push(Instr::Jump {
        target: header_label,
    });

    let outside_preds: Vec<BlockId> = cfg.blocks[header.0 as usize]
        .preds
        .iter()
        .copied()
        .filter(|p| !in_loop.contains(p))
        .collect();
    for pred in outside_preds {
        let block = &mut cfg.blocks[pred.0 as usize];
        if let Some(instr) = block.instrs.last_mut() {
            instr_retarget(instr, header_label, pre_label);
        }
    }

    cfg.blocks.insert(
        header.0 as usize,
        BasicBlock {
            label: Some(pre_label),
            instrs: pre_instrs,
            succs: Vec::new(),
            preds: Vec::new(),
        },
    );
    cfg.connect();
    true
}

fn instr_retarget(instr: &mut Instr, from: Label, to: Label) {
    match instr {
        Instr::Jump { target } => {
            if *target == from {
                *target = to;
            }
        }
        Instr::Branch { then_, else_, .. } => {
            if *then_ == from {
                *then_ = to;
            }
            if *else_ == from {
                *else_ = to;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patakha_common::{Diagnostics, FileId};

    fn lower(source: &str) -> Program {
        let mut diags = Diagnostics::new();
        let ast = patakha_parser::parse_source(source, FileId(0), &mut diags);
        let analysis = patakha_sema::check_program(ast, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.records());
        crate::lower::lower_program(&analysis)
    }

    fn optimized_main(source: &str) -> Function {
        let mut program = lower(source);
        optimize_program(&mut program);
        program.function("main").expect("main").clone()
    }

    #[test]
    fn constant_fold_collapses_to_single_load() {
        // S3: no add survives; y is loaded as the constant 3.
        let main = optimized_main("shuru\nbhai y = 1 + 2\nbol(y)\nbass");
        assert!(!main
            .instrs
            .iter()
            .any(|i| matches!(i, Instr::Bin { .. })), "{:#?}", main.instrs);
        assert!(main.instrs.iter().any(|i| matches!(
            i,
            Instr::Print {
                value: Operand::Const(Const::Int(3)),
                ..
            }
        ) || matches!(
            i,
            Instr::Const {
                value: Const::Int(3),
                ..
            }
        )));
    }

    #[test]
    fn constant_branch_folds_and_dead_arm_disappears() {
        let main = optimized_main("shuru\nagar (1 < 2) { bol(1) } warna { bol(2) }\nbass");
        assert!(!main.instrs.iter().any(|i| matches!(i, Instr::Branch { .. })));
        let prints: Vec<&Instr> = main
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Print { .. }))
            .collect();
        assert_eq!(prints.len(), 1);
        assert!(matches!(
            prints[0],
            Instr::Print {
                value: Operand::Const(Const::Int(1)),
                ..
            }
        ));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let main = optimized_main("shuru\nbhai z = 0\nbhai y = 7 / z\nbol(1)\nbass");
        // 7 / 0 must stay a runtime division (or be removed as dead), never
        // fold to a bogus constant. y is dead here, so the whole thing may
        // vanish; what must not happen is a Const with a made-up value.
        assert!(!main.instrs.iter().any(|i| matches!(
            i,
            Instr::Const {
                value: Const::Int(v),
                ..
            } if *v != 0 && *v != 1
        )));
    }

    #[test]
    fn dead_stores_are_removed() {
        let main = optimized_main("shuru\nbhai x = 1\nx = 2\nx = 3\nbol(x)\nbass");
        // Only the final value reaches the print.
        let consts: Vec<&Instr> = main
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Const { .. }))
            .collect();
        assert!(consts.len() <= 1, "{:#?}", main.instrs);
    }

    #[test]
    fn loop_used_values_survive_dse() {
        let main = optimized_main(
            "shuru\nbhai sum = 0\njabtak (bhai i = 0; i < 5; ++i) { sum += i }\nbol(sum)\nbass",
        );
        // The loop body's accumulation must survive.
        assert!(main
            .instrs
            .iter()
            .any(|i| matches!(i, Instr::Bin { op: BinOp::Add, .. })));
    }

    #[test]
    fn local_cse_reuses_first_computation() {
        let main = optimized_main(
            "shuru\nbhai a = bata()\nbhai b = bata()\nbhai x = a * b\nbhai y = a * b\nbol(x)\nbol(y)\nbass",
        );
        let muls = main
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Bin { op: BinOp::Mul, .. }))
            .count();
        assert_eq!(muls, 1, "{:#?}", main.instrs);
    }

    #[test]
    fn cse_respects_commutativity() {
        let main = optimized_main(
            "shuru\nbhai a = bata()\nbhai b = bata()\nbhai x = a + b\nbhai y = b + a\nbol(x)\nbol(y)\nbass",
        );
        let adds = main
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Bin { op: BinOp::Add, .. }))
            .count();
        assert_eq!(adds, 1, "{:#?}", main.instrs);
    }

    #[test]
    fn cse_is_invalidated_by_calls() {
        let main = optimized_main(
            "bhai f() {\nnikal 1\n}\nshuru\nbhai a = bata()\nbhai x = a + a\nbhai c = f()\nbhai y = a + a\nbol(x)\nbol(y)\nbol(c)\nbass",
        );
        let adds = main
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Bin { op: BinOp::Add, .. }))
            .count();
        assert_eq!(adds, 2, "{:#?}", main.instrs);
    }

    #[test]
    fn licm_hoists_invariant_computation() {
        let main = optimized_main(
            "shuru\nbhai n = bata()\nbhai sum = 0\njabtak (bhai i = 0; i < 10; ++i) {\nbhai inv = n * 3\nsum += inv\n}\nbol(sum)\nbass",
        );
        // The practical check: the invariant multiply lands ahead of the
        // loop's comparison in the linearized stream.
        let mul_pos = main
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::Bin { op: BinOp::Mul, .. }));
        let cmp_pos = main
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::Bin { op: BinOp::Lt, .. }));
        match (mul_pos, cmp_pos) {
            (Some(mul), Some(cmp)) => assert!(
                mul < cmp,
                "invariant multiply should be hoisted ahead of the loop: {:#?}",
                main.instrs
            ),
            _ => panic!("expected both a multiply and a compare: {:#?}", main.instrs),
        }
    }

    #[test]
    fn licm_leaves_variant_computation_alone() {
        let main = optimized_main(
            "shuru\nbhai sum = 0\njabtak (bhai i = 0; i < 10; ++i) {\nsum += i * 2\n}\nbol(sum)\nbass",
        );
        let mul_pos = main
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::Bin { op: BinOp::Mul, .. }));
        let cmp_pos = main
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::Bin { op: BinOp::Lt, .. }));
        if let (Some(mul), Some(cmp)) = (mul_pos, cmp_pos) {
            assert!(mul > cmp, "i * 2 depends on the loop and must stay inside");
        }
    }

    #[test]
    fn optimizer_is_idempotent_at_fixpoint() {
        let mut program = lower(
            "shuru\nbhai x = 1 + 2\nbhai y = x * 3\ntabtak (y > 0) { y -= 1 }\nbol(y)\nbass",
        );
        optimize_program(&mut program);
        let first = crate::ir::dump_program(&program);
        optimize_program(&mut program);
        let second = crate::ir::dump_program(&program);
        assert_eq!(first, second);
    }
}
