//! The stack backend: IR to textual assembly for a stack virtual machine.
//!
//! Mnemonics: `PUSH`/`LOAD`/`STORE`/`POP`, arithmetic (`ADD` `SUB` `MUL`
//! `DIV` `MOD` `NEG`), comparisons (`EQ` `NE` `LT` `LE` `GT` `GE`),
//! logical (`AND` `OR` `NOT`), casts (`I2F` `F2I` `I2B` `B2I`), control
//! (`JMP` `JZ` `JNZ`), `CALL name/argc`, `RET`, `PRINT`, `READ <type>`,
//! and the aggregate helpers `ALOAD name` / `ASTORE name` (element load
//! and store on a named array slot, index on the stack) and
//! `FLOAD name.field` / `FSTORE name.field`.
//!
//! Functions are bracketed by `FN name/argc` and `END`; the main body is
//! labeled `MAIN` and execution starts there. Temps that carry a source
//! variable name keep it when the name is unique within the function,
//! which keeps the listing readable.

use std::fmt::Write;

use patakha_common::Ty;
use rustc_hash::FxHashMap;

use crate::ir::{BinOp, Const, Function, Instr, Operand, Program, Temp};

/// Emit the whole program as stack assembly.
pub fn emit(program: &Program) -> String {
    let mut out = String::new();
    for func in &program.functions {
        if !func.is_main {
            emit_function(program, func, &mut out);
        }
    }
    if let Some(main) = program.functions.iter().find(|f| f.is_main) {
        out.push_str("MAIN:\n");
        let slots = SlotNames::new(main);
        emit_body(program, main, &slots, &mut out);
        out.push_str("END\n");
    }
    out
}

fn emit_function(program: &Program, func: &Function, out: &mut String) {
    let _ = writeln!(out, "FN {}/{}", func.name, func.params.len());
    let slots = SlotNames::new(func);
    // Arguments arrive on the stack, last pushed on top.
    for param in func.params.iter().rev() {
        let _ = writeln!(out, "    STORE {}", slots.name(*param));
    }
    emit_body(program, func, &slots, out);
    out.push_str("END\n");
}

/// Display names for temps: the backing variable name when it is unique in
/// the function, otherwise the plain `t<N>` spelling.
struct SlotNames {
    names: Vec<String>,
}

impl SlotNames {
    fn new(func: &Function) -> Self {
        let mut counts: FxHashMap<&str, u32> = FxHashMap::default();
        for name in func.temp_names.iter().flatten() {
            *counts.entry(name.as_str()).or_insert(0) += 1;
        }
        let names = func
            .temp_names
            .iter()
            .enumerate()
            .map(|(i, name)| match name {
                Some(name) if counts[name.as_str()] == 1 => name.clone(),
                _ => Temp(i as u32).to_string(),
            })
            .collect();
        Self { names }
    }

    fn name(&self, temp: Temp) -> &str {
        &self.names[temp.0 as usize]
    }
}

fn emit_body(program: &Program, func: &Function, slots: &SlotNames, out: &mut String) {
    for instr in &func.instrs {
        emit_instr(program, func, slots, instr, out);
    }
}

fn push_operand(slots: &SlotNames, op: &Operand, out: &mut String) {
    match op {
        Operand::Temp(t) => {
            let _ = writeln!(out, "    LOAD {}", slots.name(*t));
        }
        Operand::Const(c) => {
            let _ = writeln!(out, "    PUSH {}", const_text(c));
        }
    }
}

fn const_text(c: &Const) -> String {
    match c {
        Const::Int(v) => v.to_string(),
        Const::Float(v) => format!("{v:?}"),
        Const::Bool(true) => "1".to_string(),
        Const::Bool(false) => "0".to_string(),
        Const::Str(v) => format!("{v:?}"),
    }
}

fn bin_mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "ADD",
        BinOp::Sub => "SUB",
        BinOp::Mul => "MUL",
        BinOp::Div => "DIV",
        BinOp::Mod => "MOD",
        BinOp::Eq => "EQ",
        BinOp::Ne => "NE",
        BinOp::Lt => "LT",
        BinOp::Le => "LE",
        BinOp::Gt => "GT",
        BinOp::Ge => "GE",
    }
}

fn read_mnemonic(ty: &Ty) -> &'static str {
    match ty {
        Ty::Int => "READ INT",
        Ty::Float => "READ FLOAT",
        Ty::Bool => "READ BOOL",
        Ty::Str => "READ STR",
        _ => "READ INT",
    }
}

fn emit_instr(
    program: &Program,
    func: &Function,
    slots: &SlotNames,
    instr: &Instr,
    out: &mut String,
) {
    match instr {
        Instr::Label(label) => {
            let _ = writeln!(out, "{label}:");
        }
        Instr::Const { dst, value } => {
            let _ = writeln!(out, "    PUSH {}", const_text(value));
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::Copy { dst, src } => {
            push_operand(slots, src, out);
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::Bin { op, dst, lhs, rhs } => {
            push_operand(slots, lhs, out);
            push_operand(slots, rhs, out);
            let _ = writeln!(out, "    {}", bin_mnemonic(*op));
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::Neg { dst, src } => {
            push_operand(slots, src, out);
            let _ = writeln!(out, "    NEG");
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::Not { dst, src } => {
            push_operand(slots, src, out);
            let _ = writeln!(out, "    NOT");
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::Cast { dst, src, from, to } => {
            push_operand(slots, src, out);
            emit_cast(from, to, out);
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::IndexLoad { dst, base, index } => {
            push_operand(slots, index, out);
            let _ = writeln!(out, "    ALOAD {}", slots.name(*base));
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::IndexStore { base, index, value } => {
            push_operand(slots, index, out);
            push_operand(slots, value, out);
            let _ = writeln!(out, "    ASTORE {}", slots.name(*base));
        }
        Instr::FieldLoad { dst, base, field } => {
            let field = field_name(program, func, *base, *field);
            let _ = writeln!(out, "    FLOAD {}.{field}", slots.name(*base));
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
        Instr::FieldStore { base, field, value } => {
            let field = field_name(program, func, *base, *field);
            push_operand(slots, value, out);
            let _ = writeln!(out, "    FSTORE {}.{field}", slots.name(*base));
        }
        Instr::Jump { target } => {
            let _ = writeln!(out, "    JMP {target}");
        }
        Instr::Branch { cond, then_, else_ } => {
            push_operand(slots, cond, out);
            let _ = writeln!(out, "    JZ {else_}");
            let _ = writeln!(out, "    JMP {then_}");
        }
        Instr::Call { dst, func: name, args } => {
            for arg in args {
                push_operand(slots, arg, out);
            }
            let _ = writeln!(out, "    CALL {name}/{}", args.len());
            match dst {
                Some(dst) => {
                    let _ = writeln!(out, "    STORE {}", slots.name(*dst));
                }
                None => {}
            }
        }
        Instr::Ret { value } => {
            if let Some(value) = value {
                push_operand(slots, value, out);
            }
            let _ = writeln!(out, "    RET");
        }
        Instr::Print { value, .. } => {
            push_operand(slots, value, out);
            let _ = writeln!(out, "    PRINT");
        }
        Instr::Read { dst, ty } => {
            let _ = writeln!(out, "    {}", read_mnemonic(ty));
            let _ = writeln!(out, "    STORE {}", slots.name(*dst));
        }
    }
}

/// Compose a cast from the minimal cast set. A float-to-bool test has no
/// single mnemonic and compiles to a comparison against 0.0 instead.
fn emit_cast(from: &Ty, to: &Ty, out: &mut String) {
    match (from, to) {
        (Ty::Int, Ty::Float) => {
            let _ = writeln!(out, "    I2F");
        }
        (Ty::Float, Ty::Int) => {
            let _ = writeln!(out, "    F2I");
        }
        (Ty::Int, Ty::Bool) => {
            let _ = writeln!(out, "    I2B");
        }
        (Ty::Bool, Ty::Int) => {
            let _ = writeln!(out, "    B2I");
        }
        (Ty::Bool, Ty::Float) => {
            let _ = writeln!(out, "    B2I");
            let _ = writeln!(out, "    I2F");
        }
        (Ty::Float, Ty::Bool) => {
            let _ = writeln!(out, "    PUSH 0.0");
            let _ = writeln!(out, "    NE");
        }
        _ => {}
    }
}

fn field_name(program: &Program, func: &Function, base: Temp, field: u32) -> String {
    let Ty::Record(record) = &func.temp_tys[base.0 as usize] else {
        return format!("f{field}");
    };
    program
        .record(record)
        .and_then(|r| r.fields.get(field as usize))
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| format!("f{field}"))
}
