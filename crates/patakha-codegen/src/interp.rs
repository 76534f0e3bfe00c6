//! Reference interpreter for the IR.
//!
//! Defines the observable semantics that the optimizer and both backends
//! must preserve: the sequence of printed lines, the inputs consumed, and
//! the exit value. Tests run programs through it before and after
//! optimization and compare.
//!
//! Values are dynamically tagged; every temp starts as the zero value of
//! its type, which matches the C backend's zero-initialized locals.

use std::collections::VecDeque;

use patakha_common::Ty;
use rustc_hash::FxHashMap;

use crate::ir::{BinOp, Const, Function, Instr, Label, Operand, Program};

/// A run-time value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
    Record(Vec<Value>),
}

impl Value {
    /// The zero value of a type; used for uninitialized locals.
    fn zero(ty: &Ty, program: &Program) -> Value {
        match ty {
            Ty::Int => Value::Int(0),
            Ty::Float => Value::Float(0.0),
            Ty::Bool => Value::Bool(false),
            Ty::Str => Value::Str(String::new()),
            Ty::Array(elem, len) => {
                Value::Array(vec![Value::zero(elem, program); *len as usize])
            }
            Ty::Record(name) => {
                let record = program
                    .record(name)
                    .expect("record layouts survive into the IR");
                Value::Record(
                    record
                        .fields
                        .iter()
                        .map(|(_, ty)| Value::zero(ty, program))
                        .collect(),
                )
            }
            Ty::Void | Ty::Unknown => Value::Int(0),
        }
    }
}

/// What a program run produced.
#[derive(Debug, PartialEq)]
pub struct RunResult {
    /// Printed lines, without trailing newlines.
    pub output: Vec<String>,
    /// The main function's return value.
    pub exit: i64,
}

/// A run-time failure (zero divisor, bad index, input exhausted, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct RunError(pub String);

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execute a program against a fixed input script.
pub fn run(program: &Program, inputs: &[&str]) -> Result<RunResult, RunError> {
    let mut io = Io {
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        output: Vec::new(),
    };
    let main = program
        .function("main")
        .ok_or_else(|| RunError("program has no main".to_string()))?;
    let exit = match call(program, main, Vec::new(), &mut io, 0)? {
        Some(Value::Int(v)) => v,
        _ => 0,
    };
    Ok(RunResult {
        output: io.output,
        exit,
    })
}

struct Io {
    inputs: VecDeque<String>,
    output: Vec<String>,
}

const MAX_DEPTH: u32 = 256;

fn call(
    program: &Program,
    func: &Function,
    args: Vec<Value>,
    io: &mut Io,
    depth: u32,
) -> Result<Option<Value>, RunError> {
    if depth > MAX_DEPTH {
        return Err(RunError("call stack overflow".to_string()));
    }

    let mut temps: Vec<Value> = func
        .temp_tys
        .iter()
        .map(|ty| Value::zero(ty, program))
        .collect();
    for (param, arg) in func.params.iter().zip(args) {
        temps[param.0 as usize] = arg;
    }

    let labels: FxHashMap<Label, usize> = func
        .instrs
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| match instr {
            Instr::Label(label) => Some((*label, i)),
            _ => None,
        })
        .collect();

    let read = |temps: &[Value], op: &Operand| -> Value {
        match op {
            Operand::Temp(t) => temps[t.0 as usize].clone(),
            Operand::Const(c) => const_value(c),
        }
    };

    let mut pc = 0usize;
    let mut steps = 0u64;
    loop {
        if pc >= func.instrs.len() {
            return Err(RunError(format!("fell off the end of `{}`", func.name)));
        }
        steps += 1;
        if steps > 100_000_000 {
            return Err(RunError("instruction budget exhausted".to_string()));
        }

        match &func.instrs[pc] {
            Instr::Label(_) => {}
            Instr::Const { dst, value } => temps[dst.0 as usize] = const_value(value),
            Instr::Copy { dst, src } => temps[dst.0 as usize] = read(&temps, src),
            Instr::Bin { op, dst, lhs, rhs } => {
                let l = read(&temps, lhs);
                let r = read(&temps, rhs);
                temps[dst.0 as usize] = eval_bin(*op, l, r)?;
            }
            Instr::Neg { dst, src } => {
                temps[dst.0 as usize] = match read(&temps, src) {
                    Value::Int(v) => Value::Int(v.wrapping_neg()),
                    Value::Float(v) => Value::Float(-v),
                    other => return Err(RunError(format!("cannot negate {other:?}"))),
                };
            }
            Instr::Not { dst, src } => {
                temps[dst.0 as usize] = match read(&temps, src) {
                    Value::Bool(v) => Value::Bool(!v),
                    other => return Err(RunError(format!("cannot logically negate {other:?}"))),
                };
            }
            Instr::Cast { dst, src, to, .. } => {
                temps[dst.0 as usize] = eval_cast(read(&temps, src), to)?;
            }
            Instr::IndexLoad { dst, base, index } => {
                let idx = as_index(read(&temps, index))?;
                let Value::Array(elems) = &temps[base.0 as usize] else {
                    return Err(RunError("index base is not an array".to_string()));
                };
                let value = elems
                    .get(idx)
                    .ok_or_else(|| RunError(format!("array index {idx} out of bounds")))?
                    .clone();
                temps[dst.0 as usize] = value;
            }
            Instr::IndexStore { base, index, value } => {
                let idx = as_index(read(&temps, index))?;
                let value = read(&temps, value);
                let Value::Array(elems) = &mut temps[base.0 as usize] else {
                    return Err(RunError("index base is not an array".to_string()));
                };
                let slot = elems
                    .get_mut(idx)
                    .ok_or_else(|| RunError(format!("array index {idx} out of bounds")))?;
                *slot = value;
            }
            Instr::FieldLoad { dst, base, field } => {
                let Value::Record(fields) = &temps[base.0 as usize] else {
                    return Err(RunError("field base is not a record".to_string()));
                };
                temps[dst.0 as usize] = fields[*field as usize].clone();
            }
            Instr::FieldStore { base, field, value } => {
                let value = read(&temps, value);
                let Value::Record(fields) = &mut temps[base.0 as usize] else {
                    return Err(RunError("field base is not a record".to_string()));
                };
                fields[*field as usize] = value;
            }
            Instr::Jump { target } => {
                pc = labels[target];
                continue;
            }
            Instr::Branch { cond, then_, else_ } => {
                let Value::Bool(b) = read(&temps, cond) else {
                    return Err(RunError("branch condition is not a bool".to_string()));
                };
                pc = labels[if b { then_ } else { else_ }];
                continue;
            }
            Instr::Call { dst, func: name, args } => {
                let callee = program
                    .function(name)
                    .ok_or_else(|| RunError(format!("unknown function `{name}`")))?;
                let arg_values: Vec<Value> = args.iter().map(|a| read(&temps, a)).collect();
                let result = call(program, callee, arg_values, io, depth + 1)?;
                if let Some(dst) = dst {
                    temps[dst.0 as usize] =
                        result.ok_or_else(|| RunError("khali call used as a value".to_string()))?;
                }
            }
            Instr::Ret { value } => {
                return Ok(value.as_ref().map(|v| read(&temps, v)));
            }
            Instr::Print { value, .. } => {
                let line = format_value(&read(&temps, value));
                io.output.push(line);
            }
            Instr::Read { dst, ty } => {
                let line = io
                    .inputs
                    .pop_front()
                    .ok_or_else(|| RunError("input exhausted".to_string()))?;
                temps[dst.0 as usize] = parse_input(&line, ty);
            }
        }
        pc += 1;
    }
}

fn const_value(c: &Const) -> Value {
    match c {
        Const::Int(v) => Value::Int(*v),
        Const::Float(v) => Value::Float(*v),
        Const::Bool(v) => Value::Bool(*v),
        Const::Str(v) => Value::Str(v.clone()),
    }
}

fn as_index(value: Value) -> Result<usize, RunError> {
    match value {
        Value::Int(v) if v >= 0 => Ok(v as usize),
        Value::Int(v) => Err(RunError(format!("negative array index {v}"))),
        other => Err(RunError(format!("array index is not bhai: {other:?}"))),
    }
}

fn eval_bin(op: BinOp, l: Value, r: Value) -> Result<Value, RunError> {
    use Value::{Bool, Float, Int};
    Ok(match (op, l, r) {
        (BinOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(b)),
        (BinOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(b)),
        (BinOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(b)),
        (BinOp::Div, Int(a), Int(b)) => {
            if b == 0 {
                return Err(RunError("division by zero".to_string()));
            }
            Int(a.wrapping_div(b))
        }
        (BinOp::Mod, Int(a), Int(b)) => {
            if b == 0 {
                return Err(RunError("modulo by zero".to_string()));
            }
            Int(a.wrapping_rem(b))
        }
        (BinOp::Add, Float(a), Float(b)) => Float(a + b),
        (BinOp::Sub, Float(a), Float(b)) => Float(a - b),
        (BinOp::Mul, Float(a), Float(b)) => Float(a * b),
        (BinOp::Div, Float(a), Float(b)) => Float(a / b),
        (BinOp::Eq, a, b) => Bool(value_eq(&a, &b)?),
        (BinOp::Ne, a, b) => Bool(!value_eq(&a, &b)?),
        (BinOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (BinOp::Lt, Float(a), Float(b)) => Bool(a < b),
        (BinOp::Le, Float(a), Float(b)) => Bool(a <= b),
        (BinOp::Gt, Float(a), Float(b)) => Bool(a > b),
        (BinOp::Ge, Float(a), Float(b)) => Bool(a >= b),
        (op, l, r) => {
            return Err(RunError(format!(
                "bad operands for {}: {l:?} and {r:?}",
                op.symbol()
            )))
        }
    })
}

fn value_eq(l: &Value, r: &Value) -> Result<bool, RunError> {
    use Value::{Bool, Float, Int, Str};
    match (l, r) {
        (Int(a), Int(b)) => Ok(a == b),
        (Float(a), Float(b)) => Ok(a == b),
        (Bool(a), Bool(b)) => Ok(a == b),
        (Str(a), Str(b)) => Ok(a == b),
        _ => Err(RunError(format!("cannot compare {l:?} and {r:?}"))),
    }
}

fn eval_cast(value: Value, to: &Ty) -> Result<Value, RunError> {
    use Value::{Bool, Float, Int};
    Ok(match (value, to) {
        (Int(v), Ty::Int) => Int(v),
        (Int(v), Ty::Float) => Float(v as f64),
        (Int(v), Ty::Bool) => Bool(v != 0),
        (Float(v), Ty::Int) => Int(v as i64),
        (Float(v), Ty::Float) => Float(v),
        (Float(v), Ty::Bool) => Bool(v != 0.0),
        (Bool(v), Ty::Int) => Int(v as i64),
        (Bool(v), Ty::Float) => Float(if v { 1.0 } else { 0.0 }),
        (Bool(v), Ty::Bool) => Bool(v),
        (value, to) => return Err(RunError(format!("cannot cast {value:?} to {to}"))),
    })
}

/// Format a value the way `bol` prints it. Matches the C backend: `%lld`
/// for bhai, `%g`-style shortest form for decimal, `sahi`/`galat` for
/// bool, the raw bytes for text.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Float(v) => {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{v:.0}")
            } else {
                format!("{v}")
            }
        }
        Value::Bool(true) => "sahi".to_string(),
        Value::Bool(false) => "galat".to_string(),
        Value::Str(v) => v.clone(),
        other => format!("{other:?}"),
    }
}

/// Parse one input line the way the C runtime helpers do: unparsable input
/// yields the zero value rather than an error.
fn parse_input(line: &str, ty: &Ty) -> Value {
    let line = line.trim();
    match ty {
        Ty::Int => Value::Int(line.parse().unwrap_or(0)),
        Ty::Float => Value::Float(line.parse().unwrap_or(0.0)),
        Ty::Bool => Value::Bool(matches!(line, "sahi" | "true" | "1")),
        Ty::Str => Value::Str(line.to_string()),
        _ => Value::Int(0),
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

    fn run_source(source: &str, inputs: &[&str]) -> RunResult {
        run(&lower(source), inputs).expect("program runs")
    }

    /// Optimizing must not change observable behavior.
    fn run_both_ways(source: &str, inputs: &[&str]) -> RunResult {
        let program = lower(source);
        let before = run(&program, inputs).expect("unoptimized run");
        let mut optimized = program.clone();
        crate::opt::optimize_program(&mut optimized);
        let after = run(&optimized, inputs).expect("optimized run");
        assert_eq!(before, after, "optimizer changed behavior");
        before
    }

    #[test]
    fn s1_arithmetic_precedence() {
        let result = run_both_ways("shuru\nbhai x = 2 + 3 * 4\nbol(x)\nnikal 0\nbass", &[]);
        assert_eq!(result.output, vec!["14"]);
        assert_eq!(result.exit, 0);
    }

    #[test]
    fn s2_counted_for_accumulates() {
        let result = run_both_ways(
            "shuru\nbhai sum = 0\njabtak (bhai i = 0; i < 5; ++i) { sum += i }\nbol(sum)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["10"]);
    }

    #[test]
    fn s6_float_cast_division() {
        let result = run_both_ways("shuru\ndecimal d = decimal(3) / 2.0\nbol(d)\nbass", &[]);
        assert_eq!(result.output, vec!["1.5"]);
    }

    #[test]
    fn short_circuit_skips_rhs_effects() {
        // The rhs call would print; the false lhs must suppress it.
        let result = run_both_ways(
            "bool noisy() {\nbol(\"side\")\nnikal sahi\n}\nshuru\nbool b = galat && noisy()\nbol(b)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["galat"]);

        let result = run_both_ways(
            "bool noisy() {\nbol(\"side\")\nnikal sahi\n}\nshuru\nbool b = sahi || noisy()\nbol(b)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["sahi"]);
    }

    #[test]
    fn incdec_fixity_semantics() {
        let result = run_both_ways(
            "shuru\nbhai i = 5\nbhai a = i++\nbhai b = ++i\nbhai c = i--\nbhai d = --i\nbol(a)\nbol(b)\nbol(c)\nbol(d)\nbol(i)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["5", "7", "7", "5", "5"]);
    }

    #[test]
    fn while_do_while_and_switch() {
        let result = run_both_ways(
            "shuru\nbhai x = 0\nkar { x += 2 } tabtak (x < 6)\nswitch (x) {\ncase 6 { bol(\"chhe\") }\ndefault { bol(\"aur\") }\n}\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["chhe"]);
    }

    #[test]
    fn switch_on_strings() {
        let result = run_both_ways(
            "shuru\ntext s = \"do\"\nswitch (s) {\ncase \"ek\" { bol(1) }\ncase \"do\" { bol(2) }\ndefault { bol(0) }\n}\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["2"]);
    }

    #[test]
    fn functions_recursion_and_calls() {
        let result = run_both_ways(
            "bhai fact(bhai n) {\nagar (n <= 1) { nikal 1 }\nnikal n * fact(n - 1)\n}\nshuru\nbol(fact(6))\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["720"]);
    }

    #[test]
    fn records_and_arrays() {
        let result = run_both_ways(
            "struct Point {\nbhai x\nbhai y\n}\nshuru\nPoint p\np.x = 3\np.y = 4\nbhai a[3]\na[0] = p.x\na[1] = p.y\na[2] = a[0] * a[1]\nbol(a[2])\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["12"]);
    }

    #[test]
    fn input_reads_in_order() {
        let result = run_both_ways(
            "shuru\nbhai a = bata()\nbhai b = bata()\nbol(a + b)\nbass",
            &["17", "25"],
        );
        assert_eq!(result.output, vec!["42"]);
    }

    #[test]
    fn inputs_consumed_even_when_value_unused() {
        // bata() is side-effecting; DSE must not remove it.
        let program = {
            let mut program = lower("shuru\nbhai unused = bata()\nbhai b = bata()\nbol(b)\nbass");
            crate::opt::optimize_program(&mut program);
            program
        };
        let result = run(&program, &["1", "2"]).expect("runs");
        assert_eq!(result.output, vec!["2"]);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let program = lower("shuru\nbhai z = 0\nbol(7 / z)\nbass");
        assert!(run(&program, &[]).is_err());
    }

    #[test]
    fn exit_code_is_main_return() {
        let result = run_source("shuru\nnikal 3\nbass", &[]);
        assert_eq!(result.exit, 3);
    }

    #[test]
    fn float_formatting_matches_the_c_runtime() {
        // Non-whole values print the shortest fixed form.
        assert_eq!(format_value(&Value::Float(1.5)), "1.5");
        assert_eq!(format_value(&Value::Float(0.25)), "0.25");
        // Whole values print as plain integers, never scientific; the C
        // helper takes the same branch with %.0f.
        assert_eq!(format_value(&Value::Float(3.0)), "3");
        assert_eq!(format_value(&Value::Float(10.0)), "10");
        assert_eq!(format_value(&Value::Float(100.0)), "100");
        assert_eq!(format_value(&Value::Float(-10.0)), "-10");
    }

    #[test]
    fn whole_valued_decimals_print_without_scientific_notation() {
        let result = run_both_ways(
            "shuru\ndecimal a = decimal(10)\ndecimal b = decimal(100)\ndecimal c = a / 4.0\nbol(a)\nbol(b)\nbol(-a)\nbol(c)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["10", "100", "-10", "2.5"]);
    }

    #[test]
    fn nested_record_write_back() {
        let result = run_both_ways(
            "struct Inner {\nbhai v\n}\nstruct Outer {\nInner inner\n}\nshuru\nOuter o\no.inner.v = 9\nbol(o.inner.v)\nbass",
            &[],
        );
        assert_eq!(result.output, vec!["9"]);
    }
}
