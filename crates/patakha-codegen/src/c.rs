//! The C backend: IR to a single portable C11 translation unit.
//!
//! Layout of the emitted file: a small runtime prelude (the bounded string
//! type and stdin helpers), record declarations in dependency order, static
//! prototypes, then one function definition per IR function with the main
//! block as `int main(void)`.
//!
//! Temps become zero-initialized locals named `t<N>`; branches become
//! labels and `goto`. The short-circuit diamond emitted by the lowerer is
//! recognized and re-lowered to native `&&` / `||` when its labels have no
//! other references; any other shape keeps the goto form. User functions
//! and record types get a `pk_` prefix so they can never collide with libc
//! names.

use std::fmt::Write;

use patakha_common::Ty;
use rustc_hash::FxHashMap;

use crate::ir::{BinOp, Const, Function, Instr, Label, Operand, Program, Temp};

/// Emit the whole program as C source.
pub fn emit(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("/* generated by patakhac; do not edit */\n");
    out.push_str("#include <stdio.h>\n");
    out.push_str("#include <stdlib.h>\n");
    out.push_str("#include <string.h>\n\n");
    out.push_str(PRELUDE);

    emit_records(program, &mut out);

    for func in &program.functions {
        if !func.is_main {
            let _ = writeln!(out, "static {};", signature(func));
        }
    }
    out.push('\n');

    for func in &program.functions {
        emit_function(program, func, &mut out);
    }
    out
}

/// The runtime prelude: bounded strings plus typed stdin readers. Input
/// that does not parse yields the zero value, matching the reference
/// interpreter.
const PRELUDE: &str = r#"typedef struct { char data[1024]; } patakha_str;

static patakha_str patakha_str_lit(const char *text) {
    patakha_str s;
    strncpy(s.data, text, sizeof s.data - 1);
    s.data[sizeof s.data - 1] = '\0';
    return s;
}

static char *patakha_read_line(char *buf, size_t len) {
    if (!fgets(buf, (int)len, stdin)) {
        buf[0] = '\0';
        return buf;
    }
    buf[strcspn(buf, "\r\n")] = '\0';
    while (*buf == ' ' || *buf == '\t') buf++;
    size_t end = strlen(buf);
    while (end > 0 && (buf[end - 1] == ' ' || buf[end - 1] == '\t')) buf[--end] = '\0';
    return buf;
}

static long long patakha_read_int(void) {
    char raw[1024];
    char *buf = patakha_read_line(raw, sizeof raw);
    char *end;
    long long v = strtoll(buf, &end, 10);
    return (*buf != '\0' && *end == '\0') ? v : 0;
}

static double patakha_read_float(void) {
    char raw[1024];
    char *buf = patakha_read_line(raw, sizeof raw);
    char *end;
    double v = strtod(buf, &end);
    return (*buf != '\0' && *end == '\0') ? v : 0.0;
}

static int patakha_read_bool(void) {
    char raw[1024];
    char *buf = patakha_read_line(raw, sizeof raw);
    return strcmp(buf, "sahi") == 0 || strcmp(buf, "true") == 0 || strcmp(buf, "1") == 0;
}

static patakha_str patakha_read_str(void) {
    patakha_str s;
    patakha_str raw;
    char *buf = patakha_read_line(raw.data, sizeof raw.data);
    strncpy(s.data, buf, sizeof s.data - 1);
    s.data[sizeof s.data - 1] = '\0';
    return s;
}

/* bol on a decimal. Mirrors the reference semantics exactly: whole values
 * below 1e15 print as plain integers, everything else prints in fixed
 * notation with the fewest fractional digits that still read back as the
 * same double. */
static void patakha_print_float(double v) {
    char buf[400];
    int prec;
    if (v != v) {
        printf("NaN\n");
        return;
    }
    if (v > 1.7976931348623157e308) {
        printf("inf\n");
        return;
    }
    if (v < -1.7976931348623157e308) {
        printf("-inf\n");
        return;
    }
    if (v > -1e15 && v < 1e15 && v == (double)(long long)v) {
        printf("%.0f\n", v);
        return;
    }
    for (prec = 0; prec <= 350; prec++) {
        snprintf(buf, sizeof buf, "%.*f", prec, v);
        if (strtod(buf, NULL) == v) break;
    }
    printf("%s\n", buf);
}

"#;

/// Record declarations, contained records first.
fn emit_records(program: &Program, out: &mut String) {
    let mut emitted: Vec<String> = Vec::new();
    for record in &program.records {
        emit_record_rec(program, &record.name, &mut emitted, out);
    }
    if !program.records.is_empty() {
        out.push('\n');
    }
}

fn emit_record_rec(program: &Program, name: &str, emitted: &mut Vec<String>, out: &mut String) {
    if emitted.iter().any(|e| e == name) {
        return;
    }
    emitted.push(name.to_string());
    let Some(record) = program.record(name) else {
        return;
    };
    for (_, ty) in &record.fields {
        if let Ty::Record(inner) = ty {
            emit_record_rec(program, inner, emitted, out);
        }
    }
    let _ = writeln!(out, "typedef struct {{");
    for (field, ty) in &record.fields {
        let _ = writeln!(out, "    {};", declare(ty, field));
    }
    let _ = writeln!(out, "}} pk_{name};");
}

/// C type spelling for scalar positions.
fn c_type(ty: &Ty) -> String {
    match ty {
        Ty::Int => "long long".to_string(),
        Ty::Float => "double".to_string(),
        Ty::Bool => "int".to_string(),
        Ty::Str => "patakha_str".to_string(),
        Ty::Void => "void".to_string(),
        Ty::Record(name) => format!("pk_{name}"),
        Ty::Array(elem, _) => c_type(elem),
        Ty::Unknown => "long long".to_string(),
    }
}

/// A declaration of `name` with type `ty` (handles the array suffix).
fn declare(ty: &Ty, name: &str) -> String {
    match ty {
        Ty::Array(elem, len) => format!("{} {name}[{len}]", c_type(elem)),
        other => format!("{} {name}", c_type(other)),
    }
}

fn signature(func: &Function) -> String {
    let params: Vec<String> = func
        .params
        .iter()
        .map(|t| declare(&func.temp_tys[t.0 as usize], &t.to_string()))
        .collect();
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!("{} pk_{}({params})", c_type(&func.ret), func.name)
}

fn emit_function(program: &Program, func: &Function, out: &mut String) {
    if func.is_main {
        out.push_str("int main(void) {\n");
    } else {
        let _ = writeln!(out, "static {} {{", signature(func));
    }

    // Zero-initialized locals for every non-parameter temp.
    for id in func.params.len()..func.temp_count() {
        let temp = Temp(id as u32);
        let ty = &func.temp_tys[id];
        match ty {
            Ty::Int | Ty::Unknown => {
                let _ = writeln!(out, "    long long {temp} = 0;");
            }
            Ty::Float => {
                let _ = writeln!(out, "    double {temp} = 0;");
            }
            Ty::Bool => {
                let _ = writeln!(out, "    int {temp} = 0;");
            }
            Ty::Void => {
                let _ = writeln!(out, "    long long {temp} = 0;");
            }
            other => {
                let _ = writeln!(out, "    {};", declare(other, &temp.to_string()));
                let _ = writeln!(out, "    memset(&{temp}, 0, sizeof {temp});");
            }
        }
    }

    let label_refs = count_label_refs(func);
    let mut i = 0;
    while i < func.instrs.len() {
        if let Some((line, skip)) = match_short_circuit(func, &label_refs, i) {
            let _ = writeln!(out, "    {line}");
            i += skip;
            continue;
        }
        emit_instr(program, func, &func.instrs[i], out);
        i += 1;
    }

    out.push_str("}\n\n");
}

/// How many jumps and branches target each label.
fn count_label_refs(func: &Function) -> FxHashMap<Label, u32> {
    let mut refs: FxHashMap<Label, u32> = FxHashMap::default();
    for instr in &func.instrs {
        match instr {
            Instr::Jump { target } => *refs.entry(*target).or_insert(0) += 1,
            Instr::Branch { then_, else_, .. } => {
                *refs.entry(*then_).or_insert(0) += 1;
                *refs.entry(*else_).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    refs
}

/// Recognize the lowerer's short-circuit diamond starting at `i` and
/// return the native C statement plus the number of instructions consumed.
///
/// Two spellings of the same shape exist: the raw seven-instruction form
/// straight out of the lowerer (the short arm falls through to the end
/// label), and the eight-instruction form after CFG normalization (the
/// fall-through became an explicit jump). It only collapses when the
/// shape's labels are referenced exclusively from inside it.
fn match_short_circuit(
    func: &Function,
    label_refs: &FxHashMap<Label, u32>,
    i: usize,
) -> Option<(String, usize)> {
    let head = func.instrs.get(i..i + 6)?;
    let Instr::Branch { cond, then_, else_ } = &head[0] else {
        return None;
    };
    let Instr::Label(l1) = &head[1] else {
        return None;
    };
    let Instr::Copy { dst, src } = &head[2] else {
        return None;
    };
    let Instr::Jump { target: l3 } = &head[3] else {
        return None;
    };
    let Instr::Label(l2) = &head[4] else {
        return None;
    };
    let Instr::Const {
        dst: dst2,
        value: Const::Bool(short_value),
    } = &head[5]
    else {
        return None;
    };
    if dst != dst2 {
        return None;
    }

    // The tail is either the end label directly, or jump-then-label.
    let (consumed, l3_refs) = match func.instrs.get(i + 6) {
        Some(Instr::Label(end)) if end == l3 => (7, 1),
        Some(Instr::Jump { target }) if target == l3 => {
            match func.instrs.get(i + 7) {
                Some(Instr::Label(end)) if end == l3 => (8, 2),
                _ => return None,
            }
        }
        _ => return None,
    };

    if label_refs.get(l1).copied().unwrap_or(0) != 1
        || label_refs.get(l2).copied().unwrap_or(0) != 1
        || label_refs.get(l3).copied().unwrap_or(0) != l3_refs
    {
        return None;
    }

    let op = if *then_ == *l1 && *else_ == *l2 && !*short_value {
        "&&"
    } else if *then_ == *l2 && *else_ == *l1 && *short_value {
        "||"
    } else {
        return None;
    };

    Some((format!("{dst} = {} {op} {};", value(cond), value(src)), consumed))
}

/// Render an operand as a C expression.
fn value(op: &Operand) -> String {
    match op {
        Operand::Temp(t) => t.to_string(),
        Operand::Const(c) => const_value(c),
    }
}

fn const_value(c: &Const) -> String {
    match c {
        Const::Int(v) => format!("{v}LL"),
        Const::Float(v) => {
            if v.is_nan() {
                "(0.0 / 0.0)".to_string()
            } else if v.is_infinite() {
                if *v > 0.0 { "(1.0 / 0.0)" } else { "(-1.0 / 0.0)" }.to_string()
            } else {
                let text = format!("{v:?}");
                if text.contains('.') || text.contains('e') {
                    text
                } else {
                    format!("{text}.0")
                }
            }
        }
        Const::Bool(true) => "1".to_string(),
        Const::Bool(false) => "0".to_string(),
        Const::Str(v) => format!("patakha_str_lit(\"{}\")", escape_c(v)),
    }
}

fn escape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// The type an operand carries, for picking comparison strategies.
fn operand_ty(func: &Function, op: &Operand) -> Ty {
    match op {
        Operand::Temp(t) => func.temp_tys[t.0 as usize].clone(),
        Operand::Const(c) => c.ty(),
    }
}

fn emit_instr(program: &Program, func: &Function, instr: &Instr, out: &mut String) {
    match instr {
        Instr::Label(label) => {
            let _ = writeln!(out, "{label}:;");
        }
        Instr::Const { dst, value: v } => {
            let _ = writeln!(out, "    {dst} = {};", const_value(v));
        }
        Instr::Copy { dst, src } => {
            let _ = writeln!(out, "    {dst} = {};", value(src));
        }
        Instr::Bin { op, dst, lhs, rhs } => {
            let l = value(lhs);
            let r = value(rhs);
            if operand_ty(func, lhs) == Ty::Str {
                // String equality via strcmp; sema admits only == and !=.
                let test = match op {
                    BinOp::Eq => "==",
                    _ => "!=",
                };
                let _ = writeln!(out, "    {dst} = (strcmp({l}.data, {r}.data) {test} 0);");
            } else {
                let _ = writeln!(out, "    {dst} = ({l} {} {r});", op.symbol());
            }
        }
        Instr::Neg { dst, src } => {
            let _ = writeln!(out, "    {dst} = -({});", value(src));
        }
        Instr::Not { dst, src } => {
            let _ = writeln!(out, "    {dst} = !({});", value(src));
        }
        Instr::Cast { dst, src, from, to } => {
            let src = value(src);
            let expr = match (from, to) {
                (Ty::Int, Ty::Bool) => format!("(({src}) != 0)"),
                (Ty::Float, Ty::Bool) => format!("(({src}) != 0.0)"),
                (_, Ty::Int) => format!("(long long)({src})"),
                (_, Ty::Float) => format!("(double)({src})"),
                (_, _) => format!("({})({src})", c_type(to)),
            };
            let _ = writeln!(out, "    {dst} = {expr};");
        }
        Instr::IndexLoad { dst, base, index } => {
            let _ = writeln!(out, "    {dst} = {base}[{}];", value(index));
        }
        Instr::IndexStore { base, index, value: v } => {
            let _ = writeln!(out, "    {base}[{}] = {};", value(index), value(v));
        }
        Instr::FieldLoad { dst, base, field } => {
            let name = field_name(program, func, *base, *field);
            let _ = writeln!(out, "    {dst} = {base}.{name};");
        }
        Instr::FieldStore { base, field, value: v } => {
            let name = field_name(program, func, *base, *field);
            let _ = writeln!(out, "    {base}.{name} = {};", value(v));
        }
        Instr::Jump { target } => {
            let _ = writeln!(out, "    goto {target};");
        }
        Instr::Branch { cond, then_, else_ } => {
            let _ = writeln!(out, "    if ({}) goto {then_};", value(cond));
            let _ = writeln!(out, "    goto {else_};");
        }
        Instr::Call { dst, func: name, args } => {
            let args: Vec<String> = args.iter().map(|a| value(a)).collect();
            let call = format!("pk_{name}({})", args.join(", "));
            match dst {
                Some(dst) => {
                    let _ = writeln!(out, "    {dst} = {call};");
                }
                None => {
                    let _ = writeln!(out, "    {call};");
                }
            }
        }
        Instr::Ret { value: v } => match v {
            Some(v) if func.is_main => {
                let _ = writeln!(out, "    return (int)({});", value(v));
            }
            Some(v) => {
                let _ = writeln!(out, "    return {};", value(v));
            }
            None => {
                let _ = writeln!(out, "    return;");
            }
        },
        Instr::Print { value: v, ty } => {
            let v = value(v);
            let line = match ty {
                Ty::Int => format!("printf(\"%lld\\n\", {v});"),
                Ty::Float => format!("patakha_print_float({v});"),
                Ty::Bool => format!("printf(\"%s\\n\", ({v}) ? \"sahi\" : \"galat\");"),
                Ty::Str => format!("printf(\"%s\\n\", {v}.data);"),
                other => format!("/* cannot print {other} */"),
            };
            let _ = writeln!(out, "    {line}");
        }
        Instr::Read { dst, ty } => {
            let helper = match ty {
                Ty::Int => "patakha_read_int",
                Ty::Float => "patakha_read_float",
                Ty::Bool => "patakha_read_bool",
                Ty::Str => "patakha_read_str",
                _ => "patakha_read_int",
            };
            let _ = writeln!(out, "    {dst} = {helper}();");
        }
    }
}

/// The source field name behind a field index, recovered from the base
/// temp's record type.
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
