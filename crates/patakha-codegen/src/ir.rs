//! The three-address intermediate representation.
//!
//! Each function is a flat instruction list. Temporaries are dense integer
//! ids scoped to their function; a parallel vector records every temp's
//! type, and another keeps the source variable name when the temp holds one
//! (dumps and the stack backend use it). Control flow is expressed with
//! labels plus unconditional and conditional branches; the optimizer groups
//! instructions into basic blocks on top of this list.

use std::fmt;

use patakha_common::Ty;
pub use patakha_parser::ast::BinOp;
use patakha_sema::RecordInfo;

/// An IR virtual register, dense per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Const {
    pub fn ty(&self) -> Ty {
        match self {
            Const::Int(_) => Ty::Int,
            Const::Float(_) => Ty::Float,
            Const::Bool(_) => Ty::Bool,
            Const::Str(_) => Ty::Str,
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int(v) => write!(f, "{v}"),
            Const::Float(v) => write!(f, "{v:?}"),
            Const::Bool(true) => write!(f, "sahi"),
            Const::Bool(false) => write!(f, "galat"),
            Const::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// An instruction operand: a temp or an inline constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Temp(Temp),
    Const(Const),
}

impl Operand {
    pub fn as_temp(&self) -> Option<Temp> {
        match self {
            Operand::Temp(t) => Some(*t),
            Operand::Const(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(t) => write!(f, "{t}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

/// One three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// `dst = value`
    Const { dst: Temp, value: Const },
    /// `dst = src`
    Copy { dst: Temp, src: Operand },
    /// `dst = lhs op rhs`
    Bin {
        op: BinOp,
        dst: Temp,
        lhs: Operand,
        rhs: Operand,
    },
    /// `dst = -src`
    Neg { dst: Temp, src: Operand },
    /// `dst = !src`
    Not { dst: Temp, src: Operand },
    /// `dst = to(src)`
    Cast {
        dst: Temp,
        src: Operand,
        from: Ty,
        to: Ty,
    },
    /// `dst = base[index]`
    IndexLoad {
        dst: Temp,
        base: Temp,
        index: Operand,
    },
    /// `base[index] = value`
    IndexStore {
        base: Temp,
        index: Operand,
        value: Operand,
    },
    /// `dst = base.field` (field is an index into the record layout)
    FieldLoad { dst: Temp, base: Temp, field: u32 },
    /// `base.field = value`
    FieldStore {
        base: Temp,
        field: u32,
        value: Operand,
    },
    /// `jmp target`
    Jump { target: Label },
    /// `br cond ? then_ : else_`
    Branch {
        cond: Operand,
        then_: Label,
        else_: Label,
    },
    /// `dst = func(args...)`; `dst` is absent for khali functions.
    Call {
        dst: Option<Temp>,
        func: String,
        args: Vec<Operand>,
    },
    /// `ret value?`
    Ret { value: Option<Operand> },
    /// A branch target in the instruction stream.
    Label(Label),
    /// `bol value`
    Print { value: Operand, ty: Ty },
    /// `dst = bata()` reading a value of type `ty`.
    Read { dst: Temp, ty: Ty },
}

impl Instr {
    /// The temp this instruction defines, if any.
    pub fn dst(&self) -> Option<Temp> {
        match self {
            Instr::Const { dst, .. }
            | Instr::Copy { dst, .. }
            | Instr::Bin { dst, .. }
            | Instr::Neg { dst, .. }
            | Instr::Not { dst, .. }
            | Instr::Cast { dst, .. }
            | Instr::IndexLoad { dst, .. }
            | Instr::FieldLoad { dst, .. }
            | Instr::Read { dst, .. } => Some(*dst),
            Instr::Call { dst, .. } => *dst,
            _ => None,
        }
    }

    /// Every temp this instruction reads.
    pub fn uses(&self) -> Vec<Temp> {
        let mut out = Vec::new();
        let mut add = |op: &Operand| {
            if let Operand::Temp(t) = op {
                out.push(*t);
            }
        };
        match self {
            Instr::Copy { src, .. } | Instr::Neg { src, .. } | Instr::Not { src, .. } => add(src),
            Instr::Cast { src, .. } => add(src),
            Instr::Bin { lhs, rhs, .. } => {
                add(lhs);
                add(rhs);
            }
            Instr::IndexLoad { base, index, .. } => {
                add(&Operand::Temp(*base));
                add(index);
            }
            Instr::IndexStore { base, index, value } => {
                add(&Operand::Temp(*base));
                add(index);
                add(value);
            }
            Instr::FieldLoad { base, .. } => add(&Operand::Temp(*base)),
            Instr::FieldStore { base, value, .. } => {
                add(&Operand::Temp(*base));
                add(value);
            }
            Instr::Branch { cond, .. } => add(cond),
            Instr::Call { args, .. } => {
                for arg in args {
                    add(arg);
                }
            }
            Instr::Ret { value: Some(value) } => add(value),
            Instr::Print { value, .. } => add(value),
            _ => {}
        }
        out
    }

    /// Rewrite every operand in place.
    pub fn map_operands(&mut self, mut f: impl FnMut(&mut Operand)) {
        match self {
            Instr::Copy { src, .. } | Instr::Neg { src, .. } | Instr::Not { src, .. } => f(src),
            Instr::Cast { src, .. } => f(src),
            Instr::Bin { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Instr::IndexLoad { index, .. } => f(index),
            Instr::IndexStore { index, value, .. } => {
                f(index);
                f(value);
            }
            Instr::FieldStore { value, .. } => f(value),
            Instr::Branch { cond, .. } => f(cond),
            Instr::Call { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Instr::Ret { value: Some(value) } => f(value),
            Instr::Print { value, .. } => f(value),
            _ => {}
        }
    }

    /// Whether removing this instruction could change observable behavior.
    /// Calls, stores, prints, input, returns, and control flow are
    /// side-effecting; everything that merely defines a temp is not.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Instr::IndexStore { .. }
                | Instr::FieldStore { .. }
                | Instr::Jump { .. }
                | Instr::Branch { .. }
                | Instr::Call { .. }
                | Instr::Ret { .. }
                | Instr::Label(_)
                | Instr::Print { .. }
                | Instr::Read { .. }
        )
    }

    /// Whether this instruction ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. } | Instr::Branch { .. } | Instr::Ret { .. }
        )
    }

    /// Whether this instruction may be hoisted by loop-invariant code
    /// motion. Stricter than [`Instr::has_side_effect`]: loads stay put, and
    /// so do `/` and `%`, which can trap on a zero divisor that the loop
    /// body would never have reached.
    pub fn licm_hoistable(&self) -> bool {
        match self {
            Instr::Const { .. }
            | Instr::Copy { .. }
            | Instr::Neg { .. }
            | Instr::Not { .. }
            | Instr::Cast { .. } => true,
            Instr::Bin { op, .. } => !matches!(op, BinOp::Div | BinOp::Mod),
            _ => false,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const { dst, value } => write!(f, "{dst} = {value}"),
            Instr::Copy { dst, src } => write!(f, "{dst} = {src}"),
            Instr::Bin { op, dst, lhs, rhs } => {
                write!(f, "{dst} = {lhs} {} {rhs}", op.symbol())
            }
            Instr::Neg { dst, src } => write!(f, "{dst} = -{src}"),
            Instr::Not { dst, src } => write!(f, "{dst} = !{src}"),
            Instr::Cast { dst, src, to, .. } => write!(f, "{dst} = {to}({src})"),
            Instr::IndexLoad { dst, base, index } => write!(f, "{dst} = {base}[{index}]"),
            Instr::IndexStore { base, index, value } => {
                write!(f, "{base}[{index}] = {value}")
            }
            Instr::FieldLoad { dst, base, field } => write!(f, "{dst} = {base}.{field}"),
            Instr::FieldStore { base, field, value } => {
                write!(f, "{base}.{field} = {value}")
            }
            Instr::Jump { target } => write!(f, "jmp {target}"),
            Instr::Branch { cond, then_, else_ } => {
                write!(f, "br {cond} ? {then_} : {else_}")
            }
            Instr::Call { dst, func, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = call {func}(")?;
                } else {
                    write!(f, "call {func}(")?;
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instr::Ret { value: Some(value) } => write!(f, "ret {value}"),
            Instr::Ret { value: None } => write!(f, "ret"),
            Instr::Label(label) => write!(f, "{label}:"),
            Instr::Print { value, .. } => write!(f, "bol {value}"),
            Instr::Read { dst, ty } => write!(f, "{dst} = bata {ty}"),
        }
    }
}

/// One lowered function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// The first `params.len()` temps are the parameters, in order.
    pub params: Vec<Temp>,
    pub ret: Ty,
    /// Type of every temp, indexed by temp id.
    pub temp_tys: Vec<Ty>,
    /// Source variable name backing a temp, where there is one.
    pub temp_names: Vec<Option<String>>,
    pub instrs: Vec<Instr>,
    /// Label ids are dense per function; this is the next free one.
    pub next_label: u32,
    /// True for the `shuru ... bass` body, emitted as the entry point.
    pub is_main: bool,
}

impl Function {
    pub fn temp_ty(&self, temp: Temp) -> &Ty {
        &self.temp_tys[temp.0 as usize]
    }

    pub fn temp_count(&self) -> usize {
        self.temp_tys.len()
    }
}

/// The whole lowered program: record layouts plus functions, the main body
/// last.
#[derive(Debug, Clone)]
pub struct Program {
    pub records: Vec<RecordInfo>,
    pub functions: Vec<Function>,
}

impl Program {
    pub fn record(&self, name: &str) -> Option<&RecordInfo> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Render a function (and its temps) as text, used by `.raw.ir` and `.ir`.
pub fn dump_function(func: &Function) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let params: Vec<String> = func
        .params
        .iter()
        .map(|t| format!("{t}: {}", func.temp_ty(*t)))
        .collect();
    let head = if func.is_main { "main" } else { &func.name };
    let _ = writeln!(out, "fn {head}({}) -> {}", params.join(", "), func.ret);
    for instr in &func.instrs {
        if matches!(instr, Instr::Label(_)) {
            let _ = writeln!(out, "{instr}");
        } else {
            let _ = writeln!(out, "  {instr}");
        }
    }
    out
}

/// Render the whole program.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for func in &program.functions {
        out.push_str(&dump_function(func));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let instr = Instr::Bin {
            op: BinOp::Add,
            dst: Temp(2),
            lhs: Operand::Temp(Temp(0)),
            rhs: Operand::Const(Const::Int(3)),
        };
        assert_eq!(instr.to_string(), "t2 = t0 + 3");
        assert_eq!(
            Instr::Branch {
                cond: Operand::Temp(Temp(1)),
                then_: Label(0),
                else_: Label(1),
            }
            .to_string(),
            "br t1 ? L0 : L1"
        );
    }

    #[test]
    fn uses_and_dst() {
        let instr = Instr::IndexStore {
            base: Temp(0),
            index: Operand::Temp(Temp(1)),
            value: Operand::Const(Const::Int(9)),
        };
        assert_eq!(instr.dst(), None);
        assert_eq!(instr.uses(), vec![Temp(0), Temp(1)]);
        assert!(instr.has_side_effect());
    }

    #[test]
    fn division_is_not_hoistable() {
        let div = Instr::Bin {
            op: BinOp::Div,
            dst: Temp(0),
            lhs: Operand::Const(Const::Int(1)),
            rhs: Operand::Temp(Temp(1)),
        };
        assert!(!div.licm_hoistable());
        let add = Instr::Bin {
            op: BinOp::Add,
            dst: Temp(0),
            lhs: Operand::Const(Const::Int(1)),
            rhs: Operand::Temp(Temp(1)),
        };
        assert!(add.licm_hoistable());
    }
}
