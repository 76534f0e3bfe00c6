//! Symbol table: a lexically scoped stack of hash-map frames.
//!
//! The global frame holds function and record signatures; every function
//! body and nested block opens a frame on top. On scope exit the frame is
//! popped, unused-name warnings fire, and only the public [`Registry`]
//! survives into code generation.

use patakha_common::{Span, Ty};
use rustc_hash::FxHashMap;

/// What a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Param,
}

/// One entry in a scope frame.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub ty: Ty,
    pub span: Span,
    pub initialized: bool,
    pub reads: u32,
    pub writes: u32,
}

/// A function signature, kept after analysis for call checking and codegen.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub ret: Ty,
    pub span: Span,
}

/// A record (struct / kaksha) layout: field order is declaration order.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    pub name: String,
    pub fields: Vec<(String, Ty)>,
    pub span: Span,
}

impl RecordInfo {
    /// Index and type of a field, if declared.
    pub fn field(&self, name: &str) -> Option<(usize, &Ty)> {
        self.fields
            .iter()
            .position(|(f, _)| f == name)
            .map(|i| (i, &self.fields[i].1))
    }
}

/// Public signatures surviving semantic analysis: everything the IR builder
/// and backends need to know about names.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub functions: FxHashMap<String, FnSig>,
    pub records: FxHashMap<String, RecordInfo>,
}

impl Registry {
    /// Resolve a declared record type, if `ty` names one.
    pub fn record_of<'a>(&'a self, ty: &Ty) -> Option<&'a RecordInfo> {
        match ty {
            Ty::Record(name) => self.records.get(name),
            _ => None,
        }
    }
}

/// One line of the `.symbols.txt` dump.
#[derive(Debug, Clone)]
pub struct SymbolDump {
    /// Enclosing function name, or `"shuru"` for the main block.
    pub frame: String,
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Ty,
    pub reads: u32,
    pub writes: u32,
}

/// The scope stack used while checking one function body.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<FxHashMap<String, Symbol>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Pop the innermost frame, returning its symbols for warning checks,
    /// in deterministic (name-sorted) order.
    pub fn pop(&mut self) -> Vec<(String, Symbol)> {
        let frame = self.frames.pop().expect("scope stack underflow");
        let mut symbols: Vec<(String, Symbol)> = frame.into_iter().collect();
        symbols.sort_by(|a, b| a.0.cmp(&b.0));
        symbols
    }

    /// Declare a name in the innermost frame. Returns the shadowed outer
    /// symbol's span (for the shadowing warning), or an error if the name is
    /// already declared in this same frame.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<Option<Span>, Span> {
        if let Some(existing) = self.frames.last().expect("scope stack is empty").get(name) {
            return Err(existing.span);
        }
        let shadowed = self.lookup(name).map(|s| s.span);
        self.frames
            .last_mut()
            .expect("scope stack is empty")
            .insert(name.to_string(), symbol);
        Ok(shadowed)
    }

    /// Find a name, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Find a name for mutation (read/write accounting).
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.frames.iter_mut().rev().find_map(|f| f.get_mut(name))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Render the symbol dump collected during checking.
pub fn render_symbols(registry: &Registry, dump: &[SymbolDump]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    out.push_str("globals:\n");
    let mut records: Vec<&RecordInfo> = registry.records.values().collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    for record in records {
        let fields: Vec<String> = record
            .fields
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect();
        let _ = writeln!(out, "  type {} {{ {} }}", record.name, fields.join(", "));
    }
    let mut functions: Vec<&FnSig> = registry.functions.values().collect();
    functions.sort_by(|a, b| a.name.cmp(&b.name));
    for func in functions {
        let params: Vec<String> = func
            .params
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect();
        let _ = writeln!(out, "  fn {} {}({})", func.ret, func.name, params.join(", "));
    }

    let mut frame = "";
    for sym in dump {
        if sym.frame != frame {
            frame = &sym.frame;
            let _ = writeln!(out, "frame {frame}:");
        }
        let kind = match sym.kind {
            SymbolKind::Var => "var",
            SymbolKind::Param => "param",
        };
        let _ = writeln!(
            out,
            "  {kind} {} {}  reads={} writes={}",
            sym.ty, sym.name, sym.reads, sym.writes
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use patakha_common::FileId;

    fn sym(ty: Ty) -> Symbol {
        Symbol {
            kind: SymbolKind::Var,
            ty,
            span: Span::new(FileId(0), 0, 1),
            initialized: true,
            reads: 0,
            writes: 0,
        }
    }

    #[test]
    fn lookup_prefers_inner_frame() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", sym(Ty::Int)).unwrap();
        scopes.push();
        scopes.declare("x", sym(Ty::Float)).unwrap();
        assert_eq!(scopes.lookup("x").unwrap().ty, Ty::Float);
        scopes.pop();
        assert_eq!(scopes.lookup("x").unwrap().ty, Ty::Int);
    }

    #[test]
    fn redeclaration_in_same_frame_is_an_error() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", sym(Ty::Int)).unwrap();
        assert!(scopes.declare("x", sym(Ty::Int)).is_err());
    }

    #[test]
    fn shadowing_reports_outer_span() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", sym(Ty::Int)).unwrap();
        scopes.push();
        let shadowed = scopes.declare("x", sym(Ty::Int)).unwrap();
        assert!(shadowed.is_some());
    }

    #[test]
    fn record_field_lookup() {
        let record = RecordInfo {
            name: "Point".into(),
            fields: vec![("x".into(), Ty::Int), ("y".into(), Ty::Int)],
            span: Span::new(FileId(0), 0, 1),
        };
        assert_eq!(record.field("y"), Some((1, &Ty::Int)));
        assert_eq!(record.field("z"), None);
    }
}
