//! The type and scope checker.
//!
//! Two passes: signatures (functions, records) are collected first, then
//! bodies are checked. Expressions are annotated in place; an `Unknown`
//! operand short-circuits further checks on its parents so one mistake does
//! not cascade into a wall of diagnostics.

use patakha_common::{Diagnostics, FileId, Span, Ty};
use patakha_parser::ast::{
    BinOp, Block, Expr, ExprKind, FunctionDecl, Item, LogicalOp, Program, Stmt, StmtKind,
    TypeExpr, TypeExprKind, UnaryOp,
};
use rustc_hash::FxHashSet;

use crate::symbols::{
    FnSig, RecordInfo, Registry, ScopeStack, Symbol, SymbolDump, SymbolKind,
};

/// The result of semantic analysis: the typed AST, the public signature
/// registry, and the data behind `--dump-symbols`.
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub registry: Registry,
    pub symbol_dump: Vec<SymbolDump>,
}

/// Check a flattened program. Errors and warnings go to `diags`; checking
/// continues wherever safe so one run surfaces as much as possible.
pub fn check_program(mut program: Program, diags: &mut Diagnostics) -> Analysis {
    let mut checker = Checker {
        diags,
        registry: Registry::default(),
        scopes: ScopeStack::new(),
        current_ret: Ty::Int,
        loop_depth: 0,
        frame: String::new(),
        symbol_dump: Vec::new(),
    };

    checker.collect_records(&program);
    checker.collect_functions(&program);

    for item in &mut program.items {
        if let Item::Function(func) = item {
            checker.check_function(func);
        }
    }
    match &mut program.main {
        Some(main) => checker.check_main(main),
        None => checker.diags.error_nag(
            Span::new(FileId(0), 0, 0),
            "missing `shuru ... bass` main block",
            "program shuru se shuru hota hai",
        ),
    }

    Analysis {
        program,
        registry: checker.registry,
        symbol_dump: checker.symbol_dump,
    }
}

/// A compile-time constant value, used for case labels and condition
/// warnings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstVal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

struct Checker<'d> {
    diags: &'d mut Diagnostics,
    registry: Registry,
    scopes: ScopeStack,
    current_ret: Ty,
    loop_depth: u32,
    frame: String,
    symbol_dump: Vec<SymbolDump>,
}

impl<'d> Checker<'d> {
    // ── Pass 1: signatures ─────────────────────────────────────────────

    fn collect_records(&mut self, program: &Program) {
        // Names first, so fields may reference records declared later.
        let mut names: FxHashSet<&str> = FxHashSet::default();
        for item in &program.items {
            if let Item::Record(record) = item {
                if !names.insert(record.name.as_str()) {
                    self.diags.error(
                        record.name_span,
                        format!("record type `{}` is already declared", record.name),
                    );
                }
            }
        }

        for item in &program.items {
            let Item::Record(record) = item else { continue };
            if self.registry.records.contains_key(&record.name) {
                continue; // duplicate, reported above
            }
            let mut fields: Vec<(String, Ty)> = Vec::new();
            for field in &record.fields {
                if fields.iter().any(|(name, _)| name == &field.name) {
                    self.diags.error(
                        field.span,
                        format!(
                            "duplicate field `{}` in record `{}`",
                            field.name, record.name
                        ),
                    );
                    continue;
                }
                let ty = match &field.ty.kind {
                    TypeExprKind::Void => {
                        self.diags
                            .error(field.span, "a field cannot have type `khali`");
                        Ty::Unknown
                    }
                    TypeExprKind::Named(name) if !names.contains(name.as_str()) => {
                        self.diags
                            .error(field.ty.span, format!("unknown type `{name}`"));
                        Ty::Unknown
                    }
                    _ => field.ty.to_ty(),
                };
                fields.push((field.name.clone(), ty));
            }
            self.registry.records.insert(
                record.name.clone(),
                RecordInfo {
                    name: record.name.clone(),
                    fields,
                    span: record.name_span,
                },
            );
        }

        self.reject_recursive_records();
    }

    /// A record that contains itself (directly or through other records) has
    /// no finite layout.
    fn reject_recursive_records(&mut self) {
        let names: Vec<String> = {
            let mut names: Vec<String> = self.registry.records.keys().cloned().collect();
            names.sort();
            names
        };
        for name in names {
            let mut trail = vec![name.clone()];
            if self.record_reaches(&name, &name, &mut trail) {
                let span = self.registry.records[&name].span;
                self.diags.error(
                    span,
                    format!("record `{name}` contains itself ({})", trail.join(" -> ")),
                );
                // Break the cycle so later passes terminate.
                if let Some(record) = self.registry.records.get_mut(&name) {
                    for (_, ty) in &mut record.fields {
                        if matches!(ty, Ty::Record(_)) {
                            *ty = Ty::Unknown;
                        }
                    }
                }
            }
        }
    }

    fn record_reaches(&self, target: &str, from: &str, trail: &mut Vec<String>) -> bool {
        let Some(record) = self.registry.records.get(from) else {
            return false;
        };
        for (_, ty) in &record.fields {
            if let Ty::Record(next) = ty {
                if trail.len() > self.registry.records.len() {
                    return false;
                }
                trail.push(next.clone());
                if next == target || self.record_reaches(target, next, trail) {
                    return true;
                }
                trail.pop();
            }
        }
        false
    }

    fn collect_functions(&mut self, program: &Program) {
        for item in &program.items {
            let Item::Function(func) = item else { continue };
            if func.name == "main" {
                self.diags.error_nag(
                    func.name_span,
                    "the function name `main` is reserved; use `shuru ... bass` for the entry point",
                    "entry point ke liye shuru likho",
                );
                continue;
            }
            if self.registry.functions.contains_key(&func.name) {
                self.diags.error(
                    func.name_span,
                    format!("function `{}` is already declared", func.name),
                );
                continue;
            }
            let ret = self.resolve_type(&func.ret, true);
            let mut params: Vec<(String, Ty)> = Vec::new();
            for param in &func.params {
                if params.iter().any(|(name, _)| name == &param.name) {
                    self.diags.error(
                        param.span,
                        format!("duplicate parameter `{}`", param.name),
                    );
                    continue;
                }
                let ty = self.resolve_type(&param.ty, false);
                params.push((param.name.clone(), ty));
            }
            self.registry.functions.insert(
                func.name.clone(),
                FnSig {
                    name: func.name.clone(),
                    params,
                    ret,
                    span: func.name_span,
                },
            );
        }
    }

    /// Resolve a written type. `allow_void` is true only for return types.
    fn resolve_type(&mut self, ty: &TypeExpr, allow_void: bool) -> Ty {
        match &ty.kind {
            TypeExprKind::Void if !allow_void => {
                self.diags
                    .error(ty.span, "`khali` is only valid as a return type");
                Ty::Unknown
            }
            TypeExprKind::Named(name) if !self.registry.records.contains_key(name) => {
                self.diags.error(ty.span, format!("unknown type `{name}`"));
                Ty::Unknown
            }
            _ => ty.to_ty(),
        }
    }

    // ── Pass 2: bodies ─────────────────────────────────────────────────

    fn check_function(&mut self, func: &mut FunctionDecl) {
        let Some(sig) = self.registry.functions.get(&func.name).cloned() else {
            return; // signature collection already failed
        };
        self.current_ret = sig.ret.clone();
        self.frame = func.name.clone();
        self.scopes.push();
        for (i, (name, ty)) in sig.params.iter().enumerate() {
            let span = func.params.get(i).map(|p| p.span).unwrap_or(func.span);
            let symbol = Symbol {
                kind: SymbolKind::Param,
                ty: ty.clone(),
                span,
                initialized: true,
                reads: 0,
                writes: 0,
            };
            if self.scopes.declare(name, symbol).is_err() {
                // duplicate already reported during collection
            }
        }
        self.check_stmts(&mut func.body.stmts);
        self.pop_scope_with_warnings();
    }

    fn check_main(&mut self, main: &mut Block) {
        self.current_ret = Ty::Int;
        self.frame = "shuru".to_string();
        self.scopes.push();
        self.check_stmts(&mut main.stmts);
        self.pop_scope_with_warnings();
    }

    fn check_block(&mut self, block: &mut Block) {
        self.scopes.push();
        self.check_stmts(&mut block.stmts);
        self.pop_scope_with_warnings();
    }

    fn check_stmts(&mut self, stmts: &mut [Stmt]) {
        let mut terminated: Option<&'static str> = None;
        let mut warned_dead = false;
        for stmt in stmts.iter_mut() {
            if let Some(which) = terminated {
                if !warned_dead && !matches!(stmt.kind, StmtKind::Error) {
                    self.diags.warning(
                        stmt.span,
                        format!("unreachable statement after `{which}`"),
                    );
                    warned_dead = true;
                }
            }
            self.check_stmt(stmt);
            match stmt.kind {
                StmtKind::Return(_) => terminated = Some("nikal"),
                StmtKind::Break => terminated = Some("tod"),
                StmtKind::Continue => terminated = Some("jari"),
                _ => {}
            }
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::VarDecl {
                ty,
                name,
                name_span,
                array_len,
                init,
            } => {
                let ty = ty.clone();
                let name = name.clone();
                let name_span = *name_span;
                let array_len = *array_len;
                self.check_var_decl(&ty, &name, name_span, array_len, init.as_mut());
            }
            StmtKind::Assign { target, value } => {
                let target_ty = self.check_lvalue(target);
                if matches!(target_ty, Ty::Array(..)) {
                    self.diags.error(
                        target.span,
                        "arrays cannot be assigned as a whole; assign elements instead",
                    );
                    self.check_expr(value, None);
                } else {
                    let value_ty = self.check_expr(value, Some(&target_ty));
                    self.require_same(&target_ty, &value_ty, value.span, "cannot assign");
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cond);
                self.check_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                // The init declaration is scoped to the loop.
                self.scopes.push();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_condition(cond);
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.loop_depth += 1;
                self.scopes.push();
                self.check_stmts(&mut body.stmts);
                self.pop_scope_with_warnings();
                self.loop_depth -= 1;
                self.pop_scope_with_warnings();
            }
            StmtKind::DoWhile { body, cond } => {
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                self.check_condition(cond);
            }
            StmtKind::Switch {
                disc,
                arms,
                default,
            } => {
                let disc_ty = self.check_expr(disc, None);
                if !disc_ty.is_unknown() && !disc_ty.is_switchable() {
                    self.diags.error(
                        disc.span,
                        format!("cannot switch on a value of type {disc_ty}"),
                    );
                }
                let mut seen: Vec<ConstVal> = Vec::new();
                for arm in arms.iter_mut() {
                    let label_ty = self.check_expr(&mut arm.label, Some(&disc_ty));
                    if !label_ty.is_unknown() && !disc_ty.is_unknown() && label_ty != disc_ty {
                        self.diags.error(
                            arm.label.span,
                            format!(
                                "case label has type {label_ty}, but the switch value has type {disc_ty}"
                            ),
                        );
                    }
                    match const_eval(&arm.label) {
                        Some(value) => {
                            if seen.contains(&value) {
                                self.diags
                                    .error(arm.label.span, "duplicate case label");
                            } else {
                                seen.push(value);
                            }
                        }
                        None => {
                            if !arm.label.contains_error() {
                                self.diags.error(
                                    arm.label.span,
                                    "case label must be a constant expression",
                                );
                            }
                        }
                    }
                    self.check_block(&mut arm.body);
                }
                if let Some(default) = default {
                    self.check_block(default);
                }
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.diags
                        .error(stmt.span, "`tod` is only valid inside a loop");
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.diags
                        .error(stmt.span, "`jari` is only valid inside a loop");
                }
            }
            StmtKind::Return(value) => {
                let expected = self.current_ret.clone();
                match value {
                    Some(value) => {
                        if expected == Ty::Void {
                            self.diags.error(
                                value.span,
                                "a `khali` function cannot return a value",
                            );
                            self.check_expr(value, None);
                        } else {
                            let ty = self.check_expr(value, Some(&expected));
                            self.require_same(&expected, &ty, value.span, "cannot return");
                        }
                    }
                    None => {
                        if expected != Ty::Void && self.frame != "shuru" {
                            self.diags.error(
                                stmt.span,
                                format!("this function must return a value of type {expected}"),
                            );
                        }
                    }
                }
            }
            StmtKind::Print(args) => {
                for arg in args {
                    let ty = self.check_expr(arg, None);
                    if !ty.is_unknown()
                        && !matches!(ty, Ty::Int | Ty::Float | Ty::Bool | Ty::Str)
                    {
                        self.diags.error(
                            arg.span,
                            format!("`bol` cannot print a value of type {ty}"),
                        );
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr, None);
            }
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Error => {}
        }
    }

    fn check_var_decl(
        &mut self,
        ty: &TypeExpr,
        name: &str,
        name_span: Span,
        array_len: Option<u32>,
        init: Option<&mut Expr>,
    ) {
        let base = self.resolve_type(ty, false);
        let declared = match array_len {
            Some(len) => Ty::Array(Box::new(base), len),
            None => base,
        };

        let mut initialized = false;
        if let Some(init) = init {
            if matches!(declared, Ty::Array(..)) {
                self.diags.error(
                    init.span,
                    "array declarations cannot have an initializer; assign elements instead",
                );
                self.check_expr(init, None);
            } else {
                let init_ty = self.check_expr(init, Some(&declared));
                self.require_same(&declared, &init_ty, init.span, "cannot initialize");
            }
            initialized = true;
        }

        let symbol = Symbol {
            kind: SymbolKind::Var,
            ty: declared,
            span: name_span,
            initialized,
            reads: 0,
            writes: 0,
        };
        match self.scopes.declare(name, symbol) {
            Ok(Some(_)) => {
                self.diags.warning(
                    name_span,
                    format!("`{name}` shadows a declaration from an outer scope"),
                );
            }
            Ok(None) => {}
            Err(_) => {
                self.diags.error(
                    name_span,
                    format!("`{name}` is already declared in this scope"),
                );
            }
        }
    }

    /// Conditions must be bool; constant conditions get a warning.
    fn check_condition(&mut self, cond: &mut Expr) {
        let ty = self.check_expr(cond, None);
        if !ty.is_unknown() && ty != Ty::Bool {
            self.diags.error_nag(
                cond.span,
                format!("condition must be bool, found {ty}"),
                "yahan sahi/galat wala sawaal chahiye",
            );
        }
        if let Some(ConstVal::Bool(value)) = const_eval(cond) {
            let which = if value { "true" } else { "false" };
            self.diags
                .warning(cond.span, format!("condition is always {which}"));
        }
    }

    /// Report a mismatch between two known types.
    fn require_same(&mut self, expected: &Ty, found: &Ty, span: Span, verb: &str) {
        if expected.is_unknown() || found.is_unknown() || expected == found {
            return;
        }
        if expected.is_numeric() && found.is_numeric() {
            self.diags.error_nag(
                span,
                format!("{verb} {found} where {expected} is expected; add an explicit cast"),
                "bhai aur decimal apne aap nahi milte",
            );
        } else {
            self.diags.error(
                span,
                format!("{verb} a value of type {found} where {expected} is expected"),
            );
        }
    }

    // ── L-values ───────────────────────────────────────────────────────

    /// Check an assignment target: a name, an indexed element, or a field
    /// access. Returns the target's type.
    fn check_lvalue(&mut self, target: &mut Expr) -> Ty {
        if !target.is_lvalue() {
            if !target.contains_error() {
                self.diags.error(
                    target.span,
                    "assignment target must be a variable, element, or field",
                );
            }
            target.ty = Ty::Unknown;
            return Ty::Unknown;
        }
        let ty = match &mut target.kind {
            ExprKind::Name(name) => {
                let name = name.clone();
                match self.scopes.lookup_mut(&name) {
                    Some(symbol) => {
                        symbol.writes += 1;
                        symbol.initialized = true;
                        symbol.ty.clone()
                    }
                    None => {
                        self.diags
                            .error(target.span, format!("undeclared name `{name}`"));
                        Ty::Unknown
                    }
                }
            }
            // Element and field stores read their base on the way in.
            _ => return self.check_expr(target, None),
        };
        target.ty = ty.clone();
        ty
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// Type an expression in place. `expected` is only a hint: it gives
    /// `bata()` its type and is never used to coerce.
    fn check_expr(&mut self, expr: &mut Expr, expected: Option<&Ty>) -> Ty {
        let ty = self.check_expr_kind(expr, expected);
        expr.ty = ty.clone();
        ty
    }

    fn check_expr_kind(&mut self, expr: &mut Expr, expected: Option<&Ty>) -> Ty {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_) => Ty::Int,
            ExprKind::Float(_) => Ty::Float,
            ExprKind::Bool(_) => Ty::Bool,
            ExprKind::Str(_) => Ty::Str,
            ExprKind::Error => Ty::Unknown,
            ExprKind::Name(name) => {
                let name = name.clone();
                match self.scopes.lookup_mut(&name) {
                    Some(symbol) => {
                        symbol.reads += 1;
                        symbol.ty.clone()
                    }
                    None => {
                        self.diags.error_nag(
                            span,
                            format!("undeclared name `{name}`"),
                            "pehle declare karo, phir use karo",
                        );
                        Ty::Unknown
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lt = self.check_expr(lhs, None);
                let rt = self.check_expr(rhs, None);
                self.check_binary(op, &lt, &rt, lhs, rhs, span)
            }
            ExprKind::Logical { lhs, rhs, .. } => {
                let lt = self.check_expr(lhs, None);
                let rt = self.check_expr(rhs, None);
                for (ty, operand) in [(&lt, &*lhs), (&rt, &*rhs)] {
                    if !ty.is_unknown() && ty != &Ty::Bool {
                        self.diags.error(
                            operand.span,
                            format!("logical operators need bool operands, found {ty}"),
                        );
                    }
                }
                Ty::Bool
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let ty = self.check_expr(operand, None);
                match op {
                    UnaryOp::Neg => {
                        if !ty.is_unknown() && !ty.is_numeric() {
                            self.diags.error(
                                span,
                                format!("unary `-` needs bhai or decimal, found {ty}"),
                            );
                            return Ty::Unknown;
                        }
                        ty
                    }
                    UnaryOp::Not => {
                        if !ty.is_unknown() && ty != Ty::Bool {
                            self.diags
                                .error(span, format!("`!` needs a bool, found {ty}"));
                        }
                        Ty::Bool
                    }
                }
            }
            ExprKind::Cast { to, operand } => {
                let to = to.clone();
                let from = self.check_expr(operand, None);
                if !from.is_unknown()
                    && !matches!(from, Ty::Int | Ty::Float | Ty::Bool)
                {
                    self.diags.error(
                        operand.span,
                        format!("cannot cast a value of type {from} to {to}"),
                    );
                    return Ty::Unknown;
                }
                to
            }
            ExprKind::Call { name, args, name_span } => {
                let name = name.clone();
                let name_span = *name_span;
                let Some(sig) = self.registry.functions.get(&name).cloned() else {
                    self.diags
                        .error(name_span, format!("undeclared function `{name}`"));
                    for arg in args {
                        self.check_expr(arg, None);
                    }
                    return Ty::Unknown;
                };
                if args.len() != sig.params.len() {
                    self.diags.error(
                        span,
                        format!(
                            "`{name}` takes {} argument(s), but {} were given",
                            sig.params.len(),
                            args.len()
                        ),
                    );
                }
                for (i, arg) in args.iter_mut().enumerate() {
                    let param_ty = sig.params.get(i).map(|(_, ty)| ty.clone());
                    let arg_ty = self.check_expr(arg, param_ty.as_ref());
                    if let Some(param_ty) = param_ty {
                        if !arg_ty.is_unknown()
                            && !param_ty.is_unknown()
                            && arg_ty != param_ty
                        {
                            self.diags.error(
                                arg.span,
                                format!(
                                    "argument {} of `{name}` expects {param_ty}, found {arg_ty}",
                                    i + 1
                                ),
                            );
                        }
                    }
                }
                sig.ret
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base, None);
                let index_ty = self.check_expr(index, None);
                if !index_ty.is_unknown() && index_ty != Ty::Int {
                    self.diags.error(
                        index.span,
                        format!("array index must be bhai, found {index_ty}"),
                    );
                }
                match base_ty {
                    Ty::Array(elem, _) => *elem,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.diags.error(
                            base.span,
                            format!("cannot index a value of type {other}"),
                        );
                        Ty::Unknown
                    }
                }
            }
            ExprKind::Field { base, field, field_span } => {
                let field = field.clone();
                let field_span = *field_span;
                let base_ty = self.check_expr(base, None);
                match self.registry.record_of(&base_ty) {
                    Some(record) => match record.field(&field) {
                        Some((_, ty)) => ty.clone(),
                        None => {
                            self.diags.error(
                                field_span,
                                format!("record `{}` has no field `{field}`", record.name),
                            );
                            Ty::Unknown
                        }
                    },
                    None => {
                        if !base_ty.is_unknown() {
                            self.diags.error(
                                base.span,
                                format!("type {base_ty} has no fields"),
                            );
                        }
                        Ty::Unknown
                    }
                }
            }
            ExprKind::Input => match expected {
                Some(ty) if matches!(ty, Ty::Int | Ty::Float | Ty::Bool | Ty::Str) => ty.clone(),
                Some(ty) if ty.is_unknown() => Ty::Unknown,
                Some(ty) => {
                    self.diags
                        .error(span, format!("`bata()` cannot read a value of type {ty}"));
                    Ty::Unknown
                }
                None => {
                    self.diags.error_nag(
                        span,
                        "cannot tell what type `bata()` should read here; use it directly in a declaration or assignment",
                        "bata() ko seedha variable mein daalo",
                    );
                    Ty::Unknown
                }
            },
            ExprKind::IncDec { target, .. } => {
                let ty = self.check_lvalue(target);
                if !ty.is_unknown() && !ty.is_numeric() {
                    self.diags.error(
                        span,
                        format!("increment/decrement needs bhai or decimal, found {ty}"),
                    );
                    return Ty::Unknown;
                }
                // The updated value is also read.
                if let ExprKind::Name(name) = &target.kind {
                    if let Some(symbol) = self.scopes.lookup_mut(name) {
                        symbol.reads += 1;
                    }
                }
                ty
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lt: &Ty,
        rt: &Ty,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Ty {
        if lt.is_unknown() || rt.is_unknown() {
            return Ty::Unknown;
        }
        match op {
            BinOp::Add if *lt == Ty::Str && *rt == Ty::Str => {
                self.diags.error_nag(
                    span,
                    "string concatenation is not supported",
                    "text jodne ka jugaad abhi nahi hai",
                );
                Ty::Unknown
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if lt == rt && lt.is_numeric() {
                    lt.clone()
                } else if lt.is_numeric() && rt.is_numeric() {
                    self.mixed_numeric(op, span);
                    Ty::Unknown
                } else {
                    self.bad_operands(op, lt, rt, span);
                    Ty::Unknown
                }
            }
            BinOp::Mod => {
                if *lt == Ty::Int && *rt == Ty::Int {
                    Ty::Int
                } else {
                    self.diags.error(
                        span,
                        format!("`%` is only defined for bhai operands, found {lt} and {rt}"),
                    );
                    Ty::Unknown
                }
            }
            BinOp::Eq | BinOp::Ne => {
                if lt == rt && lt.is_equatable() {
                    Ty::Bool
                } else if lt.is_numeric() && rt.is_numeric() {
                    self.mixed_numeric(op, span);
                    Ty::Bool
                } else {
                    self.bad_operands(op, lt, rt, span);
                    Ty::Bool
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if lt == rt && lt.is_numeric() {
                    self.warn_mixed_sign(lhs, rhs, span);
                    Ty::Bool
                } else if lt.is_numeric() && rt.is_numeric() {
                    self.mixed_numeric(op, span);
                    Ty::Bool
                } else {
                    self.bad_operands(op, lt, rt, span);
                    Ty::Bool
                }
            }
        }
    }

    fn mixed_numeric(&mut self, op: BinOp, span: Span) {
        self.diags.error_nag(
            span,
            format!(
                "`{}` cannot mix bhai and decimal; add an explicit cast",
                op.symbol()
            ),
            "bhai(x) ya decimal(x) se cast karo",
        );
    }

    fn bad_operands(&mut self, op: BinOp, lt: &Ty, rt: &Ty, span: Span) {
        self.diags.error(
            span,
            format!("`{}` cannot be applied to {lt} and {rt}", op.symbol()),
        );
    }

    /// Warn when a relational comparison mixes a negative constant with an
    /// operand that can never be negative (a non-negative constant or a
    /// bool-to-number cast).
    fn warn_mixed_sign(&mut self, lhs: &Expr, rhs: &Expr, span: Span) {
        let signs = (known_sign(lhs), known_sign(rhs));
        let mixed = matches!(
            signs,
            (Some(Sign::Negative), Some(Sign::NonNegative))
                | (Some(Sign::NonNegative), Some(Sign::Negative))
        );
        if mixed {
            self.diags.warning(
                span,
                "comparison mixes a negative constant with a value that is never negative",
            );
        }
    }

    // ── Scope exit ─────────────────────────────────────────────────────

    fn pop_scope_with_warnings(&mut self) {
        for (name, symbol) in self.scopes.pop() {
            match symbol.kind {
                SymbolKind::Param => {
                    if symbol.reads == 0 {
                        self.diags
                            .warning(symbol.span, format!("unused parameter `{name}`"));
                    }
                }
                SymbolKind::Var => {
                    if symbol.reads == 0 && symbol.writes == 0 {
                        self.diags
                            .warning(symbol.span, format!("unused variable `{name}`"));
                    } else if symbol.reads == 0 {
                        self.diags.warning(
                            symbol.span,
                            format!("variable `{name}` is written but never read"),
                        );
                    }
                }
            }
            self.symbol_dump.push(SymbolDump {
                frame: self.frame.clone(),
                name,
                kind: symbol.kind,
                ty: symbol.ty,
                reads: symbol.reads,
                writes: symbol.writes,
            });
        }
    }
}

// ── Constant evaluation ────────────────────────────────────────────────

/// The static sign of an expression, when it is knowable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Negative,
    NonNegative,
}

fn known_sign(expr: &Expr) -> Option<Sign> {
    if let Some(value) = const_eval(expr) {
        return match value {
            ConstVal::Int(v) => Some(if v < 0 { Sign::Negative } else { Sign::NonNegative }),
            ConstVal::Float(v) => Some(if v < 0.0 { Sign::Negative } else { Sign::NonNegative }),
            _ => None,
        };
    }
    // A bool cast to a number is always 0 or 1.
    if let ExprKind::Cast { operand, .. } = &expr.kind {
        if operand.ty == Ty::Bool {
            return Some(Sign::NonNegative);
        }
    }
    None
}

/// Fold an expression to a constant, when it is one. Pure folding only:
/// anything that could trap (division by zero, overflow) returns `None` and
/// is left for run time.
pub fn const_eval(expr: &Expr) -> Option<ConstVal> {
    match &expr.kind {
        ExprKind::Int(v) => Some(ConstVal::Int(*v)),
        ExprKind::Float(v) => Some(ConstVal::Float(*v)),
        ExprKind::Bool(v) => Some(ConstVal::Bool(*v)),
        ExprKind::Str(v) => Some(ConstVal::Str(v.clone())),
        ExprKind::Unary { op, operand } => {
            let value = const_eval(operand)?;
            match (op, value) {
                (UnaryOp::Neg, ConstVal::Int(v)) => v.checked_neg().map(ConstVal::Int),
                (UnaryOp::Neg, ConstVal::Float(v)) => Some(ConstVal::Float(-v)),
                (UnaryOp::Not, ConstVal::Bool(v)) => Some(ConstVal::Bool(!v)),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = const_eval(lhs)?;
            let r = const_eval(rhs)?;
            fold_binary(*op, l, r)
        }
        ExprKind::Logical { op, lhs, rhs } => {
            let ConstVal::Bool(l) = const_eval(lhs)? else {
                return None;
            };
            // Respect short-circuit: a constant left side may decide alone.
            match (op, l) {
                (LogicalOp::And, false) => Some(ConstVal::Bool(false)),
                (LogicalOp::Or, true) => Some(ConstVal::Bool(true)),
                _ => match const_eval(rhs)? {
                    ConstVal::Bool(r) => Some(ConstVal::Bool(r)),
                    _ => None,
                },
            }
        }
        ExprKind::Cast { to, operand } => {
            let value = const_eval(operand)?;
            fold_cast(to, value)
        }
        _ => None,
    }
}

fn fold_binary(op: BinOp, l: ConstVal, r: ConstVal) -> Option<ConstVal> {
    use ConstVal::{Bool, Float, Int};
    match (op, l, r) {
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(b).map(Int),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int),
        (BinOp::Div, Int(a), Int(b)) => a.checked_div(b).map(Int),
        (BinOp::Mod, Int(a), Int(b)) => a.checked_rem(b).map(Int),
        (BinOp::Add, Float(a), Float(b)) => Some(Float(a + b)),
        (BinOp::Sub, Float(a), Float(b)) => Some(Float(a - b)),
        (BinOp::Mul, Float(a), Float(b)) => Some(Float(a * b)),
        (BinOp::Div, Float(a), Float(b)) => Some(Float(a / b)),
        (BinOp::Eq, a, b) => const_cmp(a, b).map(|ord| Bool(ord == std::cmp::Ordering::Equal)),
        (BinOp::Ne, a, b) => const_cmp(a, b).map(|ord| Bool(ord != std::cmp::Ordering::Equal)),
        (BinOp::Lt, a, b) => const_cmp(a, b).map(|ord| Bool(ord == std::cmp::Ordering::Less)),
        (BinOp::Le, a, b) => const_cmp(a, b).map(|ord| Bool(ord != std::cmp::Ordering::Greater)),
        (BinOp::Gt, a, b) => const_cmp(a, b).map(|ord| Bool(ord == std::cmp::Ordering::Greater)),
        (BinOp::Ge, a, b) => const_cmp(a, b).map(|ord| Bool(ord != std::cmp::Ordering::Less)),
        _ => None,
    }
}

fn const_cmp(l: ConstVal, r: ConstVal) -> Option<std::cmp::Ordering> {
    use ConstVal::{Bool, Float, Int, Str};
    match (l, r) {
        (Int(a), Int(b)) => Some(a.cmp(&b)),
        (Float(a), Float(b)) => a.partial_cmp(&b),
        (Bool(a), Bool(b)) => Some(a.cmp(&b)),
        (Str(a), Str(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

fn fold_cast(to: &Ty, value: ConstVal) -> Option<ConstVal> {
    use ConstVal::{Bool, Float, Int};
    match (to, value) {
        (Ty::Int, Int(v)) => Some(Int(v)),
        (Ty::Int, Float(v)) => Some(Int(v as i64)),
        (Ty::Int, Bool(v)) => Some(Int(v as i64)),
        (Ty::Float, Int(v)) => Some(Float(v as f64)),
        (Ty::Float, Float(v)) => Some(Float(v)),
        (Ty::Float, Bool(v)) => Some(Float(if v { 1.0 } else { 0.0 })),
        (Ty::Bool, Int(v)) => Some(Bool(v != 0)),
        (Ty::Bool, Float(v)) => Some(Bool(v != 0.0)),
        (Ty::Bool, Bool(v)) => Some(Bool(v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patakha_common::FileId;

    fn analyze(source: &str) -> (Analysis, Diagnostics) {
        let mut diags = Diagnostics::new();
        let program = patakha_parser::parse_source(source, FileId(0), &mut diags);
        let analysis = check_program(program, &mut diags);
        (analysis, diags)
    }

    fn errors(source: &str) -> Vec<String> {
        let (_, diags) = analyze(source);
        diags
            .records()
            .iter()
            .filter(|d| d.severity == patakha_common::Severity::Error)
            .map(|d| d.message.clone())
            .collect()
    }

    fn warnings(source: &str) -> Vec<String> {
        let (_, diags) = analyze(source);
        diags
            .records()
            .iter()
            .filter(|d| d.severity == patakha_common::Severity::Warning)
            .map(|d| d.message.clone())
            .collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let (_, diags) = analyze("shuru\nbhai x = 2 + 3\nbol(x)\nnikal 0\nbass");
        assert!(diags.is_empty(), "{:?}", diags.records());
    }

    #[test]
    fn every_expression_gets_a_type() {
        let (analysis, _) = analyze("shuru\nbhai x = 2 + 3\nbol(x)\nbass");
        let main = analysis.program.main.unwrap();
        let StmtKind::VarDecl { init: Some(init), .. } = &main.stmts[0].kind else {
            panic!();
        };
        assert_eq!(init.ty, Ty::Int);
        let ExprKind::Binary { lhs, rhs, .. } = &init.kind else {
            panic!();
        };
        assert_eq!(lhs.ty, Ty::Int);
        assert_eq!(rhs.ty, Ty::Int);
    }

    #[test]
    fn undeclared_name_is_an_error() {
        let errs = errors("shuru\nbol(y)\nbass");
        assert!(errs.iter().any(|e| e.contains("undeclared name `y`")));
    }

    #[test]
    fn declaration_must_precede_use_in_scope() {
        let errs = errors("shuru\nbhai x = x + 1\nbass");
        assert!(errs.iter().any(|e| e.contains("undeclared name `x`")));
    }

    #[test]
    fn functions_are_hoisted() {
        let (_, diags) =
            analyze("shuru\nbol(twice(4))\nbass\nbhai twice(bhai n) {\nnikal n * 2\n}");
        assert!(!diags.has_errors(), "{:?}", diags.records());
    }

    #[test]
    fn mixed_numeric_needs_cast() {
        let errs = errors("shuru\ndecimal d = 1.5 + 2\nbass");
        assert!(errs.iter().any(|e| e.contains("cast")));
    }

    #[test]
    fn mixed_comparison_rejected() {
        let errs = errors("shuru\nbhai x = 1\nagar (x < 2.0) { bol(1) }\nbass");
        assert!(errs.iter().any(|e| e.contains("cast")));
    }

    #[test]
    fn explicit_casts_are_accepted() {
        let (_, diags) =
            analyze("shuru\ndecimal d = decimal(3) / 2.0\nbol(d)\nbass");
        assert!(!diags.has_errors(), "{:?}", diags.records());
    }

    #[test]
    fn string_concatenation_rejected() {
        let errs = errors("shuru\ntext s = \"a\" + \"b\"\nbass");
        assert!(errs
            .iter()
            .any(|e| e.contains("string concatenation is not supported")));
    }

    #[test]
    fn condition_must_be_bool() {
        let errs = errors("shuru\nagar (1) { bol(1) }\nbass");
        assert!(errs.iter().any(|e| e.contains("condition must be bool")));
    }

    #[test]
    fn arity_is_exact() {
        let errs = errors("bhai f(bhai a) {\nnikal a\n}\nshuru\nbol(f(1, 2))\nbass");
        assert!(errs.iter().any(|e| e.contains("takes 1 argument(s)")));
    }

    #[test]
    fn return_type_must_match() {
        let errs = errors("bhai f() {\nnikal sahi\n}\nshuru\nbol(f())\nbass");
        assert!(errs.iter().any(|e| e.contains("cannot return")));
    }

    #[test]
    fn void_function_rejects_value_return() {
        let errs = errors("khali f() {\nnikal 1\n}\nshuru\nf()\nbass");
        assert!(errs
            .iter()
            .any(|e| e.contains("`khali` function cannot return a value")));
    }

    #[test]
    fn assignment_target_must_be_lvalue() {
        let errs = errors("shuru\nbhai x = 1\nx + 1 = 2\nbass");
        assert!(errs
            .iter()
            .any(|e| e.contains("assignment target must be")));
    }

    #[test]
    fn record_fields_checked() {
        let source = "struct Point {\nbhai x\nbhai y\n}\nshuru\nPoint p\np.x = 1\nbol(p.x)\nbass";
        let (_, diags) = analyze(source);
        assert!(!diags.has_errors(), "{:?}", diags.records());

        let errs =
            errors("struct Point {\nbhai x\n}\nshuru\nPoint p\np.z = 1\nbass");
        assert!(errs.iter().any(|e| e.contains("no field `z`")));
    }

    #[test]
    fn duplicate_field_is_an_error() {
        let errs = errors("struct P {\nbhai x\nbhai x\n}\nshuru\nbass");
        assert!(errs.iter().any(|e| e.contains("duplicate field `x`")));
    }

    #[test]
    fn kaksha_behaves_like_struct() {
        let (_, diags) =
            analyze("kaksha Box {\nbhai v\n}\nshuru\nBox b\nb.v = 3\nbol(b.v)\nbass");
        assert!(!diags.has_errors(), "{:?}", diags.records());
    }

    #[test]
    fn recursive_record_rejected() {
        let errs = errors("struct A {\nA inner\n}\nshuru\nbass");
        assert!(errs.iter().any(|e| e.contains("contains itself")));
    }

    #[test]
    fn switch_labels_must_be_constant_and_unique() {
        let errs = errors(
            "shuru\nbhai x = 1\nswitch (x) {\ncase x { bol(1) }\n}\nbass",
        );
        assert!(errs
            .iter()
            .any(|e| e.contains("must be a constant expression")));

        let errs = errors(
            "shuru\nbhai x = 1\nswitch (x) {\ncase 1 { bol(1) }\ncase 1 { bol(2) }\n}\nbass",
        );
        assert!(errs.iter().any(|e| e.contains("duplicate case label")));
    }

    #[test]
    fn switch_label_type_must_match() {
        let errs = errors(
            "shuru\nbhai x = 1\nswitch (x) {\ncase \"a\" { bol(1) }\n}\nbass",
        );
        assert!(errs.iter().any(|e| e.contains("case label has type")));
    }

    #[test]
    fn break_outside_loop_rejected() {
        let errs = errors("shuru\ntod\nbass");
        assert!(errs.iter().any(|e| e.contains("only valid inside a loop")));
    }

    #[test]
    fn bata_takes_type_from_context() {
        let (analysis, diags) = analyze("shuru\nbhai n = bata()\nbol(n)\nbass");
        assert!(!diags.has_errors(), "{:?}", diags.records());
        let main = analysis.program.main.unwrap();
        let StmtKind::VarDecl { init: Some(init), .. } = &main.stmts[0].kind else {
            panic!();
        };
        assert_eq!(init.ty, Ty::Int);

        let errs = errors("shuru\nbhai n = 1 + bata()\nbol(n)\nbass");
        assert!(errs.iter().any(|e| e.contains("bata()")));
    }

    #[test]
    fn warning_set() {
        let warns = warnings(
            "shuru\nbhai unused = 1\nbhai w = 1\nw = 2\nbhai x = 1\n{\nbhai x = 2\nbol(x)\n}\nbol(x)\nnikal 0\nbol(9)\nbass",
        );
        assert!(warns.iter().any(|w| w.contains("unused variable `unused`")));
        assert!(warns.iter().any(|w| w.contains("written but never read")));
        assert!(warns.iter().any(|w| w.contains("shadows")));
        assert!(warns.iter().any(|w| w.contains("unreachable statement")));
    }

    #[test]
    fn unused_parameter_warns() {
        let warns = warnings("bhai f(bhai a, bhai b) {\nnikal a\n}\nshuru\nbol(f(1, 2))\nbass");
        assert!(warns.iter().any(|w| w.contains("unused parameter `b`")));
    }

    #[test]
    fn constant_condition_warns() {
        let warns = warnings("shuru\nagar (1 < 2) { bol(1) }\nbass");
        assert!(warns.iter().any(|w| w.contains("always true")));
        let warns = warnings("shuru\ntabtak (galat) { bol(1) }\nbass");
        assert!(warns.iter().any(|w| w.contains("always false")));
    }

    #[test]
    fn mixed_sign_comparison_warns() {
        let warns = warnings(
            "shuru\nbool b = sahi\nagar (bhai(b) < -1) { bol(1) }\nbass",
        );
        assert!(warns
            .iter()
            .any(|w| w.contains("never negative")));
    }

    #[test]
    fn error_nodes_do_not_cascade() {
        // S4: one syntax error, and sema stays quiet about the error node.
        let (_, diags) = analyze("shuru bhai a = bol(a) nikal 0 bass");
        let semantic_errors: Vec<_> = diags
            .records()
            .iter()
            .filter(|d| {
                d.severity == patakha_common::Severity::Error
                    && d.message.contains("undeclared")
            })
            .collect();
        assert!(semantic_errors.is_empty(), "{semantic_errors:?}");
    }

    #[test]
    fn const_eval_folds() {
        let mut diags = Diagnostics::new();
        let program =
            patakha_parser::parse_source("shuru\nbool b = !(1 + 2 * 3 == 7)\nbass", FileId(0), &mut diags);
        let StmtKind::VarDecl { init: Some(init), .. } = &program.main.unwrap().stmts[0].kind
        else {
            panic!();
        };
        assert_eq!(const_eval(init), Some(ConstVal::Bool(false)));
    }
}
