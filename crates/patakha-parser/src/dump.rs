//! Textual and Graphviz dumps of the AST (`--dump-ast`, `--dump-ast-dot`).
//!
//! The text form is an indented tree, one node per line. When the tree has
//! been through semantic analysis, expression lines carry a `: type` suffix.

use std::fmt::Write;

use crate::ast::{
    Block, Expr, ExprKind, Fixity, IncDecOp, Item, Program, RecordKeyword, Stmt, StmtKind,
    UnaryOp,
};

/// Render the whole program as an indented tree.
pub fn dump_text(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("program\n");
    for item in &program.items {
        match item {
            Item::Import(import) => {
                let _ = writeln!(out, "  import {:?}", import.path);
            }
            Item::Record(record) => {
                let kw = match record.keyword {
                    RecordKeyword::Struct => "struct",
                    RecordKeyword::Kaksha => "kaksha",
                };
                let _ = writeln!(out, "  {kw} {}", record.name);
                for field in &record.fields {
                    let _ = writeln!(out, "    field {} {}", field.ty.to_ty(), field.name);
                }
            }
            Item::Function(func) => {
                let params: Vec<String> = func
                    .params
                    .iter()
                    .map(|p| format!("{} {}", p.ty.to_ty(), p.name))
                    .collect();
                let _ = writeln!(
                    out,
                    "  fn {} {}({})",
                    func.ret.to_ty(),
                    func.name,
                    params.join(", ")
                );
                dump_block(&mut out, &func.body, 2);
            }
        }
    }
    if let Some(main) = &program.main {
        out.push_str("  main\n");
        dump_block(&mut out, main, 2);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_block(out: &mut String, block: &Block, depth: usize) {
    indent(out, depth);
    out.push_str("block\n");
    for stmt in &block.stmts {
        dump_stmt(out, stmt, depth + 1);
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match &stmt.kind {
        StmtKind::VarDecl {
            ty,
            name,
            array_len,
            init,
            ..
        } => {
            indent(out, depth);
            match array_len {
                Some(len) => {
                    let _ = writeln!(out, "var-decl {}[{len}] {name}", ty.to_ty());
                }
                None => {
                    let _ = writeln!(out, "var-decl {} {name}", ty.to_ty());
                }
            }
            if let Some(init) = init {
                dump_expr(out, init, depth + 1);
            }
        }
        StmtKind::Assign { target, value } => {
            indent(out, depth);
            out.push_str("assign\n");
            dump_expr(out, target, depth + 1);
            dump_expr(out, value, depth + 1);
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            indent(out, depth);
            out.push_str("if\n");
            dump_expr(out, cond, depth + 1);
            dump_block(out, then_branch, depth + 1);
            if let Some(else_branch) = else_branch {
                indent(out, depth);
                out.push_str("else\n");
                dump_stmt(out, else_branch, depth + 1);
            }
        }
        StmtKind::While { cond, body } => {
            indent(out, depth);
            out.push_str("while\n");
            dump_expr(out, cond, depth + 1);
            dump_block(out, body, depth + 1);
        }
        StmtKind::For {
            init,
            cond,
            post,
            body,
        } => {
            indent(out, depth);
            out.push_str("for\n");
            if let Some(init) = init {
                dump_stmt(out, init, depth + 1);
            }
            if let Some(cond) = cond {
                dump_expr(out, cond, depth + 1);
            }
            if let Some(post) = post {
                dump_stmt(out, post, depth + 1);
            }
            dump_block(out, body, depth + 1);
        }
        StmtKind::DoWhile { body, cond } => {
            indent(out, depth);
            out.push_str("do-while\n");
            dump_block(out, body, depth + 1);
            dump_expr(out, cond, depth + 1);
        }
        StmtKind::Switch {
            disc,
            arms,
            default,
        } => {
            indent(out, depth);
            out.push_str("switch\n");
            dump_expr(out, disc, depth + 1);
            for arm in arms {
                indent(out, depth + 1);
                out.push_str("case\n");
                dump_expr(out, &arm.label, depth + 2);
                dump_block(out, &arm.body, depth + 2);
            }
            if let Some(default) = default {
                indent(out, depth + 1);
                out.push_str("default\n");
                dump_block(out, default, depth + 2);
            }
        }
        StmtKind::Break => {
            indent(out, depth);
            out.push_str("break\n");
        }
        StmtKind::Continue => {
            indent(out, depth);
            out.push_str("continue\n");
        }
        StmtKind::Return(value) => {
            indent(out, depth);
            out.push_str("return\n");
            if let Some(value) = value {
                dump_expr(out, value, depth + 1);
            }
        }
        StmtKind::Print(args) => {
            indent(out, depth);
            out.push_str("print\n");
            for arg in args {
                dump_expr(out, arg, depth + 1);
            }
        }
        StmtKind::Expr(expr) => {
            indent(out, depth);
            out.push_str("expr-stmt\n");
            dump_expr(out, expr, depth + 1);
        }
        StmtKind::Block(block) => dump_block(out, block, depth),
        StmtKind::Error => {
            indent(out, depth);
            out.push_str("<error>\n");
        }
    }
}

fn expr_label(expr: &Expr) -> String {
    let head = match &expr.kind {
        ExprKind::Int(v) => format!("int {v}"),
        ExprKind::Float(v) => format!("float {v}"),
        ExprKind::Bool(v) => format!("bool {v}"),
        ExprKind::Str(v) => format!("str {v:?}"),
        ExprKind::Name(name) => format!("name {name}"),
        ExprKind::Binary { op, .. } => format!("binary {}", op.symbol()),
        ExprKind::Logical { op, .. } => format!("logical {}", op.symbol()),
        ExprKind::Unary { op: UnaryOp::Neg, .. } => "neg".to_string(),
        ExprKind::Unary { op: UnaryOp::Not, .. } => "not".to_string(),
        ExprKind::Cast { to, .. } => format!("cast {to}"),
        ExprKind::Call { name, .. } => format!("call {name}"),
        ExprKind::Index { .. } => "index".to_string(),
        ExprKind::Field { field, .. } => format!("field {field}"),
        ExprKind::Input => "input".to_string(),
        ExprKind::IncDec { op, fixity, .. } => {
            let op = match op {
                IncDecOp::Inc => "inc",
                IncDecOp::Dec => "dec",
            };
            let fixity = match fixity {
                Fixity::Pre => "pre",
                Fixity::Post => "post",
            };
            format!("{fixity}-{op}")
        }
        ExprKind::Error => "<error>".to_string(),
    };
    if expr.ty.is_unknown() {
        head
    } else {
        format!("{head} : {}", expr.ty)
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    indent(out, depth);
    out.push_str(&expr_label(expr));
    out.push('\n');
    match &expr.kind {
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
            dump_expr(out, lhs, depth + 1);
            dump_expr(out, rhs, depth + 1);
        }
        ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
            dump_expr(out, operand, depth + 1);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                dump_expr(out, arg, depth + 1);
            }
        }
        ExprKind::Index { base, index } => {
            dump_expr(out, base, depth + 1);
            dump_expr(out, index, depth + 1);
        }
        ExprKind::Field { base, .. } => dump_expr(out, base, depth + 1),
        ExprKind::IncDec { target, .. } => dump_expr(out, target, depth + 1),
        _ => {}
    }
}

/// Render the program as a Graphviz digraph.
pub fn dump_dot(program: &Program) -> String {
    let mut dot = DotWriter::new();
    let root = dot.node("program");
    for item in &program.items {
        match item {
            Item::Import(import) => {
                let n = dot.node(&format!("import {:?}", import.path));
                dot.edge(root, n);
            }
            Item::Record(record) => {
                let n = dot.node(&format!("record {}", record.name));
                dot.edge(root, n);
                for field in &record.fields {
                    let f = dot.node(&format!("{} {}", field.ty.to_ty(), field.name));
                    dot.edge(n, f);
                }
            }
            Item::Function(func) => {
                let n = dot.node(&format!("fn {}", func.name));
                dot.edge(root, n);
                let b = dot.block(&func.body);
                dot.edge(n, b);
            }
        }
    }
    if let Some(main) = &program.main {
        let n = dot.node("main");
        dot.edge(root, n);
        let b = dot.block(main);
        dot.edge(n, b);
    }
    dot.finish()
}

struct DotWriter {
    body: String,
    next: usize,
}

impl DotWriter {
    fn new() -> Self {
        Self {
            body: String::new(),
            next: 0,
        }
    }

    fn node(&mut self, label: &str) -> usize {
        let id = self.next;
        self.next += 1;
        let escaped = label.replace('\\', "\\\\").replace('"', "\\\"");
        let _ = writeln!(self.body, "  n{id} [label=\"{escaped}\"];");
        id
    }

    fn edge(&mut self, from: usize, to: usize) {
        let _ = writeln!(self.body, "  n{from} -> n{to};");
    }

    fn block(&mut self, block: &Block) -> usize {
        let id = self.node("block");
        for stmt in &block.stmts {
            let s = self.stmt(stmt);
            self.edge(id, s);
        }
        id
    }

    fn stmt(&mut self, stmt: &Stmt) -> usize {
        match &stmt.kind {
            StmtKind::VarDecl {
                ty, name, init, ..
            } => {
                let id = self.node(&format!("var-decl {} {name}", ty.to_ty()));
                if let Some(init) = init {
                    let e = self.expr(init);
                    self.edge(id, e);
                }
                id
            }
            StmtKind::Assign { target, value } => {
                let id = self.node("assign");
                let t = self.expr(target);
                let v = self.expr(value);
                self.edge(id, t);
                self.edge(id, v);
                id
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let id = self.node("if");
                let c = self.expr(cond);
                self.edge(id, c);
                let t = self.block(then_branch);
                self.edge(id, t);
                if let Some(else_branch) = else_branch {
                    let e = self.stmt(else_branch);
                    self.edge(id, e);
                }
                id
            }
            StmtKind::While { cond, body } => {
                let id = self.node("while");
                let c = self.expr(cond);
                let b = self.block(body);
                self.edge(id, c);
                self.edge(id, b);
                id
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                let id = self.node("for");
                if let Some(init) = init {
                    let n = self.stmt(init);
                    self.edge(id, n);
                }
                if let Some(cond) = cond {
                    let n = self.expr(cond);
                    self.edge(id, n);
                }
                if let Some(post) = post {
                    let n = self.stmt(post);
                    self.edge(id, n);
                }
                let b = self.block(body);
                self.edge(id, b);
                id
            }
            StmtKind::DoWhile { body, cond } => {
                let id = self.node("do-while");
                let b = self.block(body);
                let c = self.expr(cond);
                self.edge(id, b);
                self.edge(id, c);
                id
            }
            StmtKind::Switch {
                disc,
                arms,
                default,
            } => {
                let id = self.node("switch");
                let d = self.expr(disc);
                self.edge(id, d);
                for arm in arms {
                    let a = self.node("case");
                    self.edge(id, a);
                    let l = self.expr(&arm.label);
                    self.edge(a, l);
                    let b = self.block(&arm.body);
                    self.edge(a, b);
                }
                if let Some(default) = default {
                    let a = self.node("default");
                    self.edge(id, a);
                    let b = self.block(default);
                    self.edge(a, b);
                }
                id
            }
            StmtKind::Break => self.node("break"),
            StmtKind::Continue => self.node("continue"),
            StmtKind::Return(value) => {
                let id = self.node("return");
                if let Some(value) = value {
                    let v = self.expr(value);
                    self.edge(id, v);
                }
                id
            }
            StmtKind::Print(args) => {
                let id = self.node("print");
                for arg in args {
                    let a = self.expr(arg);
                    self.edge(id, a);
                }
                id
            }
            StmtKind::Expr(expr) => {
                let id = self.node("expr-stmt");
                let e = self.expr(expr);
                self.edge(id, e);
                id
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::Error => self.node("<error>"),
        }
    }

    fn expr(&mut self, expr: &Expr) -> usize {
        let id = self.node(&expr_label(expr));
        match &expr.kind {
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                let l = self.expr(lhs);
                let r = self.expr(rhs);
                self.edge(id, l);
                self.edge(id, r);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                let o = self.expr(operand);
                self.edge(id, o);
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    let a = self.expr(arg);
                    self.edge(id, a);
                }
            }
            ExprKind::Index { base, index } => {
                let b = self.expr(base);
                let i = self.expr(index);
                self.edge(id, b);
                self.edge(id, i);
            }
            ExprKind::Field { base, .. } => {
                let b = self.expr(base);
                self.edge(id, b);
            }
            ExprKind::IncDec { target, .. } => {
                let t = self.expr(target);
                self.edge(id, t);
            }
            _ => {}
        }
        id
    }

    fn finish(self) -> String {
        format!("digraph ast {{\n  node [shape=box, fontname=\"monospace\"];\n{}}}\n", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patakha_common::{Diagnostics, FileId};

    #[test]
    fn text_dump_is_indented_tree() {
        let mut diags = Diagnostics::new();
        let program =
            crate::parse_source("shuru\nbhai x = 1 + 2\nbol(x)\nbass", FileId(0), &mut diags);
        let text = dump_text(&program);
        assert!(text.starts_with("program\n  main\n"));
        assert!(text.contains("var-decl bhai x"));
        assert!(text.contains("binary +"));
        assert!(text.contains("print"));
    }

    #[test]
    fn dot_dump_is_a_digraph() {
        let mut diags = Diagnostics::new();
        let program = crate::parse_source("shuru\nbol(1)\nbass", FileId(0), &mut diags);
        let dot = dump_dot(&program);
        assert!(dot.starts_with("digraph ast {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("->"));
        assert!(dot.contains("print"));
    }
}
