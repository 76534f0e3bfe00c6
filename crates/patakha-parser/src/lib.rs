//! Patakha parser: hand-written recursive descent producing the AST.
//!
//! Statement terminators are loose: a `;`, a newline, or the end of a block
//! ends a statement, and a statement also ends naturally when the next token
//! cannot extend it (so `bhai x = 2 bol(x)` on one line parses as two
//! statements). Inside `(...)` and `[...]` newlines are insignificant. The
//! one place a literal `;` is mandatory is between the clauses of a
//! `jabtak (init; cond; post)` header.
//!
//! # Error recovery
//!
//! The parser is panic-mode: on a syntax error it reports a diagnostic at
//! the offending token, drops input up to the next synchronization point (a
//! statement-starting keyword, `}`, `bass`, a terminator, or end of input)
//! and resumes. All errors of a run are collected in the shared sink;
//! parsing never stops at the first error. Unparseable regions leave
//! [`ast::StmtKind::Error`] / [`ast::ExprKind::Error`] placeholders that
//! later passes step over.

pub mod ast;
pub mod dump;
pub mod tables;

use patakha_common::{Diagnostics, FileId, Span, Token, TokenKind, Ty};
use patakha_lexer::unescape_string;

use ast::{
    BinOp, Block, CaseArm, Expr, ExprKind, FieldDecl, Fixity, FunctionDecl, ImportDecl, IncDecOp,
    Item, LogicalOp, Param, Program, RecordDecl, RecordKeyword, Stmt, StmtKind, TypeExpr,
    TypeExprKind, UnaryOp,
};

/// Parse a token stream into a [`Program`].
///
/// `tokens` must be the output of [`patakha_lexer::tokenize`] for `source`
/// (in particular it must end with `Eof`).
pub fn parse(source: &str, tokens: &[Token], file: FileId, diags: &mut Diagnostics) -> Program {
    Parser {
        source,
        tokens,
        pos: 0,
        file,
        group_depth: 0,
        diags,
    }
    .parse_program()
}

/// Lex and parse in one step.
pub fn parse_source(source: &str, file: FileId, diags: &mut Diagnostics) -> Program {
    let tokens = patakha_lexer::tokenize(source, file, diags);
    parse(source, &tokens, file, diags)
}

struct Parser<'t, 'd> {
    source: &'t str,
    tokens: &'t [Token],
    pos: usize,
    file: FileId,
    /// `(` / `[` nesting depth. Newlines are skipped while it is non-zero.
    group_depth: u32,
    diags: &'d mut Diagnostics,
}

impl<'t, 'd> Parser<'t, 'd> {
    // ── Token navigation ───────────────────────────────────────────────

    /// The current token. Inside `(...)` / `[...]` groups this transparently
    /// skips newline tokens.
    fn cur(&mut self) -> Token {
        if self.group_depth > 0 {
            while self.tokens[self.pos].kind == TokenKind::Newline {
                self.pos += 1;
            }
        }
        self.tokens[self.pos]
    }

    fn at(&mut self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    /// The token after the current one, with the same newline skipping.
    fn peek_second(&mut self) -> TokenKind {
        let cur_pos = {
            self.cur();
            self.pos
        };
        let mut i = cur_pos + 1;
        while self.tokens[i].kind == TokenKind::Newline && self.group_depth > 0 {
            i += 1;
        }
        self.tokens[i].kind
    }

    /// Consume and return the current token, maintaining group depth.
    fn bump(&mut self) -> Token {
        let token = self.cur();
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => self.group_depth += 1,
            TokenKind::RParen | TokenKind::RBracket => {
                self.group_depth = self.group_depth.saturating_sub(1)
            }
            _ => {}
        }
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or report what was found instead.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            return true;
        }
        let found = self.cur();
        self.diags.error(
            found.span,
            format!("expected {}, found {}", kind.describe(), found.kind.describe()),
        );
        false
    }

    fn text(&self, token: Token) -> &'t str {
        &self.source[token.span.start as usize..token.span.end as usize]
    }

    /// Skip statement terminators (`;` and newlines).
    fn skip_terminators(&mut self) {
        while matches!(
            self.tokens[self.pos].kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.pos += 1;
        }
    }

    /// Panic-mode synchronization: drop tokens until a statement start, a
    /// block boundary, a terminator, or end of input.
    fn sync(&mut self) {
        loop {
            let kind = self.tokens[self.pos].kind;
            match kind {
                TokenKind::Eof | TokenKind::RBrace | TokenKind::Bass | TokenKind::Shuru => return,
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.skip_terminators();
                    return;
                }
                k if k.starts_statement() => return,
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.cur().span;
        self.diags.error(span, message.into());
    }

    // ── Program structure ──────────────────────────────────────────────

    fn parse_program(mut self) -> Program {
        let mut items = Vec::new();
        let mut main = None;

        self.skip_terminators();
        loop {
            match self.cur().kind {
                TokenKind::Eof => break,
                TokenKind::Shuru => {
                    let shuru = self.bump();
                    let block = self.parse_stmts_until(TokenKind::Bass, shuru.span);
                    if main.replace(block).is_some() {
                        self.diags
                            .error(shuru.span, "duplicate `shuru ... bass` main block");
                    }
                }
                TokenKind::Import => {
                    if let Some(import) = self.parse_import() {
                        items.push(Item::Import(import));
                    }
                }
                TokenKind::Struct | TokenKind::Kaksha => {
                    if let Some(record) = self.parse_record() {
                        items.push(Item::Record(record));
                    }
                }
                kind if kind.is_type_keyword() || kind == TokenKind::Ident => {
                    if let Some(func) = self.parse_function() {
                        items.push(Item::Function(func));
                    }
                }
                _ => {
                    let found = self.cur();
                    self.diags.error_nag(
                        found.span,
                        format!(
                            "expected a declaration or `shuru`, found {}",
                            found.kind.describe()
                        ),
                        "top level pe sirf function, struct ya import aata hai",
                    );
                    self.bump();
                    self.sync();
                }
            }
            self.skip_terminators();
        }

        Program { items, main }
    }

    /// `import "path"`.
    fn parse_import(&mut self) -> Option<ImportDecl> {
        let kw = self.bump();
        if !self.at(TokenKind::StringLiteral) {
            self.error_here("expected a string path after `import`");
            self.sync();
            return None;
        }
        let tok = self.bump();
        let path = unescape_string(self.text(tok));
        Some(ImportDecl {
            path,
            span: kw.span.merge(tok.span),
        })
    }

    /// `struct Name { <type> field ... }` / `kaksha Name { ... }`.
    fn parse_record(&mut self) -> Option<RecordDecl> {
        let kw = self.bump();
        let keyword = if kw.kind == TokenKind::Struct {
            RecordKeyword::Struct
        } else {
            RecordKeyword::Kaksha
        };
        if !self.at(TokenKind::Ident) {
            self.error_here("expected a record name");
            self.sync();
            return None;
        }
        let name_tok = self.bump();
        let name = self.text(name_tok).to_string();

        if !self.expect(TokenKind::LBrace) {
            self.sync();
            return None;
        }
        let mut fields = Vec::new();
        self.skip_terminators();
        while !matches!(self.cur().kind, TokenKind::RBrace | TokenKind::Eof) {
            let Some(ty) = self.parse_type_expr() else {
                self.bump();
                self.sync();
                continue;
            };
            if !self.at(TokenKind::Ident) {
                self.error_here("expected a field name");
                self.sync();
                continue;
            }
            let field_tok = self.bump();
            fields.push(FieldDecl {
                span: ty.span.merge(field_tok.span),
                name: self.text(field_tok).to_string(),
                ty,
            });
            self.skip_terminators();
        }
        let close = self.cur();
        self.expect(TokenKind::RBrace);
        Some(RecordDecl {
            keyword,
            name,
            name_span: name_tok.span,
            fields,
            span: kw.span.merge(close.span),
        })
    }

    /// `<ret> name(<params>) { ... }`.
    fn parse_function(&mut self) -> Option<FunctionDecl> {
        let ret = self.parse_type_expr()?;
        if !self.at(TokenKind::Ident) {
            self.error_here("expected a function name");
            self.sync();
            return None;
        }
        let name_tok = self.bump();
        let name = self.text(name_tok).to_string();

        if !self.expect(TokenKind::LParen) {
            self.sync();
            return None;
        }
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let Some(ty) = self.parse_type_expr() else {
                    self.error_here("expected a parameter type");
                    break;
                };
                if !self.at(TokenKind::Ident) {
                    self.error_here("expected a parameter name");
                    break;
                }
                let param_tok = self.bump();
                params.push(Param {
                    span: ty.span.merge(param_tok.span),
                    name: self.text(param_tok).to_string(),
                    ty,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen);
        let body = self.parse_block()?;
        let span = ret.span.merge(body.span);
        Some(FunctionDecl {
            ret,
            name,
            name_span: name_tok.span,
            params,
            body,
            span,
        })
    }

    fn parse_type_expr(&mut self) -> Option<TypeExpr> {
        let token = self.cur();
        let kind = match token.kind {
            TokenKind::Bhai => TypeExprKind::Int,
            TokenKind::Decimal => TypeExprKind::Float,
            TokenKind::Bool => TypeExprKind::Bool,
            TokenKind::Text => TypeExprKind::Str,
            TokenKind::Khali => TypeExprKind::Void,
            TokenKind::Ident => TypeExprKind::Named(self.text(token).to_string()),
            _ => return None,
        };
        self.bump();
        Some(TypeExpr {
            kind,
            span: token.span,
        })
    }

    // ── Blocks and statements ──────────────────────────────────────────

    /// `{ stmts }`.
    fn parse_block(&mut self) -> Option<Block> {
        let open = self.cur();
        if !self.expect(TokenKind::LBrace) {
            self.sync();
            return None;
        }
        let mut block = self.parse_stmts_until(TokenKind::RBrace, open.span);
        block.span = open.span.merge(block.span);
        Some(block)
    }

    /// Parse statements until `close` (or end of input), consuming `close`.
    fn parse_stmts_until(&mut self, close: TokenKind, open_span: Span) -> Block {
        let mut stmts = Vec::new();
        self.skip_terminators();
        while !matches!(self.cur().kind, TokenKind::Eof) && !self.at(close) {
            // A stray `bass` inside `{ ... }` means the brace was never
            // closed; leave it for the main-block parser.
            if self.at(TokenKind::Bass) && close != TokenKind::Bass {
                break;
            }
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                // Recovery made no progress (e.g. a stray `}` in the main
                // block); drop one token rather than stall.
                self.bump();
            }
            self.skip_terminators();
        }
        let end = self.cur().span;
        if !self.eat(close) {
            self.diags.error_nag(
                end,
                format!("expected {} to close this block", close.describe()),
                "block band karna mat bhool",
            );
        }
        Block {
            stmts,
            span: open_span.merge(end),
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        let token = self.cur();
        match token.kind {
            kind if kind.is_type_keyword() => self.parse_var_decl(),
            TokenKind::Ident if self.peek_second() == TokenKind::Ident => self.parse_var_decl(),
            TokenKind::Agar => self.parse_if(),
            TokenKind::Tabtak => self.parse_while(),
            TokenKind::Jabtak => self.parse_for(),
            TokenKind::Kar => self.parse_do_while(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Tod => {
                let tok = self.bump();
                Stmt {
                    kind: StmtKind::Break,
                    span: tok.span,
                }
            }
            TokenKind::Jari => {
                let tok = self.bump();
                Stmt {
                    kind: StmtKind::Continue,
                    span: tok.span,
                }
            }
            TokenKind::Nikal => self.parse_return(),
            TokenKind::Bol => self.parse_print(),
            TokenKind::LBrace => match self.parse_block() {
                Some(block) => Stmt {
                    span: block.span,
                    kind: StmtKind::Block(block),
                },
                None => Stmt {
                    kind: StmtKind::Error,
                    span: token.span,
                },
            },
            TokenKind::Import => {
                self.error_here("`import` is only allowed at the top level of a file");
                // Still parse it so recovery lands cleanly after the path.
                self.parse_import();
                Stmt {
                    kind: StmtKind::Error,
                    span: token.span,
                }
            }
            TokenKind::Shuru => {
                self.diags.error_nag(
                    token.span,
                    "`shuru` cannot be nested",
                    "ek hi shuru kaafi hai bhai",
                );
                self.bump();
                Stmt {
                    kind: StmtKind::Error,
                    span: token.span,
                }
            }
            _ => self.parse_expr_leading_stmt(),
        }
    }

    /// `<type> name ([len])? (= init)?`.
    fn parse_var_decl(&mut self) -> Stmt {
        let ty = self
            .parse_type_expr()
            .expect("caller checked a type starts here");
        if !self.at(TokenKind::Ident) {
            self.error_here("expected a variable name");
            self.sync();
            return Stmt {
                kind: StmtKind::Error,
                span: ty.span,
            };
        }
        let name_tok = self.bump();
        let name = self.text(name_tok).to_string();
        let mut span = ty.span.merge(name_tok.span);

        let mut array_len = None;
        if self.at(TokenKind::LBracket) {
            self.bump();
            if self.at(TokenKind::IntLiteral) {
                let len_tok = self.bump();
                match self.text(len_tok).parse::<u32>() {
                    Ok(len) if len > 0 => array_len = Some(len),
                    _ => self
                        .diags
                        .error(len_tok.span, "array length must be a positive integer"),
                }
            } else {
                self.error_here("expected an integer array length");
            }
            let close = self.cur();
            self.expect(TokenKind::RBracket);
            span = span.merge(close.span);
        }

        let mut init = None;
        if self.eat(TokenKind::Eq) {
            let value = self.parse_expr();
            span = span.merge(value.span);
            init = Some(value);
        }

        Stmt {
            kind: StmtKind::VarDecl {
                ty,
                name,
                name_span: name_tok.span,
                array_len,
                init,
            },
            span,
        }
    }

    /// A statement that begins with an expression: assignment (simple,
    /// compound, or chained), increment/decrement, or a bare expression.
    fn parse_expr_leading_stmt(&mut self) -> Stmt {
        let start = self.cur().span;
        let expr = self.parse_expr();
        if matches!(expr.kind, ExprKind::Error) && !self.at_assign_op() {
            self.sync();
            return Stmt {
                kind: StmtKind::Error,
                span: start,
            };
        }

        match self.cur().kind {
            TokenKind::Eq => self.parse_assign_chain(expr),
            TokenKind::PlusEq => self.parse_compound_assign(expr, BinOp::Add),
            TokenKind::MinusEq => self.parse_compound_assign(expr, BinOp::Sub),
            TokenKind::StarEq => self.parse_compound_assign(expr, BinOp::Mul),
            TokenKind::SlashEq => self.parse_compound_assign(expr, BinOp::Div),
            TokenKind::PercentEq => self.parse_compound_assign(expr, BinOp::Mod),
            _ => {
                let span = expr.span;
                let ty = expr.ty;
                match expr.kind {
                    // `x++` in statement position is plain `x = x + 1`.
                    ExprKind::IncDec { op, target, .. } => {
                        self.desugar_incdec_stmt(*target, op, span)
                    }
                    kind => Stmt {
                        span,
                        kind: StmtKind::Expr(Expr { kind, span, ty }),
                    },
                }
            }
        }
    }

    fn at_assign_op(&mut self) -> bool {
        matches!(
            self.cur().kind,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
        )
    }

    /// `a = b = e` is right-associative: the rightmost assignment happens
    /// first, and each earlier target receives the one after it.
    fn parse_assign_chain(&mut self, first: Expr) -> Stmt {
        let mut targets = vec![first];
        self.bump(); // `=`
        let value = loop {
            let expr = self.parse_expr();
            if self.eat(TokenKind::Eq) {
                targets.push(expr);
            } else {
                break expr;
            }
        };

        let mut stmts = Vec::new();
        let mut rhs = value;
        for target in targets.into_iter().rev() {
            let span = target.span.merge(rhs.span);
            let carried = target.clone();
            stmts.push(Stmt {
                kind: StmtKind::Assign { target, value: rhs },
                span,
            });
            rhs = carried;
        }
        if stmts.len() == 1 {
            stmts.pop().expect("one statement was just pushed")
        } else {
            let span = stmts
                .iter()
                .map(|s| s.span)
                .reduce(Span::merge)
                .expect("chain has at least two statements");
            Stmt {
                kind: StmtKind::Block(Block { stmts, span }),
                span,
            }
        }
    }

    /// `x op= e` expands to `x = x op e`.
    fn parse_compound_assign(&mut self, target: Expr, op: BinOp) -> Stmt {
        self.bump(); // the compound operator
        let rhs = self.parse_expr();
        let span = target.span.merge(rhs.span);
        let value = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(target.clone()),
                rhs: Box::new(rhs),
            },
            span,
        );
        Stmt {
            kind: StmtKind::Assign { target, value },
            span,
        }
    }

    /// Statement-position `x++` / `++x` / `x--` / `--x` all expand to
    /// `x = x (+|-) 1`.
    fn desugar_incdec_stmt(&mut self, target: Expr, op: IncDecOp, span: Span) -> Stmt {
        let bin_op = match op {
            IncDecOp::Inc => BinOp::Add,
            IncDecOp::Dec => BinOp::Sub,
        };
        let one = Expr::new(ExprKind::Int(1), span);
        let value = Expr::new(
            ExprKind::Binary {
                op: bin_op,
                lhs: Box::new(target.clone()),
                rhs: Box::new(one),
            },
            span,
        );
        Stmt {
            kind: StmtKind::Assign { target, value },
            span,
        }
    }

    /// `agar (cond) { ... } [warna { ... } | warna agar ...]`.
    fn parse_if(&mut self) -> Stmt {
        let kw = self.bump();
        let cond = self.parse_paren_expr();
        let then_branch = self.parse_block().unwrap_or(Block {
            stmts: Vec::new(),
            span: kw.span,
        });
        let mut span = kw.span.merge(then_branch.span);

        let mut else_branch = None;
        // A newline may separate `}` from `warna`.
        let saved = self.pos;
        self.skip_terminators();
        if self.at(TokenKind::Warna) {
            self.bump();
            let stmt = if self.at(TokenKind::Agar) {
                self.parse_if()
            } else {
                match self.parse_block() {
                    Some(block) => Stmt {
                        span: block.span,
                        kind: StmtKind::Block(block),
                    },
                    None => Stmt {
                        kind: StmtKind::Error,
                        span: kw.span,
                    },
                }
            };
            span = span.merge(stmt.span);
            else_branch = Some(Box::new(stmt));
        } else {
            self.pos = saved;
        }

        Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            span,
        }
    }

    /// `tabtak (cond) { ... }`.
    fn parse_while(&mut self) -> Stmt {
        let kw = self.bump();
        let cond = self.parse_paren_expr();
        let body = self.parse_block().unwrap_or(Block {
            stmts: Vec::new(),
            span: kw.span,
        });
        let span = kw.span.merge(body.span);
        Stmt {
            kind: StmtKind::While { cond, body },
            span,
        }
    }

    /// `jabtak (init; cond; post) { ... }`. The `;` separators are the one
    /// place a literal semicolon is required.
    fn parse_for(&mut self) -> Stmt {
        let kw = self.bump();
        self.expect(TokenKind::LParen);

        let init = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_for_clause(true)))
        };
        self.expect(TokenKind::Semicolon);

        let cond = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(TokenKind::Semicolon);

        let post = if self.at(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_clause(false)))
        };
        self.expect(TokenKind::RParen);

        let body = self.parse_block().unwrap_or(Block {
            stmts: Vec::new(),
            span: kw.span,
        });
        let span = kw.span.merge(body.span);
        Stmt {
            kind: StmtKind::For {
                init,
                cond,
                post,
                body,
            },
            span,
        }
    }

    /// One clause of a `jabtak` header: a declaration (init position only),
    /// an assignment, or an increment/decrement.
    fn parse_for_clause(&mut self, allow_decl: bool) -> Stmt {
        let kind = self.cur().kind;
        if allow_decl && (kind.is_type_keyword() || (kind == TokenKind::Ident && self.peek_second() == TokenKind::Ident))
        {
            return self.parse_var_decl();
        }
        self.parse_expr_leading_stmt()
    }

    /// `kar { ... } tabtak (cond)`.
    fn parse_do_while(&mut self) -> Stmt {
        let kw = self.bump();
        let body = self.parse_block().unwrap_or(Block {
            stmts: Vec::new(),
            span: kw.span,
        });
        self.skip_terminators();
        self.expect(TokenKind::Tabtak);
        let cond = self.parse_paren_expr();
        let span = kw.span.merge(cond.span);
        Stmt {
            kind: StmtKind::DoWhile { body, cond },
            span,
        }
    }

    /// `switch (disc) { case <const> { ... } ... default { ... } }`.
    fn parse_switch(&mut self) -> Stmt {
        let kw = self.bump();
        let disc = self.parse_paren_expr();
        let mut arms = Vec::new();
        let mut default: Option<Block> = None;
        let mut end = kw.span;

        if self.expect(TokenKind::LBrace) {
            self.skip_terminators();
            while !matches!(self.cur().kind, TokenKind::RBrace | TokenKind::Eof) {
                match self.cur().kind {
                    TokenKind::Case => {
                        let case_kw = self.bump();
                        let label = self.parse_expr();
                        let body = self.parse_block().unwrap_or(Block {
                            stmts: Vec::new(),
                            span: case_kw.span,
                        });
                        arms.push(CaseArm {
                            span: case_kw.span.merge(body.span),
                            label,
                            body,
                        });
                    }
                    TokenKind::Default => {
                        let default_kw = self.bump();
                        let body = self.parse_block().unwrap_or(Block {
                            stmts: Vec::new(),
                            span: default_kw.span,
                        });
                        if default.replace(body).is_some() {
                            self.diags.error(
                                default_kw.span,
                                "duplicate `default` arm; a switch may have at most one",
                            );
                        }
                    }
                    _ => {
                        self.error_here("expected `case` or `default` inside switch");
                        self.bump();
                        self.sync();
                    }
                }
                self.skip_terminators();
            }
            end = self.cur().span;
            self.expect(TokenKind::RBrace);
        }

        Stmt {
            kind: StmtKind::Switch {
                disc,
                arms,
                default,
            },
            span: kw.span.merge(end),
        }
    }

    /// `nikal e?`. The value is absent when the statement ends immediately.
    fn parse_return(&mut self) -> Stmt {
        let kw = self.bump();
        let value = match self.cur().kind {
            TokenKind::Newline
            | TokenKind::Semicolon
            | TokenKind::RBrace
            | TokenKind::Bass
            | TokenKind::Eof => None,
            _ => Some(self.parse_expr()),
        };
        let span = value
            .as_ref()
            .map(|v| kw.span.merge(v.span))
            .unwrap_or(kw.span);
        Stmt {
            kind: StmtKind::Return(value),
            span,
        }
    }

    /// `bol(e, ...)`.
    fn parse_print(&mut self) -> Stmt {
        let kw = self.bump();
        self.expect(TokenKind::LParen);
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.cur();
        self.expect(TokenKind::RParen);
        if args.is_empty() {
            self.diags
                .error(kw.span, "`bol` needs at least one value to print");
        }
        Stmt {
            kind: StmtKind::Print(args),
            span: kw.span.merge(close.span),
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// `( expr )` as used by condition headers.
    fn parse_paren_expr(&mut self) -> Expr {
        if !self.expect(TokenKind::LParen) {
            return Expr::error(self.cur().span);
        }
        let expr = self.parse_expr();
        self.expect(TokenKind::RParen);
        expr
    }

    /// Precedence, tight to loose: unary, multiplicative, additive,
    /// relational, equality, logical-and, logical-or.
    fn parse_expr(&mut self) -> Expr {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut lhs = self.parse_logical_and();
        while self.at(TokenKind::PipePipe) {
            self.bump();
            let rhs = self.parse_logical_and();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut lhs = self.parse_equality();
        while self.at(TokenKind::AmpAmp) {
            self.bump();
            let rhs = self.parse_equality();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_equality(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.cur().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.cur().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.cur().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.cur().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary();
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let token = self.cur();
        match token.kind {
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_unary();
                let span = token.span.merge(operand.span);
                Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                )
            }
            TokenKind::Bang => {
                self.bump();
                let operand = self.parse_unary();
                let span = token.span.merge(operand.span);
                Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                )
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if token.kind == TokenKind::PlusPlus {
                    IncDecOp::Inc
                } else {
                    IncDecOp::Dec
                };
                self.bump();
                let target = self.parse_unary();
                let span = token.span.merge(target.span);
                if !target.is_lvalue() && !target.contains_error() {
                    self.diags
                        .error(span, "increment/decrement needs a variable, element, or field");
                }
                Expr::new(
                    ExprKind::IncDec {
                        op,
                        fixity: Fixity::Pre,
                        target: Box::new(target),
                    },
                    span,
                )
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.cur().kind {
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expr();
                    let close = self.cur();
                    self.expect(TokenKind::RBracket);
                    let span = expr.span.merge(close.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.bump();
                    if !self.at(TokenKind::Ident) {
                        self.error_here("expected a field name after `.`");
                        return Expr::error(expr.span);
                    }
                    let field_tok = self.bump();
                    let span = expr.span.merge(field_tok.span);
                    expr = Expr::new(
                        ExprKind::Field {
                            base: Box::new(expr),
                            field: self.text(field_tok).to_string(),
                            field_span: field_tok.span,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let tok = self.bump();
                    let op = if tok.kind == TokenKind::PlusPlus {
                        IncDecOp::Inc
                    } else {
                        IncDecOp::Dec
                    };
                    let span = expr.span.merge(tok.span);
                    if !expr.is_lvalue() && !expr.contains_error() {
                        self.diags
                            .error(span, "increment/decrement needs a variable, element, or field");
                    }
                    expr = Expr::new(
                        ExprKind::IncDec {
                            op,
                            fixity: Fixity::Post,
                            target: Box::new(expr),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let token = self.cur();
        match token.kind {
            TokenKind::IntLiteral => {
                self.bump();
                match self.text(token).parse::<i64>() {
                    Ok(value) => Expr::new(ExprKind::Int(value), token.span),
                    Err(_) => {
                        self.diags
                            .error(token.span, "integer literal is too large for `bhai`");
                        Expr::error(token.span)
                    }
                }
            }
            TokenKind::FloatLiteral => {
                self.bump();
                match self.text(token).parse::<f64>() {
                    Ok(value) => Expr::new(ExprKind::Float(value), token.span),
                    Err(_) => {
                        self.diags.error(token.span, "malformed float literal");
                        Expr::error(token.span)
                    }
                }
            }
            TokenKind::Sahi => {
                self.bump();
                Expr::new(ExprKind::Bool(true), token.span)
            }
            TokenKind::Galat => {
                self.bump();
                Expr::new(ExprKind::Bool(false), token.span)
            }
            TokenKind::StringLiteral => {
                self.bump();
                Expr::new(
                    ExprKind::Str(unescape_string(self.text(token))),
                    token.span,
                )
            }
            TokenKind::Ident => {
                self.bump();
                if self.at(TokenKind::LParen) {
                    self.parse_call(token)
                } else {
                    Expr::new(ExprKind::Name(self.text(token).to_string()), token.span)
                }
            }
            TokenKind::Bhai | TokenKind::Decimal | TokenKind::Bool => {
                // Cast syntax: the type name used as a one-argument call.
                if self.peek_second() == TokenKind::LParen {
                    let to = match token.kind {
                        TokenKind::Bhai => Ty::Int,
                        TokenKind::Decimal => Ty::Float,
                        _ => Ty::Bool,
                    };
                    self.bump();
                    self.bump(); // `(`
                    let operand = self.parse_expr();
                    let close = self.cur();
                    self.expect(TokenKind::RParen);
                    Expr::new(
                        ExprKind::Cast {
                            to,
                            operand: Box::new(operand),
                        },
                        token.span.merge(close.span),
                    )
                } else {
                    self.unexpected_in_expr(token)
                }
            }
            TokenKind::Text | TokenKind::Khali => {
                if self.peek_second() == TokenKind::LParen {
                    self.diags.error(
                        token.span,
                        format!("cannot cast to {}", token.kind.describe()),
                    );
                    self.bump();
                    self.bump();
                    let _ = self.parse_expr();
                    self.expect(TokenKind::RParen);
                    Expr::error(token.span)
                } else {
                    self.unexpected_in_expr(token)
                }
            }
            TokenKind::Bata => {
                self.bump();
                self.expect(TokenKind::LParen);
                let close = self.cur();
                self.expect(TokenKind::RParen);
                Expr::new(ExprKind::Input, token.span.merge(close.span))
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr();
                self.expect(TokenKind::RParen);
                expr
            }
            TokenKind::Error => {
                // The lexer already reported this token.
                self.bump();
                Expr::error(token.span)
            }
            _ => self.unexpected_in_expr(token),
        }
    }

    fn unexpected_in_expr(&mut self, token: Token) -> Expr {
        self.diags.error(
            token.span,
            format!("expected an expression, found {}", token.kind.describe()),
        );
        // Keep synchronization tokens for the statement-level recovery;
        // swallow anything else so expression loops cannot stall.
        let keep = token.kind.starts_statement()
            || matches!(
                token.kind,
                TokenKind::RBrace
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::Newline
                    | TokenKind::Semicolon
                    | TokenKind::Bass
                    | TokenKind::Eof
                    | TokenKind::Comma
            );
        if !keep {
            self.bump();
        }
        Expr::error(token.span)
    }

    /// `name(args)` where `name` has already been consumed.
    fn parse_call(&mut self, name_tok: Token) -> Expr {
        self.bump(); // `(`
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.cur();
        self.expect(TokenKind::RParen);
        Expr::new(
            ExprKind::Call {
                name: self.text(name_tok).to_string(),
                name_span: name_tok.span,
                args,
            },
            name_tok.span.merge(close.span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_main(source: &str) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        let program = parse_source(source, FileId(0), &mut diags);
        (program, diags)
    }

    fn main_stmts(source: &str) -> Vec<Stmt> {
        let (program, diags) = parse_main(source);
        assert!(
            !diags.has_errors(),
            "unexpected errors: {:?}",
            diags.records()
        );
        program.main.expect("main block").stmts
    }

    #[test]
    fn one_line_program_splits_statements() {
        let stmts = main_stmts("shuru bhai x = 2 + 3 * 4 bol(x) nikal 0 bass");
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::VarDecl { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::Print(_)));
        assert!(matches!(stmts[2].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn precedence_mul_over_add() {
        let stmts = main_stmts("shuru\nbhai x = 2 + 3 * 4\nbass");
        let StmtKind::VarDecl { init: Some(init), .. } = &stmts[0].kind else {
            panic!("expected var decl");
        };
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &init.kind else {
            panic!("expected + at the top: {:?}", init.kind);
        };
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn relational_binds_tighter_than_equality() {
        let stmts = main_stmts("shuru\nbool b = 1 < 2 == sahi\nbass");
        let StmtKind::VarDecl { init: Some(init), .. } = &stmts[0].kind else {
            panic!("expected var decl");
        };
        let ExprKind::Binary { op: BinOp::Eq, lhs, .. } = &init.kind else {
            panic!("expected == at the top: {:?}", init.kind);
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Lt, .. }));
    }

    #[test]
    fn logical_ops_are_dedicated_nodes() {
        let stmts = main_stmts("shuru\nbool b = sahi && galat || sahi\nbass");
        let StmtKind::VarDecl { init: Some(init), .. } = &stmts[0].kind else {
            panic!("expected var decl");
        };
        let ExprKind::Logical { op: LogicalOp::Or, lhs, .. } = &init.kind else {
            panic!("expected || at the top: {:?}", init.kind);
        };
        assert!(matches!(
            lhs.kind,
            ExprKind::Logical { op: LogicalOp::And, .. }
        ));
    }

    #[test]
    fn compound_assign_expands() {
        let stmts = main_stmts("shuru\nbhai x = 1\nx += 2\nbass");
        let StmtKind::Assign { target, value } = &stmts[1].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(target.kind, ExprKind::Name(_)));
        assert!(matches!(
            value.kind,
            ExprKind::Binary { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn statement_incdec_expands_to_assignment() {
        for source in ["shuru\nbhai x = 1\nx++\nbass", "shuru\nbhai x = 1\n++x\nbass"] {
            let stmts = main_stmts(source);
            assert!(
                matches!(stmts[1].kind, StmtKind::Assign { .. }),
                "{source} should desugar to an assignment"
            );
        }
    }

    #[test]
    fn expression_incdec_keeps_fixity() {
        let stmts = main_stmts("shuru\nbhai i = 0\nbhai a = i++\nbhai b = ++i\nbass");
        let StmtKind::VarDecl { init: Some(post), .. } = &stmts[1].kind else {
            panic!();
        };
        let StmtKind::VarDecl { init: Some(pre), .. } = &stmts[2].kind else {
            panic!();
        };
        assert!(matches!(
            post.kind,
            ExprKind::IncDec { fixity: Fixity::Post, .. }
        ));
        assert!(matches!(
            pre.kind,
            ExprKind::IncDec { fixity: Fixity::Pre, .. }
        ));
    }

    #[test]
    fn chained_assignment_is_right_associative() {
        let stmts = main_stmts("shuru\nbhai x = 0\nbhai y = 0\nx = y = 5\nbass");
        let StmtKind::Block(block) = &stmts[2].kind else {
            panic!("expected desugared chain block: {:?}", stmts[2].kind);
        };
        // y = 5 first, then x = y.
        let StmtKind::Assign { target, .. } = &block.stmts[0].kind else {
            panic!();
        };
        assert!(matches!(&target.kind, ExprKind::Name(n) if n == "y"));
        let StmtKind::Assign { target, value } = &block.stmts[1].kind else {
            panic!();
        };
        assert!(matches!(&target.kind, ExprKind::Name(n) if n == "x"));
        assert!(matches!(&value.kind, ExprKind::Name(n) if n == "y"));
    }

    #[test]
    fn for_header_requires_semicolons() {
        let (_, diags) = parse_main("shuru\njabtak (bhai i = 0 i < 5; ++i) { }\nbass");
        assert!(diags.has_errors());
    }

    #[test]
    fn for_header_with_newlines_inside_parens() {
        let stmts = main_stmts("shuru\nbhai sum = 0\njabtak (bhai i = 0;\n i < 5;\n ++i) { sum += i }\nbass");
        assert!(matches!(stmts[1].kind, StmtKind::For { .. }));
    }

    #[test]
    fn do_while_parses() {
        let stmts = main_stmts("shuru\nbhai x = 0\nkar { x += 1 } tabtak (x < 3)\nbass");
        assert!(matches!(stmts[1].kind, StmtKind::DoWhile { .. }));
    }

    #[test]
    fn switch_arms_and_default() {
        let stmts = main_stmts(
            "shuru\nbhai x = 2\nswitch (x) {\ncase 1 { bol(1) }\ncase 2 { bol(2) }\ndefault { bol(0) }\n}\nbass",
        );
        let StmtKind::Switch { arms, default, .. } = &stmts[1].kind else {
            panic!("expected switch");
        };
        assert_eq!(arms.len(), 2);
        assert!(default.is_some());
    }

    #[test]
    fn duplicate_default_is_an_error() {
        let (_, diags) = parse_main(
            "shuru\nswitch (1) {\ndefault { }\ndefault { }\n}\nbass",
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn casts_parse_as_dedicated_nodes() {
        let stmts = main_stmts("shuru\ndecimal d = decimal(3) / 2.0\nbass");
        let StmtKind::VarDecl { init: Some(init), .. } = &stmts[0].kind else {
            panic!();
        };
        let ExprKind::Binary { op: BinOp::Div, lhs, .. } = &init.kind else {
            panic!("expected division: {:?}", init.kind);
        };
        assert!(matches!(lhs.kind, ExprKind::Cast { to: Ty::Float, .. }));
    }

    #[test]
    fn recovery_keeps_rest_of_block() {
        // S4: the bad initializer produces an error but bol/nikal still parse.
        let (program, diags) = parse_main("shuru bhai a = bol(a) nikal 0 bass");
        assert!(diags.has_errors());
        let stmts = program.main.expect("main survives recovery").stmts;
        assert!(stmts.iter().any(|s| matches!(s.kind, StmtKind::Print(_))));
        assert!(stmts
            .iter()
            .any(|s| matches!(s.kind, StmtKind::Return(Some(_)))));
    }

    #[test]
    fn malformed_inputs_always_terminate() {
        for source in [
            "shuru )))) bass",
            "shuru bhai = = 4 bass",
            "{ { { {",
            "shuru agar ( { } bass",
            "jabtak jabtak jabtak",
            "shuru x = bass",
            "))",
        ] {
            let (_, diags) = parse_main(source);
            assert!(
                diags.has_errors() || source.is_empty(),
                "{source:?} should report at least one diagnostic"
            );
        }
    }

    #[test]
    fn imports_only_at_top_level() {
        let (program, diags) = parse_main("import \"a.bhai\"\nshuru\nimport \"b.bhai\"\nbass");
        assert!(diags.has_errors());
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn record_declarations() {
        let (program, diags) =
            parse_main("struct Point {\nbhai x\nbhai y\n}\nkaksha Pair {\nbhai a\n}\nshuru\nbass");
        assert!(!diags.has_errors(), "{:?}", diags.records());
        let records: Vec<&RecordDecl> = program
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Record(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields.len(), 2);
        assert_eq!(records[0].keyword, RecordKeyword::Struct);
        assert_eq!(records[1].keyword, RecordKeyword::Kaksha);
    }

    #[test]
    fn function_declarations() {
        let (program, diags) = parse_main(
            "bhai add(bhai a, bhai b) {\nnikal a + b\n}\nshuru\nbol(add(1, 2))\nbass",
        );
        assert!(!diags.has_errors(), "{:?}", diags.records());
        let Item::Function(func) = &program.items[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name, "add");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.ret.kind, TypeExprKind::Int);
    }

    #[test]
    fn array_declaration_and_indexing() {
        let stmts = main_stmts("shuru\nbhai a[5]\na[0] = 7\nbol(a[0])\nbass");
        let StmtKind::VarDecl { array_len, .. } = &stmts[0].kind else {
            panic!();
        };
        assert_eq!(*array_len, Some(5));
        let StmtKind::Assign { target, .. } = &stmts[1].kind else {
            panic!();
        };
        assert!(matches!(target.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn aliases_parse_like_canonical_keywords() {
        let canonical = main_stmts("shuru\nbhai x = 0\ntabtak (x < 3) { x += 1 }\nbass");
        let aliased = main_stmts("start_bhai\nint x = 0\nwhile (x < 3) { x += 1 }\nbas_kar");
        assert_eq!(canonical.len(), aliased.len());
        assert!(matches!(aliased[1].kind, StmtKind::While { .. }));
    }
}
