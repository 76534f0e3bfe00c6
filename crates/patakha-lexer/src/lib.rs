//! Patakha lexer -- tokenizer for the Patakha programming language.
//!
//! Converts source text into a flat `Vec<Token>` terminated by `Eof`.
//! Newlines are preserved as distinct tokens (the parser treats them as
//! optional statement terminators); all other whitespace is skipped.
//! Keyword aliases (`while`, `laao`, `start_bhai`, ...) fold to the same
//! [`TokenKind`] as their canonical spelling during identifier lookup.
//!
//! Lexing never aborts: invalid characters and unterminated strings produce
//! a diagnostic plus a synthesized `Error` token, and scanning continues.

mod cursor;

use cursor::Cursor;
use patakha_common::{keyword_from_str, Diagnostics, FileId, Span, Token, TokenKind};

/// The Patakha lexer. Converts one file's source text into tokens.
pub struct Lexer<'src, 'd> {
    cursor: Cursor<'src>,
    file: FileId,
    diags: &'d mut Diagnostics,
}

/// Tokenize a whole file. The returned vector always ends with an `Eof` token.
pub fn tokenize(source: &str, file: FileId, diags: &mut Diagnostics) -> Vec<Token> {
    let mut lexer = Lexer {
        cursor: Cursor::new(source),
        file,
        diags,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

impl<'src, 'd> Lexer<'src, 'd> {
    fn span(&self, start: u32) -> Span {
        Span::new(self.file, start, self.cursor.pos())
    }

    fn token(&self, kind: TokenKind, start: u32) -> Token {
        Token::new(kind, self.span(start))
    }

    /// Produce the next token, skipping non-newline whitespace and comments.
    fn next_token(&mut self) -> Token {
        loop {
            self.cursor.eat_while(|c| c == ' ' || c == '\t');

            let start = self.cursor.pos();
            let Some(c) = self.cursor.peek() else {
                return self.token(TokenKind::Eof, start);
            };

            // Comments are trivia; loop around after one.
            if c == '/' {
                if self.cursor.peek_second() == Some('/') {
                    self.cursor.eat_while(|c| c != '\n');
                    continue;
                }
                if self.cursor.peek_second() == Some('*') {
                    self.skip_block_comment(start);
                    continue;
                }
            }

            return self.lex_at(c, start);
        }
    }

    fn lex_at(&mut self, c: char, start: u32) -> Token {
        match c {
            '\n' => {
                self.cursor.bump();
                self.token(TokenKind::Newline, start)
            }
            '\r' => {
                // \r\n folds to a single newline token.
                self.cursor.bump();
                self.cursor.bump_if('\n');
                self.token(TokenKind::Newline, start)
            }

            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            '[' => self.single(TokenKind::LBracket, start),
            ']' => self.single(TokenKind::RBracket, start),
            '{' => self.single(TokenKind::LBrace, start),
            '}' => self.single(TokenKind::RBrace, start),
            ',' => self.single(TokenKind::Comma, start),
            ';' => self.single(TokenKind::Semicolon, start),
            '.' => self.single(TokenKind::Dot, start),

            '+' => self.lex_plus(start),
            '-' => self.lex_minus(start),
            '*' => self.lex_with_eq(TokenKind::Star, TokenKind::StarEq, start),
            '/' => self.lex_with_eq(TokenKind::Slash, TokenKind::SlashEq, start),
            '%' => self.lex_with_eq(TokenKind::Percent, TokenKind::PercentEq, start),
            '=' => self.lex_with_eq(TokenKind::Eq, TokenKind::EqEq, start),
            '!' => self.lex_with_eq(TokenKind::Bang, TokenKind::NotEq, start),
            '<' => self.lex_with_eq(TokenKind::Lt, TokenKind::LtEq, start),
            '>' => self.lex_with_eq(TokenKind::Gt, TokenKind::GtEq, start),
            '&' => self.lex_amp(start),
            '|' => self.lex_pipe(start),

            '0'..='9' => self.lex_number(start),
            '"' => self.lex_string(start),
            c if is_ident_start(c) => self.lex_ident(start),

            _ => {
                self.cursor.bump();
                self.diags.error_nag(
                    self.span(start),
                    format!("invalid character {c:?}"),
                    "yeh character yahan nahi chalega",
                );
                self.token(TokenKind::Error, start)
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn single(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.bump();
        self.token(kind, start)
    }

    /// `X` or `X=` (e.g. `*` / `*=`, `<` / `<=`).
    fn lex_with_eq(&mut self, bare: TokenKind, with_eq: TokenKind, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.bump_if('=') {
            self.token(with_eq, start)
        } else {
            self.token(bare, start)
        }
    }

    /// `+`, `+=`, `++`
    fn lex_plus(&mut self, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.bump_if('=') {
            self.token(TokenKind::PlusEq, start)
        } else if self.cursor.bump_if('+') {
            self.token(TokenKind::PlusPlus, start)
        } else {
            self.token(TokenKind::Plus, start)
        }
    }

    /// `-`, `-=`, `--`
    fn lex_minus(&mut self, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.bump_if('=') {
            self.token(TokenKind::MinusEq, start)
        } else if self.cursor.bump_if('-') {
            self.token(TokenKind::MinusMinus, start)
        } else {
            self.token(TokenKind::Minus, start)
        }
    }

    /// `&&`; a lone `&` is invalid.
    fn lex_amp(&mut self, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.bump_if('&') {
            self.token(TokenKind::AmpAmp, start)
        } else {
            self.diags.error(self.span(start), "expected `&&`, found a lone `&`");
            self.token(TokenKind::Error, start)
        }
    }

    /// `||`; a lone `|` is invalid.
    fn lex_pipe(&mut self, start: u32) -> Token {
        self.cursor.bump();
        if self.cursor.bump_if('|') {
            self.token(TokenKind::PipePipe, start)
        } else {
            self.diags.error(self.span(start), "expected `||`, found a lone `|`");
            self.token(TokenKind::Error, start)
        }
    }

    // ── Comments ───────────────────────────────────────────────────────

    /// Skip a `/* ... */` block comment. Non-nesting.
    fn skip_block_comment(&mut self, start: u32) {
        self.cursor.bump();
        self.cursor.bump();
        loop {
            match self.cursor.bump() {
                Some('*') if self.cursor.peek() == Some('/') => {
                    self.cursor.bump();
                    return;
                }
                Some(_) => {}
                None => {
                    self.diags.error(self.span(start), "unterminated block comment");
                    return;
                }
            }
        }
    }

    // ── Literals ───────────────────────────────────────────────────────

    /// Integer or float literal. A float needs a decimal point followed by a
    /// digit, or an exponent.
    fn lex_number(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.bump();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            // Only an exponent with digits makes this a float; `2e` alone is
            // a malformed number.
            let after_e = self.cursor.peek_second();
            let exp_digits = match after_e {
                Some('+' | '-') => true,
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exp_digits {
                is_float = true;
                self.cursor.bump();
                if !self.cursor.bump_if('+') {
                    self.cursor.bump_if('-');
                }
                if !self.cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.diags.error(
                        self.span(start),
                        "malformed number: exponent has no digits",
                    );
                    return self.token(TokenKind::Error, start);
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
            }
        }

        // `123abc` is one malformed token, not a number then an identifier.
        if self.cursor.peek().is_some_and(is_ident_start) {
            self.cursor.eat_while(is_ident_continue);
            self.diags.error(
                self.span(start),
                format!(
                    "malformed number `{}`",
                    self.cursor.slice(start, self.cursor.pos())
                ),
            );
            return self.token(TokenKind::Error, start);
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.token(kind, start)
    }

    /// String literal with `\n`, `\t`, `\\`, `\"` escapes.
    fn lex_string(&mut self, start: u32) -> Token {
        self.cursor.bump();
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    self.diags.error_nag(
                        self.span(start),
                        "unterminated string literal",
                        "string ka quote band karna bhool gaya",
                    );
                    return self.token(TokenKind::Error, start);
                }
                Some('"') => {
                    self.cursor.bump();
                    return self.token(TokenKind::StringLiteral, start);
                }
                Some('\\') => {
                    let esc_start = self.cursor.pos();
                    self.cursor.bump();
                    match self.cursor.bump() {
                        Some('n' | 't' | '\\' | '"') => {}
                        Some(c) => {
                            self.diags.error(
                                Span::new(self.file, esc_start, self.cursor.pos()),
                                format!("invalid escape sequence `\\{c}`"),
                            );
                        }
                        None => {}
                    }
                }
                Some(_) => {
                    self.cursor.bump();
                }
            }
        }
    }

    /// Identifier or keyword (aliases fold via the keyword table).
    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        self.token(kind, start)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Decode the escapes of a string literal lexeme (including its quotes) into
/// the run-time string value. The lexer has already validated the escapes;
/// anything unrecognized passes through unchanged.
pub fn unescape_string(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .unwrap_or(lexeme)
        .strip_suffix('"')
        .unwrap_or(lexeme);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = tokenize(source, FileId(0), &mut diags);
        (tokens, diags)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn spans_cover_lexemes() {
        let (tokens, diags) = lex("bhai x = 42");
        assert!(diags.is_empty());
        let spans: Vec<(u32, u32)> = tokens.iter().map(|t| (t.span.start, t.span.end)).collect();
        assert_eq!(spans, vec![(0, 4), (5, 6), (7, 8), (9, 11), (11, 11)]);
    }

    #[test]
    fn keywords_and_aliases_fold() {
        assert_eq!(kinds("tabtak"), kinds("while"));
        assert_eq!(kinds("laao"), kinds("import"));
        assert_eq!(kinds("start_bhai"), kinds("shuru"));
        assert_eq!(kinds("bas_kar"), kinds("bass"));
        assert_eq!(
            kinds("kar class khali"),
            vec![
                TokenKind::Kar,
                TokenKind::Kaksha,
                TokenKind::Khali,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("+= -= *= /= %= ++ -- == != <= >= && ||"),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn int_vs_float_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::IntLiteral, TokenKind::Eof]);
        assert_eq!(kinds("4.2"), vec![TokenKind::FloatLiteral, TokenKind::Eof]);
        assert_eq!(kinds("1e9"), vec![TokenKind::FloatLiteral, TokenKind::Eof]);
        assert_eq!(kinds("2.5e-3"), vec![TokenKind::FloatLiteral, TokenKind::Eof]);
        // A trailing dot is field access, not a float.
        assert_eq!(
            kinds("3.x"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn malformed_number_is_one_error_token() {
        let (tokens, diags) = lex("123abc");
        assert!(diags.has_errors());
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Error, TokenKind::Eof]
        );
    }

    #[test]
    fn newlines_are_tokens_spaces_are_not() {
        assert_eq!(
            kinds("bol ( 1 )\nbol(2)"),
            vec![
                TokenKind::Bol,
                TokenKind::LParen,
                TokenKind::IntLiteral,
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Bol,
                TokenKind::LParen,
                TokenKind::IntLiteral,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn crlf_is_one_newline() {
        assert_eq!(
            kinds("1\r\n2"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Newline,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // till end of line\n2 /* block\ncomment */ 3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Newline,
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_reports() {
        let (tokens, diags) = lex("1 /* never closed");
        assert!(diags.has_errors());
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::IntLiteral, TokenKind::Eof]
        );
    }

    #[test]
    fn string_literals_and_escapes() {
        let (tokens, diags) = lex(r#""namaste \"duniya\"\n""#);
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(
            unescape_string(r#""namaste \"duniya\"\n""#),
            "namaste \"duniya\"\n"
        );
    }

    #[test]
    fn unterminated_string_recovers() {
        let (tokens, diags) = lex("\"oops\nbol(1)");
        assert!(diags.has_errors());
        // Lexing continued past the bad string.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Bol));
    }

    #[test]
    fn invalid_character_recovers() {
        let (tokens, diags) = lex("bhai @ x");
        assert!(diags.has_errors());
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Bhai,
                TokenKind::Error,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn retokenizing_is_deterministic() {
        let src = "shuru bhai x = 2 + 3 * 4 bol(x) nikal 0 bass";
        let (a, _) = lex(src);
        let (b, _) = lex(src);
        assert_eq!(a, b);
    }
}
