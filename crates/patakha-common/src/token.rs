use serde::Serialize;

use crate::span::Span;

/// A token produced by the Patakha lexer.
///
/// Tokens do not own their text; the lexeme is recovered by slicing the
/// source with the token's span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind and a span.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Every kind of token in the Patakha language.
///
/// Keyword aliases (`while` for `tabtak`, `laao` for `import`, ...) fold to
/// the same variant during lexing, so nothing downstream of the keyword table
/// can tell an alias from its canonical spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Type keywords ──────────────────────────────────────────────────
    /// `bhai` (alias `int`) -- integer type.
    Bhai,
    /// `decimal` (alias `float`) -- float type.
    Decimal,
    /// `bool` -- boolean type.
    Bool,
    /// `text` (alias `string`) -- string type.
    Text,
    /// `khali` (alias `void`) -- void type.
    Khali,

    // ── Statement keywords ─────────────────────────────────────────────
    /// `agar` (alias `if`).
    Agar,
    /// `warna` (alias `else`).
    Warna,
    /// `tabtak` (alias `while`) -- while, and the tail of do-while.
    Tabtak,
    /// `jabtak` (alias `for`) -- counted for.
    Jabtak,
    /// `kar` (alias `do`).
    Kar,
    /// `switch`.
    Switch,
    /// `case`.
    Case,
    /// `default`.
    Default,
    /// `tod` (alias `break`).
    Tod,
    /// `jari` (alias `continue`).
    Jari,
    /// `nikal` (alias `return`).
    Nikal,
    /// `bol` (alias `print`).
    Bol,
    /// `bata` (alias `input`) -- read a value from stdin.
    Bata,
    /// `shuru` (alias `start_bhai`) -- opens the main block.
    Shuru,
    /// `bass` (alias `bas_kar`) -- closes the main block.
    Bass,
    /// `import` (alias `laao`).
    Import,
    /// `struct`.
    Struct,
    /// `kaksha` (alias `class`) -- behaviorally identical to `struct`.
    Kaksha,

    // ── Literals ───────────────────────────────────────────────────────
    /// `sahi` (alias `true`).
    Sahi,
    /// `galat` (alias `false`).
    Galat,
    /// Integer literal, e.g. `42`.
    IntLiteral,
    /// Floating-point literal, e.g. `3.14`, `1e9` -- requires a decimal
    /// point or an exponent.
    FloatLiteral,
    /// String literal, e.g. `"namaste"`.
    StringLiteral,

    // ── Operators ──────────────────────────────────────────────────────
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `!`
    Bang,
    /// `+=`
    PlusEq,
    /// `-=`
    MinusEq,
    /// `*=`
    StarEq,
    /// `/=`
    SlashEq,
    /// `%=`
    PercentEq,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `.`
    Dot,

    // ── Delimiters and punctuation ─────────────────────────────────────
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// Significant newline (optional statement terminator).
    Newline,

    // ── Identifiers and specials ───────────────────────────────────────
    /// Regular identifier, e.g. `sum`, `meri_file`.
    Ident,
    /// Synthesized for invalid input; lexing continues past it.
    Error,
    /// End of input. Always the last token of a stream.
    Eof,
}

impl TokenKind {
    /// Whether this kind is a primitive type keyword.
    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Bhai | TokenKind::Decimal | TokenKind::Bool | TokenKind::Text | TokenKind::Khali
        )
    }

    /// Whether a statement can begin with this kind. Used by the parser for
    /// panic-mode synchronization.
    pub fn starts_statement(self) -> bool {
        self.is_type_keyword()
            || matches!(
                self,
                TokenKind::Agar
                    | TokenKind::Tabtak
                    | TokenKind::Jabtak
                    | TokenKind::Kar
                    | TokenKind::Switch
                    | TokenKind::Tod
                    | TokenKind::Jari
                    | TokenKind::Nikal
                    | TokenKind::Bol
                    | TokenKind::Import
                    | TokenKind::Struct
                    | TokenKind::Kaksha
                    | TokenKind::LBrace
            )
    }

    /// Human-readable name used in diagnostics, e.g. `` `tabtak` `` or
    /// `integer literal`.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Bhai => "`bhai`",
            TokenKind::Decimal => "`decimal`",
            TokenKind::Bool => "`bool`",
            TokenKind::Text => "`text`",
            TokenKind::Khali => "`khali`",
            TokenKind::Agar => "`agar`",
            TokenKind::Warna => "`warna`",
            TokenKind::Tabtak => "`tabtak`",
            TokenKind::Jabtak => "`jabtak`",
            TokenKind::Kar => "`kar`",
            TokenKind::Switch => "`switch`",
            TokenKind::Case => "`case`",
            TokenKind::Default => "`default`",
            TokenKind::Tod => "`tod`",
            TokenKind::Jari => "`jari`",
            TokenKind::Nikal => "`nikal`",
            TokenKind::Bol => "`bol`",
            TokenKind::Bata => "`bata`",
            TokenKind::Shuru => "`shuru`",
            TokenKind::Bass => "`bass`",
            TokenKind::Import => "`import`",
            TokenKind::Struct => "`struct`",
            TokenKind::Kaksha => "`kaksha`",
            TokenKind::Sahi => "`sahi`",
            TokenKind::Galat => "`galat`",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::Eq => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::LtEq => "`<=`",
            TokenKind::GtEq => "`>=`",
            TokenKind::AmpAmp => "`&&`",
            TokenKind::PipePipe => "`||`",
            TokenKind::Bang => "`!`",
            TokenKind::PlusEq => "`+=`",
            TokenKind::MinusEq => "`-=`",
            TokenKind::StarEq => "`*=`",
            TokenKind::SlashEq => "`/=`",
            TokenKind::PercentEq => "`%=`",
            TokenKind::PlusPlus => "`++`",
            TokenKind::MinusMinus => "`--`",
            TokenKind::Dot => "`.`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Newline => "newline",
            TokenKind::Ident => "identifier",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of input",
        }
    }
}

/// Map an identifier to its keyword kind, folding aliases to canonical kinds.
///
/// Returns `None` for plain identifiers.
pub fn keyword_from_str(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "bhai" | "int" => TokenKind::Bhai,
        "decimal" | "float" => TokenKind::Decimal,
        "bool" => TokenKind::Bool,
        "text" | "string" => TokenKind::Text,
        "khali" | "void" => TokenKind::Khali,
        "agar" | "if" => TokenKind::Agar,
        "warna" | "else" => TokenKind::Warna,
        "tabtak" | "while" => TokenKind::Tabtak,
        "jabtak" | "for" => TokenKind::Jabtak,
        "kar" | "do" => TokenKind::Kar,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "tod" | "break" => TokenKind::Tod,
        "jari" | "continue" => TokenKind::Jari,
        "nikal" | "return" => TokenKind::Nikal,
        "bol" | "print" => TokenKind::Bol,
        "bata" | "input" => TokenKind::Bata,
        "shuru" | "start_bhai" => TokenKind::Shuru,
        "bass" | "bas_kar" => TokenKind::Bass,
        "import" | "laao" => TokenKind::Import,
        "struct" => TokenKind::Struct,
        "kaksha" | "class" => TokenKind::Kaksha,
        "sahi" | "true" => TokenKind::Sahi,
        "galat" | "false" => TokenKind::Galat,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_canonical() {
        assert_eq!(keyword_from_str("tabtak"), Some(TokenKind::Tabtak));
        assert_eq!(keyword_from_str("shuru"), Some(TokenKind::Shuru));
        assert_eq!(keyword_from_str("bata"), Some(TokenKind::Bata));
    }

    #[test]
    fn keyword_lookup_alias_folds_to_same_kind() {
        assert_eq!(keyword_from_str("while"), keyword_from_str("tabtak"));
        assert_eq!(keyword_from_str("for"), keyword_from_str("jabtak"));
        assert_eq!(keyword_from_str("do"), keyword_from_str("kar"));
        assert_eq!(keyword_from_str("class"), keyword_from_str("kaksha"));
        assert_eq!(keyword_from_str("void"), keyword_from_str("khali"));
        assert_eq!(keyword_from_str("float"), keyword_from_str("decimal"));
        assert_eq!(keyword_from_str("start_bhai"), keyword_from_str("shuru"));
        assert_eq!(keyword_from_str("bas_kar"), keyword_from_str("bass"));
        assert_eq!(keyword_from_str("laao"), keyword_from_str("import"));
        assert_eq!(keyword_from_str("break"), keyword_from_str("tod"));
        assert_eq!(keyword_from_str("continue"), keyword_from_str("jari"));
        assert_eq!(keyword_from_str("input"), keyword_from_str("bata"));
    }

    #[test]
    fn keyword_lookup_plain_identifier() {
        assert_eq!(keyword_from_str("sum"), None);
        assert_eq!(keyword_from_str("bhaiya"), None);
    }

    #[test]
    fn statement_start_kinds() {
        assert!(TokenKind::Agar.starts_statement());
        assert!(TokenKind::Bhai.starts_statement());
        assert!(TokenKind::Tod.starts_statement());
        assert!(!TokenKind::Plus.starts_statement());
        assert!(!TokenKind::RParen.starts_statement());
    }
}
