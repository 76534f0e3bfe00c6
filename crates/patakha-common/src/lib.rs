//! Shared types for the Patakha compiler.
//!
//! Every stage of the pipeline speaks in terms of the types defined here:
//! byte-offset [`span::Span`]s into source text, the [`token::Token`]
//! vocabulary produced by the lexer, and the ordered [`diag::Diagnostics`]
//! sink that all stages append to.

pub mod diag;
pub mod span;
pub mod token;
pub mod ty;

pub use diag::{Diagnostic, Diagnostics, Severity, SourceFile, SourceMap};
pub use span::{FileId, Span};
pub use token::{keyword_from_str, Token, TokenKind};
pub use ty::Ty;
