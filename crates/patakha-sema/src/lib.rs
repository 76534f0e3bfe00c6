//! Semantic analysis for the Patakha compiler.
//!
//! Consumes the parsed AST and the shared diagnostic sink, and produces a
//! typed AST (the tree is annotated in place) plus the public signature
//! registry that code generation reads. Checking is two-pass: function and
//! record signatures are collected first, so declaration order between
//! top-level items does not matter; inside a body, every name must be
//! declared before use.
//!
//! The import loader lives here too: `import "path"` statements are resolved
//! recursively (lex, parse, then merge) before the importer is checked, with
//! an in-progress set for cycle detection. Backends always see one flattened
//! program.

mod check;
mod imports;
mod symbols;

pub use check::{check_program, Analysis};
pub use imports::load_program;
pub use symbols::{render_symbols, FnSig, RecordInfo, Registry, SymbolDump, SymbolKind};

use std::path::Path;

use patakha_common::diag::SourceMap;
use patakha_common::Diagnostics;

/// Front half of the pipeline: load a root file and its imports, parse
/// everything, and semantically check the flattened program.
///
/// Returns `Err` only for an I/O failure on the root file itself; a missing
/// or unreadable *imported* file is an ordinary diagnostic. The returned
/// analysis may still carry error diagnostics in `diags`; callers must check
/// the sink before lowering.
pub fn analyze_file(
    root: &Path,
    map: &mut SourceMap,
    diags: &mut Diagnostics,
) -> Result<Analysis, String> {
    let program = load_program(root, map, diags)?;
    Ok(check_program(program, diags))
}
