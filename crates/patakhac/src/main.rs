//! The Patakha compiler CLI.
//!
//! `patakhac <source.bhai>` runs the full pipeline: lex, parse (with
//! recovery), semantic analysis (with import resolution), IR lowering, the
//! optimizer, and one of the two backends. Artifacts are written next to
//! the source file. `patakhac lint <source>` stops after the front end and
//! reports diagnostics only.
//!
//! Exit codes: 0 on success, 1 when error diagnostics were reported, 2 for
//! usage errors (clap's default), 3 for I/O failures including a missing
//! or failing C compiler.

use std::path::{Path, PathBuf};
use std::process::{self, Command};

use clap::{Parser, Subcommand, ValueEnum};

use patakha_common::diag::SourceMap;
use patakha_common::{Diagnostics, Severity};

#[derive(Parser)]
#[command(name = "patakhac", version, about = "The Patakha compiler")]
struct Cli {
    /// Source file to compile (`.bhai`)
    source: Option<PathBuf>,

    /// Code generator for the final artifact
    #[arg(long, value_enum, default_value = "c")]
    backend: Backend,

    /// Invoke the system C compiler on the emitted C to produce an executable
    #[arg(long)]
    gcc: bool,

    /// Write collected warnings to `<source>.warnings.txt`
    #[arg(long)]
    emit_warnings: bool,

    /// Write the token stream to `<source>.tokens.txt`
    #[arg(long)]
    emit_tokens: bool,

    /// Write the unoptimized IR to `<source>.raw.ir`
    #[arg(long)]
    emit_raw_ir: bool,

    /// Write the optimized IR to `<source>.ir`
    #[arg(long)]
    emit_ir: bool,

    /// Write stack-machine assembly to `<source>.stk` even when the backend is C
    #[arg(long)]
    emit_stack: bool,

    /// Write the AST as an indented tree to `<source>.ast.txt`
    #[arg(long)]
    dump_ast: bool,

    /// Write the AST as Graphviz to `<source>.ast.dot`
    #[arg(long)]
    dump_ast_dot: bool,

    /// Write the symbol table to `<source>.symbols.txt`
    #[arg(long)]
    dump_symbols: bool,

    /// Write the per-function CFGs to `<source>.cfg.txt`
    #[arg(long)]
    dump_cfg: bool,

    /// Write the per-function CFGs as Graphviz to `<source>.cfg.dot`
    #[arg(long)]
    dump_cfg_dot: bool,

    /// Print the LL(1) tables for the core grammar to stdout
    #[arg(long)]
    dump_ll1: bool,

    /// Print the SLR tables for the core grammar to stdout
    #[arg(long)]
    dump_slr: bool,

    /// Render diagnostics as labeled source reports instead of plain lines
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    C,
    Stack,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the front end only and report diagnostics
    Lint {
        /// Source file to lint
        source: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match &cli.command {
        Some(Commands::Lint { source, strict }) => lint(source, *strict, cli.pretty),
        None => match cli.source.clone() {
            Some(source) => compile(&source, &cli),
            None => {
                eprintln!("error: no source file given (try `patakhac --help`)");
                2
            }
        },
    };
    process::exit(code);
}

/// Run the full pipeline for one source file.
fn compile(source: &Path, cli: &Cli) -> i32 {
    if cli.dump_ll1 {
        print!("{}", patakha_parser::tables::dump_ll1());
    }
    if cli.dump_slr {
        print!("{}", patakha_parser::tables::dump_slr());
    }

    let mut map = SourceMap::new();
    let mut diags = Diagnostics::new();

    // Front end: lex + parse + imports + semantic analysis.
    let analysis = match patakha_sema::analyze_file(source, &mut map, &mut diags) {
        Ok(analysis) => analysis,
        Err(message) => {
            eprintln!("error: {message}");
            return 3;
        }
    };

    if cli.emit_tokens {
        let text = render_tokens(&map);
        if let Err(code) = write_artifact(source, "tokens.txt", &text) {
            return code;
        }
    }
    if cli.dump_ast {
        let text = patakha_parser::dump::dump_text(&analysis.program);
        if let Err(code) = write_artifact(source, "ast.txt", &text) {
            return code;
        }
    }
    if cli.dump_ast_dot {
        let text = patakha_parser::dump::dump_dot(&analysis.program);
        if let Err(code) = write_artifact(source, "ast.dot", &text) {
            return code;
        }
    }
    if cli.dump_symbols {
        let text = patakha_sema::render_symbols(&analysis.registry, &analysis.symbol_dump);
        if let Err(code) = write_artifact(source, "symbols.txt", &text) {
            return code;
        }
    }
    if cli.emit_warnings {
        let warnings: String = map
            .render_all(&diags)
            .lines()
            .filter(|l| l.contains(": warning: "))
            .map(|l| format!("{l}\n"))
            .collect();
        if let Err(code) = write_artifact(source, "warnings.txt", &warnings) {
            return code;
        }
    }

    // The pipeline moves past a stage boundary only with zero errors;
    // warnings never stop it.
    if diags.has_errors() {
        report(&map, &diags, cli.pretty);
        return 1;
    }

    // Middle end.
    let mut program = patakha_codegen::lower_program(&analysis);
    if cli.emit_raw_ir {
        let text = patakha_codegen::dump_program(&program);
        if let Err(code) = write_artifact(source, "raw.ir", &text) {
            return code;
        }
    }
    patakha_codegen::optimize_program(&mut program);
    if cli.emit_ir {
        let text = patakha_codegen::dump_program(&program);
        if let Err(code) = write_artifact(source, "ir", &text) {
            return code;
        }
    }
    if cli.dump_cfg || cli.dump_cfg_dot {
        let mut text = String::new();
        let mut dot = String::new();
        for func in &program.functions {
            let cfg = patakha_codegen::Cfg::build(func);
            text.push_str(&patakha_codegen::dump_cfg(&func.name, &cfg));
            dot.push_str(&patakha_codegen::dump_cfg_dot(&func.name, &cfg));
        }
        if cli.dump_cfg {
            if let Err(code) = write_artifact(source, "cfg.txt", &text) {
                return code;
            }
        }
        if cli.dump_cfg_dot {
            if let Err(code) = write_artifact(source, "cfg.dot", &dot) {
                return code;
            }
        }
    }

    // Backends.
    if cli.emit_stack || cli.backend == Backend::Stack {
        let asm = patakha_codegen::stack::emit(&program);
        if let Err(code) = write_artifact(source, "stk", &asm) {
            return code;
        }
    }
    if cli.backend == Backend::C {
        let c_source = patakha_codegen::c::emit(&program);
        if let Err(code) = write_artifact(source, "c", &c_source) {
            return code;
        }
        if cli.gcc {
            if let Some(code) = run_gcc(source) {
                return code;
            }
        }
    }

    report(&map, &diags, cli.pretty);
    0
}

/// Front end only; `--strict` promotes warnings to errors.
fn lint(source: &Path, strict: bool, pretty: bool) -> i32 {
    let mut map = SourceMap::new();
    let mut diags = Diagnostics::new();
    if let Err(message) = patakha_sema::analyze_file(source, &mut map, &mut diags) {
        eprintln!("error: {message}");
        return 3;
    }
    if strict {
        diags.promote_warnings();
    }
    report(&map, &diags, pretty);
    if diags.has_errors() {
        1
    } else {
        0
    }
}

/// Print every collected diagnostic to stderr in stable order.
fn report(map: &SourceMap, diags: &Diagnostics, pretty: bool) {
    if pretty {
        report_pretty(map, diags);
    } else {
        eprint!("{}", map.render_all(diags));
    }
}

/// Labeled source reports via ariadne.
fn report_pretty(map: &SourceMap, diags: &Diagnostics) {
    use ariadne::{Label, Report, ReportKind, Source};

    for diag in diags.sorted() {
        let file = map.get(diag.span.file);
        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Note => ReportKind::Advice,
        };
        let start = diag.span.start as usize;
        let end = (diag.span.end as usize).max(start + 1);
        let mut label = Label::new(start..end).with_message(&diag.message);
        if let Some(nag) = diag.nag {
            label = label.with_message(format!("{} ({nag})", diag.message));
        }
        let _ = Report::<std::ops::Range<usize>>::build(kind, start..end)
            .with_message(file.path.display().to_string())
            .with_label(label)
            .finish()
            .eprint(Source::from(file.text.as_str()));
    }
}

/// One line per token: `line:col kind "lexeme"`.
fn render_tokens(map: &SourceMap) -> String {
    use std::fmt::Write;

    let root = map.get(patakha_common::FileId(0));
    let mut throwaway = Diagnostics::new();
    let tokens = patakha_lexer::tokenize(&root.text, patakha_common::FileId(0), &mut throwaway);

    let mut out = String::new();
    for token in tokens {
        let (line, col) = root.line_col(token.span.start);
        let lexeme = &root.text[token.span.start as usize..token.span.end as usize];
        let _ = writeln!(out, "{line}:{col} {:?} {lexeme:?}", token.kind);
    }
    out
}

/// Write an artifact next to the source, e.g. `prog.bhai` -> `prog.c`.
/// Returns the process exit code on failure.
fn write_artifact(source: &Path, extension: &str, text: &str) -> Result<(), i32> {
    let path = source.with_extension(extension);
    std::fs::write(&path, text).map_err(|e| {
        eprintln!("error: cannot write `{}`: {e}", path.display());
        3
    })
}

/// Drive the system C compiler over the emitted `.c` file.
fn run_gcc(source: &Path) -> Option<i32> {
    let c_path = source.with_extension("c");
    let exe_path = source.with_extension("exe");
    let status = Command::new("gcc")
        .arg("-std=c11")
        .arg("-O2")
        .arg(&c_path)
        .arg("-o")
        .arg(&exe_path)
        .status();
    match status {
        Ok(status) if status.success() => None,
        Ok(status) => {
            eprintln!("error: gcc exited with {status}");
            Some(3)
        }
        Err(e) => {
            eprintln!("error: cannot run gcc: {e}");
            Some(3)
        }
    }
}
