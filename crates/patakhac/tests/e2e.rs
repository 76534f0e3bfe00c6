//! End-to-end tests for the patakhac CLI.
//!
//! Each test writes a `.bhai` source into a temp directory, invokes the
//! compiled `patakhac` binary, and asserts on exit codes, diagnostics, and
//! the artifacts written next to the source.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn patakhac() -> &'static str {
    env!("CARGO_BIN_EXE_patakhac")
}

fn write_source(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("failed to write source");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(patakhac())
        .args(args)
        .output()
        .expect("failed to invoke patakhac")
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn compiles_a_clean_program_to_c() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "hello.bhai",
        "shuru\nbhai x = 2 + 3 * 4\nbol(x)\nnikal 0\nbass\n",
    );

    let output = run(&[source.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));

    let c_path = dir.path().join("hello.c");
    let c_source = std::fs::read_to_string(&c_path).expect(".c artifact written");
    assert!(c_source.contains("int main(void)"));
    // The constant folded all the way to the print.
    assert!(c_source.contains("14"), "{c_source}");
}

#[test]
fn optimized_ir_has_no_add_for_constant_initializer() {
    // S3: `bhai y = 1 + 2` leaves a single constant load, no add.
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "fold.bhai", "shuru\nbhai y = 1 + 2\nbol(y)\nbass\n");

    let output = run(&[source.to_str().unwrap(), "--emit-raw-ir", "--emit-ir"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));

    let raw = std::fs::read_to_string(dir.path().join("fold.raw.ir")).unwrap();
    let optimized = std::fs::read_to_string(dir.path().join("fold.ir")).unwrap();
    assert!(raw.contains(" + "), "raw IR keeps the add:\n{raw}");
    assert!(!optimized.contains(" + "), "optimized IR folded it:\n{optimized}");
    assert!(optimized.contains('3'), "{optimized}");
}

#[test]
fn stack_backend_and_emit_flags_write_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "art.bhai",
        "shuru\nbhai i = 0\ntabtak (i < 3) { i += 1 }\nbol(i)\nbass\n",
    );

    let output = run(&[
        source.to_str().unwrap(),
        "--backend",
        "stack",
        "--emit-tokens",
        "--dump-ast",
        "--dump-ast-dot",
        "--dump-symbols",
        "--dump-cfg",
        "--dump-cfg-dot",
    ]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));

    for ext in [
        "stk",
        "tokens.txt",
        "ast.txt",
        "ast.dot",
        "symbols.txt",
        "cfg.txt",
        "cfg.dot",
    ] {
        let path = dir.path().join(format!("art.{ext}"));
        assert!(path.exists(), "missing artifact {ext}");
    }

    let stk = std::fs::read_to_string(dir.path().join("art.stk")).unwrap();
    assert!(stk.contains("MAIN:"));
    assert!(stk.contains("JZ"));

    let tokens = std::fs::read_to_string(dir.path().join("art.tokens.txt")).unwrap();
    assert!(tokens.contains("Tabtak"), "{tokens}");

    let cfg = std::fs::read_to_string(dir.path().join("art.cfg.txt")).unwrap();
    assert!(cfg.contains("succs:"), "{cfg}");
}

#[test]
fn diagnostics_use_the_canonical_line_format() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "bad.bhai", "shuru\nbol(nahi_mila)\nbass\n");

    let output = run(&[source.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = stderr_of(&output);
    let line = stderr
        .lines()
        .find(|l| l.contains("undeclared name"))
        .unwrap_or_else(|| panic!("expected an undeclared-name error, got:\n{stderr}"));
    // <path>:<line>:<col>: <severity>: <message>
    assert!(line.contains("bad.bhai:2:5: error: undeclared name"), "{line}");
}

#[test]
fn parser_recovery_reports_and_continues() {
    // S4: one syntax error, the rest of the block still parses, exit is 1.
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "rec.bhai", "shuru bhai a = bol(a) nikal 0 bass\n");

    let output = run(&[source.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("error"), "{stderr}");
}

#[test]
fn import_cycle_is_reported_once_with_both_files() {
    // S5: a.bhai <-> b.bhai.
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "b.bhai", "import \"a.bhai\"\n");
    let a = write_source(
        dir.path(),
        "a.bhai",
        "import \"b.bhai\"\nshuru\nbol(1)\nbass\n",
    );

    let output = run(&[a.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = stderr_of(&output);
    let cycle_lines: Vec<&str> = stderr
        .lines()
        .filter(|l| l.contains("import cycle"))
        .collect();
    assert_eq!(cycle_lines.len(), 1, "{stderr}");
    assert!(cycle_lines[0].contains("a.bhai"));
    assert!(cycle_lines[0].contains("b.bhai"));
}

#[test]
fn imports_pull_in_declarations() {
    let dir = tempfile::tempdir().unwrap();
    write_source(
        dir.path(),
        "lib.bhai",
        "bhai teen_guna(bhai n) {\nnikal n * 3\n}\n",
    );
    let main = write_source(
        dir.path(),
        "main.bhai",
        "import \"lib.bhai\"\nshuru\nbol(teen_guna(14))\nbass\n",
    );

    let output = run(&[main.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));
    let c_source = std::fs::read_to_string(dir.path().join("main.c")).unwrap();
    assert!(c_source.contains("pk_teen_guna"), "{c_source}");
}

#[test]
fn warnings_do_not_stop_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "warn.bhai",
        "shuru\nbhai anjaan = 1\nbol(2)\nbass\n",
    );

    let output = run(&[source.to_str().unwrap(), "--emit-warnings"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));

    let warnings = std::fs::read_to_string(dir.path().join("warn.warnings.txt")).unwrap();
    assert!(warnings.contains("warning: unused variable `anjaan`"), "{warnings}");
    assert!(dir.path().join("warn.c").exists());
}

#[test]
fn lint_strict_promotes_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "lint.bhai",
        "shuru\nbhai anjaan = 1\nbol(2)\nbass\n",
    );

    let relaxed = run(&["lint", source.to_str().unwrap()]);
    assert_eq!(relaxed.status.code(), Some(0), "{}", stderr_of(&relaxed));

    let strict = run(&["lint", source.to_str().unwrap(), "--strict"]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(stderr_of(&strict).contains("error: unused variable"));
}

#[test]
fn grammar_table_dumps_go_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "g.bhai", "shuru\nbol(1)\nbass\n");

    let output = run(&[source.to_str().unwrap(), "--dump-ll1", "--dump-slr"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr_of(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FIRST("), "{stdout}");
    assert!(stdout.contains("ACTION["), "{stdout}");
}

#[test]
fn missing_source_file_is_an_io_failure() {
    let output = run(&["/nahi/hai/kahin.bhai"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn no_arguments_is_a_usage_error() {
    let output = run(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn artifacts_are_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "det.bhai",
        "shuru\nbhai sum = 0\njabtak (bhai i = 0; i < 5; ++i) { sum += i }\nbol(sum)\nbass\n",
    );

    let args = [source.to_str().unwrap(), "--emit-ir", "--emit-stack"];
    assert_eq!(run(&args).status.code(), Some(0));
    let first_ir = std::fs::read_to_string(dir.path().join("det.ir")).unwrap();
    let first_stk = std::fs::read_to_string(dir.path().join("det.stk")).unwrap();

    assert_eq!(run(&args).status.code(), Some(0));
    let second_ir = std::fs::read_to_string(dir.path().join("det.ir")).unwrap();
    let second_stk = std::fs::read_to_string(dir.path().join("det.stk")).unwrap();

    assert_eq!(first_ir, second_ir);
    assert_eq!(first_stk, second_stk);
}
