//! Import resolution.
//!
//! `import "path"` pulls another file's top-level declarations into the
//! compilation unit. Paths resolve relative to the importing file. Each file
//! is loaded and parsed at most once (visited set); a file that is still
//! being loaded when it is imported again is a cycle, reported as a single
//! diagnostic naming every participant.
//!
//! An imported file may carry its own `shuru ... bass` block so that it
//! stays runnable on its own; only the root file's main block is kept, the
//! rest are ignored.

use std::path::{Path, PathBuf};

use patakha_common::diag::SourceMap;
use patakha_common::{Diagnostics, Span};
use patakha_parser::ast::{Item, Program};
use rustc_hash::FxHashSet;

/// Load `root` and everything it imports, returning one flattened program.
///
/// Imported declarations appear before their importer's, in depth-first
/// order, so the flattened item list is deterministic. Returns `Err` only
/// when the root file itself cannot be read.
pub fn load_program(
    root: &Path,
    map: &mut SourceMap,
    diags: &mut Diagnostics,
) -> Result<Program, String> {
    let root = normalize(root);
    let text = std::fs::read_to_string(&root)
        .map_err(|e| format!("cannot read `{}`: {e}", root.display()))?;

    let mut loader = Loader {
        map,
        diags,
        visited: FxHashSet::default(),
        loading: Vec::new(),
        items: Vec::new(),
    };
    let main = loader.load(root, text);
    Ok(Program {
        items: loader.items,
        main,
    })
}

struct Loader<'d> {
    map: &'d mut SourceMap,
    diags: &'d mut Diagnostics,
    /// Files already merged; repeated imports are skipped.
    visited: FxHashSet<PathBuf>,
    /// Files currently being loaded, outermost first. Importing one of
    /// these again is a cycle.
    loading: Vec<PathBuf>,
    /// The flattened top-level declarations.
    items: Vec<Item>,
}

impl<'d> Loader<'d> {
    /// Parse one file, recurse into its imports, then append its own items.
    /// Returns the file's main block (kept only for the root).
    fn load(&mut self, path: PathBuf, text: String) -> Option<patakha_parser::ast::Block> {
        self.visited.insert(path.clone());
        self.loading.push(path.clone());

        let file = self.map.add(path.clone(), text);
        let source = self.map.get(file).text.clone();
        let program = patakha_parser::parse_source(&source, file, self.diags);

        for item in program.items {
            match item {
                Item::Import(import) => self.load_import(&path, &import.path, import.span),
                other => self.items.push(other),
            }
        }

        self.loading.pop();
        program.main
    }

    fn load_import(&mut self, importer: &Path, rel: &str, span: Span) {
        let dir = importer.parent().unwrap_or_else(|| Path::new("."));
        let target = normalize(&dir.join(rel));

        if let Some(pos) = self.loading.iter().position(|p| p == &target) {
            let mut participants: Vec<String> = self.loading[pos..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            participants.push(target.display().to_string());
            self.diags.error_nag(
                span,
                format!("import cycle: {}", participants.join(" -> ")),
                "files ek doosre ko ghoom ke import kar rahe hain",
            );
            return;
        }
        if self.visited.contains(&target) {
            return; // already merged
        }

        match std::fs::read_to_string(&target) {
            Ok(text) => {
                // Imported main blocks are dropped; the root's is authoritative.
                let _ = self.load(target, text);
            }
            Err(e) => {
                self.diags.error(
                    span,
                    format!("cannot import `{}`: {e}", target.display()),
                );
            }
        }
    }
}

/// Lexically normalize a path (fold `.` and `..`) so that the same file
/// reached through different spellings hits the visited set once.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use patakha_common::Severity;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).expect("fixture write");
        path
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("patakha-imports-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("fixture dir");
        dir
    }

    #[test]
    fn imported_declarations_are_merged() {
        let dir = temp_dir("merge");
        write(&dir, "lib.bhai", "bhai twice(bhai n) {\nnikal n * 2\n}\n");
        let root = write(
            &dir,
            "main.bhai",
            "import \"lib.bhai\"\nshuru\nbol(twice(21))\nbass\n",
        );

        let mut map = SourceMap::new();
        let mut diags = Diagnostics::new();
        let program = load_program(&root, &mut map, &mut diags).expect("root readable");
        assert!(!diags.has_errors(), "{:?}", diags.records());
        assert_eq!(program.items.len(), 1);
        assert!(program.main.is_some());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn imported_main_blocks_are_ignored() {
        let dir = temp_dir("mains");
        write(
            &dir,
            "lib.bhai",
            "bhai one() {\nnikal 1\n}\nshuru\nbol(99)\nbass\n",
        );
        let root = write(
            &dir,
            "main.bhai",
            "import \"lib.bhai\"\nshuru\nbol(one())\nbass\n",
        );

        let mut map = SourceMap::new();
        let mut diags = Diagnostics::new();
        let program = load_program(&root, &mut map, &mut diags).expect("root readable");
        assert!(!diags.has_errors(), "{:?}", diags.records());
        // Root main kept, imported main dropped.
        let main = program.main.expect("root main");
        assert_eq!(main.stmts.len(), 1);
    }

    #[test]
    fn diamond_import_is_loaded_once() {
        let dir = temp_dir("diamond");
        write(&dir, "base.bhai", "bhai base() {\nnikal 7\n}\n");
        write(&dir, "a.bhai", "import \"base.bhai\"\nbhai a() {\nnikal base()\n}\n");
        write(&dir, "b.bhai", "import \"base.bhai\"\nbhai b() {\nnikal base()\n}\n");
        let root = write(
            &dir,
            "main.bhai",
            "import \"a.bhai\"\nimport \"b.bhai\"\nshuru\nbol(a() + b())\nbass\n",
        );

        let mut map = SourceMap::new();
        let mut diags = Diagnostics::new();
        let program = load_program(&root, &mut map, &mut diags).expect("root readable");
        assert!(!diags.has_errors(), "{:?}", diags.records());
        // base(), a(), b() once each; no duplicate of base().
        assert_eq!(program.items.len(), 3);
    }

    #[test]
    fn import_cycle_reports_exactly_once_with_participants() {
        let dir = temp_dir("cycle");
        write(&dir, "a.bhai", "import \"b.bhai\"\nshuru\nbol(1)\nbass\n");
        write(&dir, "b.bhai", "import \"a.bhai\"\n");
        let root = dir.join("a.bhai");

        let mut map = SourceMap::new();
        let mut diags = Diagnostics::new();
        let _ = load_program(&root, &mut map, &mut diags).expect("root readable");

        let cycles: Vec<_> = diags
            .records()
            .iter()
            .filter(|d| d.severity == Severity::Error && d.message.contains("import cycle"))
            .collect();
        assert_eq!(cycles.len(), 1, "{:?}", diags.records());
        assert!(cycles[0].message.contains("a.bhai"));
        assert!(cycles[0].message.contains("b.bhai"));
    }

    #[test]
    fn missing_import_is_a_diagnostic_not_a_crash() {
        let dir = temp_dir("missing");
        let root = write(&dir, "main.bhai", "import \"nahi_hai.bhai\"\nshuru\nbass\n");

        let mut map = SourceMap::new();
        let mut diags = Diagnostics::new();
        let _ = load_program(&root, &mut map, &mut diags).expect("root readable");
        assert!(diags.has_errors());
    }
}
