//! Parser-theory table dumps (`--dump-ll1`, `--dump-slr`).
//!
//! The compiler itself parses by recursive descent; these dumps exist for
//! studying the grammar. They cover the statement/expression core of the
//! language: an LL(1) table over the right-recursive form, and an SLR table
//! over the classic left-recursive expression form.
//!
//! All containers are BTree-based so the printed tables are deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// A grammar symbol: terminal or nonterminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Sym {
    T(&'static str),
    N(&'static str),
}

/// One production. An empty `rhs` is an epsilon production.
#[derive(Debug, Clone, Copy)]
struct Production {
    lhs: &'static str,
    rhs: &'static [Sym],
}

use Sym::{N, T};

/// End-of-input marker used in FOLLOW sets and table columns.
const END: &str = "$";

/// The right-recursive statement/expression grammar used for the LL(1) dump.
fn ll1_grammar() -> Vec<Production> {
    vec![
        Production { lhs: "Stmt", rhs: &[T("id"), T("="), N("Expr")] },
        Production { lhs: "Stmt", rhs: &[T("bol"), T("("), N("Expr"), T(")")] },
        Production { lhs: "Stmt", rhs: &[T("agar"), T("("), N("Expr"), T(")"), N("Block"), N("Else")] },
        Production { lhs: "Stmt", rhs: &[T("tabtak"), T("("), N("Expr"), T(")"), N("Block")] },
        Production { lhs: "Stmt", rhs: &[N("Block")] },
        Production { lhs: "Else", rhs: &[T("warna"), N("Block")] },
        Production { lhs: "Else", rhs: &[] },
        Production { lhs: "Block", rhs: &[T("{"), N("Stmts"), T("}")] },
        Production { lhs: "Stmts", rhs: &[N("Stmt"), N("Stmts")] },
        Production { lhs: "Stmts", rhs: &[] },
        Production { lhs: "Expr", rhs: &[N("And"), N("Expr'")] },
        Production { lhs: "Expr'", rhs: &[T("||"), N("And"), N("Expr'")] },
        Production { lhs: "Expr'", rhs: &[] },
        Production { lhs: "And", rhs: &[N("Cmp"), N("And'")] },
        Production { lhs: "And'", rhs: &[T("&&"), N("Cmp"), N("And'")] },
        Production { lhs: "And'", rhs: &[] },
        Production { lhs: "Cmp", rhs: &[N("Add"), N("Cmp'")] },
        Production { lhs: "Cmp'", rhs: &[T("rel"), N("Add"), N("Cmp'")] },
        Production { lhs: "Cmp'", rhs: &[] },
        Production { lhs: "Add", rhs: &[N("Mul"), N("Add'")] },
        Production { lhs: "Add'", rhs: &[T("+"), N("Mul"), N("Add'")] },
        Production { lhs: "Add'", rhs: &[T("-"), N("Mul"), N("Add'")] },
        Production { lhs: "Add'", rhs: &[] },
        Production { lhs: "Mul", rhs: &[N("Unary"), N("Mul'")] },
        Production { lhs: "Mul'", rhs: &[T("*"), N("Unary"), N("Mul'")] },
        Production { lhs: "Mul'", rhs: &[T("/"), N("Unary"), N("Mul'")] },
        Production { lhs: "Mul'", rhs: &[T("%"), N("Unary"), N("Mul'")] },
        Production { lhs: "Mul'", rhs: &[] },
        Production { lhs: "Unary", rhs: &[T("-"), N("Unary")] },
        Production { lhs: "Unary", rhs: &[T("!"), N("Unary")] },
        Production { lhs: "Unary", rhs: &[N("Primary")] },
        Production { lhs: "Primary", rhs: &[T("id")] },
        Production { lhs: "Primary", rhs: &[T("num")] },
        Production { lhs: "Primary", rhs: &[T("("), N("Expr"), T(")")] },
    ]
}

/// The left-recursive expression grammar used for the SLR dump. Production 0
/// is the augmented start.
fn slr_grammar() -> Vec<Production> {
    vec![
        Production { lhs: "S'", rhs: &[N("Stmt")] },
        Production { lhs: "Stmt", rhs: &[T("id"), T("="), N("Expr")] },
        Production { lhs: "Stmt", rhs: &[T("bol"), T("("), N("Expr"), T(")")] },
        Production { lhs: "Expr", rhs: &[N("Expr"), T("+"), N("Term")] },
        Production { lhs: "Expr", rhs: &[N("Expr"), T("-"), N("Term")] },
        Production { lhs: "Expr", rhs: &[N("Term")] },
        Production { lhs: "Term", rhs: &[N("Term"), T("*"), N("Factor")] },
        Production { lhs: "Term", rhs: &[N("Term"), T("/"), N("Factor")] },
        Production { lhs: "Term", rhs: &[N("Factor")] },
        Production { lhs: "Factor", rhs: &[T("("), N("Expr"), T(")")] },
        Production { lhs: "Factor", rhs: &[T("id")] },
        Production { lhs: "Factor", rhs: &[T("num")] },
    ]
}

fn nonterminals(grammar: &[Production]) -> Vec<&'static str> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for p in grammar {
        if seen.insert(p.lhs) {
            out.push(p.lhs);
        }
    }
    out
}

fn terminals(grammar: &[Production]) -> Vec<&'static str> {
    let mut out = BTreeSet::new();
    for p in grammar {
        for sym in p.rhs {
            if let T(t) = sym {
                out.insert(*t);
            }
        }
    }
    out.into_iter().collect()
}

/// FIRST sets plus nullability, computed to a fixpoint.
fn first_sets(
    grammar: &[Production],
) -> (BTreeMap<&'static str, BTreeSet<&'static str>>, BTreeSet<&'static str>) {
    let mut first: BTreeMap<&'static str, BTreeSet<&'static str>> = BTreeMap::new();
    let mut nullable: BTreeSet<&'static str> = BTreeSet::new();
    for nt in nonterminals(grammar) {
        first.insert(nt, BTreeSet::new());
    }

    let mut changed = true;
    while changed {
        changed = false;
        for p in grammar {
            let mut all_nullable = true;
            for sym in p.rhs {
                match sym {
                    T(t) => {
                        if first.get_mut(p.lhs).expect("lhs registered").insert(*t) {
                            changed = true;
                        }
                        all_nullable = false;
                        break;
                    }
                    N(n) => {
                        let sub: Vec<&str> = first[*n].iter().copied().collect();
                        let set = first.get_mut(p.lhs).expect("lhs registered");
                        for t in sub {
                            if set.insert(t) {
                                changed = true;
                            }
                        }
                        if !nullable.contains(*n) {
                            all_nullable = false;
                            break;
                        }
                    }
                }
            }
            if all_nullable && nullable.insert(p.lhs) {
                changed = true;
            }
        }
    }
    (first, nullable)
}

/// FOLLOW sets. The start symbol (lhs of the first production) gets `$`.
fn follow_sets(
    grammar: &[Production],
    first: &BTreeMap<&'static str, BTreeSet<&'static str>>,
    nullable: &BTreeSet<&'static str>,
) -> BTreeMap<&'static str, BTreeSet<&'static str>> {
    let mut follow: BTreeMap<&'static str, BTreeSet<&'static str>> = BTreeMap::new();
    for nt in nonterminals(grammar) {
        follow.insert(nt, BTreeSet::new());
    }
    follow
        .get_mut(grammar[0].lhs)
        .expect("start symbol registered")
        .insert(END);

    let mut changed = true;
    while changed {
        changed = false;
        for p in grammar {
            for (i, sym) in p.rhs.iter().enumerate() {
                let N(n) = sym else { continue };
                // Everything FIRST-derivable from the suffix follows `n`.
                let mut suffix_nullable = true;
                let mut additions: BTreeSet<&str> = BTreeSet::new();
                for rest in &p.rhs[i + 1..] {
                    match rest {
                        T(t) => {
                            additions.insert(*t);
                            suffix_nullable = false;
                            break;
                        }
                        N(m) => {
                            additions.extend(first[*m].iter().copied());
                            if !nullable.contains(*m) {
                                suffix_nullable = false;
                                break;
                            }
                        }
                    }
                }
                if suffix_nullable {
                    additions.extend(follow[p.lhs].iter().copied());
                }
                let set = follow.get_mut(*n).expect("nonterminal registered");
                for t in additions {
                    if set.insert(t) {
                        changed = true;
                    }
                }
            }
        }
    }
    follow
}

fn format_production(idx: usize, p: &Production) -> String {
    let rhs = if p.rhs.is_empty() {
        "<e>".to_string()
    } else {
        p.rhs
            .iter()
            .map(|s| match s {
                T(t) => *t,
                N(n) => *n,
            })
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!("({idx}) {} -> {rhs}", p.lhs)
}

fn format_set(name: &str, set: &BTreeSet<&str>) -> String {
    let items: Vec<&str> = set.iter().copied().collect();
    format!("{name} = {{ {} }}", items.join(", "))
}

// ── LL(1) ──────────────────────────────────────────────────────────────

/// Render the LL(1) dump: grammar, FIRST/FOLLOW, and the predictive table
/// with conflicts marked.
pub fn dump_ll1() -> String {
    let grammar = ll1_grammar();
    let (first, nullable) = first_sets(&grammar);
    let follow = follow_sets(&grammar, &first, &nullable);

    let mut out = String::new();
    out.push_str("LL(1) table for the statement/expression core grammar\n");
    out.push_str("(<e> is the empty production; rel is any relational operator)\n\n");

    out.push_str("Grammar:\n");
    for (i, p) in grammar.iter().enumerate() {
        let _ = writeln!(out, "  {}", format_production(i, p));
    }

    out.push_str("\nFIRST sets:\n");
    for nt in nonterminals(&grammar) {
        let mut set = first[nt].clone();
        if nullable.contains(nt) {
            set.insert("<e>");
        }
        let _ = writeln!(out, "  {}", format_set(&format!("FIRST({nt})"), &set));
    }

    out.push_str("\nFOLLOW sets:\n");
    for nt in nonterminals(&grammar) {
        let _ = writeln!(out, "  {}", format_set(&format!("FOLLOW({nt})"), &follow[nt]));
    }

    // M[A, a] = productions predicted for nonterminal A on lookahead a.
    let mut table: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (i, p) in grammar.iter().enumerate() {
        let mut lookaheads: BTreeSet<&str> = BTreeSet::new();
        let mut prefix_nullable = true;
        for sym in p.rhs {
            match sym {
                T(t) => {
                    lookaheads.insert(*t);
                    prefix_nullable = false;
                    break;
                }
                N(n) => {
                    lookaheads.extend(first[*n].iter().copied());
                    if !nullable.contains(*n) {
                        prefix_nullable = false;
                        break;
                    }
                }
            }
        }
        if prefix_nullable {
            lookaheads.extend(follow[p.lhs].iter().copied());
        }
        for t in lookaheads {
            table.entry((p.lhs, t)).or_default().push(i);
        }
    }

    out.push_str("\nPredictive table (nonterminal, lookahead) -> production:\n");
    let mut conflicts = 0usize;
    for ((nt, t), prods) in &table {
        let cell = prods
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("/");
        if prods.len() > 1 {
            conflicts += 1;
            let _ = writeln!(out, "  M[{nt}, {t}] = {cell}  <-- conflict");
        } else {
            let _ = writeln!(out, "  M[{nt}, {t}] = {cell}");
        }
    }
    let _ = writeln!(out, "\n{conflicts} conflict(s).");
    out
}

// ── SLR ────────────────────────────────────────────────────────────────

/// An LR(0) item: production index plus dot position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Item {
    prod: usize,
    dot: usize,
}

type State = BTreeSet<Item>;

fn closure(grammar: &[Production], mut state: State) -> State {
    let mut changed = true;
    while changed {
        changed = false;
        let items: Vec<Item> = state.iter().copied().collect();
        for item in items {
            let p = &grammar[item.prod];
            if let Some(N(n)) = p.rhs.get(item.dot) {
                for (i, q) in grammar.iter().enumerate() {
                    if q.lhs == *n && state.insert(Item { prod: i, dot: 0 }) {
                        changed = true;
                    }
                }
            }
        }
    }
    state
}

fn goto(grammar: &[Production], state: &State, sym: Sym) -> State {
    let mut next = State::new();
    for item in state {
        let p = &grammar[item.prod];
        if p.rhs.get(item.dot) == Some(&sym) {
            next.insert(Item {
                prod: item.prod,
                dot: item.dot + 1,
            });
        }
    }
    closure(grammar, next)
}

/// Render the SLR dump: grammar, LR(0) item sets, and the ACTION/GOTO table
/// with conflicts marked.
pub fn dump_slr() -> String {
    let grammar = slr_grammar();
    let (first, nullable) = first_sets(&grammar);
    let follow = follow_sets(&grammar, &first, &nullable);

    // Canonical LR(0) collection, numbered in discovery order.
    let start = closure(
        &grammar,
        [Item { prod: 0, dot: 0 }].into_iter().collect(),
    );
    let mut states: Vec<State> = vec![start];
    let mut transitions: BTreeMap<(usize, Sym), usize> = BTreeMap::new();

    let mut symbols: Vec<Sym> = terminals(&grammar).into_iter().map(T).collect();
    symbols.extend(nonterminals(&grammar).into_iter().skip(1).map(N));

    let mut i = 0;
    while i < states.len() {
        for &sym in &symbols {
            let next = goto(&grammar, &states[i], sym);
            if next.is_empty() {
                continue;
            }
            let target = match states.iter().position(|s| *s == next) {
                Some(idx) => idx,
                None => {
                    states.push(next);
                    states.len() - 1
                }
            };
            transitions.insert((i, sym), target);
        }
        i += 1;
    }

    let mut out = String::new();
    out.push_str("SLR table for the expression core grammar\n\n");
    out.push_str("Grammar:\n");
    for (idx, p) in grammar.iter().enumerate() {
        let _ = writeln!(out, "  {}", format_production(idx, p));
    }

    out.push_str("\nLR(0) item sets:\n");
    for (idx, state) in states.iter().enumerate() {
        let _ = writeln!(out, "  I{idx}:");
        for item in state {
            let p = &grammar[item.prod];
            let mut rhs: Vec<&str> = Vec::new();
            for (j, sym) in p.rhs.iter().enumerate() {
                if j == item.dot {
                    rhs.push(".");
                }
                rhs.push(match sym {
                    T(t) => t,
                    N(n) => n,
                });
            }
            if item.dot == p.rhs.len() {
                rhs.push(".");
            }
            let _ = writeln!(out, "    {} -> {}", p.lhs, rhs.join(" "));
        }
    }

    // ACTION and GOTO.
    let mut action: BTreeMap<(usize, &str), Vec<String>> = BTreeMap::new();
    for (idx, state) in states.iter().enumerate() {
        for item in state {
            let p = &grammar[item.prod];
            match p.rhs.get(item.dot).copied() {
                Some(T(t)) => {
                    let target = transitions[&(idx, T(t))];
                    let entry = action.entry((idx, t)).or_default();
                    let shift = format!("s{target}");
                    if !entry.contains(&shift) {
                        entry.push(shift);
                    }
                }
                Some(N(_)) => {}
                None => {
                    if item.prod == 0 {
                        action.entry((idx, END)).or_default().push("acc".to_string());
                    } else {
                        for &t in &follow[p.lhs] {
                            action
                                .entry((idx, t))
                                .or_default()
                                .push(format!("r{}", item.prod));
                        }
                    }
                }
            }
        }
    }

    out.push_str("\nACTION:\n");
    let mut conflicts = 0usize;
    for ((state, t), entries) in &action {
        let cell = entries.join("/");
        if entries.len() > 1 {
            conflicts += 1;
            let _ = writeln!(out, "  ACTION[{state}, {t}] = {cell}  <-- conflict");
        } else {
            let _ = writeln!(out, "  ACTION[{state}, {t}] = {cell}");
        }
    }

    out.push_str("\nGOTO:\n");
    for ((state, sym), target) in &transitions {
        if let N(n) = sym {
            let _ = writeln!(out, "  GOTO[{state}, {n}] = {target}");
        }
    }
    let _ = writeln!(out, "\n{} state(s), {conflicts} conflict(s).", states.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ll1_core_grammar_has_no_conflicts() {
        let dump = dump_ll1();
        assert!(dump.contains("0 conflict(s)."));
        assert!(dump.contains("FIRST(Expr)"));
        assert!(dump.contains("M[Stmt, agar]"));
    }

    #[test]
    fn slr_core_grammar_has_no_conflicts() {
        let dump = dump_slr();
        assert!(dump.contains("0 conflict(s)."));
        assert!(dump.contains("ACTION[0, id] = s"));
        assert!(dump.contains("GOTO["));
    }

    #[test]
    fn dumps_are_deterministic() {
        assert_eq!(dump_ll1(), dump_ll1());
        assert_eq!(dump_slr(), dump_slr());
    }
}
