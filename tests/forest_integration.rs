//! Integration tests for parse forests
//!
//! These tests cover tree enumeration over ambiguous grammars, sharing of
//! unambiguous subtrees, cyclic grammars, deeply nested trees, node views
//! and JSON output.

use abnf_earley::earley::grammar_dsl::*;
use abnf_earley::earley::TreePrinter;
use abnf_earley::{ElementKind, Grammar, ParseTree};
use std::collections::HashSet;
use std::sync::Arc;

fn build(builder: GrammarBuilder) -> Grammar {
    builder.build().expect("grammar should be valid")
}

/// S = S S / "x"
fn binary() -> Grammar {
    build(GrammarBuilder::new("binary").rule("s", (call("s") >> call("s")) | lit("x")))
}

/// Leaf spans of a tree, left to right
fn leaves(tree: &ParseTree<'_>) -> Vec<std::ops::Range<usize>> {
    let mut out = Vec::new();
    tree.walk(|node, _| {
        if node.children().is_empty() {
            out.push(node.span());
        }
    });
    out
}

// ============================================================================
// Ambiguity Tests
// ============================================================================

#[test]
fn test_duplicate_alternatives_give_two_derivations() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("a") | lit("a")));
    let forest = grammar.parse("r", b"a").unwrap();

    let root = forest.root();
    assert_eq!(root.kind(), ElementKind::Alternation);
    let choices: Vec<_> = root
        .derivations()
        .iter()
        .map(|d| d.alternative().unwrap())
        .collect();
    assert_eq!(choices, vec![0, 1]);

    let trees: Vec<_> = forest.iter().collect();
    assert_eq!(trees.len(), 2);
    assert_ne!(trees[0], trees[1]);
    assert_ne!(trees[0].children()[0].element_id(), trees[1].children()[0].element_id());
}

#[test]
fn test_catalan_numbers() {
    let grammar = binary();
    // Number of binary bracketings of n leaves: 1, 1, 2, 5, 14, 42
    let expected = [1, 1, 2, 5, 14, 42];
    for (n, &count) in expected.iter().enumerate().skip(1) {
        let input = vec![b'x'; n];
        let forest = grammar.parse("s", &input).unwrap();
        assert_eq!(forest.iter().count(), count, "n = {}", n);
    }
}

#[test]
fn test_enumerated_trees_are_distinct() {
    let grammar = binary();
    let forest = grammar.parse("s", b"xxxxx").unwrap();
    let trees: Vec<_> = forest.iter().collect();
    for (i, a) in trees.iter().enumerate() {
        for b in &trees[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_enumeration_is_restartable() {
    let grammar = binary();
    let forest = grammar.parse("s", b"xxxx").unwrap();
    let first_pass: Vec<_> = forest.iter().collect();
    let second_pass: Vec<_> = forest.trees().collect();
    assert_eq!(first_pass, second_pass);

    let mut count = 0;
    for tree in &forest {
        assert_eq!(tree.span(), 0..4);
        count += 1;
    }
    assert_eq!(count, 5);
}

#[test]
fn test_lazy_enumeration() {
    // 2^20 trees: taking a few must not build them all.
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("r", call("ab").many())
            .rule("ab", lit("a") | lit("a")),
    );
    let forest = grammar.parse("r", &[b'a'; 20]).unwrap();
    assert!(forest.is_ambiguous());
    let some: Vec<_> = forest.iter().take(3).collect();
    assert_eq!(some.len(), 3);
}

#[test]
fn test_ambiguous_split_in_repetition() {
    // r = *("a" / "aa") over "aaa": a.a.a, a.aa, aa.a
    let grammar = build(
        GrammarBuilder::new("g").rule("r", (lit("a") | lit("aa")).many()),
    );
    let forest = grammar.parse("r", b"aaa").unwrap();
    let splits: HashSet<Vec<_>> = forest
        .iter()
        .map(|t| t.children().iter().map(|c| c.span()).collect())
        .collect();
    let expected: HashSet<Vec<_>> = [
        vec![0..1, 1..2, 2..3],
        vec![0..1, 1..3],
        vec![0..2, 2..3],
    ]
    .into_iter()
    .collect();
    assert_eq!(splits, expected);
}

#[test]
fn test_ambiguous_concatenation_split() {
    // r = a a ; a = "x" / "xx"  over "xxx": x.xx and xx.x
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("r", call("a") >> call("a"))
            .rule("a", lit("x") | lit("xx")),
    );
    let forest = grammar.parse("r", b"xxx").unwrap();
    let mut splits: Vec<_> = forest
        .iter()
        .map(|t| t.children()[0].span())
        .collect();
    splits.sort_by_key(|r| r.end);
    assert_eq!(splits, vec![0..1, 0..2]);

    let packed = forest.root().derivations();
    assert_eq!(packed.len(), 1);
    let prefix = packed[0].prefix().unwrap();
    assert_eq!(prefix.links().len(), 2);
}

#[test]
fn test_bounded_repetition_of_nullable_element() {
    // r = 0*2("" / "a") over "a": [a], ["", a] and [a, ""]
    let grammar = build(
        GrammarBuilder::new("g").rule("r", (lit("") | lit("a")).repeat(0, Some(2))),
    );
    let forest = grammar.parse("r", b"a").unwrap();
    let shapes: HashSet<Vec<_>> = forest
        .iter()
        .map(|t| t.children().iter().map(|c| c.span()).collect())
        .collect();
    let expected: HashSet<Vec<_>> = [vec![0..1], vec![0..0, 0..1], vec![0..1, 1..1]]
        .into_iter()
        .collect();
    assert_eq!(forest.iter().count(), 3);
    assert_eq!(shapes, expected);
}

#[test]
fn test_bounded_repetition_counts_empty_iterations() {
    // 0*2() over "": zero, one and two empty iterations all fit the bounds
    let grammar = build(GrammarBuilder::new("g").rule("r", empty().repeat(0, Some(2))));
    let forest = grammar.parse("r", b"").unwrap();
    assert_eq!(forest.root().derivation_count(), 3);
    let mut counts: Vec<usize> = forest.iter().map(|t| t.children().len()).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![0, 1, 2]);

    // The unbounded form still stops at one derivation per saturated count.
    let grammar = build(GrammarBuilder::new("g").rule("r", empty().many()));
    let forest = grammar.parse("r", b"").unwrap();
    assert_eq!(forest.iter().count(), 1);
}

// ============================================================================
// First Tree Tests
// ============================================================================

#[test]
fn test_first_is_first_enumerated() {
    let grammar = binary();
    let forest = grammar.parse("s", b"xxxxxx").unwrap();
    assert_eq!(forest.first(), forest.iter().next().unwrap());
}

#[test]
fn test_first_on_unambiguous_input() {
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("kv", call("key") >> lit("=") >> call("value"))
            .rule("key", range(b'a', b'z').many1())
            .rule("value", range(b'0', b'9').many1()),
    );
    let input = b"port=8080";
    let forest = grammar.parse("kv", input).unwrap();
    assert!(!forest.is_ambiguous());
    let tree = forest.first();
    let key = &tree.children()[0];
    let value = &tree.children()[2];
    assert_eq!(key.rule(), Some("key"));
    assert_eq!(key.text(input), b"port");
    assert_eq!(value.rule(), Some("value"));
    assert_eq!(value.text(input), b"8080");
}

// ============================================================================
// Sharing Tests
// ============================================================================

#[test]
fn test_unambiguous_subtrees_are_shared() {
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("top", call("head") >> call("body"))
            .rule("head", lit("h") | lit("h"))
            .rule("body", range(b'a', b'z').many1()),
    );
    let forest = grammar.parse("top", b"hbody").unwrap();
    let trees: Vec<_> = forest.iter().collect();
    assert_eq!(trees.len(), 2);
    assert!(Arc::ptr_eq(&trees[0].children()[1], &trees[1].children()[1]));
    assert!(!Arc::ptr_eq(&trees[0].children()[0], &trees[1].children()[0]));
}

// ============================================================================
// Cyclic Grammar Tests
// ============================================================================

#[test]
fn test_cyclic_unit_rule_enumeration_is_finite() {
    // a = b / "x" ; b = a
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("a", call("b") | lit("x"))
            .rule("b", call("a")),
    );
    let forest = grammar.parse("a", b"x").unwrap();
    let trees: Vec<_> = forest.iter().collect();
    assert_eq!(trees.len(), 1);
    assert_eq!(leaves(&trees[0]), vec![0..1]);
}

#[test]
fn test_cyclic_nullable_grammar() {
    // s = s s / "" : infinitely many derivations of the empty string
    let grammar = build(
        GrammarBuilder::new("g").rule("s", (call("s") >> call("s")) | lit("")),
    );
    let forest = grammar.parse("s", b"").unwrap();
    let trees: Vec<_> = forest.iter().collect();
    assert!(!trees.is_empty());
    assert!(trees.len() < 100);
    assert_eq!(trees[0], forest.first());
    for tree in &trees {
        assert_eq!(tree.span(), 0..0);
    }
}

#[test]
fn test_cyclic_grammar_with_input() {
    // e = e / e "+" e / "1"
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("e", call("e") | (call("e") >> lit("+") >> call("e")) | lit("1")),
    );
    let forest = grammar.parse("e", b"1+1").unwrap();
    let trees: Vec<_> = forest.iter().collect();
    assert!(!trees.is_empty());
    let distinct: HashSet<String> = trees.iter().map(|t| format!("{:?}", t)).collect();
    assert_eq!(distinct.len(), trees.len());
}

// ============================================================================
// Node View Tests
// ============================================================================

#[test]
fn test_root_view() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("ab") >> call("c")).rule("c", lit("c")));
    let forest = grammar.parse("r", b"abc").unwrap();
    let root = forest.root();
    assert_eq!(root.span(), 0..3);
    assert_eq!(root.len(), 3);
    assert!(!root.is_empty());
    assert_eq!(root.derivation_count(), 1);

    let prefix = root.derivations()[0].prefix().unwrap();
    assert_eq!(prefix.progress(), 2);
    let link = prefix.links()[0];
    assert_eq!(link.child.kind(), ElementKind::RuleCall);
    let call_packed = link.child.derivations()[0];
    let target = call_packed.child().unwrap();
    assert_eq!(target.kind(), ElementKind::LiteralString);
    assert_eq!(target.span(), 2..3);
}

#[test]
fn test_forest_statistics() {
    let grammar = binary();
    let forest = grammar.parse("s", b"xxx").unwrap();
    let stats = forest.stats();
    assert_eq!(stats.input_len, 3);
    assert_eq!(stats.furthest, 3);
    assert_eq!(stats.spans, forest.span_count());
    assert_eq!(stats.derivations, forest.derivation_count());
    assert!(stats.frames > 0);
    assert!(stats.joins > 0);
}

#[test]
fn test_forest_outlives_parser() {
    let grammar = binary();
    let forest = {
        let input = b"xx".to_vec();
        abnf_earley::ChartParser::new(&grammar, &input).parse("s").unwrap()
    };
    assert_eq!(forest.iter().count(), 1);
}

// ============================================================================
// JSON Output Tests
// ============================================================================

#[test]
fn test_tree_to_json() {
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("pair", call("word") >> lit(":") >> call("word"))
            .rule("word", range(b'a', b'z').many1()),
    );
    let input = b"ab:c";
    let tree = grammar.parse("pair", input).unwrap().first();
    let json = tree.to_json(input);

    assert_eq!(json["kind"], "Concatenation");
    assert_eq!(json["rule"], "pair");
    assert_eq!(json["start"], 0);
    assert_eq!(json["end"], 4);
    assert_eq!(json["text"], "ab:c");
    assert_eq!(json["children"][0]["call"], "word");
    assert_eq!(json["children"][0]["children"][0]["rule"], "word");
    assert_eq!(json["children"][1]["text"], ":");
    assert!(json["children"][1].get("children").is_none());
    assert_eq!(json["children"][2]["children"][0]["children"][0]["text"], "c");
}

// ============================================================================
// Deep Tree Tests
// ============================================================================

#[test]
fn test_deep_left_recursion() {
    // l = l "x" / "x"
    let grammar = build(
        GrammarBuilder::new("g").rule("l", (call("l") >> lit("x")) | lit("x")),
    );
    let n = 50_000;
    let forest = grammar.parse("l", &vec![b'x'; n]).unwrap();
    let tree = forest.first();
    assert_eq!(tree.span(), 0..n);
    assert_eq!(leaves(&tree).len(), n);

    let mut deepest = 0;
    tree.walk(|_, depth| deepest = deepest.max(depth));
    assert!(deepest >= 3 * (n - 1));

    let trees: Vec<_> = forest.iter().collect();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0], tree);
}

#[test]
fn test_deep_nesting() {
    // p = "(" p ")" / "x"
    let grammar = build(
        GrammarBuilder::new("g").rule("p", (lit("(") >> call("p") >> lit(")")) | lit("x")),
    );
    let depth = 20_000;
    let mut input = vec![b'('; depth];
    input.push(b'x');
    input.extend(std::iter::repeat(b')').take(depth));

    let forest = grammar.parse("p", &input).unwrap();
    let tree = forest.first();
    assert_eq!(tree.span(), 0..input.len());
    // Alternation, concatenation, two parentheses and a call per level,
    // then the alternation and literal of the innermost "x".
    assert_eq!(tree.node_count(), 5 * depth + 2);
    assert_eq!(forest.iter().count(), 1);

    let printed = TreePrinter::new().max_depth(3).print(&tree, &input);
    assert_eq!(printed.lines().count(), 7);
    assert!(printed.contains("\n        ...\n"));
    assert!(printed.ends_with(" \")\"\n"));
}

#[test]
fn test_deep_right_recursion_with_empty_base() {
    // r = "x" r / ""
    let grammar = build(
        GrammarBuilder::new("g").rule("r", (lit("x") >> call("r")) | lit("")),
    );
    let n = 1_000;
    let input = vec![b'x'; n];
    let forest = grammar.parse("r", &input).unwrap();
    let tree = forest.first();
    assert_eq!(tree.span(), 0..n);
    assert_eq!(tree.node_count(), 4 * n + 2);
    assert_eq!(leaves(&tree).len(), n + 1);

    let mut deepest = 0;
    tree.walk(|_, depth| deepest = deepest.max(depth));
    assert_eq!(deepest, 3 * n + 1);
    assert_eq!(forest.iter().next().unwrap(), tree);
}

#[test]
fn test_deep_ambiguous_enumeration() {
    // r = ("x" / "x") r / "": every position doubles the tree count
    let grammar = build(
        GrammarBuilder::new("g").rule("r", ((lit("x") | lit("x")) >> call("r")) | lit("")),
    );
    let n = 1_000;
    let forest = grammar.parse("r", &vec![b'x'; n]).unwrap();
    assert!(forest.is_ambiguous());
    let trees: Vec<_> = forest.iter().take(3).collect();
    assert_eq!(trees.len(), 3);
    assert_eq!(trees[0], forest.first());
    assert_ne!(trees[0], trees[1]);
    assert_ne!(trees[1], trees[2]);
    for tree in &trees {
        assert_eq!(tree.span(), 0..n);
        assert_eq!(leaves(tree).len(), n + 1);
    }
}
