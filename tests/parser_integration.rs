//! Integration tests for core parser functionality
//!
//! These tests cover the fundamental parsing operations including:
//! - Literal strings and byte ranges
//! - Concatenation and alternation
//! - Bounded and unbounded repetition
//! - Recursive rules (left, right and mutual)
//! - Nullable constructs
//! - Resource limits

use abnf_earley::earley::grammar_dsl::*;
use abnf_earley::{ChartParser, ElementKind, Grammar, ParseError, ParserConfig, Resource};

fn build(builder: GrammarBuilder) -> Grammar {
    builder.build().expect("grammar should be valid")
}

// ============================================================================
// Literal Matching Tests
// ============================================================================

#[test]
fn test_literal_match() {
    let grammar = build(GrammarBuilder::new("g").rule("hello", lit("hello")));
    let forest = grammar.parse("hello", b"hello").expect("Should parse 'hello'");
    let tree = forest.first();
    assert_eq!(tree.kind(), ElementKind::LiteralString);
    assert_eq!(tree.span(), 0..5);
    assert!(tree.children().is_empty());
}

#[test]
fn test_literal_no_match() {
    let grammar = build(GrammarBuilder::new("g").rule("hello", lit("hello")));
    let result = grammar.parse("hello", b"world");
    assert!(result.is_err(), "Should fail to parse 'world' with 'hello' rule");
}

#[test]
fn test_empty_literal_on_empty_input() {
    let grammar = build(GrammarBuilder::new("g").rule("empty", lit("")));
    let forest = grammar.parse("empty", b"").expect("empty literal matches empty input");
    assert_eq!(forest.first().span(), 0..0);
    assert!(!grammar.recognize("empty", b"x").unwrap());
}

#[test]
fn test_case_insensitive_literal() {
    let grammar = build(GrammarBuilder::new("g").rule("word", lit_nocase("AbC")));
    assert!(grammar.recognize("word", b"aBc").unwrap());
    assert!(grammar.recognize("word", b"ABC").unwrap());
    assert!(grammar.recognize("word", b"abc").unwrap());
    assert!(!grammar.recognize("word", b"abd").unwrap());
}

#[test]
fn test_case_sensitive_literal() {
    let grammar = build(GrammarBuilder::new("g").rule("word", lit("AbC")));
    assert!(grammar.recognize("word", b"AbC").unwrap());
    assert!(!grammar.recognize("word", b"abc").unwrap());
}

#[test]
fn test_case_folding_only_affects_letters() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit_nocase("a-1")));
    assert!(grammar.recognize("r", b"A-1").unwrap());
    assert!(!grammar.recognize("r", b"A_1").unwrap());
}

#[test]
fn test_byte_range() {
    let grammar = build(GrammarBuilder::new("g").rule("digit", range(b'0', b'9')));
    for d in b'0'..=b'9' {
        assert!(grammar.recognize("digit", &[d]).unwrap());
    }
    assert!(!grammar.recognize("digit", b"/").unwrap());
    assert!(!grammar.recognize("digit", b":").unwrap());
    assert!(!grammar.recognize("digit", b"").unwrap());
}

#[test]
fn test_non_ascii_bytes() {
    let grammar = build(
        GrammarBuilder::new("g").rule("r", bytes(&[0xC3, 0xA9]) >> range(0x80, 0xFF)),
    );
    assert!(grammar.recognize("r", &[0xC3, 0xA9, 0x80]).unwrap());
    assert!(!grammar.recognize("r", &[0xC3, 0xA9, 0x7F]).unwrap());
}

// ============================================================================
// Concatenation and Alternation Tests
// ============================================================================

#[test]
fn test_concatenation() {
    let grammar = build(
        GrammarBuilder::new("g").rule("pair", lit("a") >> lit("b") >> lit("c")),
    );
    let forest = grammar.parse("pair", b"abc").unwrap();
    let tree = forest.first();
    assert_eq!(tree.kind(), ElementKind::Concatenation);
    let spans: Vec<_> = tree.children().iter().map(|c| c.span()).collect();
    assert_eq!(spans, vec![0..1, 1..2, 2..3]);
    assert!(!grammar.recognize("pair", b"ab").unwrap());
    assert!(!grammar.recognize("pair", b"abcd").unwrap());
}

#[test]
fn test_empty_concatenation_matches_empty() {
    let grammar = build(GrammarBuilder::new("g").rule("nothing", seq(Vec::<Lit>::new())));
    assert!(grammar.recognize("nothing", b"").unwrap());
    assert!(!grammar.recognize("nothing", b"a").unwrap());
}

#[test]
fn test_alternation() {
    let grammar = build(
        GrammarBuilder::new("g").rule("ab", lit("a") | lit("b") | lit("cd")),
    );
    assert!(grammar.recognize("ab", b"a").unwrap());
    assert!(grammar.recognize("ab", b"b").unwrap());
    assert!(grammar.recognize("ab", b"cd").unwrap());
    assert!(!grammar.recognize("ab", b"c").unwrap());
}

#[test]
fn test_alternation_keeps_every_match() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("a") | lit("a")));
    let forest = grammar.parse("r", b"a").unwrap();
    assert_eq!(forest.iter().count(), 2);
}

#[test]
fn test_empty_alternation_never_matches() {
    let grammar = build(GrammarBuilder::new("g").rule("never", alt(Vec::<Lit>::new())));
    assert!(!grammar.recognize("never", b"").unwrap());
    assert!(!grammar.recognize("never", b"a").unwrap());
}

// ============================================================================
// Repetition Tests
// ============================================================================

#[test]
fn test_bounded_repetition() {
    let grammar = build(
        GrammarBuilder::new("g").rule("digits", range(b'0', b'9').repeat(2, Some(3))),
    );
    assert!(grammar.recognize("digits", b"12").unwrap());
    assert!(grammar.recognize("digits", b"123").unwrap());
    assert!(!grammar.recognize("digits", b"1").unwrap());
    assert!(!grammar.recognize("digits", b"1234").unwrap());
}

#[test]
fn test_bounded_repetition_rejects_trailing_input() {
    let grammar = build(
        GrammarBuilder::new("g").rule("digits", range(b'0', b'9').repeat(2, Some(3))),
    );
    let failure = grammar.parse("digits", b"1234").unwrap_err();
    let failure = failure.failure().expect("ordinary parse failure");
    assert_eq!(failure.position, 3);
    assert_eq!(failure.found, Some(b'4'));
    assert!(failure.expected.is_empty());
}

#[test]
fn test_exact_repetition() {
    let grammar = build(GrammarBuilder::new("g").rule("three", lit("ab").times(3)));
    assert!(grammar.recognize("three", b"ababab").unwrap());
    assert!(!grammar.recognize("three", b"abab").unwrap());
    assert!(!grammar.recognize("three", b"abababab").unwrap());
}

#[test]
fn test_unbounded_repetition() {
    let grammar = build(GrammarBuilder::new("g").rule("as", lit("a").many()));
    assert!(grammar.recognize("as", b"").unwrap());
    assert!(grammar.recognize("as", b"a").unwrap());
    assert!(grammar.recognize("as", &[b'a'; 500]).unwrap());
    assert!(!grammar.recognize("as", b"ab").unwrap());

    let tree = grammar.parse("as", b"aaaa").unwrap().first();
    assert_eq!(tree.children().len(), 4);
}

#[test]
fn test_at_least_repetition() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("x").at_least(2)));
    assert!(!grammar.recognize("r", b"x").unwrap());
    assert!(grammar.recognize("r", b"xx").unwrap());
    assert!(grammar.recognize("r", b"xxxxxx").unwrap());
}

#[test]
fn test_optional() {
    let grammar = build(
        GrammarBuilder::new("g").rule("signed", lit("-").optional() >> range(b'0', b'9')),
    );
    assert!(grammar.recognize("signed", b"5").unwrap());
    assert!(grammar.recognize("signed", b"-5").unwrap());
    assert!(!grammar.recognize("signed", b"--5").unwrap());
}

#[test]
fn test_zero_upper_bound_matches_only_empty() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("a").repeat(0, Some(0))));
    assert!(grammar.recognize("r", b"").unwrap());
    assert!(!grammar.recognize("r", b"a").unwrap());
}

// ============================================================================
// Nullable Construct Tests
// ============================================================================

#[test]
fn test_nullable_repetition_terminates() {
    // Repetition with lower = 0 over an empty concatenation.
    let grammar = build(
        GrammarBuilder::new("g").rule("r", seq(Vec::<Lit>::new()).many()),
    );
    let forest = grammar.parse("r", b"").expect("nullable repetition matches empty input");
    assert_eq!(forest.first().span(), 0..0);
    assert!(!grammar.recognize("r", b"a").unwrap());
}

#[test]
fn test_nullable_repetition_with_lower_bound() {
    let grammar = build(
        GrammarBuilder::new("g").rule("r", (lit("a").optional()).repeat(3, None)),
    );
    assert!(grammar.recognize("r", b"").unwrap());
    assert!(grammar.recognize("r", b"aa").unwrap());
    assert!(grammar.recognize("r", b"aaaaa").unwrap());
}

#[test]
fn test_nested_nullable_alternations() {
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("r", (empty() | (empty() | lit("x"))) >> (lit("y") | empty())),
    );
    let inputs: [&[u8]; 4] = [b"", b"x", b"y", b"xy"];
    for input in inputs {
        assert!(grammar.recognize("r", input).unwrap(), "input {:?}", input);
    }
    assert!(!grammar.recognize("r", b"yx").unwrap());
}

// ============================================================================
// Recursion Tests
// ============================================================================

#[test]
fn test_right_recursion_with_empty_base() {
    // R = "x" R / ""
    let grammar = build(
        GrammarBuilder::new("g").rule("r", (lit("x") >> call("r")) | lit("")),
    );
    let forest = grammar.parse("r", b"xxx").unwrap();
    assert_eq!(forest.first().span(), 0..3);
    assert_eq!(forest.iter().count(), 1);

    let forest = grammar.parse("r", b"").unwrap();
    assert_eq!(forest.first().span(), 0..0);
}

#[test]
fn test_left_recursion() {
    // list = list "," item / item
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("list", (call("list") >> lit(",") >> call("item")) | call("item"))
            .rule("item", range(b'a', b'z')),
    );
    assert!(grammar.recognize("list", b"a").unwrap());
    assert!(grammar.recognize("list", b"a,b,c,d").unwrap());
    assert!(!grammar.recognize("list", b"a,").unwrap());

    let forest = grammar.parse("list", b"a,b,c").unwrap();
    assert!(!forest.is_ambiguous());
    // Left-nested: the leftmost child spans everything but the last item.
    let tree = forest.first();
    let concat = &tree.children()[0];
    assert_eq!(concat.children()[0].span(), 0..3);
}

#[test]
fn test_mutual_recursion() {
    // even = "" / "a" odd ; odd = "a" even
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("even", lit("") | (lit("a") >> call("odd")))
            .rule("odd", lit("a") >> call("even")),
    );
    assert!(grammar.recognize("even", b"").unwrap());
    assert!(grammar.recognize("even", b"aaaa").unwrap());
    assert!(!grammar.recognize("even", b"aaa").unwrap());
    assert!(grammar.recognize("odd", b"aaa").unwrap());
}

#[test]
fn test_hidden_left_recursion() {
    // a = b a "x" / "y" ; b = ""  (left recursion behind a nullable call)
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("a", (call("b") >> call("a") >> lit("x")) | lit("y"))
            .rule("b", lit("")),
    );
    assert!(grammar.recognize("a", b"y").unwrap());
    assert!(grammar.recognize("a", b"yxx").unwrap());
    assert!(!grammar.recognize("a", b"x").unwrap());
}

#[test]
fn test_arithmetic_expressions() {
    let grammar = build(
        GrammarBuilder::new("arith")
            .rule("expr", (call("expr") >> byte(b'+') >> call("term")) | call("term"))
            .rule("term", (call("term") >> byte(b'*') >> call("factor")) | call("factor"))
            .rule(
                "factor",
                (byte(b'(') >> call("expr") >> byte(b')')) | range(b'0', b'9').many1(),
            ),
    );
    let inputs: [&[u8]; 6] = [b"1", b"1+2", b"1+2*3", b"(1+2)*3", b"((42))", b"12*(3+4)*5"];
    for input in inputs {
        let forest = grammar.parse("expr", input).unwrap();
        assert!(!forest.is_ambiguous(), "input {:?}", input);
    }
    assert!(!grammar.recognize("expr", b"1+").unwrap());
    assert!(!grammar.recognize("expr", b"(1").unwrap());
}

// ============================================================================
// Start Rule and Imports Tests
// ============================================================================

#[test]
fn test_any_rule_can_start() {
    let grammar = build(
        GrammarBuilder::new("g")
            .rule("pair", call("digit") >> call("digit"))
            .rule("digit", range(b'0', b'9')),
    );
    assert!(grammar.recognize("digit", b"7").unwrap());
    assert!(grammar.recognize("pair", b"77").unwrap());
}

#[test]
fn test_undefined_start_rule() {
    let grammar = build(GrammarBuilder::new("g").rule("a", lit("a")));
    let err = grammar.parse("b", b"a").unwrap_err();
    assert!(matches!(err, ParseError::UndefinedRule { ref rule, .. } if rule == "b"));
    assert!(err.is_fatal());
}

#[test]
fn test_imported_rules() {
    let core = std::sync::Arc::new(build(
        GrammarBuilder::new("core")
            .rule("ALPHA", range(b'A', b'Z') | range(b'a', b'z'))
            .rule("DIGIT", range(b'0', b'9')),
    ));
    let grammar = build(
        GrammarBuilder::new("ident")
            .import(core)
            .rule("ident", call("ALPHA") >> (call("ALPHA") | call("DIGIT")).many()),
    );
    assert!(grammar.recognize("ident", b"x1y2").unwrap());
    assert!(!grammar.recognize("ident", b"1x").unwrap());
    // Imported rules can be used as start rules too.
    assert!(grammar.recognize("DIGIT", b"4").unwrap());
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_chart_parser_direct_use() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("ab").many()));
    let parser = ChartParser::new(&grammar, b"abab");
    assert_eq!(parser.input(), b"abab");
    let forest = parser.parse("r").unwrap();
    assert_eq!(forest.first().children().len(), 2);
    // A parser can be reused for another start rule or the same one.
    assert!(parser.recognize("r").unwrap());
}

#[test]
fn test_max_input_size() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("a").many()));
    let config = ParserConfig::new().with_max_input_size(3);
    let err = ChartParser::with_config(&grammar, b"aaaa", config)
        .parse("r")
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::ResourceExceeded {
            resource: Resource::InputSize,
            used: 4,
            limit: 3
        }
    ));
    assert!(ChartParser::with_config(&grammar, b"aaa", config)
        .parse("r")
        .is_ok());
}

#[test]
fn test_early_failure_on_large_input() {
    let grammar = build(GrammarBuilder::new("g").rule("r", range(b'a', b'z')));
    let mut input = vec![b'0'; 8 * 1024 * 1024];
    let failure = grammar.parse("r", &input).unwrap_err();
    let failure = failure.failure().expect("ordinary parse failure");
    assert_eq!(failure.position, 0);
    assert_eq!(failure.found, Some(b'0'));

    input[0] = b'q';
    let failure = grammar.parse("r", &input).unwrap_err();
    let failure = failure.failure().expect("ordinary parse failure");
    assert_eq!(failure.position, 1);
    assert!(failure.expected.is_empty());
}

#[test]
fn test_max_frames() {
    let grammar = build(GrammarBuilder::new("g").rule("r", lit("a").many()));
    let config = ParserConfig::new().with_max_frames(10);
    let err = ChartParser::with_config(&grammar, &[b'a'; 100], config)
        .parse("r")
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::ResourceExceeded {
            resource: Resource::Frames,
            ..
        }
    ));
}

#[test]
fn test_max_derivations() {
    let grammar = build(
        GrammarBuilder::new("g").rule("s", (call("s") >> call("s")) | lit("x")),
    );
    let config = ParserConfig::new().with_max_derivations(20);
    let err = ChartParser::with_config(&grammar, &[b'x'; 30], config)
        .parse("s")
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::ResourceExceeded {
            resource: Resource::Derivations,
            ..
        }
    ));
}

#[test]
fn test_default_config_is_unlimited_except_input() {
    let config = ParserConfig::default();
    assert_eq!(config.max_input_size, 100 * 1024 * 1024);
    assert_eq!(config.max_frames, 0);
    assert_eq!(config.max_derivations, 0);
    assert_eq!(config.timeout_ms, 0);
}
