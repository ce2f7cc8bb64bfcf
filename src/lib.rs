//! abnf-earley - Chart Parser for ABNF-style Grammars
//!
//! A general context-free parser over byte input. Grammars are written as
//! ABNF-style rules (alternation, concatenation, bounded repetition, literal
//! strings, byte ranges, rule calls) and may be left recursive, ambiguous or
//! nullable. The parser returns every parse at once as a shared forest.
//!
//! It provides:
//! - Chart-based (Earley-style) parsing with shared continuations, so left
//!   recursion and repeated calls terminate
//! - Ambiguity-preserving parse forests with lazy tree enumeration
//! - Furthest-failure diagnostics with expected terminals and line/column
//! - A combinator DSL for building grammars in code, ABNF rendering and JSON
//!   (de)serialization of grammars
//! - Static grammar analysis (nullable, unreachable and unproductive rules)
//! - Developer tools (tree printing, DOT forest visualization)
//! - Batch parsing of many inputs against one grammar
//!
//! ## Quick Start
//!
//! ```rust
//! use abnf_earley::earley::grammar_dsl::*;
//!
//! // sum = sum "+" num / num
//! // num = 1*%x30-39
//! let grammar = GrammarBuilder::new("arith")
//!     .rule("sum", (call("sum") >> lit("+") >> call("num")) | call("num"))
//!     .rule("num", range(b'0', b'9').many1())
//!     .build()
//!     .unwrap();
//!
//! let forest = grammar.parse("sum", b"1+22+3").unwrap();
//! let tree = forest.first();
//! assert_eq!(tree.span(), 0..6);
//! assert!(!forest.is_ambiguous());
//! ```
//!
//! ## Ambiguity
//!
//! ```rust
//! use abnf_earley::earley::grammar_dsl::*;
//!
//! // e = e "-" e / "1"
//! let grammar = GrammarBuilder::new("minus")
//!     .rule("e", (call("e") >> lit("-") >> call("e")) | lit("1"))
//!     .build()
//!     .unwrap();
//!
//! let forest = grammar.parse("e", b"1-1-1").unwrap();
//! assert_eq!(forest.iter().count(), 2);
//! ```
//!
//! ## Grammars as Data
//!
//! ```rust
//! use abnf_earley::Grammar;
//!
//! let grammar_json = r#"{
//!     "name": "hello",
//!     "rules": [ { "name": "greeting", "root": 0 } ],
//!     "elements": [ { "LiteralString": { "bytes": [104, 105] } } ]
//! }"#;
//!
//! let grammar = Grammar::from_json(grammar_json).unwrap();
//! assert!(grammar.recognize("greeting", b"hi").unwrap());
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Enable parallel batch parsing using `rayon`

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
// Allow some pedantic lints that are too noisy
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

// Prelude module for convenient imports
pub mod prelude;

// Grammar model, chart parser and forest
pub mod earley;

/// Re-export commonly used types for convenience
pub use earley::{
    // Debug tools
    debug::{ForestPrinter, TreePrinter},
    // Errors
    error::{Expected, GrammarError, ParseError, ParseFailure, Resource},
    // Forest
    forest::{Forest, ForestNode, ParseStats, ParseTree, Trees},
    // Grammar model
    grammar::{Element, ElementId, ElementKind, Grammar, Rule},
    // Analysis
    grammar_analysis::{GrammarAnalyzer, GrammarWarning, WarningKind},
    // Grammar DSL
    grammar_dsl::{GrammarBuilder, Pattern, PatternExt},
    // Batch parsing
    parallel::parse_batch,
    // Parser
    parser::{ChartParser, ParserConfig},
    source_location::SourcePosition,
};

#[cfg(feature = "rayon")]
pub use earley::parallel::parse_batch_parallel;
