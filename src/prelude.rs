//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from
//! abnf-earley. Importing this module with a wildcard import brings the core
//! types and the grammar DSL into scope:
//!
//! ```
//! use abnf_earley::prelude::*;
//!
//! let grammar = GrammarBuilder::new("g")
//!     .rule("ab", lit("a") >> lit("b").optional())
//!     .build()
//!     .unwrap();
//! assert!(grammar.recognize("ab", b"a").unwrap());
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - Validated grammar with rules and imports
//! - [`ChartParser`] - Main parser type
//! - [`ParserConfig`] - Resource limits
//! - [`Forest`] - All parses of one input
//! - [`ParseTree`] - One parse tree
//!
//! ## Grammar DSL
//! - [`lit()`] / [`lit_nocase()`] - Match a literal string
//! - [`bytes()`] / [`byte()`] - Match exact bytes
//! - [`range()`] - Match one byte in a range
//! - [`call()`] - Reference to another rule
//! - [`seq()`] / [`alt()`] - Concatenation and alternation of many patterns
//! - [`empty()`] - Match the empty string
//! - [`dynamic()`] - Type-erased pattern
//! - [`GrammarBuilder`] - Builder for constructing grammars
//! - [`Pattern`] - Trait for pattern types
//! - [`PatternExt`] - Extension trait for pattern combinators
//!
//! ## Error Handling
//! - [`ParseError`] - Parse error type
//! - [`ParseFailure`] - Furthest failure with expected terminals
//! - [`GrammarError`] - Grammar construction error

// ============================================================================
// Core Types
// ============================================================================

pub use crate::earley::{ChartParser, Forest, Grammar, ParseTree, ParserConfig};

// ============================================================================
// Grammar DSL
// ============================================================================

pub use crate::earley::grammar_dsl::{
    alt, byte, bytes, call, dynamic, empty, lit, lit_nocase, range, seq, GrammarBuilder, Pattern,
    PatternExt,
};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::earley::error::{GrammarError, ParseError, ParseFailure};
