//! Chart parsing core
//!
//! This module contains the grammar model, the chart-based recognizer and the
//! shared parse forest it produces.
//!
//! # Module Organization
//!
//! ## Grammar Model
//! - [`grammar`] - Grammars, rules and grammar elements
//! - [`grammar_dsl`] - Combinator DSL for building grammars in code
//! - [`abnf`] - ABNF rendering of grammars and elements
//! - [`grammar_analysis`] - Static checks (nullable, unproductive rules, ...)
//!
//! ## Engine
//! - [`arena`] - Frame storage
//! - [`memo`] - Completion and partial-progress memo
//! - [`chart`] - Per-position frame sets and join nodes
//! - [`stepper`] - Closure and scanning steps
//! - [`parser`] - Parse driver, configuration and resource limits
//!
//! ## Results
//! - [`forest`] - Shared parse forest and tree enumeration
//! - [`error`] - Grammar and parse errors
//! - [`source_location`] - Line/column tracking for diagnostics
//!
//! ## Tooling
//! - [`debug`] - Tree printing and forest visualization
//! - [`parallel`] - Batch parsing (parallel with the `parallel` feature)

// ============================================================================
// Logging
// ============================================================================

/// No-op logging when the `logging` feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

// ============================================================================
// Module Declarations
// ============================================================================

pub mod abnf;
pub mod arena;
pub mod chart;
pub mod debug;
pub mod error;
pub mod forest;
pub mod grammar;
pub mod grammar_analysis;
pub mod grammar_dsl;
pub mod memo;
pub mod parallel;
pub mod parser;
pub mod source_location;
pub mod stepper;

// ============================================================================
// Re-exports
// ============================================================================

pub use debug::{ForestPrinter, TreePrinter};
pub use error::{Expected, GrammarError, ParseError, ParseFailure, Resource};
pub use forest::{
    Forest, ForestNode, PackedNode, ParseStats, ParseTree, PrefixLink, PrefixNode, Trees,
};
pub use grammar::{Element, ElementId, ElementKind, Grammar, Rule, RuleRef};
pub use grammar_analysis::{GrammarAnalyzer, GrammarWarning, WarningKind};
pub use grammar_dsl::{GrammarBuilder, Pattern, PatternExt};
pub use parallel::{parse_batch, parse_batch_with_config};
#[cfg(feature = "rayon")]
pub use parallel::{parse_batch_parallel, parse_batch_parallel_with_config};
pub use parser::{ChartParser, ParserConfig};
pub use source_location::SourcePosition;

/// Hash map used throughout the engine (hashbrown with ahash)
pub(crate) type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Hash set companion to [`FastMap`]
pub(crate) type FastSet<K> = hashbrown::HashSet<K, ahash::RandomState>;
