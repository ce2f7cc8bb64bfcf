//! Batch parsing
//!
//! Many independent inputs can be parsed against one shared grammar. A
//! [`Grammar`] is immutable and `Sync`; every parse builds and owns its own
//! chart, so the only thing shared between parses is the grammar itself.
//!
//! # Feature Flag
//!
//! [`parse_batch`] is always available and parses the inputs one after the
//! other. With the `parallel` feature, [`parse_batch_parallel`] spreads the
//! inputs over the rayon thread pool:
//!
//! ```toml
//! [dependencies]
//! abnf-earley = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! # Example
//!
//! ```
//! use abnf_earley::earley::grammar_dsl::*;
//! use abnf_earley::earley::parse_batch;
//!
//! let grammar = GrammarBuilder::new("num")
//!     .rule("number", range(b'0', b'9').many1())
//!     .build()
//!     .unwrap();
//!
//! let inputs: [&[u8]; 3] = [b"12", b"x", b"345"];
//! let results = parse_batch(&grammar, "number", &inputs);
//!
//! // Results are in the same order as the inputs
//! assert!(results[0].is_ok());
//! assert!(results[1].is_err());
//! assert!(results[2].is_ok());
//! ```

use super::error::ParseError;
use super::forest::Forest;
use super::grammar::Grammar;
use super::parser::{ChartParser, ParserConfig};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Parse every input from `rule`, sequentially
///
/// Results are in the same order as the inputs.
pub fn parse_batch<'g>(
    grammar: &'g Grammar,
    rule: &str,
    inputs: &[&[u8]],
) -> Vec<Result<Forest<'g>, ParseError>> {
    parse_batch_with_config(grammar, rule, inputs, ParserConfig::default())
}

/// [`parse_batch`] with explicit resource limits, applied to each parse
pub fn parse_batch_with_config<'g>(
    grammar: &'g Grammar,
    rule: &str,
    inputs: &[&[u8]],
    config: ParserConfig,
) -> Vec<Result<Forest<'g>, ParseError>> {
    log_debug!("batch parse of {} inputs from '{}'", inputs.len(), rule);
    inputs
        .iter()
        .map(|input| ChartParser::with_config(grammar, input, config).parse(rule))
        .collect()
}

/// Parse every input from `rule` on the rayon thread pool
///
/// Results are in the same order as the inputs. Each parse runs on a single
/// thread with its own chart.
#[cfg(feature = "rayon")]
pub fn parse_batch_parallel<'g>(
    grammar: &'g Grammar,
    rule: &str,
    inputs: &[&[u8]],
) -> Vec<Result<Forest<'g>, ParseError>> {
    parse_batch_parallel_with_config(grammar, rule, inputs, ParserConfig::default())
}

/// [`parse_batch_parallel`] with explicit resource limits, applied to each
/// parse
#[cfg(feature = "rayon")]
pub fn parse_batch_parallel_with_config<'g>(
    grammar: &'g Grammar,
    rule: &str,
    inputs: &[&[u8]],
    config: ParserConfig,
) -> Vec<Result<Forest<'g>, ParseError>> {
    log_debug!("parallel batch parse of {} inputs from '{}'", inputs.len(), rule);
    inputs
        .par_iter()
        .map(|input| ChartParser::with_config(grammar, input, config).parse(rule))
        .collect()
}
