//! Parse driver
//!
//! [`ChartParser`] runs the chart over an input, one position at a time:
//! closure, then scanning, until the input is exhausted or no frame is left
//! alive. The input is accepted when the start rule's root element was
//! recognized over the whole input; the memo then becomes a [`Forest`].
//! Otherwise the furthest position that still had live frames is reported,
//! together with the terminals that failed to match there.
//!
//! Parsing is bounded by [`ParserConfig`]: input size, frame and derivation
//! counts, and an optional wall-clock timeout.

use super::chart::Chart;
use super::error::{Expected, ParseError, ParseFailure, Resource};
use super::forest::{Forest, ParseStats};
use super::grammar::{ElementKey, Grammar, GrammarSet};
use super::memo::SpanKey;
use super::stepper::Stepper;
use std::time::Instant;

/// Default maximum input size: 100 MB
pub const DEFAULT_MAX_INPUT_SIZE: usize = 100 * 1024 * 1024;

/// Default maximum number of frames (0 = no limit)
pub const DEFAULT_MAX_FRAMES: usize = 0;

/// Default maximum number of recorded derivations (0 = no limit)
pub const DEFAULT_MAX_DERIVATIONS: usize = 0;

/// Default timeout in milliseconds (0 = no timeout)
pub const DEFAULT_TIMEOUT_MS: u64 = 0;

/// Check interval for timeout (number of agenda steps between checks)
const TIMEOUT_CHECK_INTERVAL: u64 = 1000;

/// Parser configuration for resource limits
///
/// Use this to guard against pathological grammars or inputs. Chart parsing
/// is cubic in the worst case, so a hostile input against an ambiguous
/// grammar can take a long time without any limit.
///
/// # Example
///
/// ```rust
/// use abnf_earley::earley::ParserConfig;
///
/// let config = ParserConfig::default()
///     .with_max_input_size(1024 * 1024)
///     .with_max_frames(1_000_000)
///     .with_timeout_ms(5000);
/// assert_eq!(config.timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum allowed input size in bytes
    pub max_input_size: usize,

    /// Maximum number of frames across the chart (0 = no limit)
    pub max_frames: usize,

    /// Maximum number of derivations in the memo (0 = no limit)
    pub max_derivations: usize,

    /// Timeout in milliseconds (0 = no timeout)
    pub timeout_ms: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_frames: DEFAULT_MAX_FRAMES,
            max_derivations: DEFAULT_MAX_DERIVATIONS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ParserConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum number of frames
    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    /// Set the maximum number of derivations
    pub fn with_max_derivations(mut self, derivations: usize) -> Self {
        self.max_derivations = derivations;
        self
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

/// Enforces the frame, derivation and time limits while a parse runs
#[derive(Debug)]
pub(crate) struct ResourceGuard {
    max_frames: usize,
    max_derivations: usize,
    timeout_ms: u64,
    started: Option<Instant>,
    steps: u64,
}

impl ResourceGuard {
    pub(crate) fn new(config: &ParserConfig) -> Self {
        Self {
            max_frames: config.max_frames,
            max_derivations: config.max_derivations,
            timeout_ms: config.timeout_ms,
            started: (config.timeout_ms > 0).then(Instant::now),
            steps: 0,
        }
    }

    /// Count one agenda step and check every limit against the chart
    #[inline]
    pub(crate) fn tick(&mut self, chart: &Chart) -> Result<(), ParseError> {
        self.steps += 1;

        if self.max_frames > 0 && chart.frame_count() > self.max_frames {
            return Err(ParseError::ResourceExceeded {
                resource: Resource::Frames,
                used: chart.frame_count() as u64,
                limit: self.max_frames as u64,
            });
        }

        let derivations = chart.memo().derivation_count();
        if self.max_derivations > 0 && derivations > self.max_derivations {
            return Err(ParseError::ResourceExceeded {
                resource: Resource::Derivations,
                used: derivations as u64,
                limit: self.max_derivations as u64,
            });
        }

        self.check_timeout()
    }

    fn check_timeout(&self) -> Result<(), ParseError> {
        if self.timeout_ms == 0 || self.steps % TIMEOUT_CHECK_INTERVAL != 0 {
            return Ok(());
        }
        if let Some(started) = self.started {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if elapsed_ms > self.timeout_ms {
                return Err(ParseError::ResourceExceeded {
                    resource: Resource::Time,
                    used: elapsed_ms,
                    limit: self.timeout_ms,
                });
            }
        }
        Ok(())
    }
}

/// Chart parser over one input
///
/// # Example
///
/// ```rust
/// use abnf_earley::earley::grammar_dsl::*;
/// use abnf_earley::earley::ChartParser;
///
/// let grammar = GrammarBuilder::new("g")
///     .rule("r", lit("a") | lit("a"))
///     .build()
///     .unwrap();
/// let forest = ChartParser::new(&grammar, b"a").parse("r").unwrap();
/// assert_eq!(forest.iter().count(), 2);
/// ```
pub struct ChartParser<'g, 'i> {
    grammar: &'g Grammar,
    input: &'i [u8],
    config: ParserConfig,
}

impl<'g, 'i> ChartParser<'g, 'i> {
    /// Create a parser with the default configuration
    pub fn new(grammar: &'g Grammar, input: &'i [u8]) -> Self {
        Self::with_config(grammar, input, ParserConfig::default())
    }

    /// Create a parser with an explicit configuration
    pub fn with_config(grammar: &'g Grammar, input: &'i [u8], config: ParserConfig) -> Self {
        Self {
            grammar,
            input,
            config,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// The input being parsed
    pub fn input(&self) -> &'i [u8] {
        self.input
    }

    fn check_input_size(&self) -> Result<(), ParseError> {
        if self.config.max_input_size > 0 && self.input.len() > self.config.max_input_size {
            return Err(ParseError::ResourceExceeded {
                resource: Resource::InputSize,
                used: self.input.len() as u64,
                limit: self.config.max_input_size as u64,
            });
        }
        Ok(())
    }

    /// Parse the whole input as `start_rule`
    ///
    /// Returns every parse of the input as a [`Forest`], or the furthest
    /// failure. Parsing the same input twice gives the same result.
    pub fn parse(&self, start_rule: &str) -> Result<Forest<'g>, ParseError> {
        self.check_input_size()?;

        let set = GrammarSet::new(self.grammar);
        let root = set.rule_key(start_rule)?;
        log_debug!(
            "Starting parse: input_len={}, start_rule={}, grammar={}",
            self.input.len(),
            start_rule,
            self.grammar.name()
        );

        let mut stepper = Stepper::new(set, self.input, ResourceGuard::new(&self.config));
        stepper.seed(root);

        let mut furthest = 0;
        let mut failed = Vec::new();
        for position in 0..=self.input.len() {
            if position >= stepper.chart().horizon() {
                break;
            }
            if !stepper.has_work(position) {
                continue;
            }
            stepper.close(position)?;
            failed = stepper.scan(position);
            furthest = position;
        }

        let stats = ParseStats {
            input_len: self.input.len(),
            furthest,
            frames: stepper.chart().frame_count(),
            joins: stepper.chart().join_count(),
            spans: stepper.chart().memo().len(),
            derivations: stepper.chart().memo().derivation_count(),
        };
        let span = SpanKey {
            element: root,
            start: 0,
            end: self.input.len(),
        };

        if stepper.chart().memo().contains(&span) {
            log_debug!(
                "Parse successful: frames={}, spans={}, derivations={}",
                stats.frames,
                stats.spans,
                stats.derivations
            );
            let (set, chart) = stepper.into_parts();
            return Ok(Forest::new(set, chart.into_memo(), span, stats));
        }

        let failure = self.failure(stepper.set(), furthest, &failed);
        log_debug!("Parse failed: {}", failure);
        Err(ParseError::Failed(failure))
    }

    /// Check whether the input is in the language of `start_rule`
    pub fn recognize(&self, start_rule: &str) -> Result<bool, ParseError> {
        match self.parse(start_rule) {
            Ok(_) => Ok(true),
            Err(ParseError::Failed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn failure(
        &self,
        set: &GrammarSet<'g>,
        position: usize,
        failed: &[ElementKey],
    ) -> ParseFailure {
        let expected = failed
            .iter()
            .map(|&key| {
                let grammar = set.grammar(key.slot);
                Expected {
                    description: grammar.display_element(key.id).to_string(),
                    kind: set.element(key).kind(),
                    rule: set.rule_name(key).to_string(),
                    grammar: grammar.name().to_string(),
                }
            })
            .collect();

        ParseFailure {
            position,
            found: self.input.get(position).copied(),
            expected,
        }
    }
}
