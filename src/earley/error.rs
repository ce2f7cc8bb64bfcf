//! Grammar and parse errors
//!
//! [`GrammarError`] is reported while building or resolving a grammar.
//! [`ParseError`] is the failure side of a parse: either the input is not in
//! the language ([`ParseError::Failed`], carrying a [`ParseFailure`] with the
//! furthest position reached and the terminals expected there), or the parse
//! could not be carried out at all.

use super::grammar::{ElementId, ElementKind};
use super::source_location::{format_context, SourcePosition};
use std::fmt;

/// Errors raised while constructing or resolving grammars
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// A rule name does not resolve in the grammar or its imports
    UndefinedRule {
        /// The rule that was looked up
        rule: String,
        /// Grammar the lookup started from
        grammar: String,
        /// Where the reference was made
        location: String,
    },

    /// Two rules of one grammar share a name
    DuplicateRule {
        /// The duplicated name
        rule: String,
        /// Grammar containing both rules
        grammar: String,
    },

    /// An element is reachable from more than one parent
    SharedElement {
        /// The shared element
        element: ElementId,
        /// Grammar containing it
        grammar: String,
        /// Rule in which the second reference was found
        location: String,
    },

    /// An element id is dangling or otherwise malformed
    InvalidElement {
        /// The offending element
        element: ElementId,
        /// Grammar containing it
        grammar: String,
        /// What is wrong with it
        reason: String,
    },

    /// A byte range with `first > last`
    InvalidRange {
        /// Lower byte
        first: u8,
        /// Upper byte
        last: u8,
        /// Where the range is
        location: String,
    },

    /// A repetition with `upper < lower`
    InvalidBounds {
        /// Minimum iterations
        lower: u32,
        /// Maximum iterations
        upper: u32,
        /// Where the repetition is
        location: String,
    },

    /// Grammar JSON could not be read or written
    Json {
        /// Error reported by serde_json
        message: String,
    },
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::UndefinedRule {
                rule,
                grammar,
                location,
            } => {
                write!(
                    f,
                    "Rule '{}' not defined in grammar '{}' (referenced from {})",
                    rule, grammar, location
                )
            }
            GrammarError::DuplicateRule { rule, grammar } => {
                write!(f, "Rule '{}' defined twice in grammar '{}'", rule, grammar)
            }
            GrammarError::SharedElement {
                element,
                grammar,
                location,
            } => {
                write!(
                    f,
                    "Element {} in grammar '{}' is used more than once (again in {})",
                    element, grammar, location
                )
            }
            GrammarError::InvalidElement {
                element,
                grammar,
                reason,
            } => {
                write!(
                    f,
                    "Invalid element {} in grammar '{}': {}",
                    element, grammar, reason
                )
            }
            GrammarError::InvalidRange {
                first,
                last,
                location,
            } => {
                write!(
                    f,
                    "Invalid range %x{:02X}-{:02X} in {}: first byte exceeds last",
                    first, last, location
                )
            }
            GrammarError::InvalidBounds {
                lower,
                upper,
                location,
            } => {
                write!(
                    f,
                    "Invalid repetition bounds {}*{} in {}: upper bound below lower bound",
                    lower, upper, location
                )
            }
            GrammarError::Json { message } => write!(f, "Grammar JSON error: {}", message),
        }
    }
}

impl std::error::Error for GrammarError {}

/// A terminal the parser could have consumed at the failure position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expected {
    /// ABNF rendering of the terminal, e.g. `%x61-7A` or `%s"if"`
    pub description: String,
    /// Kind of the terminal element
    pub kind: ElementKind,
    /// Rule containing the terminal
    pub rule: String,
    /// Grammar containing the terminal
    pub grammar: String,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Diagnostic for input that is not in the language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// Furthest byte offset at which any parse was still alive
    pub position: usize,
    /// Byte at `position`, `None` at end of input
    pub found: Option<u8>,
    /// Terminals that failed to match at `position`. Empty means the only
    /// acceptable continuation was the end of input.
    pub expected: Vec<Expected>,
}

impl ParseFailure {
    /// Whether the parser wanted the input to end at `position`
    pub fn expected_end_of_input(&self) -> bool {
        self.expected.is_empty()
    }

    /// Line/column of the failure position
    pub fn source_position(&self, input: &[u8]) -> SourcePosition {
        SourcePosition::from_offset(input, self.position)
    }

    /// Multi-line report with line/column and a caret under the failing byte
    pub fn format_with_source(&self, input: &[u8]) -> String {
        format!(
            "{} ({})\n{}",
            self,
            self.source_position(input),
            format_context(input, self.position)
        )
    }
}

fn describe_byte(f: &mut fmt::Formatter<'_>, byte: u8) -> fmt::Result {
    if byte.is_ascii_graphic() || byte == b' ' {
        write!(f, "byte 0x{:02X} ('{}')", byte, byte as char)
    } else {
        write!(f, "byte 0x{:02X}", byte)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected.as_slice() {
            [] => f.write_str("expected end of input")?,
            [single] => write!(f, "expected {}", single)?,
            many => {
                f.write_str("expected one of ")?;
                for (i, e) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
            }
        }
        f.write_str(", got ")?;
        match self.found {
            Some(byte) => describe_byte(f, byte)?,
            None => f.write_str("end of input")?,
        }
        write!(f, " at offset {}", self.position)
    }
}

/// Resource limited by [`ParserConfig`](super::parser::ParserConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Input length in bytes
    InputSize,
    /// Frames created across the chart
    Frames,
    /// Derivations recorded in the memo
    Derivations,
    /// Wall-clock time in milliseconds
    Time,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::InputSize => "input size (bytes)",
            Resource::Frames => "frames",
            Resource::Derivations => "derivations",
            Resource::Time => "time (ms)",
        })
    }
}

/// Error type for parse operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input is not in the language of the start rule
    Failed(ParseFailure),

    /// The start rule, or a rule reached during the parse, does not resolve
    UndefinedRule {
        /// Rule that was looked up
        rule: String,
        /// Grammar the lookup started from
        grammar: String,
    },

    /// The grammar is malformed
    Grammar(GrammarError),

    /// A configured limit was exceeded; the parse was abandoned
    ResourceExceeded {
        /// Which limit
        resource: Resource,
        /// Amount used when the limit was hit
        used: u64,
        /// Configured limit
        limit: u64,
    },
}

impl ParseError {
    /// The failure diagnostic, for [`ParseError::Failed`]
    pub fn failure(&self) -> Option<&ParseFailure> {
        match self {
            ParseError::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the error says something about the grammar or configuration
    /// rather than about the input
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::Failed(_))
    }

    /// Add source position information to the error message
    pub fn format_with_position(&self, input: &[u8]) -> String {
        match self {
            ParseError::Failed(failure) => format!(
                "Parse failed at {}: {}",
                failure.source_position(input),
                failure
            ),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Failed(failure) => write!(f, "Parse failed: {}", failure),
            ParseError::UndefinedRule { rule, grammar } => {
                write!(f, "Rule '{}' not defined in grammar '{}'", rule, grammar)
            }
            ParseError::Grammar(err) => write!(f, "Invalid grammar: {}", err),
            ParseError::ResourceExceeded {
                resource,
                used,
                limit,
            } => {
                write!(
                    f,
                    "Resource limit exceeded: {} {} exceeds limit of {}",
                    resource, used, limit
                )
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<GrammarError> for ParseError {
    fn from(err: GrammarError) -> Self {
        match err {
            GrammarError::UndefinedRule { rule, grammar, .. } => {
                ParseError::UndefinedRule { rule, grammar }
            }
            other => ParseError::Grammar(other),
        }
    }
}
