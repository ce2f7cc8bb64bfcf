//! Grammar DSL - building grammars in Rust code
//!
//! Patterns are small combinator values that are lowered into a grammar's
//! element arena by [`GrammarBuilder::rule`]. Chains of `then` / `>>` flatten
//! into a single concatenation and chains of `or` / `|` into a single
//! alternation, so `a.or(b).or(c)` has three alternatives.
//!
//! # Example
//!
//! ```rust
//! use abnf_earley::earley::grammar_dsl::*;
//!
//! let grammar = GrammarBuilder::new("expr")
//!     .rule("sum", call("num").then(lit("+").then(call("num")).many()))
//!     .rule("num", range(b'0', b'9').many1())
//!     .build()
//!     .unwrap();
//! assert!(grammar.recognize("sum", b"1+22+3").unwrap());
//! ```

use super::error::GrammarError;
use super::grammar::{Element, ElementId, Grammar, Rule};
use std::ops::{BitOr, Shr};
use std::sync::Arc;

/// Pattern trait - implemented by all grammar combinators
pub trait Pattern {
    /// Lower this pattern into the builder's element arena
    fn build(self, builder: &mut GrammarBuilder) -> ElementId;

    /// Lower this pattern as one or more items of an enclosing concatenation
    #[doc(hidden)]
    fn build_sequence_items(self, builder: &mut GrammarBuilder, items: &mut Vec<ElementId>)
    where
        Self: Sized,
    {
        items.push(self.build(builder));
    }

    /// Lower this pattern as one or more alternatives of an enclosing
    /// alternation
    #[doc(hidden)]
    fn build_alternatives(self, builder: &mut GrammarBuilder, items: &mut Vec<ElementId>)
    where
        Self: Sized,
    {
        items.push(self.build(builder));
    }
}

/// Grammar builder
pub struct GrammarBuilder {
    name: String,
    elements: Vec<Element>,
    rules: Vec<Rule>,
    imports: Vec<Arc<Grammar>>,
}

impl GrammarBuilder {
    /// Create a builder for a grammar called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            rules: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Make the rules of `grammar` visible to rule calls in this grammar.
    /// Imports are searched in the order they are added.
    pub fn import(mut self, grammar: Arc<Grammar>) -> Self {
        self.imports.push(grammar);
        self
    }

    /// Add a rule
    pub fn rule(mut self, name: &str, pattern: impl Pattern) -> Self {
        self.rule_mut(name, pattern);
        self
    }

    /// Add a rule (mutable version, for builders filled in a loop)
    pub fn rule_mut(&mut self, name: &str, pattern: impl Pattern) -> &mut Self {
        let root = pattern.build(self);
        self.rules.push(Rule {
            name: name.to_string(),
            root,
        });
        self
    }

    /// Add an element directly
    pub fn add_element(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(element);
        id
    }

    /// Number of elements added so far
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Validate and build the grammar
    pub fn build(self) -> Result<Grammar, GrammarError> {
        Grammar::new(self.name, self.rules, self.elements, self.imports)
    }
}

// ============================================================================
// Terminals
// ============================================================================

/// Match a literal byte string
#[derive(Debug, Clone)]
pub struct Lit {
    bytes: Vec<u8>,
    case_sensitive: bool,
}

impl Pattern for Lit {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        builder.add_element(Element::LiteralString {
            bytes: self.bytes,
            case_sensitive: self.case_sensitive,
        })
    }
}

/// Match one byte in an inclusive range
#[derive(Debug, Clone, Copy)]
pub struct ByteRange {
    first: u8,
    last: u8,
}

impl Pattern for ByteRange {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        builder.add_element(Element::LiteralRange {
            first: self.first,
            last: self.last,
        })
    }
}

/// Call a rule by name
#[derive(Debug, Clone)]
pub struct Call(String);

impl Pattern for Call {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        builder.add_element(Element::RuleCall { rule: self.0 })
    }
}

/// Match the empty string (an empty concatenation)
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

impl Pattern for Empty {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        builder.add_element(Element::Concatenation {
            elements: Vec::new(),
        })
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Two patterns in sequence (`a >> b`)
#[derive(Debug, Clone)]
pub struct Then<A, B>(A, B);

impl<A: Pattern, B: Pattern> Pattern for Then<A, B> {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        let mut elements = Vec::new();
        self.build_sequence_items(builder, &mut elements);
        builder.add_element(Element::Concatenation { elements })
    }

    fn build_sequence_items(self, builder: &mut GrammarBuilder, items: &mut Vec<ElementId>) {
        self.0.build_sequence_items(builder, items);
        self.1.build_sequence_items(builder, items);
    }
}

/// Two alternatives (`a | b`)
#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

impl<A: Pattern, B: Pattern> Pattern for Or<A, B> {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        let mut alternatives = Vec::new();
        self.build_alternatives(builder, &mut alternatives);
        builder.add_element(Element::Alternation { alternatives })
    }

    fn build_alternatives(self, builder: &mut GrammarBuilder, items: &mut Vec<ElementId>) {
        self.0.build_alternatives(builder, items);
        self.1.build_alternatives(builder, items);
    }
}

/// A concatenation of any number of patterns of one type
#[derive(Debug, Clone)]
pub struct Seq<P>(pub Vec<P>);

impl<P: Pattern> Pattern for Seq<P> {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        let elements = self.0.into_iter().map(|p| p.build(builder)).collect();
        builder.add_element(Element::Concatenation { elements })
    }
}

/// An alternation of any number of patterns of one type
#[derive(Debug, Clone)]
pub struct Alt<P>(pub Vec<P>);

impl<P: Pattern> Pattern for Alt<P> {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        let alternatives = self.0.into_iter().map(|p| p.build(builder)).collect();
        builder.add_element(Element::Alternation { alternatives })
    }
}

/// Repetition of a pattern
#[derive(Debug, Clone)]
pub struct Repeat<P> {
    inner: P,
    lower: u32,
    upper: Option<u32>,
}

impl<P: Pattern> Pattern for Repeat<P> {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        let element = self.inner.build(builder);
        builder.add_element(Element::Repetition {
            element,
            lower: self.lower,
            upper: self.upper,
        })
    }
}

/// A type-erased pattern (for heterogeneous sequences/alternations)
pub struct Dynamic(Box<dyn DynPattern>);

/// Trait for type-erased patterns
pub trait DynPattern {
    /// Lower this pattern into the builder
    fn build_boxed(self: Box<Self>, builder: &mut GrammarBuilder) -> ElementId;
}

impl<P: Pattern + 'static> DynPattern for P {
    fn build_boxed(self: Box<Self>, builder: &mut GrammarBuilder) -> ElementId {
        (*self).build(builder)
    }
}

impl Pattern for Dynamic {
    fn build(self, builder: &mut GrammarBuilder) -> ElementId {
        self.0.build_boxed(builder)
    }
}

// ============================================================================
// Extension trait for Pattern
// ============================================================================

/// Builder methods available on every pattern
pub trait PatternExt: Pattern + Sized {
    /// Sequence: `self` then `other`
    fn then<B: Pattern>(self, other: B) -> Then<Self, B> {
        Then(self, other)
    }

    /// Alternative: `self` or `other`
    fn or<B: Pattern>(self, other: B) -> Or<Self, B> {
        Or(self, other)
    }

    /// Between `lower` and `upper` repetitions (`None` = unbounded)
    fn repeat(self, lower: u32, upper: Option<u32>) -> Repeat<Self> {
        Repeat {
            inner: self,
            lower,
            upper,
        }
    }

    /// Exactly `n` repetitions
    fn times(self, n: u32) -> Repeat<Self> {
        self.repeat(n, Some(n))
    }

    /// At least `n` repetitions
    fn at_least(self, n: u32) -> Repeat<Self> {
        self.repeat(n, None)
    }

    /// Zero or more repetitions
    fn many(self) -> Repeat<Self> {
        self.repeat(0, None)
    }

    /// One or more repetitions
    fn many1(self) -> Repeat<Self> {
        self.repeat(1, None)
    }

    /// Zero or one occurrence
    fn optional(self) -> Repeat<Self> {
        self.repeat(0, Some(1))
    }

    /// Box into a [`Dynamic`] pattern
    fn boxed(self) -> Dynamic
    where
        Self: 'static,
    {
        Dynamic(Box::new(self))
    }
}

impl<T: Pattern + Sized> PatternExt for T {}

// ============================================================================
// Operator Overloading (>> for sequence, | for alternation)
// ============================================================================

macro_rules! impl_operators {
    ($([$($gen:ident),*] $ty:ty),* $(,)?) => {$(
        impl<$($gen: Pattern,)* Rhs: Pattern> Shr<Rhs> for $ty {
            type Output = Then<Self, Rhs>;

            fn shr(self, rhs: Rhs) -> Self::Output {
                Then(self, rhs)
            }
        }

        impl<$($gen: Pattern,)* Rhs: Pattern> BitOr<Rhs> for $ty {
            type Output = Or<Self, Rhs>;

            fn bitor(self, rhs: Rhs) -> Self::Output {
                Or(self, rhs)
            }
        }
    )*};
}

impl_operators!(
    [] Lit,
    [] ByteRange,
    [] Call,
    [] Empty,
    [] Dynamic,
    [A, B] Then<A, B>,
    [A, B] Or<A, B>,
    [P] Seq<P>,
    [P] Alt<P>,
    [P] Repeat<P>,
);

// ============================================================================
// Helper Functions
// ============================================================================

/// Match a literal string, case-sensitively
pub fn lit(s: impl AsRef<[u8]>) -> Lit {
    Lit {
        bytes: s.as_ref().to_vec(),
        case_sensitive: true,
    }
}

/// Match a literal string, ignoring ASCII case
pub fn lit_nocase(s: impl AsRef<[u8]>) -> Lit {
    Lit {
        bytes: s.as_ref().to_vec(),
        case_sensitive: false,
    }
}

/// Match exact bytes
pub fn bytes(b: &[u8]) -> Lit {
    lit(b)
}

/// Match a single byte
pub fn byte(b: u8) -> Lit {
    lit([b])
}

/// Match one byte in `first..=last`
pub fn range(first: u8, last: u8) -> ByteRange {
    ByteRange { first, last }
}

/// Call a rule by name. The rule may be defined later or in an import.
pub fn call(name: &str) -> Call {
    Call(name.to_string())
}

/// Match the empty string
pub fn empty() -> Empty {
    Empty
}

/// Concatenate patterns of one type
pub fn seq<I, P>(items: I) -> Seq<P>
where
    I: IntoIterator<Item = P>,
{
    Seq(items.into_iter().collect())
}

/// Alternation of patterns of one type
pub fn alt<I, P>(items: I) -> Alt<P>
where
    I: IntoIterator<Item = P>,
{
    Alt(items.into_iter().collect())
}

/// Convert any pattern to a dynamic one
pub fn dynamic<P: Pattern + 'static>(p: P) -> Dynamic {
    Dynamic(Box::new(p))
}

/// Concatenation of heterogeneous patterns
///
/// ```
/// use abnf_earley::earley::grammar_dsl::*;
///
/// let pattern = abnf_earley::seq_of![lit("a"), range(b'0', b'9'), call("b")];
/// ```
#[macro_export]
macro_rules! seq_of {
    ($($p:expr),* $(,)?) => {
        $crate::earley::grammar_dsl::Seq(vec![
            $($crate::earley::grammar_dsl::dynamic($p)),*
        ])
    };
}

/// Alternation of heterogeneous patterns
///
/// ```
/// use abnf_earley::earley::grammar_dsl::*;
///
/// let pattern = abnf_earley::alt_of![lit("+"), lit("-"), range(b'0', b'9').many1()];
/// ```
#[macro_export]
macro_rules! alt_of {
    ($($p:expr),* $(,)?) => {
        $crate::earley::grammar_dsl::Alt(vec![
            $($crate::earley::grammar_dsl::dynamic($p)),*
        ])
    };
}

pub use crate::{alt_of, seq_of};
