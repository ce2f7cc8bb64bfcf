//! Grammar analysis and warnings
//!
//! The chart parser accepts every context-free grammar, including left
//! recursive and ambiguous ones, so nothing reported here prevents parsing.
//! The analysis points at grammar constructs that are usually mistakes:
//! - Rules never reachable from the start rule
//! - Rules that can never match any input
//! - Empty alternations (never match)
//! - Repetitions with an upper bound of zero
//! - Unbounded repetitions of nullable elements
//! - Left recursion (informational)
//!
//! # Example
//!
//! ```
//! use abnf_earley::earley::grammar_dsl::*;
//! use abnf_earley::earley::{GrammarAnalyzer, WarningKind};
//!
//! let grammar = GrammarBuilder::new("expr")
//!     .rule("sum", (call("sum") >> lit("+") >> call("num")) | call("num"))
//!     .rule("num", range(b'0', b'9').many1())
//!     .build()
//!     .unwrap();
//!
//! let warnings = GrammarAnalyzer::new(&grammar).analyze();
//! assert!(warnings.iter().any(|w| w.kind == WarningKind::LeftRecursion));
//! ```

use super::grammar::{Element, ElementId, ElementKey, Grammar, GrammarSet};
use super::{FastMap, FastSet};
use std::fmt;

/// Kind of grammar warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A rule of the grammar is not reachable from the start rule
    UnreachableRule,

    /// A rule can never match any input
    ///
    /// Example: `a = "x" a` has no base case.
    UnproductiveRule,

    /// An alternation with no alternatives never matches
    EmptyAlternation,

    /// Repetition with an upper bound of zero (always matches nothing)
    UselessRepetition,

    /// Unbounded repetition of an element that can match the empty string
    ///
    /// The parser terminates on these, but the number of ways to split the
    /// input between iterations is unbounded; only finitely many are kept.
    NullableRepetition,

    /// Direct or indirect left recursion
    ///
    /// Handled by the parser; reported for information only.
    LeftRecursion,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableRule => write!(f, "unreachable rule"),
            Self::UnproductiveRule => write!(f, "unproductive rule"),
            Self::EmptyAlternation => write!(f, "empty alternation"),
            Self::UselessRepetition => write!(f, "useless repetition"),
            Self::NullableRepetition => write!(f, "nullable repetition"),
            Self::LeftRecursion => write!(f, "left recursion"),
        }
    }
}

/// A grammar warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Rule the warning is about
    pub rule: String,
    /// Where in the grammar it was detected
    pub location: String,
    /// Human-readable message
    pub message: String,
}

impl GrammarWarning {
    fn new(kind: WarningKind, set: &GrammarSet<'_>, key: ElementKey, message: String) -> Self {
        Self {
            kind,
            rule: set.rule_name(key).to_string(),
            location: set.location(key),
            message,
        }
    }
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.location, self.kind, self.message)
    }
}

/// Grammar analyzer
///
/// Nullability and productivity are computed up front over the grammar and
/// everything it imports.
pub struct GrammarAnalyzer<'g> {
    set: GrammarSet<'g>,
    start: Option<&'g str>,
    /// Resolved rule-call targets
    calls: FastMap<ElementKey, ElementKey>,
    nullable: FastSet<ElementKey>,
    productive: FastSet<ElementKey>,
}

impl<'g> GrammarAnalyzer<'g> {
    /// Create a new analyzer for the given grammar
    pub fn new(grammar: &'g Grammar) -> Self {
        let set = GrammarSet::new(grammar);
        let calls = set
            .keys()
            .filter(|&key| matches!(set.element(key), Element::RuleCall { .. }))
            .filter_map(|key| set.resolve_call(key).ok().map(|target| (key, target)))
            .collect();
        let mut analyzer = Self {
            set,
            start: grammar.rules().first().map(|r| r.name.as_str()),
            calls,
            nullable: FastSet::default(),
            productive: FastSet::default(),
        };
        analyzer.nullable = analyzer.fixpoint(Self::derives_empty);
        analyzer.productive = analyzer.fixpoint(Self::derives_some);
        analyzer
    }

    /// Use `rule` instead of the first rule as the start rule for
    /// reachability
    pub fn with_start(mut self, rule: &'g str) -> Self {
        self.start = Some(rule);
        self
    }

    /// Whether the named rule can match the empty string
    pub fn is_nullable(&self, rule: &str) -> bool {
        self.set
            .rule_key(rule)
            .is_ok_and(|key| self.nullable.contains(&key))
    }

    /// Whether the named rule can match some input
    pub fn is_productive(&self, rule: &str) -> bool {
        self.set
            .rule_key(rule)
            .is_ok_and(|key| self.productive.contains(&key))
    }

    /// Rules of the grammar that can match the empty string
    pub fn nullable_rules(&self) -> Vec<&'g str> {
        let grammar = self.set.root();
        grammar
            .rules()
            .iter()
            .filter(|r| self.is_nullable(&r.name))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Analyze the grammar and return all warnings
    pub fn analyze(&self) -> Vec<GrammarWarning> {
        let mut warnings = Vec::new();

        self.detect_unreachable_rules(&mut warnings);
        self.detect_unproductive_rules(&mut warnings);
        self.detect_element_issues(&mut warnings);
        self.detect_left_recursion(&mut warnings);

        warnings
    }

    /// Least fixpoint of `holds` over every element in the set
    fn fixpoint(
        &self,
        holds: fn(&Self, &FastSet<ElementKey>, ElementKey) -> bool,
    ) -> FastSet<ElementKey> {
        let mut known = FastSet::default();
        loop {
            let added: Vec<ElementKey> = self
                .set
                .keys()
                .filter(|key| !known.contains(key) && holds(self, &known, *key))
                .collect();
            if added.is_empty() {
                return known;
            }
            known.extend(added);
        }
    }

    fn derives_empty(&self, nullable: &FastSet<ElementKey>, key: ElementKey) -> bool {
        let child = |id| nullable.contains(&self.set.child(key, id));
        match self.set.element(key) {
            Element::Alternation { alternatives } => alternatives.iter().any(|&id| child(id)),
            Element::Concatenation { elements } => elements.iter().all(|&id| child(id)),
            Element::Repetition { element, lower, .. } => *lower == 0 || child(*element),
            Element::LiteralString { bytes, .. } => bytes.is_empty(),
            Element::LiteralRange { .. } => false,
            Element::RuleCall { .. } => self
                .calls
                .get(&key)
                .is_some_and(|target| nullable.contains(target)),
        }
    }

    fn derives_some(&self, productive: &FastSet<ElementKey>, key: ElementKey) -> bool {
        let child = |id| productive.contains(&self.set.child(key, id));
        match self.set.element(key) {
            Element::Alternation { alternatives } => alternatives.iter().any(|&id| child(id)),
            Element::Concatenation { elements } => elements.iter().all(|&id| child(id)),
            Element::Repetition { element, lower, .. } => *lower == 0 || child(*element),
            Element::LiteralString { .. } | Element::LiteralRange { .. } => true,
            Element::RuleCall { .. } => self
                .calls
                .get(&key)
                .is_some_and(|target| productive.contains(target)),
        }
    }

    /// Rule roots called from anywhere inside the rule rooted at `root`
    fn called_rules(&self, root: ElementKey) -> Vec<ElementKey> {
        let mut called = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if let Some(&target) = self.calls.get(&key) {
                called.push(target);
            }
            let element = self.set.element(key);
            stack.extend(element.children().iter().map(|&id| self.set.child(key, id)));
        }
        called
    }

    /// Detect rules of the grammar that the start rule never reaches
    fn detect_unreachable_rules(&self, warnings: &mut Vec<GrammarWarning>) {
        let Some(start) = self.start.and_then(|name| self.set.rule_key(name).ok()) else {
            return;
        };
        let mut reachable = FastSet::default();
        let mut stack = vec![start];
        while let Some(root) = stack.pop() {
            if reachable.insert(root) {
                stack.extend(self.called_rules(root));
            }
        }

        let grammar = self.set.root();
        for rule in grammar.rules() {
            let key = ElementKey {
                slot: 0,
                id: rule.root,
            };
            if !reachable.contains(&key) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnreachableRule,
                    &self.set,
                    key,
                    format!(
                        "rule '{}' is never used by start rule '{}'",
                        rule.name,
                        self.set.rule_name(start)
                    ),
                ));
            }
        }
    }

    /// Detect rules of the grammar that can never match
    fn detect_unproductive_rules(&self, warnings: &mut Vec<GrammarWarning>) {
        let grammar = self.set.root();
        for rule in grammar.rules() {
            let key = ElementKey {
                slot: 0,
                id: rule.root,
            };
            if !self.productive.contains(&key) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnproductiveRule,
                    &self.set,
                    key,
                    format!("rule '{}' can never match any input", rule.name),
                ));
            }
        }
    }

    /// Detect empty alternations and suspicious repetitions
    fn detect_element_issues(&self, warnings: &mut Vec<GrammarWarning>) {
        let grammar = self.set.root();
        for index in 0..grammar.elements().len() {
            let key = ElementKey {
                slot: 0,
                id: ElementId(index as u32),
            };
            match self.set.element(key) {
                Element::Alternation { alternatives } if alternatives.is_empty() => {
                    warnings.push(GrammarWarning::new(
                        WarningKind::EmptyAlternation,
                        &self.set,
                        key,
                        "empty alternation never matches".to_string(),
                    ));
                }
                Element::Repetition {
                    upper: Some(0), ..
                } => {
                    warnings.push(GrammarWarning::new(
                        WarningKind::UselessRepetition,
                        &self.set,
                        key,
                        "repetition with upper bound 0 always matches nothing".to_string(),
                    ));
                }
                Element::Repetition {
                    element,
                    upper: None,
                    ..
                } if self.nullable.contains(&self.set.child(key, *element)) => {
                    warnings.push(GrammarWarning::new(
                        WarningKind::NullableRepetition,
                        &self.set,
                        key,
                        format!(
                            "unbounded repetition of {}, which can match the empty string",
                            grammar.display_element(*element)
                        ),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Rule roots that can be called before any input is consumed
    fn left_calls(&self, root: ElementKey) -> Vec<ElementKey> {
        let mut calls = Vec::new();
        let mut seen = FastSet::default();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                continue;
            }
            match self.set.element(key) {
                Element::Alternation { alternatives } => {
                    stack.extend(alternatives.iter().map(|&id| self.set.child(key, id)));
                }
                Element::Concatenation { elements } => {
                    for &id in elements {
                        let child = self.set.child(key, id);
                        stack.push(child);
                        if !self.nullable.contains(&child) {
                            break;
                        }
                    }
                }
                Element::Repetition { element, upper, .. } => {
                    if *upper != Some(0) {
                        stack.push(self.set.child(key, *element));
                    }
                }
                Element::RuleCall { .. } => {
                    if let Some(&target) = self.calls.get(&key) {
                        calls.push(target);
                    }
                }
                Element::LiteralString { .. } | Element::LiteralRange { .. } => {}
            }
        }
        calls
    }

    /// Detect rules that can reach themselves without consuming input
    fn detect_left_recursion(&self, warnings: &mut Vec<GrammarWarning>) {
        let grammar = self.set.root();
        let mut edges: FastMap<ElementKey, Vec<ElementKey>> = FastMap::default();

        for rule in grammar.rules() {
            let root = ElementKey {
                slot: 0,
                id: rule.root,
            };
            // Breadth-first search for a left-call path back to `root`,
            // keeping parents to report the chain.
            let mut parent: FastMap<ElementKey, ElementKey> = FastMap::default();
            let mut queue = std::collections::VecDeque::from([root]);
            let mut found = None;
            while let Some(current) = queue.pop_front() {
                let next = edges
                    .entry(current)
                    .or_insert_with(|| self.left_calls(current))
                    .clone();
                for target in next {
                    if target == root {
                        found = Some(current);
                        break;
                    }
                    if !parent.contains_key(&target) {
                        parent.insert(target, current);
                        queue.push_back(target);
                    }
                }
                if found.is_some() {
                    break;
                }
            }

            let Some(mut last) = found else {
                continue;
            };
            let mut chain = vec![self.set.rule_name(root)];
            let mut back = Vec::new();
            while last != root {
                back.push(self.set.rule_name(last));
                last = parent[&last];
            }
            chain.extend(back.into_iter().rev());
            chain.push(self.set.rule_name(root));

            let message = if chain.len() == 2 {
                format!("rule '{}' is directly left-recursive", rule.name)
            } else {
                format!("rule '{}' is left-recursive via {}", rule.name, chain.join(" -> "))
            };
            warnings.push(GrammarWarning::new(
                WarningKind::LeftRecursion,
                &self.set,
                root,
                message,
            ));
        }
    }
}
