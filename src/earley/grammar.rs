//! Grammar model
//!
//! A [`Grammar`] is a named set of rules. Each rule's right-hand side is a tree
//! of [`Element`]s stored in a flat arena owned by the grammar; composite
//! elements refer to their children by [`ElementId`]. Every element belongs to
//! exactly one rule, so an `ElementId` doubles as the element's identity.
//!
//! Grammars may import other grammars. A rule name is resolved against the
//! grammar's own rules first and then against each import's own rules, in
//! import order. Imports are not transitive for lookup purposes.
//!
//! Grammars are validated on construction: every rule call must resolve,
//! rule names are unique, ranges and repetition bounds are well formed and no
//! element is shared between two parents.

use super::error::{GrammarError, ParseError};
use super::forest::Forest;
use super::grammar_analysis::{GrammarAnalyzer, GrammarWarning};
use super::parser::ChartParser;
use super::FastMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Index of an element inside its grammar's element arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl ElementId {
    /// Arena index of this element
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The six kinds of grammar element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Ordered list of alternatives, all of which are explored
    Alternation,
    /// Sequence of elements matched one after another
    Concatenation,
    /// Bounded or unbounded repetition of one element
    Repetition,
    /// Literal byte string
    LiteralString,
    /// Inclusive range of byte values
    LiteralRange,
    /// Reference to a rule by name
    RuleCall,
}

impl ElementKind {
    /// Human-readable name of the kind
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Alternation => "Alternation",
            ElementKind::Concatenation => "Concatenation",
            ElementKind::Repetition => "Repetition",
            ElementKind::LiteralString => "LiteralString",
            ElementKind::LiteralRange => "LiteralRange",
            ElementKind::RuleCall => "RuleCall",
        }
    }

    /// Whether elements of this kind consume input directly
    pub fn is_terminal(self) -> bool {
        matches!(self, ElementKind::LiteralString | ElementKind::LiteralRange)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_case_sensitive() -> bool {
    true
}

/// A grammar element
///
/// Composite elements reference their children by [`ElementId`] within the
/// same grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    /// Matches if any alternative matches; every matching alternative is kept
    Alternation {
        /// Alternatives in declaration order
        alternatives: Vec<ElementId>,
    },
    /// Matches its elements in order. An empty concatenation matches the
    /// empty string.
    Concatenation {
        /// Elements in order
        elements: Vec<ElementId>,
    },
    /// Matches between `lower` and `upper` (inclusive) consecutive matches of
    /// `element`. `upper == None` means unbounded.
    Repetition {
        /// Repeated element
        element: ElementId,
        /// Minimum number of iterations
        #[serde(default)]
        lower: u32,
        /// Maximum number of iterations, `None` for unbounded
        #[serde(default)]
        upper: Option<u32>,
    },
    /// Matches the exact byte sequence. When `case_sensitive` is false, ASCII
    /// letters match either case; other bytes compare exactly.
    LiteralString {
        /// Bytes to match
        bytes: Vec<u8>,
        /// Whether ASCII letters must match case exactly
        #[serde(default = "default_case_sensitive")]
        case_sensitive: bool,
    },
    /// Matches one byte `b` with `first <= b <= last`
    LiteralRange {
        /// Lowest accepted byte
        first: u8,
        /// Highest accepted byte
        last: u8,
    },
    /// Matches whatever the named rule matches
    RuleCall {
        /// Name of the called rule
        rule: String,
    },
}

impl Element {
    /// Kind of this element
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Alternation { .. } => ElementKind::Alternation,
            Element::Concatenation { .. } => ElementKind::Concatenation,
            Element::Repetition { .. } => ElementKind::Repetition,
            Element::LiteralString { .. } => ElementKind::LiteralString,
            Element::LiteralRange { .. } => ElementKind::LiteralRange,
            Element::RuleCall { .. } => ElementKind::RuleCall,
        }
    }

    /// Direct children of this element
    pub fn children(&self) -> &[ElementId] {
        match self {
            Element::Alternation { alternatives } => alternatives,
            Element::Concatenation { elements } => elements,
            Element::Repetition { element, .. } => std::slice::from_ref(element),
            _ => &[],
        }
    }

    /// Whether this element consumes input directly
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Check whether this terminal matches `input` at `pos`, returning the
    /// end position on success. Non-terminals never match.
    pub fn match_at(&self, input: &[u8], pos: usize) -> Option<usize> {
        match self {
            Element::LiteralString {
                bytes,
                case_sensitive,
            } => {
                let end = pos.checked_add(bytes.len())?;
                let window = input.get(pos..end)?;
                let matched = if *case_sensitive {
                    window == bytes.as_slice()
                } else {
                    window.eq_ignore_ascii_case(bytes)
                };
                matched.then_some(end)
            }
            Element::LiteralRange { first, last } => {
                let byte = *input.get(pos)?;
                (*first..=*last).contains(&byte).then_some(pos + 1)
            }
            _ => None,
        }
    }
}

/// A named rule: the root element of a tree of elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique within its grammar
    pub name: String,
    /// Root element of the rule's right-hand side
    pub root: ElementId,
}

/// A rule resolved through [`Grammar::lookup`], together with the grammar
/// that defines it
#[derive(Debug, Clone, Copy)]
pub struct RuleRef<'g> {
    grammar: &'g Grammar,
    rule: &'g Rule,
}

impl<'g> RuleRef<'g> {
    /// Rule name
    pub fn name(&self) -> &'g str {
        &self.rule.name
    }

    /// Grammar that owns the rule
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Root element id in the owning grammar
    pub fn root(&self) -> ElementId {
        self.rule.root
    }

    /// Root element
    pub fn element(&self) -> &'g Element {
        self.grammar.element(self.rule.root)
    }
}

/// Serialized form of a grammar, validated into a [`Grammar`]
#[derive(Deserialize)]
struct GrammarRepr {
    name: String,
    rules: Vec<Rule>,
    elements: Vec<Element>,
    #[serde(default)]
    imports: Vec<Grammar>,
}

impl TryFrom<GrammarRepr> for Grammar {
    type Error = GrammarError;

    fn try_from(repr: GrammarRepr) -> Result<Self, Self::Error> {
        let imports = repr.imports.into_iter().map(Arc::new).collect();
        Grammar::new(repr.name, repr.rules, repr.elements, imports)
    }
}

/// A validated grammar
///
/// Grammars are immutable once built. Share them between parsers (and
/// threads) by reference or behind an [`Arc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GrammarRepr")]
pub struct Grammar {
    name: String,
    rules: Vec<Rule>,
    elements: Vec<Element>,
    imports: Vec<Arc<Grammar>>,
    #[serde(skip)]
    rule_index: FastMap<String, usize>,
    /// Index of the owning rule for every element
    #[serde(skip)]
    owners: Vec<u32>,
    /// Enclosing element of every element, `None` for rule roots
    #[serde(skip)]
    parents: Vec<Option<ElementId>>,
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.rules == other.rules
            && self.elements == other.elements
            && self.imports == other.imports
    }
}

impl Eq for Grammar {}

impl Grammar {
    /// Build and validate a grammar from its parts
    pub fn new(
        name: impl Into<String>,
        rules: Vec<Rule>,
        elements: Vec<Element>,
        imports: Vec<Arc<Grammar>>,
    ) -> Result<Self, GrammarError> {
        let name = name.into();
        let mut rule_index =
            FastMap::with_capacity_and_hasher(rules.len(), Default::default());
        for (i, rule) in rules.iter().enumerate() {
            if rule_index.insert(rule.name.clone(), i).is_some() {
                return Err(GrammarError::DuplicateRule {
                    rule: rule.name.clone(),
                    grammar: name,
                });
            }
        }

        let (owners, parents) = assign_owners(&name, &rules, &elements)?;
        let grammar = Grammar {
            name,
            rules,
            elements,
            imports,
            rule_index,
            owners,
            parents,
        };
        grammar.validate()?;
        Ok(grammar)
    }

    /// Check ranges, repetition bounds and that every rule call resolves.
    /// Run on construction; structural checks (dangling or shared elements,
    /// duplicate rule names) happen before this.
    pub fn validate(&self) -> Result<(), GrammarError> {
        for (i, element) in self.elements.iter().enumerate() {
            let id = ElementId(i as u32);
            match element {
                Element::LiteralRange { first, last } if first > last => {
                    return Err(GrammarError::InvalidRange {
                        first: *first,
                        last: *last,
                        location: self.location(id),
                    });
                }
                Element::Repetition {
                    lower,
                    upper: Some(upper),
                    ..
                } if upper < lower => {
                    return Err(GrammarError::InvalidBounds {
                        lower: *lower,
                        upper: *upper,
                        location: self.location(id),
                    });
                }
                Element::RuleCall { rule } => {
                    if self.lookup(rule).is_err() {
                        return Err(GrammarError::UndefinedRule {
                            rule: rule.clone(),
                            grammar: self.name.clone(),
                            location: self.location(id),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Grammar name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules defined directly in this grammar, in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Element arena
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Imported grammars, in lookup order
    pub fn imports(&self) -> &[Arc<Grammar>] {
        &self.imports
    }

    /// Element by id
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this grammar.
    #[inline]
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    /// Element by id, if it exists
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())
    }

    /// Rule defined directly in this grammar
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rule_index.get(name).map(|&i| &self.rules[i])
    }

    /// Resolve a rule name: own rules first, then each import's own rules in
    /// order.
    pub fn lookup(&self, name: &str) -> Result<RuleRef<'_>, GrammarError> {
        if let Some(rule) = self.rule(name) {
            return Ok(RuleRef {
                grammar: self,
                rule,
            });
        }
        for import in &self.imports {
            if let Some(rule) = import.rule(name) {
                return Ok(RuleRef {
                    grammar: import,
                    rule,
                });
            }
        }
        Err(GrammarError::UndefinedRule {
            rule: name.to_string(),
            grammar: self.name.clone(),
            location: format!("grammar '{}'", self.name),
        })
    }

    /// Whether `name` resolves in this grammar
    pub fn contains_rule(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Names of all rules visible from this grammar: own rules, then each
    /// import's own rules
    pub fn rule_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.iter().map(|r| r.name.as_str()).chain(
            self.imports
                .iter()
                .flat_map(|g| g.rules.iter().map(|r| r.name.as_str())),
        )
    }

    /// Number of visible rules (own plus imported)
    pub fn len(&self) -> usize {
        self.rules.len() + self.imports.iter().map(|g| g.rules.len()).sum::<usize>()
    }

    /// Whether the grammar has no visible rules
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rule that contains the element
    pub fn owner(&self, id: ElementId) -> &Rule {
        &self.rules[self.owners[id.index()] as usize]
    }

    /// Element whose children include `id`; `None` for a rule's root
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// Elements enclosing `id`, innermost first, ending at its rule's root
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Describe where an element lives, e.g. `rule 'digit' in grammar 'core'`
    pub fn location(&self, id: ElementId) -> String {
        let rule = self.owner(id);
        if rule.root == id {
            format!("rule '{}' in grammar '{}'", rule.name, self.name)
        } else {
            format!(
                "{} in rule '{}' in grammar '{}'",
                self.element(id).kind(),
                rule.name,
                self.name
            )
        }
    }

    /// Parse `input` starting from `rule`
    pub fn parse(&self, rule: &str, input: &[u8]) -> Result<Forest<'_>, ParseError> {
        ChartParser::new(self, input).parse(rule)
    }

    /// Check whether `input` is in the language of `rule`
    pub fn recognize(&self, rule: &str, input: &[u8]) -> Result<bool, ParseError> {
        match self.parse(rule, input) {
            Ok(_) => Ok(true),
            Err(ParseError::Failed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run the static checks in [`GrammarAnalyzer`]
    pub fn analyze(&self) -> Vec<GrammarWarning> {
        GrammarAnalyzer::new(self).analyze()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, GrammarError> {
        serde_json::to_string(self).map_err(|e| GrammarError::Json {
            message: e.to_string(),
        })
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, GrammarError> {
        serde_json::to_string_pretty(self).map_err(|e| GrammarError::Json {
            message: e.to_string(),
        })
    }

    /// Deserialize and validate a grammar from JSON
    pub fn from_json(json: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(json).map_err(|e| GrammarError::Json {
            message: e.to_string(),
        })
    }
}

/// Walk every rule tree, recording the owning rule and the parent of each
/// element. Rejects dangling ids, elements reachable twice and elements
/// outside every rule.
fn assign_owners(
    grammar: &str,
    rules: &[Rule],
    elements: &[Element],
) -> Result<(Vec<u32>, Vec<Option<ElementId>>), GrammarError> {
    const UNOWNED: u32 = u32::MAX;
    let mut owners = vec![UNOWNED; elements.len()];
    let mut parents = vec![None; elements.len()];
    let mut stack = Vec::new();

    for (rule_idx, rule) in rules.iter().enumerate() {
        stack.push((rule.root, None));
        while let Some((id, parent)) = stack.pop() {
            let Some(element) = elements.get(id.index()) else {
                return Err(GrammarError::InvalidElement {
                    element: id,
                    grammar: grammar.to_string(),
                    reason: format!(
                        "dangling element id in rule '{}' ({} elements)",
                        rule.name,
                        elements.len()
                    ),
                });
            };
            if owners[id.index()] != UNOWNED {
                return Err(GrammarError::SharedElement {
                    element: id,
                    grammar: grammar.to_string(),
                    location: format!("rule '{}'", rule.name),
                });
            }
            owners[id.index()] = rule_idx as u32;
            parents[id.index()] = parent;
            stack.extend(element.children().iter().rev().map(|&c| (c, Some(id))));
        }
    }

    if let Some(orphan) = owners.iter().position(|&o| o == UNOWNED) {
        return Err(GrammarError::InvalidElement {
            element: ElementId(orphan as u32),
            grammar: grammar.to_string(),
            reason: "element is not part of any rule".to_string(),
        });
    }
    Ok((owners, parents))
}

// ============================================================================
// Grammar sets
// ============================================================================

/// Identity of an element across a set of grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ElementKey {
    /// Slot of the owning grammar in the [`GrammarSet`]
    pub slot: u32,
    /// Element id within that grammar
    pub id: ElementId,
}

/// A grammar together with everything it imports, transitively, so that every
/// reachable element has a flat [`ElementKey`]
#[derive(Debug, Clone)]
pub(crate) struct GrammarSet<'g> {
    grammars: Vec<&'g Grammar>,
}

impl<'g> GrammarSet<'g> {
    pub(crate) fn new(root: &'g Grammar) -> Self {
        let mut grammars: Vec<&'g Grammar> = Vec::new();
        let mut stack = vec![root];
        while let Some(grammar) = stack.pop() {
            if grammars.iter().any(|g| std::ptr::eq(*g, grammar)) {
                continue;
            }
            grammars.push(grammar);
            stack.extend(grammar.imports.iter().rev().map(|g| g.as_ref()));
        }
        GrammarSet { grammars }
    }

    /// The grammar the set was built from
    pub(crate) fn root(&self) -> &'g Grammar {
        self.grammars[0]
    }

    pub(crate) fn grammar(&self, slot: u32) -> &'g Grammar {
        self.grammars[slot as usize]
    }

    pub(crate) fn slot_of(&self, grammar: &Grammar) -> Option<u32> {
        self.grammars
            .iter()
            .position(|g| std::ptr::eq(*g, grammar))
            .map(|slot| slot as u32)
    }

    #[inline]
    pub(crate) fn element(&self, key: ElementKey) -> &'g Element {
        self.grammars[key.slot as usize].element(key.id)
    }

    /// Key of a child element (children live in the parent's grammar)
    #[inline]
    pub(crate) fn child(&self, parent: ElementKey, id: ElementId) -> ElementKey {
        ElementKey {
            slot: parent.slot,
            id,
        }
    }

    /// Resolve a rule name from the root grammar
    pub(crate) fn rule_key(&self, name: &str) -> Result<ElementKey, GrammarError> {
        self.resolve_in(self.root(), name)
    }

    /// Resolve the target root of a rule call, lexically from the grammar that
    /// owns the call
    pub(crate) fn resolve_call(&self, call: ElementKey) -> Result<ElementKey, GrammarError> {
        let grammar = self.grammar(call.slot);
        match grammar.element(call.id) {
            Element::RuleCall { rule } => self.resolve_in(grammar, rule),
            other => Err(GrammarError::InvalidElement {
                element: call.id,
                grammar: grammar.name.clone(),
                reason: format!("expected a rule call, found {}", other.kind()),
            }),
        }
    }

    fn resolve_in(&self, grammar: &'g Grammar, name: &str) -> Result<ElementKey, GrammarError> {
        let rule = grammar.lookup(name)?;
        let slot = self
            .slot_of(rule.grammar())
            .ok_or_else(|| GrammarError::UndefinedRule {
                rule: name.to_string(),
                grammar: grammar.name.clone(),
                location: format!("grammar '{}'", grammar.name),
            })?;
        Ok(ElementKey {
            slot,
            id: rule.root(),
        })
    }

    /// Every element key in the set
    pub(crate) fn keys(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.grammars.iter().enumerate().flat_map(|(slot, g)| {
            (0..g.elements.len()).map(move |i| ElementKey {
                slot: slot as u32,
                id: ElementId(i as u32),
            })
        })
    }

    /// Name of the rule containing `key`
    pub(crate) fn rule_name(&self, key: ElementKey) -> &'g str {
        &self.grammar(key.slot).owner(key.id).name
    }

    pub(crate) fn location(&self, key: ElementKey) -> String {
        self.grammar(key.slot).location(key.id)
    }
}
