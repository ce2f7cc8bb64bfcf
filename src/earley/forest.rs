//! Parse forest
//!
//! A successful parse yields a [`Forest`]: every way the input derives from
//! the start rule, packed into one graph. Span nodes `(element, start, end)`
//! carry one packed derivation per distinct way the span was recognized;
//! concatenation and repetition children hang off binarized prefix nodes, so
//! the forest stays polynomial in the input even when the number of trees is
//! exponential.
//!
//! Trees are produced on demand:
//!
//! - [`Forest::first`] builds one tree from the earliest recorded derivation
//!   of every node. Those derivations always form a finite tree.
//! - [`Forest::iter`] enumerates every tree, depth-first, like an odometer
//!   over the choice points. Enumeration is lazy and can be restarted by
//!   calling `iter` again. In cyclic grammars a derivation that would re-enter
//!   a node already on the current path is skipped, so only finite trees come
//!   out and the enumeration ends.
//!
//! Subtrees whose whole sub-forest has a single derivation are built once and
//! shared between every tree that contains them.

use super::grammar::{Element, ElementId, ElementKey, ElementKind, Grammar, GrammarSet};
use super::memo::{Derivation, Memo, ProgressKey, SpanKey};
use super::{FastMap, FastSet};
use serde_json::{json, Value};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Chart statistics for one parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseStats {
    /// Input length in bytes
    pub input_len: usize,
    /// Furthest position with live frames
    pub furthest: usize,
    /// Frames created
    pub frames: usize,
    /// Join nodes created
    pub joins: usize,
    /// Distinct recognized spans
    pub spans: usize,
    /// Derivations recorded across all spans
    pub derivations: usize,
}

/// All parses of one input
pub struct Forest<'g> {
    set: GrammarSet<'g>,
    memo: Memo,
    root: SpanKey,
    stats: ParseStats,
}

impl fmt::Debug for Forest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("grammar", &self.set.root().name())
            .field("span", &(self.root.start..self.root.end))
            .field("stats", &self.stats)
            .finish()
    }
}

impl<'g> Forest<'g> {
    pub(crate) fn new(set: GrammarSet<'g>, memo: Memo, root: SpanKey, stats: ParseStats) -> Self {
        Self {
            set,
            memo,
            root,
            stats,
        }
    }

    /// The grammar the parse started from
    pub fn grammar(&self) -> &'g Grammar {
        self.set.root()
    }

    /// Chart statistics of the parse that produced this forest
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Root node: the start rule's root element over the whole input
    pub fn root(&self) -> ForestNode<'_, 'g> {
        ForestNode {
            forest: self,
            key: self.root,
        }
    }

    /// One parse tree, built from the earliest derivation of every node
    pub fn first(&self) -> ParseTree<'g> {
        let tree = Builder::new(self).earliest(self.root);
        Arc::try_unwrap(tree).unwrap_or_else(|shared| (*shared).clone())
    }

    /// Lazily enumerate every parse tree
    pub fn iter(&self) -> Trees<'_, 'g> {
        Trees {
            builder: Builder::new(self),
            next: Some(Vec::new()),
        }
    }

    /// Alias for [`Forest::iter`]
    pub fn trees(&self) -> Trees<'_, 'g> {
        self.iter()
    }

    /// Whether the input has more than one parse tree
    pub fn is_ambiguous(&self) -> bool {
        self.iter().take(2).count() > 1
    }

    /// Number of recognized spans in the forest
    pub fn span_count(&self) -> usize {
        self.memo.len()
    }

    /// Number of packed derivations in the forest
    pub fn derivation_count(&self) -> usize {
        self.memo.derivation_count()
    }

    pub(crate) fn memo(&self) -> &Memo {
        &self.memo
    }

    pub(crate) fn set(&self) -> &GrammarSet<'g> {
        &self.set
    }

    pub(crate) fn root_key(&self) -> SpanKey {
        self.root
    }
}

impl<'f, 'g> IntoIterator for &'f Forest<'g> {
    type Item = ParseTree<'g>;
    type IntoIter = Trees<'f, 'g>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Forest node views
// ============================================================================

/// A recognized span of one element
#[derive(Clone, Copy)]
pub struct ForestNode<'f, 'g> {
    forest: &'f Forest<'g>,
    key: SpanKey,
}

impl<'f, 'g> ForestNode<'f, 'g> {
    /// The element recognized
    pub fn element(&self) -> &'g Element {
        self.forest.set.element(self.key.element)
    }

    /// Grammar that owns the element
    pub fn grammar(&self) -> &'g Grammar {
        self.forest.set.grammar(self.key.element.slot)
    }

    /// Element id within [`ForestNode::grammar`]
    pub fn element_id(&self) -> ElementId {
        self.key.element.id
    }

    /// Element kind
    pub fn kind(&self) -> ElementKind {
        self.element().kind()
    }

    /// Byte range covered
    pub fn span(&self) -> Range<usize> {
        self.key.start..self.key.end
    }

    /// Number of bytes covered
    pub fn len(&self) -> usize {
        self.key.end - self.key.start
    }

    /// Whether the span is empty
    pub fn is_empty(&self) -> bool {
        self.key.start == self.key.end
    }

    /// Number of distinct derivations of this span
    pub fn derivation_count(&self) -> usize {
        self.forest.memo.derivations(&self.key).len()
    }

    /// Packed derivations, in the order they were found
    pub fn derivations(&self) -> Vec<PackedNode<'f, 'g>> {
        self.forest
            .memo
            .derivations(&self.key)
            .iter()
            .map(|&derivation| PackedNode {
                forest: self.forest,
                parent: self.key,
                derivation,
            })
            .collect()
    }
}

impl fmt::Debug for ForestNode<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..{}) in {}",
            self.kind(),
            self.key.start,
            self.key.end,
            self.forest.set.location(self.key.element)
        )
    }
}

/// One derivation of a span
///
/// Alternations and rule calls have a single child span. Concatenations and
/// repetitions point at the prefix node holding their children.
#[derive(Clone, Copy)]
pub struct PackedNode<'f, 'g> {
    forest: &'f Forest<'g>,
    parent: SpanKey,
    derivation: Derivation,
}

impl<'f, 'g> PackedNode<'f, 'g> {
    /// Index of the chosen alternative, for alternations
    pub fn alternative(&self) -> Option<usize> {
        match self.derivation {
            Derivation::Choice { alternative } => Some(alternative as usize),
            _ => None,
        }
    }

    /// The single child span, for alternations and rule calls
    pub fn child(&self) -> Option<ForestNode<'f, 'g>> {
        let key = self.forest.derivation_child(self.parent, self.derivation)?;
        Some(ForestNode {
            forest: self.forest,
            key,
        })
    }

    /// The full prefix, for concatenations and repetitions
    pub fn prefix(&self) -> Option<PrefixNode<'f, 'g>> {
        let key = Forest::derivation_prefix(self.parent, self.derivation)?;
        Some(PrefixNode {
            forest: self.forest,
            key,
        })
    }
}

/// A recognized prefix of a concatenation or repetition
#[derive(Clone, Copy)]
pub struct PrefixNode<'f, 'g> {
    forest: &'f Forest<'g>,
    key: ProgressKey,
}

/// One way a prefix was reached: a shorter prefix (absent for the empty
/// base) followed by one child span
#[derive(Clone, Copy)]
pub struct PrefixLink<'f, 'g> {
    /// Prefix before the child, `None` when it is the empty start
    pub previous: Option<PrefixNode<'f, 'g>>,
    /// The child that extends it
    pub child: ForestNode<'f, 'g>,
}

impl<'f, 'g> PrefixNode<'f, 'g> {
    /// Children consumed so far (iteration state for repetitions)
    pub fn progress(&self) -> u32 {
        self.key.progress
    }

    /// Byte range covered
    pub fn span(&self) -> Range<usize> {
        self.key.start..self.key.end
    }

    /// Every way this prefix was reached
    pub fn links(&self) -> Vec<PrefixLink<'f, 'g>> {
        let forest = self.forest;
        let Some(child) = forest.child_of_prefix(&self.key) else {
            return Vec::new();
        };
        forest
            .memo
            .links(&self.key)
            .iter()
            .map(|link| {
                let previous = ProgressKey {
                    progress: link.previous,
                    end: link.split,
                    ..self.key
                };
                PrefixLink {
                    previous: (!previous.is_base()).then_some(PrefixNode {
                        forest,
                        key: previous,
                    }),
                    child: ForestNode {
                        forest,
                        key: SpanKey {
                            element: child,
                            start: link.split,
                            end: self.key.end,
                        },
                    },
                }
            })
            .collect()
    }
}

impl<'g> Forest<'g> {
    /// Child span of an alternation or rule-call derivation
    pub(crate) fn derivation_child(&self, key: SpanKey, derivation: Derivation) -> Option<SpanKey> {
        let element = match derivation {
            Derivation::Choice { alternative } => {
                let id = *self
                    .set
                    .element(key.element)
                    .children()
                    .get(alternative as usize)?;
                self.set.child(key.element, id)
            }
            Derivation::Call { target } => target,
            _ => return None,
        };
        Some(SpanKey { element, ..key })
    }

    /// Full prefix of a concatenation or repetition derivation
    pub(crate) fn derivation_prefix(key: SpanKey, derivation: Derivation) -> Option<ProgressKey> {
        let progress = match derivation {
            Derivation::Sequence { len } => len,
            Derivation::Repeat { count } => count,
            _ => return None,
        };
        Some(ProgressKey {
            element: key.element,
            progress,
            start: key.start,
            end: key.end,
        })
    }

    /// Element that extends `key` to the next progress value
    pub(crate) fn child_of_prefix(&self, key: &ProgressKey) -> Option<ElementKey> {
        let id = match self.set.element(key.element) {
            Element::Concatenation { elements } => {
                *elements.get((key.progress as usize).checked_sub(1)?)?
            }
            Element::Repetition { element, .. } => *element,
            _ => return None,
        };
        Some(self.set.child(key.element, id))
    }
}

// ============================================================================
// Parse trees
// ============================================================================

/// One parse tree
///
/// Children are reference counted so that unambiguous subtrees can be shared
/// between the trees of one enumeration.
#[derive(Clone)]
pub struct ParseTree<'g> {
    grammar: &'g Grammar,
    id: ElementId,
    start: usize,
    end: usize,
    children: Vec<Arc<ParseTree<'g>>>,
}

impl PartialEq for ParseTree<'_> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            let same_node = std::ptr::eq(a.grammar, b.grammar)
                && a.id == b.id
                && a.start == b.start
                && a.end == b.end
                && a.children.len() == b.children.len();
            if !same_node {
                return false;
            }
            pending.extend(
                a.children
                    .iter()
                    .zip(&b.children)
                    .filter(|(x, y)| !Arc::ptr_eq(x, y))
                    .map(|(x, y)| (x.as_ref(), y.as_ref())),
            );
        }
        true
    }
}

impl Eq for ParseTree<'_> {}

impl Drop for ParseTree<'_> {
    fn drop(&mut self) {
        // Unlink uniquely owned children first so that dropping a deep tree
        // does not recurse once per level.
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                pending.append(&mut node.children);
            }
        }
    }
}

impl fmt::Debug for ParseTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ParseTree");
        s.field("kind", &self.kind())
            .field("rule", &self.owner_rule())
            .field("span", &self.span());
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}

impl<'g> ParseTree<'g> {
    /// The element this node recognized
    pub fn element(&self) -> &'g Element {
        self.grammar.element(self.id)
    }

    /// Element id within [`ParseTree::grammar`]
    pub fn element_id(&self) -> ElementId {
        self.id
    }

    /// Grammar that owns the element
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Element kind
    pub fn kind(&self) -> ElementKind {
        self.element().kind()
    }

    /// Byte range covered
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// First byte covered
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte covered
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the node covers no input
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Child nodes, left to right. A rule call has one child (the rule's
    /// root element); alternations have the chosen alternative; terminals
    /// have none.
    pub fn children(&self) -> &[Arc<ParseTree<'g>>] {
        &self.children
    }

    /// Whether this node is a literal match
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Input bytes covered by this node
    pub fn text<'i>(&self, input: &'i [u8]) -> &'i [u8] {
        input.get(self.start..self.end).unwrap_or_default()
    }

    /// Name of the called rule, for rule-call nodes
    pub fn rule(&self) -> Option<&'g str> {
        match self.element() {
            Element::RuleCall { rule } => Some(rule),
            _ => None,
        }
    }

    /// Name of the rule containing this node's element
    pub fn owner_rule(&self) -> &'g str {
        &self.grammar.owner(self.id).name
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }

    /// Visit every node in pre-order
    pub fn walk<F: FnMut(&ParseTree<'g>, usize)>(&self, mut visit: F) {
        let mut pending = vec![(self, 0)];
        while let Some((node, depth)) = pending.pop() {
            visit(node, depth);
            pending.extend(node.children.iter().rev().map(|c| (c.as_ref(), depth + 1)));
        }
    }

    /// JSON form of the tree, with the covered text of every node
    pub fn to_json(&self, input: &[u8]) -> Value {
        let mut pending = vec![(self, false)];
        let mut built: Vec<Value> = Vec::new();
        while let Some((node, expanded)) = pending.pop() {
            if !expanded {
                pending.push((node, true));
                pending.extend(node.children.iter().rev().map(|c| (c.as_ref(), false)));
                continue;
            }
            let mut value = json!({
                "kind": node.kind().name(),
                "rule": node.owner_rule(),
                "start": node.start,
                "end": node.end,
                "text": String::from_utf8_lossy(node.text(input)),
            });
            if let Some(called) = node.rule() {
                value["call"] = json!(called);
            }
            if !node.children.is_empty() {
                let children = built.split_off(built.len() - node.children.len());
                value["children"] = Value::Array(children);
            }
            built.push(value);
        }
        built.pop().unwrap_or(Value::Null)
    }
}

// ============================================================================
// Tree construction
// ============================================================================

/// Choice-point cursor for one tree build. `planned` holds the choices to
/// make at the first choice points; later ones default to the first option.
struct Cursor<'c> {
    planned: &'c [usize],
    taken: Vec<(usize, usize)>,
}

impl<'c> Cursor<'c> {
    fn new(planned: &'c [usize]) -> Self {
        Self {
            planned,
            taken: Vec::with_capacity(planned.len()),
        }
    }

    fn choose(&mut self, options: usize) -> usize {
        if options <= 1 {
            return 0;
        }
        let choice = self
            .planned
            .get(self.taken.len())
            .copied()
            .unwrap_or(0)
            .min(options - 1);
        self.taken.push((choice, options));
        choice
    }

    /// Choices for the next build: bump the deepest choice point that has
    /// options left and drop everything after it
    fn successor(self) -> Option<Vec<usize>> {
        let mut taken = self.taken;
        while let Some((choice, options)) = taken.pop() {
            if choice + 1 < options {
                let mut next: Vec<usize> = taken.iter().map(|&(c, _)| c).collect();
                next.push(choice + 1);
                return Some(next);
            }
        }
        None
    }
}

struct Builder<'f, 'g> {
    forest: &'f Forest<'g>,
    /// Finished subtrees that do not depend on any choice
    shared: FastMap<SpanKey, Arc<ParseTree<'g>>>,
    /// Whether a span's sub-forest is acyclic with one derivation everywhere
    unambiguous: FastMap<SpanKey, bool>,
}

impl<'f, 'g> Builder<'f, 'g> {
    fn new(forest: &'f Forest<'g>) -> Self {
        Self {
            forest,
            shared: FastMap::default(),
            unambiguous: FastMap::default(),
        }
    }

    fn node(&self, key: SpanKey, children: Vec<Arc<ParseTree<'g>>>) -> Arc<ParseTree<'g>> {
        Arc::new(ParseTree {
            grammar: self.forest.set.grammar(key.element.slot),
            id: key.element.id,
            start: key.start,
            end: key.end,
            children,
        })
    }

    /// Walk a prefix chain back to its base, collecting the child spans left
    /// to right. `choose` picks a link whenever there is more than one.
    fn split(
        &self,
        prefix: ProgressKey,
        mut choose: impl FnMut(usize) -> usize,
    ) -> Option<Vec<SpanKey>> {
        let memo = &self.forest.memo;
        let mut pieces = Vec::new();
        let mut key = prefix;
        while !key.is_base() {
            let links = memo.links(&key);
            let link = *links.get(choose(links.len()))?;
            let child = self.forest.child_of_prefix(&key)?;
            pieces.push(SpanKey {
                element: child,
                start: link.split,
                end: key.end,
            });
            key = ProgressKey {
                progress: link.previous,
                end: link.split,
                ..key
            };
        }
        pieces.reverse();
        Some(pieces)
    }

    /// Child spans of one derivation, left to right. Prefix links are picked
    /// by `choose`; `None` if a link is missing.
    fn derivation_pieces(
        &self,
        key: SpanKey,
        derivation: Derivation,
        choose: impl FnMut(usize) -> usize,
    ) -> Option<Vec<SpanKey>> {
        if let Some(child) = self.forest.derivation_child(key, derivation) {
            return Some(vec![child]);
        }
        match Forest::derivation_prefix(key, derivation) {
            Some(prefix) => self.split(prefix, choose),
            None => Some(Vec::new()),
        }
    }

    /// Build from the earliest derivation and link of every node
    fn earliest(&mut self, key: SpanKey) -> Arc<ParseTree<'g>> {
        let mut stack = vec![Visit::Enter(key)];
        let mut built: Vec<Arc<ParseTree<'g>>> = Vec::new();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(key) => {
                    if let Some(tree) = self.shared.get(&key) {
                        built.push(Arc::clone(tree));
                        continue;
                    }
                    let pieces = match self.forest.memo.derivations(&key).first() {
                        Some(&derivation) => self
                            .derivation_pieces(key, derivation, |_| 0)
                            .unwrap_or_default(),
                        None => Vec::new(),
                    };
                    stack.push(Visit::Exit(key, pieces.len()));
                    stack.extend(pieces.into_iter().rev().map(Visit::Enter));
                }
                Visit::Exit(key, count) => {
                    let children = built.split_off(built.len() - count);
                    let tree = self.node(key, children);
                    self.shared.insert(key, Arc::clone(&tree));
                    built.push(tree);
                }
            }
        }
        built.pop().unwrap_or_else(|| self.node(key, Vec::new()))
    }

    /// Child spans to check under `key`, reversed for popping, or `None`
    /// when the node itself has several derivations or links. Marks the
    /// node as ambiguous until the check finishes, which is what a cycle
    /// back into it will see.
    fn open_check(&mut self, key: SpanKey) -> Option<Vec<SpanKey>> {
        self.unambiguous.insert(key, false);
        let &[derivation] = self.forest.memo.derivations(&key) else {
            return None;
        };
        let mut unique = true;
        let mut pieces = self.derivation_pieces(key, derivation, |n| {
            unique &= n == 1;
            0
        })?;
        if !unique {
            return None;
        }
        pieces.reverse();
        Some(pieces)
    }

    /// Whether the sub-forest under `key` is acyclic and has exactly one
    /// derivation and one link at every node
    fn is_unambiguous(&mut self, key: SpanKey) -> bool {
        if let Some(&known) = self.unambiguous.get(&key) {
            return known;
        }
        let pending = self.open_check(key);
        let mut stack = vec![(key, pending)];

        while let Some(top) = stack.last_mut() {
            let current = top.0;
            let next = match &mut top.1 {
                None => Err(false),
                Some(pending) => pending.pop().ok_or(true),
            };
            match next {
                Ok(child) => match self.unambiguous.get(&child).copied() {
                    Some(true) => {}
                    Some(false) => top.1 = None,
                    None => {
                        let pending = self.open_check(child);
                        stack.push((child, pending));
                    }
                },
                Err(result) => {
                    stack.pop();
                    self.unambiguous.insert(current, result);
                    if !result {
                        if let Some(parent) = stack.last_mut() {
                            parent.1 = None;
                        }
                    }
                }
            }
        }
        self.unambiguous.get(&key).copied().unwrap_or(false)
    }

    /// Build the tree selected by `cursor`. `None` means the choices lead
    /// back into a node already on `path`.
    ///
    /// Choice points are visited depth-first, left to right: a node's
    /// derivation, then its prefix links, then its children in order.
    fn build(
        &mut self,
        key: SpanKey,
        cursor: &mut Cursor<'_>,
        path: &mut FastSet<SpanKey>,
    ) -> Option<Arc<ParseTree<'g>>> {
        let mut stack = vec![Visit::Enter(key)];
        let mut built: Vec<Arc<ParseTree<'g>>> = Vec::new();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(key) => {
                    if let Some(tree) = self.shared.get(&key) {
                        built.push(Arc::clone(tree));
                        continue;
                    }
                    if self.is_unambiguous(key) {
                        let tree = self.earliest(key);
                        built.push(tree);
                        continue;
                    }
                    if !path.insert(key) {
                        return None;
                    }
                    let derivations = self.forest.memo.derivations(&key);
                    let derivation = *derivations.get(cursor.choose(derivations.len()))?;
                    let pieces =
                        self.derivation_pieces(key, derivation, |n| cursor.choose(n))?;
                    stack.push(Visit::Exit(key, pieces.len()));
                    stack.extend(pieces.into_iter().rev().map(Visit::Enter));
                }
                Visit::Exit(key, count) => {
                    path.remove(&key);
                    let children = built.split_off(built.len() - count);
                    built.push(self.node(key, children));
                }
            }
        }
        built.pop()
    }
}

/// Work item of the tree builders
#[derive(Debug, Clone, Copy)]
enum Visit {
    /// Build the node for this span
    Enter(SpanKey),
    /// Children are built; assemble the node from the last `n` results
    Exit(SpanKey, usize),
}

/// Lazy iterator over the trees of a [`Forest`]
pub struct Trees<'f, 'g> {
    builder: Builder<'f, 'g>,
    /// Choices for the next build; `None` once every combination was tried
    next: Option<Vec<usize>>,
}

impl<'g> Iterator for Trees<'_, 'g> {
    type Item = ParseTree<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let planned = self.next.take()?;
            let mut cursor = Cursor::new(&planned);
            let mut path = FastSet::default();
            let root = self.builder.forest.root;
            let tree = self.builder.build(root, &mut cursor, &mut path);
            self.next = cursor.successor();
            if let Some(tree) = tree {
                return Some(Arc::try_unwrap(tree).unwrap_or_else(|shared| (*shared).clone()));
            }
        }
    }
}

impl fmt::Debug for Trees<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trees")
            .field("exhausted", &self.next.is_none())
            .finish()
    }
}
