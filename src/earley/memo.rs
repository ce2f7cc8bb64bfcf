//! Completion memo
//!
//! The memo is the raw material of the parse forest. It records two things:
//!
//! 1. **Completions**: for every span `(element, start, end)` that was
//!    recognized, the list of distinct ways ([`Derivation`]s) it was
//!    recognized.
//! 2. **Partials**: for concatenations and repetitions, how each prefix
//!    `(element, progress, start, end)` was reached, as a list of [`Link`]s
//!    to the shorter prefix and the span of the child that extended it.
//!
//! The base prefix `(element, 0, start, start)` is implicit and never stored.
//! Recording is idempotent: adding a derivation or link that is already
//! present leaves the memo unchanged.

use super::grammar::ElementKey;
use super::FastMap;
use std::mem;

/// A recognized span of one element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SpanKey {
    pub element: ElementKey,
    pub start: usize,
    pub end: usize,
}

/// A recognized prefix of a concatenation or repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ProgressKey {
    pub element: ElementKey,
    pub progress: u32,
    pub start: usize,
    pub end: usize,
}

impl ProgressKey {
    /// The implicit empty prefix every concatenation and repetition starts from
    pub fn is_base(&self) -> bool {
        self.progress == 0 && self.start == self.end
    }
}

/// One way a span was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Derivation {
    /// A literal matched (or an empty literal completed)
    Terminal,
    /// An alternation completed through its `alternative`-th child
    Choice { alternative: u32 },
    /// A concatenation completed; children are read from the partial
    /// `(element, len, start, end)`
    Sequence { len: u32 },
    /// A repetition completed in iteration state `count`; children are read
    /// from the partial `(element, count, start, end)`
    Repeat { count: u32 },
    /// A rule call completed through the rule's root element
    Call { target: ElementKey },
}

/// How a prefix was extended: the previous prefix ended at `split`, the child
/// spans `split..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Link {
    pub previous: u32,
    pub split: usize,
}

/// Completion and partial-progress records for one parse
#[derive(Debug, Default)]
pub struct Memo {
    completions: FastMap<SpanKey, Vec<Derivation>>,
    partials: FastMap<ProgressKey, Vec<Link>>,
    derivations: usize,
    links: usize,
}

impl Memo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a derivation for a span. Returns `true` if it was not already
    /// present.
    pub(crate) fn record_completion(&mut self, key: SpanKey, derivation: Derivation) -> bool {
        let entry = self.completions.entry(key).or_default();
        if entry.contains(&derivation) {
            return false;
        }
        entry.push(derivation);
        self.derivations += 1;
        true
    }

    /// Record a link for a prefix. Returns `true` if it was not already
    /// present.
    pub(crate) fn record_link(&mut self, key: ProgressKey, link: Link) -> bool {
        let entry = self.partials.entry(key).or_default();
        if entry.contains(&link) {
            return false;
        }
        entry.push(link);
        self.links += 1;
        true
    }

    /// Derivations of a span, in the order they were recorded
    pub(crate) fn derivations(&self, key: &SpanKey) -> &[Derivation] {
        self.completions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Links of a prefix, in the order they were recorded
    pub(crate) fn links(&self, key: &ProgressKey) -> &[Link] {
        self.partials.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the span was recognized
    pub(crate) fn contains(&self, key: &SpanKey) -> bool {
        self.completions.contains_key(key)
    }

    pub(crate) fn spans(&self) -> impl Iterator<Item = (&SpanKey, &[Derivation])> + '_ {
        self.completions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub(crate) fn prefixes(&self) -> impl Iterator<Item = (&ProgressKey, &[Link])> + '_ {
        self.partials.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of recognized spans
    pub fn len(&self) -> usize {
        self.completions.len()
    }

    /// Whether nothing has been recognized
    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }

    /// Total derivations recorded across all spans
    pub fn derivation_count(&self) -> usize {
        self.derivations
    }

    /// Total links recorded across all prefixes
    pub fn link_count(&self) -> usize {
        self.links
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.completions.capacity()
            * (mem::size_of::<SpanKey>() + mem::size_of::<Vec<Derivation>>())
            + self.partials.capacity()
                * (mem::size_of::<ProgressKey>() + mem::size_of::<Vec<Link>>())
            + self.derivations * mem::size_of::<Derivation>()
            + self.links * mem::size_of::<Link>()
    }
}

#[cfg(test)]
mod tests {
    use super::super::grammar::ElementId;
    use super::*;

    fn span(id: u32, start: usize, end: usize) -> SpanKey {
        SpanKey {
            element: ElementKey {
                slot: 0,
                id: ElementId(id),
            },
            start,
            end,
        }
    }

    #[test]
    fn test_record_completion_dedups() {
        let mut memo = Memo::new();
        let key = span(0, 0, 1);
        assert!(memo.record_completion(key, Derivation::Choice { alternative: 0 }));
        assert!(memo.record_completion(key, Derivation::Choice { alternative: 1 }));
        assert!(!memo.record_completion(key, Derivation::Choice { alternative: 0 }));
        assert_eq!(memo.derivations(&key).len(), 2);
        assert_eq!(memo.derivation_count(), 2);
        assert_eq!(memo.len(), 1);
        assert!(memo.contains(&key));
        assert!(!memo.contains(&span(0, 0, 2)));
    }

    #[test]
    fn test_record_link_dedups() {
        let mut memo = Memo::new();
        let key = ProgressKey {
            element: span(1, 0, 0).element,
            progress: 2,
            start: 0,
            end: 4,
        };
        let link = Link {
            previous: 1,
            split: 2,
        };
        assert!(memo.record_link(key, link));
        assert!(!memo.record_link(key, link));
        assert_eq!(memo.links(&key), &[link]);
        assert_eq!(memo.link_count(), 1);
    }

    #[test]
    fn test_missing_entries_are_empty() {
        let memo = Memo::new();
        assert!(memo.is_empty());
        assert!(memo.derivations(&span(3, 1, 2)).is_empty());
        let base = ProgressKey {
            element: span(3, 1, 1).element,
            progress: 0,
            start: 1,
            end: 1,
        };
        assert!(base.is_base());
        assert!(memo.links(&base).is_empty());
    }
}
