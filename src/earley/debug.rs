//! Developer tools
//!
//! Printing and visualization for parse results:
//! - [`TreePrinter`] renders one parse tree as indented text
//! - [`ForestPrinter`] renders the shared forest as a Graphviz DOT graph
//! - `Display` for [`ParseStats`] summarizes the chart of a parse

use super::forest::{Forest, ParseStats, ParseTree};
use super::grammar::Element;
use super::memo::{ProgressKey, SpanKey};
use super::FastMap;
use std::fmt::{self, Write};

/// Parse tree pretty printer
pub struct TreePrinter {
    /// Indentation string
    indent: String,
    /// Maximum depth to print
    max_depth: Option<usize>,
    /// Show the matched text of every node, not just terminals
    show_text: bool,
}

impl TreePrinter {
    /// Create a new tree printer
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
            show_text: false,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Show matched text on non-terminal nodes too
    pub fn show_text(mut self, show: bool) -> Self {
        self.show_text = show;
        self
    }

    /// Print a parse tree
    pub fn print(&self, tree: &ParseTree<'_>, input: &[u8]) -> String {
        let mut output = String::new();
        let mut pending = vec![(tree, 0)];
        while let Some((node, depth)) = pending.pop() {
            if self.print_node(node, input, depth, &mut output) {
                pending.extend(node.children().iter().rev().map(|c| (c.as_ref(), depth + 1)));
            }
        }
        output
    }

    /// Print one line for `node`; `false` when its children are cut off
    fn print_node(
        &self,
        node: &ParseTree<'_>,
        input: &[u8],
        depth: usize,
        output: &mut String,
    ) -> bool {
        let indent = self.indent.repeat(depth);
        if self.max_depth.is_some_and(|max| depth > max) {
            let _ = writeln!(output, "{}...", indent);
            return false;
        }

        let _ = write!(output, "{}{}", indent, node.kind());
        match node.element() {
            Element::RuleCall { rule } => {
                let _ = write!(output, " {}", rule);
            }
            _ if depth == 0 => {
                let _ = write!(output, " ({})", node.owner_rule());
            }
            _ => {}
        }
        let _ = write!(output, " {}..{}", node.start(), node.end());
        if self.show_text || node.is_terminal() {
            let _ = write!(output, " \"{}\"", node.text(input).escape_ascii());
        }
        output.push('\n');
        true
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared forest visualizer
///
/// Span nodes are ellipses, binarized prefix nodes are boxes, and packed
/// derivations of ambiguous nodes are small points.
pub struct ForestPrinter<'f, 'g> {
    forest: &'f Forest<'g>,
}

impl<'f, 'g> ForestPrinter<'f, 'g> {
    /// Create a new forest printer
    pub fn new(forest: &'f Forest<'g>) -> Self {
        Self { forest }
    }

    /// Generate a Graphviz DOT graph of every span and prefix in the forest
    pub fn to_dot(&self) -> String {
        let forest = self.forest;
        let memo = forest.memo();
        let set = forest.set();

        let mut spans: Vec<SpanKey> = memo.spans().map(|(k, _)| *k).collect();
        spans.sort_by_key(|k| (k.start, k.end, k.element));
        let mut prefixes: Vec<ProgressKey> = memo.prefixes().map(|(k, _)| *k).collect();
        prefixes.sort_by_key(|k| (k.start, k.end, k.element, k.progress));

        let span_ids: FastMap<SpanKey, usize> =
            spans.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let prefix_ids: FastMap<ProgressKey, usize> =
            prefixes.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let span_node = |key: &SpanKey| span_ids.get(key).map(|i| format!("s{}", i));
        let prefix_node = |key: &ProgressKey| prefix_ids.get(key).map(|i| format!("q{}", i));

        let mut output = String::new();
        output.push_str("digraph forest {\n");
        output.push_str("  node [fontname=\"monospace\"];\n");

        for (i, key) in spans.iter().enumerate() {
            let element = set.element(key.element);
            let mut label = format!("{} {}", element.kind(), escape(set.rule_name(key.element)));
            if let Element::RuleCall { rule } = element {
                let _ = write!(label, " -> {}", escape(rule));
            }
            let root = if *key == forest.root_key() {
                ", peripheries=2"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "  s{} [label=\"{}\\n[{}..{})\"{}];",
                i, label, key.start, key.end, root
            );
        }
        for (i, key) in prefixes.iter().enumerate() {
            let _ = writeln!(
                output,
                "  q{} [shape=box, label=\"{} {}/{}\\n[{}..{})\"];",
                i,
                set.element(key.element).kind(),
                escape(set.rule_name(key.element)),
                key.progress,
                key.start,
                key.end
            );
        }

        for (i, key) in spans.iter().enumerate() {
            let derivations = memo.derivations(key);
            for (d, &derivation) in derivations.iter().enumerate() {
                let from = if derivations.len() > 1 {
                    let packed = format!("s{}_{}", i, d);
                    let _ = writeln!(output, "  {} [shape=point];", packed);
                    let _ = writeln!(output, "  s{} -> {};", i, packed);
                    packed
                } else {
                    format!("s{}", i)
                };
                let child = forest
                    .derivation_child(*key, derivation)
                    .and_then(|c| span_node(&c))
                    .or_else(|| {
                        Forest::derivation_prefix(*key, derivation).and_then(|p| prefix_node(&p))
                    });
                if let Some(child) = child {
                    let _ = writeln!(output, "  {} -> {};", from, child);
                }
            }
        }

        for (i, key) in prefixes.iter().enumerate() {
            let links = memo.links(key);
            let Some(element) = forest.child_of_prefix(key) else {
                continue;
            };
            for (l, link) in links.iter().enumerate() {
                let from = if links.len() > 1 {
                    let packed = format!("q{}_{}", i, l);
                    let _ = writeln!(output, "  {} [shape=point];", packed);
                    let _ = writeln!(output, "  q{} -> {};", i, packed);
                    packed
                } else {
                    format!("q{}", i)
                };
                let previous = ProgressKey {
                    progress: link.previous,
                    end: link.split,
                    ..*key
                };
                if let Some(previous) = prefix_node(&previous) {
                    let _ = writeln!(output, "  {} -> {} [style=dashed];", from, previous);
                }
                let child = SpanKey {
                    element,
                    start: link.split,
                    end: key.end,
                };
                if let Some(child) = span_node(&child) {
                    let _ = writeln!(output, "  {} -> {};", from, child);
                }
            }
        }

        output.push_str("}\n");
        output
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input: {} bytes, furthest: {}, frames: {}, joins: {}, spans: {}, derivations: {}",
            self.input_len, self.furthest, self.frames, self.joins, self.spans, self.derivations
        )
    }
}
