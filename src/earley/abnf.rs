//! ABNF rendering
//!
//! Grammars and elements print as RFC 5234 style ABNF. The output is meant for
//! humans (diagnostics, debugging); it is not parsed back.
//!
//! Literal strings are split into runs: printable ASCII other than `"` is
//! rendered as a quoted char-val (prefixed with `%s` when case-sensitive), all
//! other bytes as dotted hex (`%x0D.0A`).

use super::grammar::{Element, ElementId, Grammar};
use std::fmt::{self, Write as _};

/// Display adapter for one element of a grammar
#[derive(Debug, Clone, Copy)]
pub struct ElementDisplay<'g> {
    grammar: &'g Grammar,
    id: ElementId,
    nested: bool,
}

impl Grammar {
    /// ABNF rendering of an element
    pub fn display_element(&self, id: ElementId) -> ElementDisplay<'_> {
        ElementDisplay {
            grammar: self,
            id,
            nested: false,
        }
    }
}

impl<'g> ElementDisplay<'g> {
    fn child(&self, id: ElementId, nested: bool) -> ElementDisplay<'g> {
        ElementDisplay {
            grammar: self.grammar,
            id,
            nested,
        }
    }

    fn write_group(
        &self,
        f: &mut fmt::Formatter<'_>,
        items: &[ElementId],
        sep: &str,
    ) -> fmt::Result {
        match items {
            [] => f.write_str("()"),
            [only] => fmt::Display::fmt(&self.child(*only, self.nested), f),
            _ => {
                if self.nested {
                    f.write_char('(')?;
                }
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    fmt::Display::fmt(&self.child(item, true), f)?;
                }
                if self.nested {
                    f.write_char(')')?;
                }
                Ok(())
            }
        }
    }

    fn write_repetition(
        &self,
        f: &mut fmt::Formatter<'_>,
        element: ElementId,
        lower: u32,
        upper: Option<u32>,
    ) -> fmt::Result {
        match upper {
            Some(upper) if upper == lower => match lower {
                0 => f.write_str("()"),
                1 => fmt::Display::fmt(&self.child(element, self.nested), f),
                n => write!(f, "{}{}", n, self.child(element, true)),
            },
            None if lower == 0 => write!(f, "*{}", self.child(element, true)),
            None => write!(f, "{}*{}", lower, self.child(element, true)),
            Some(1) => write!(f, "[{}]", self.child(element, false)),
            Some(upper) => write!(f, "{}*{}{}", lower, upper, self.child(element, true)),
        }
    }
}

fn is_char_val(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) && byte != b'"'
}

/// Render a literal byte string as a space-separated list of ABNF components
fn literal_components(bytes: &[u8], case_sensitive: bool) -> Vec<String> {
    let mut components = Vec::new();
    let mut rest = bytes;
    while let Some(&first) = rest.first() {
        let quoted = is_char_val(first);
        let run = rest
            .iter()
            .position(|&b| is_char_val(b) != quoted)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(run);
        let mut text = String::new();
        if quoted {
            if case_sensitive {
                text.push_str("%s");
            }
            text.push('"');
            text.extend(chunk.iter().map(|&b| b as char));
            text.push('"');
        } else {
            text.push_str("%x");
            for (i, b) in chunk.iter().enumerate() {
                if i > 0 {
                    text.push('.');
                }
                let _ = write!(text, "{:02X}", b);
            }
        }
        components.push(text);
        rest = tail;
    }
    components
}

impl fmt::Display for ElementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.grammar.element(self.id) {
            Element::Alternation { alternatives } => self.write_group(f, alternatives, " / "),
            Element::Concatenation { elements } => self.write_group(f, elements, " "),
            Element::Repetition {
                element,
                lower,
                upper,
            } => self.write_repetition(f, *element, *lower, *upper),
            Element::LiteralString {
                bytes,
                case_sensitive,
            } => {
                let components = literal_components(bytes, *case_sensitive);
                match components.len() {
                    0 => f.write_str("\"\""),
                    1 => f.write_str(&components[0]),
                    _ if self.nested => write!(f, "({})", components.join(" ")),
                    _ => f.write_str(&components.join(" ")),
                }
            }
            Element::LiteralRange { first, last } => write!(f, "%x{:02X}-{:02X}", first, last),
            Element::RuleCall { rule } => f.write_str(rule),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "; ===== Grammar {} =====", self.name())?;
        if !self.imports().is_empty() {
            let names: Vec<&str> = self.imports().iter().map(|g| g.name()).collect();
            write!(f, "\n; uses rules from {}", names.join(", "))?;
        }
        for rule in self.rules() {
            write!(f, "\n{} = {}", rule.name, self.display_element(rule.root))?;
        }
        Ok(())
    }
}
