use crate::{Document, NodeKey, NodeKind};
use std::fmt;

/// Deterministic line rendering of a subtree for test comparisons.
///
/// Equivalence rules:
/// - Node kinds, element names and character data must match.
/// - Attribute order is significant; valueless attributes render bare.
/// - Shadow roots render as `#shadow-root` ahead of the host's light children.
/// - Node keys never appear in the output, so two documents built with
///   different allocation histories compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(doc: &Document, root: NodeKey) -> Self {
        let mut lines = Vec::new();
        walk(doc, root, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn walk(doc: &Document, key: NodeKey, depth: usize, out: &mut Vec<String>) {
    let Some(kind) = doc.kind(key) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let line = match kind {
        NodeKind::Document => "#document".to_string(),
        NodeKind::Element { name, attributes } => {
            let mut line = format!("| {indent}<{name}");
            for (k, v) in attributes {
                match v {
                    Some(v) => line.push_str(&format!(" {k}=\"{v}\"")),
                    None => line.push_str(&format!(" {k}")),
                }
            }
            line.push('>');
            line
        }
        NodeKind::Text { text } => format!("| {indent}\"{text}\""),
        NodeKind::Comment { text } => format!("| {indent}<!-- {text} -->"),
        NodeKind::ShadowRoot { .. } => format!("| {indent}#shadow-root"),
    };
    out.push(line);
    let child_depth = if matches!(kind, NodeKind::Document) { 0 } else { depth + 1 };
    if let Some(shadow) = doc.shadow_root(key) {
        walk(doc, shadow, child_depth, out);
    }
    for child in doc.children(key) {
        walk(doc, *child, child_depth, out);
    }
}
