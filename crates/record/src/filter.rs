use dom::{Document, NodeKey, NodeKind, Selector};
use mirror::NodeMirror;
use regex::Regex;

/// Which subtrees the recorder must not observe.
///
/// Both rules are optional; with neither configured nothing is blocked.
/// `class_pattern` is tested against each class token of an element.
#[derive(Debug, Clone, Default)]
pub struct BlockPolicy {
    pub selector: Option<Selector>,
    pub class_pattern: Option<Regex>,
    pub check_ancestors: bool,
}

impl BlockPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn selector(selector: Selector, check_ancestors: bool) -> Self {
        Self {
            selector: Some(selector),
            class_pattern: None,
            check_ancestors,
        }
    }

    pub fn class_pattern(pattern: Regex, check_ancestors: bool) -> Self {
        Self {
            selector: None,
            class_pattern: Some(pattern),
            check_ancestors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selector.is_none() && self.class_pattern.is_none()
    }

    fn matches(&self, doc: &Document, el: NodeKey) -> bool {
        if let Some(pattern) = &self.class_pattern {
            if doc.class_list(el).any(|class| pattern.is_match(class)) {
                return true;
            }
        }
        self.selector
            .as_ref()
            .is_some_and(|selector| selector.matches(doc, el))
    }
}

/// Whether `node` falls under `policy`.
///
/// Non-element nodes are judged by their parent element. With
/// `check_ancestors` every element ancestor up to the nearest shadow root
/// or the document is considered too. Evaluated against the live tree on
/// every call.
pub fn is_blocked(doc: &Document, node: NodeKey, policy: &BlockPolicy) -> bool {
    if policy.is_empty() {
        return false;
    }
    let el = if doc.is_element(node) {
        node
    } else {
        match doc.parent_element(node) {
            Some(el) => el,
            None => return false,
        }
    };
    if policy.matches(doc, el) {
        return true;
    }
    policy.check_ancestors
        && doc
            .ancestors(el)
            .any(|ancestor| doc.is_element(ancestor) && policy.matches(doc, ancestor))
}

/// Whether `node` or one of its ancestors has left the mirrored tree.
///
/// Shadow roots are never considered removed; a node whose chain ends
/// anywhere but the document is.
pub fn is_ancestor_removed(doc: &Document, nodes: &NodeMirror, node: NodeKey) -> bool {
    let mut current = node;
    loop {
        if doc.is_shadow_root(current) {
            return false;
        }
        if !nodes.has_id(nodes.get_id(current)) {
            return true;
        }
        match doc.parent(current) {
            Some(parent) if matches!(doc.kind(parent), Some(NodeKind::Document)) => return false,
            Some(parent) => current = parent,
            None => return true,
        }
    }
}
