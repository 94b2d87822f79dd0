use std::fmt;
use std::sync::Arc;

/// Non-owning handle to a node in a [`Document`](crate::Document).
///
/// Freeing a node bumps the generation of its slot, so a stale key never
/// aliases a node created later in the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeKey {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
    /// Document-fragment-like root attached to an element host.
    ShadowRoot {
        host: NodeKey,
    },
}

impl NodeKind {
    pub fn allows_children(&self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::Element { .. } | NodeKind::ShadowRoot { .. }
        )
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    MissingKey(NodeKey),
    WrongNodeKind(NodeKey),
    InvalidParent(NodeKey),
    InvalidSibling { parent: NodeKey, before: NodeKey },
    CycleDetected { parent: NodeKey, child: NodeKey },
    ShadowRootExists(NodeKey),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::MissingKey(key) => write!(f, "node {key:?} is not live"),
            DomError::WrongNodeKind(key) => write!(f, "node {key:?} has the wrong kind"),
            DomError::InvalidParent(key) => write!(f, "node {key:?} cannot have children"),
            DomError::InvalidSibling { parent, before } => {
                write!(f, "{before:?} is not a child of {parent:?}")
            }
            DomError::CycleDetected { parent, child } => {
                write!(f, "inserting {child:?} under {parent:?} would create a cycle")
            }
            DomError::ShadowRootExists(host) => {
                write!(f, "element {host:?} already hosts a shadow root")
            }
        }
    }
}

impl std::error::Error for DomError {}
