//! # mirror
//!
//! Identity tables that make live objects addressable in a serialized
//! stream: [`NodeMirror`] for document nodes, [`StyleSheetMirror`] and
//! [`VariableMirror`] for auxiliary resources.
//!
//! Lookups never fail loudly: unknown handles yield
//! [`NOT_MIRRORED`](core_types::NOT_MIRRORED) or `None` and callers branch on
//! that. Ids must be re-validated with `has`/`get_ref` after a `reset`.

mod mirror;
mod stylesheet;
mod variable;

pub use mirror::Mirror;
pub use stylesheet::{StyleSheetMirror, nested_rule_position};
pub use variable::VariableMirror;

/// Node identity table keyed by non-owning document handles.
pub type NodeMirror = Mirror<dom::NodeKey>;

/// Drop entries for nodes the document has freed.
pub fn prune_dead_nodes(mirror: &mut NodeMirror, doc: &dom::Document) {
    let before = mirror.len();
    mirror.retain(|key| doc.contains(key));
    let dropped = before - mirror.len();
    if dropped > 0 {
        log::trace!(target: "mirror", "pruned {dropped} dead node entries");
    }
}
