//! # dom
//!
//! Live host document used by the recorder and rebuilt by the replay side.
//!
//! The recorder never owns nodes: it holds [`NodeKey`] handles, which go
//! stale when the document frees the node. Everything the recording core
//! needs from a node is exposed here: kind discriminants, ancestry links,
//! shadow-root hosting, attribute/class lookup and selector matching.

mod document;
mod payload;
mod selector;
mod snapshot;
mod traverse;
mod types;

pub use document::Document;
pub use payload::NodePayload;
pub use selector::{Selector, SelectorError};
pub use snapshot::DomSnapshot;
pub use traverse::{Ancestors, Descendants};
pub use types::{DomError, NodeKey, NodeKind};
