use core_types::{CanvasContext, MirrorId};
use dom::DomError;
use record::HostError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A record names a node id the replay document does not hold.
    MissingNode(MirrorId),
    /// A call arrived for a canvas with no announced context.
    NoContext(MirrorId),
    /// The replay canvas refused the announced context type.
    ContextUnavailable {
        owner: MirrorId,
        context: CanvasContext,
    },
    MissingVariable {
        class: String,
        index: MirrorId,
    },
    /// An assignment record without a value.
    MissingValue {
        owner: MirrorId,
        member: String,
    },
    Dom(DomError),
    Host(HostError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::MissingNode(id) => write!(f, "node {id} not found"),
            ReplayError::NoContext(owner) => write!(f, "canvas {owner} has no context"),
            ReplayError::ContextUnavailable { owner, context } => {
                write!(f, "canvas {owner} cannot provide a {} context", context.as_str())
            }
            ReplayError::MissingVariable { class, index } => {
                write!(f, "no {class} with index {index}")
            }
            ReplayError::MissingValue { owner, member } => {
                write!(f, "assignment to {member} on canvas {owner} carries no value")
            }
            ReplayError::Dom(err) => write!(f, "{err}"),
            ReplayError::Host(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Dom(err) => Some(err),
            ReplayError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for ReplayError {
    fn from(err: DomError) -> Self {
        ReplayError::Dom(err)
    }
}

impl From<HostError> for ReplayError {
    fn from(err: HostError) -> Self {
        ReplayError::Host(err)
    }
}
