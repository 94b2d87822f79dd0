use crate::SerializedArg;
use core_types::{CanvasContext, MirrorId};
use dom::NodePayload;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: MirrorId,
    pub payload: NodePayload,
}

/// One inserted node. `next_id` names the sibling that must directly follow
/// the node once replayed; it may refer to a node inserted later in the
/// same batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedNodeMutation {
    pub parent_id: Option<MirrorId>,
    pub next_id: Option<MirrorId>,
    pub node: SerializedNode,
}

impl AddedNodeMutation {
    pub fn id(&self) -> MirrorId {
        self.node.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNodeMutation {
    pub parent_id: MirrorId,
    pub id: MirrorId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMutation {
    pub id: MirrorId,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub id: MirrorId,
    pub attributes: Vec<(String, Option<String>)>,
}

/// One change-notification batch, keyed by node mirror ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationData {
    pub adds: Vec<AddedNodeMutation>,
    pub removes: Vec<RemovedNodeMutation>,
    pub texts: Vec<TextMutation>,
    pub attributes: Vec<AttributeMutation>,
}

impl MutationData {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty()
            && self.removes.is_empty()
            && self.texts.is_empty()
            && self.attributes.is_empty()
    }
}

/// A recorded method call or property assignment on an observed object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMutation {
    pub owner: MirrorId,
    pub context: CanvasContext,
    pub member: String,
    pub args: Vec<SerializedArg>,
    #[serde(default)]
    pub is_assignment: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordEvent {
    Mutation(MutationData),
    Call(CallMutation),
    /// An opaque object received its variable index; replay must create a
    /// counterpart before the index is referenced.
    #[serde(rename_all = "camelCase")]
    VariableCreated {
        owner: MirrorId,
        context: CanvasContext,
        class: String,
        index: MirrorId,
    },
    /// First rendering context requested on a canvas node.
    #[serde(rename_all = "camelCase")]
    ContextCreated {
        owner: MirrorId,
        context: CanvasContext,
    },
}

/// Keep only the latest text change per node, newest first.
pub fn unique_text_mutations(mutations: &[TextMutation]) -> Vec<TextMutation> {
    let mut seen = std::collections::HashSet::new();
    mutations
        .iter()
        .rev()
        .filter(|m| seen.insert(m.id))
        .cloned()
        .collect()
}
