use crate::capability::CapabilityFamily;
use crate::host::{HostObject, ObjectHandle, Value};
use bus::{SerializedArg, TaggedArg};
use core_types::{IGNORED_NODE, MirrorId, NOT_MIRRORED};
use mirror::{NodeMirror, VariableMirror};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// A variable index minted while serializing; replay has to create the
/// counterpart object before the index is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedVariable {
    pub class: String,
    pub index: MirrorId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Serialized {
    pub args: Vec<SerializedArg>,
    pub created: Vec<CreatedVariable>,
}

/// Converts call arguments into stream values.
///
/// Rules, first match wins: primitives pass through, arrays recurse, typed
/// buffers are copied, objects of the observed family go through the
/// variable mirror, mirrored nodes become node references, and anything
/// else becomes an unsupported marker.
///
/// The variable mirror is keyed by object handle and never keeps an object
/// alive; [`ArgumentSerializer::prune`] drops entries for dead objects.
#[derive(Debug, Default)]
pub struct ArgumentSerializer {
    variables: VariableMirror<ObjectHandle>,
    live: HashMap<ObjectHandle, Weak<HostObject>>,
}

impl ArgumentSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize_args(
        &mut self,
        args: &[Value],
        family: &CapabilityFamily,
        nodes: &NodeMirror,
    ) -> Serialized {
        let mut created = Vec::new();
        let args = args
            .iter()
            .map(|value| self.serialize_into(value, family, nodes, &mut created))
            .collect();
        Serialized { args, created }
    }

    pub fn serialize(
        &mut self,
        value: &Value,
        family: &CapabilityFamily,
        nodes: &NodeMirror,
    ) -> Serialized {
        let mut created = Vec::new();
        let arg = self.serialize_into(value, family, nodes, &mut created);
        Serialized {
            args: vec![arg],
            created,
        }
    }

    fn serialize_into(
        &mut self,
        value: &Value,
        family: &CapabilityFamily,
        nodes: &NodeMirror,
        created: &mut Vec<CreatedVariable>,
    ) -> SerializedArg {
        match value {
            Value::Undefined => SerializedArg::undefined(),
            Value::Null => SerializedArg::Null,
            Value::Bool(b) => SerializedArg::Bool(*b),
            Value::Number(n) => SerializedArg::Number(*n),
            Value::String(s) => SerializedArg::String(s.clone()),
            Value::Array(items) => SerializedArg::Array(
                items
                    .iter()
                    .map(|item| self.serialize_into(item, family, nodes, created))
                    .collect(),
            ),
            Value::Typed(array) => SerializedArg::Object(TaggedArg::TypedArray {
                element: array.element(),
                values: array.snapshot(),
            }),
            Value::ArrayBuffer(bytes) => SerializedArg::Object(TaggedArg::ArrayBuffer {
                bytes: bytes.borrow().clone(),
            }),
            Value::Object(obj) if family.is_variable_class(obj.class()) => {
                let (index, fresh) = self.save(obj);
                if fresh {
                    created.push(CreatedVariable {
                        class: obj.class().to_string(),
                        index,
                    });
                }
                SerializedArg::Object(TaggedArg::Variable {
                    class: obj.class().to_string(),
                    index,
                })
            }
            Value::Node(key) => match nodes.get_id(*key) {
                NOT_MIRRORED | IGNORED_NODE => SerializedArg::unsupported("Node"),
                id => SerializedArg::Object(TaggedArg::Node { id }),
            },
            Value::Object(obj) => {
                log::trace!(
                    target: "record.serialize",
                    "{} is outside {}",
                    obj.class(),
                    family.class
                );
                SerializedArg::unsupported(obj.class())
            }
            Value::Function(_) => SerializedArg::unsupported("Function"),
        }
    }

    fn save(&mut self, obj: &Rc<HostObject>) -> (MirrorId, bool) {
        let (index, fresh) = self.variables.save(obj.class(), obj.handle());
        if fresh {
            self.live.insert(obj.handle(), Rc::downgrade(obj));
        }
        (index, fresh)
    }

    /// Register the return value of an observed call so that an object is
    /// indexed when it is created rather than when it is first passed back.
    pub fn save_result(
        &mut self,
        value: &Value,
        family: &CapabilityFamily,
    ) -> Option<CreatedVariable> {
        let obj = value.as_object()?;
        if !family.is_variable_class(obj.class()) {
            return None;
        }
        let (index, fresh) = self.save(obj);
        fresh.then(|| CreatedVariable {
            class: obj.class().to_string(),
            index,
        })
    }

    pub fn index_of(&self, obj: &HostObject) -> MirrorId {
        self.variables.index_of(obj.class(), obj.handle())
    }

    /// Drop variable entries whose objects no longer exist.
    pub fn prune(&mut self) -> usize {
        let before = self.live.len();
        self.live.retain(|_, weak| weak.strong_count() > 0);
        let live = &self.live;
        self.variables.retain(|handle| live.contains_key(&handle));
        before - self.live.len()
    }

    pub fn reset(&mut self) {
        self.variables.reset();
        self.live.clear();
    }
}
