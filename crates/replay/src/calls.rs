//! Re-issues recorded canvas calls against a local set of canvas
//! interfaces.

use crate::document::ReplayDocument;
use crate::error::ReplayError;
use bus::{CallMutation, SerializedArg, TaggedArg};
use core_types::{CanvasContext, MirrorId};
use mirror::VariableMirror;
use record::host::TypedArray;
use record::{HostObject, NativeCanvas, ObjectHandle, ObjectRef, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct CallReplayer {
    native: NativeCanvas,
    canvases: HashMap<MirrorId, ObjectRef>,
    contexts: HashMap<MirrorId, ObjectRef>,
    variables: VariableMirror<ObjectHandle>,
    objects: HashMap<ObjectHandle, ObjectRef>,
    /// Object returned by the latest call, claimed by the create record
    /// that follows it.
    last_result: Option<ObjectRef>,
}

impl CallReplayer {
    pub fn new() -> Self {
        Self {
            native: NativeCanvas::new(),
            canvases: HashMap::new(),
            contexts: HashMap::new(),
            variables: VariableMirror::new(),
            objects: HashMap::new(),
            last_result: None,
        }
    }

    fn canvas(&mut self, doc: &ReplayDocument, owner: MirrorId) -> Result<ObjectRef, ReplayError> {
        if let Some(canvas) = self.canvases.get(&owner) {
            return Ok(Rc::clone(canvas));
        }
        let node = doc.node(owner).ok_or(ReplayError::MissingNode(owner))?;
        let canvas = self.native.canvas(node);
        self.canvases.insert(owner, Rc::clone(&canvas));
        Ok(canvas)
    }

    pub fn create_context(
        &mut self,
        doc: &ReplayDocument,
        owner: MirrorId,
        context: CanvasContext,
    ) -> Result<(), ReplayError> {
        let canvas = self.canvas(doc, owner)?;
        let created = canvas.call("getContext", &[Value::String(context.as_str().to_string())])?;
        let Some(ctx) = created.as_object() else {
            return Err(ReplayError::ContextUnavailable { owner, context });
        };
        self.contexts.insert(owner, Rc::clone(ctx));
        Ok(())
    }

    /// Bind `index` to the object the previous call returned when its class
    /// matches, or to a fresh stand-in otherwise.
    pub fn create_variable(
        &mut self,
        doc: &ReplayDocument,
        owner: MirrorId,
        class: &str,
        index: MirrorId,
    ) {
        let object = match self.last_result.take() {
            Some(obj) if obj.class() == class => obj,
            _ => {
                log::trace!(target: "replay.calls", "{class}#{index} has no producing call");
                let obj = HostObject::plain(class);
                obj.set_owner(doc.node(owner));
                obj
            }
        };
        self.variables.insert(class, index, object.handle());
        self.objects.insert(object.handle(), object);
    }

    pub fn call(&mut self, doc: &ReplayDocument, call: &CallMutation) -> Result<(), ReplayError> {
        self.last_result = None;
        let ctx = self
            .contexts
            .get(&call.owner)
            .cloned()
            .ok_or(ReplayError::NoContext(call.owner))?;
        let mut args = call
            .args
            .iter()
            .map(|arg| self.decode(doc, arg))
            .collect::<Result<Vec<_>, _>>()?;

        if call.is_assignment {
            if args.is_empty() {
                return Err(ReplayError::MissingValue {
                    owner: call.owner,
                    member: call.member.clone(),
                });
            }
            ctx.set(&call.member, args.swap_remove(0))?;
            return Ok(());
        }
        let result = ctx.call(&call.member, &args)?;
        self.last_result = result.as_object().cloned();
        Ok(())
    }

    fn decode(&self, doc: &ReplayDocument, arg: &SerializedArg) -> Result<Value, ReplayError> {
        let value = match arg {
            SerializedArg::Null => Value::Null,
            SerializedArg::Bool(b) => Value::Bool(*b),
            SerializedArg::Number(n) => Value::Number(*n),
            SerializedArg::String(s) => Value::String(s.clone()),
            SerializedArg::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.decode(doc, item))
                    .collect::<Result<_, _>>()?,
            ),
            SerializedArg::Object(TaggedArg::Undefined) => Value::Undefined,
            SerializedArg::Object(TaggedArg::TypedArray { element, values }) => {
                Value::Typed(TypedArray::new(*element, values.clone()))
            }
            SerializedArg::Object(TaggedArg::ArrayBuffer { bytes }) => {
                Value::ArrayBuffer(Rc::new(RefCell::new(bytes.clone())))
            }
            SerializedArg::Object(TaggedArg::Variable { class, index }) => {
                let object = self
                    .variables
                    .get(class, *index)
                    .and_then(|handle| self.objects.get(&handle))
                    .ok_or_else(|| ReplayError::MissingVariable {
                        class: class.clone(),
                        index: *index,
                    })?;
                Value::Object(Rc::clone(object))
            }
            SerializedArg::Object(TaggedArg::Node { id }) => {
                Value::Node(doc.node(*id).ok_or(ReplayError::MissingNode(*id))?)
            }
            SerializedArg::Object(TaggedArg::Unsupported { class }) => {
                log::debug!(target: "replay.calls", "unsupported {class} argument replayed as undefined");
                Value::Undefined
            }
        };
        Ok(value)
    }

    /// Calls that reached the replay context of `owner`, as rendered by
    /// [`record::native::journal`].
    pub fn journal(&self, owner: MirrorId) -> Vec<String> {
        self.contexts
            .get(&owner)
            .map(record::native::journal)
            .unwrap_or_default()
    }

    /// Canvases with a live context, in id order.
    pub fn owners(&self) -> Vec<MirrorId> {
        let mut owners: Vec<MirrorId> = self.contexts.keys().copied().collect();
        owners.sort_unstable();
        owners
    }

    pub fn context_of(&self, owner: MirrorId) -> Option<CanvasContext> {
        let ctx = self.contexts.get(&owner)?;
        [CanvasContext::TwoD, CanvasContext::WebGl, CanvasContext::WebGl2]
            .into_iter()
            .find(|&context| record::CapabilityFamily::for_context(context).class == ctx.class())
    }

    pub fn reset(&mut self) {
        self.canvases.clear();
        self.contexts.clear();
        self.variables.reset();
        self.objects.clear();
        self.last_result = None;
    }
}

impl Default for CallReplayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::{AddedNodeMutation, MutationData, SerializedNode};
    use dom::NodePayload;

    fn doc_with_canvas() -> ReplayDocument {
        let mut doc = ReplayDocument::new();
        let add = |id, parent, payload| AddedNodeMutation {
            parent_id: parent,
            next_id: None,
            node: SerializedNode { id, payload },
        };
        doc.apply(&MutationData {
            adds: vec![
                add(1, None, NodePayload::Document),
                add(
                    2,
                    Some(1),
                    NodePayload::Element {
                        tag_name: "canvas".into(),
                        attributes: Vec::new(),
                    },
                ),
            ],
            ..MutationData::default()
        });
        doc
    }

    fn call(member: &str, args: Vec<SerializedArg>) -> CallMutation {
        CallMutation {
            owner: 2,
            context: CanvasContext::WebGl,
            member: member.into(),
            args,
            is_assignment: false,
        }
    }

    fn buffer(index: MirrorId) -> SerializedArg {
        SerializedArg::Object(TaggedArg::Variable {
            class: "WebGLBuffer".into(),
            index,
        })
    }

    #[test]
    fn created_variables_bind_the_call_result() {
        let doc = doc_with_canvas();
        let mut calls = CallReplayer::new();
        calls.create_context(&doc, 2, CanvasContext::WebGl).unwrap();
        calls.call(&doc, &call("createBuffer", Vec::new())).unwrap();
        let produced = calls.last_result.clone().unwrap();
        calls.create_variable(&doc, 2, "WebGLBuffer", 0);
        calls
            .call(&doc, &call("bindBuffer", vec![SerializedArg::Number(34962.0), buffer(0)]))
            .unwrap();

        let bound = calls.variables.get("WebGLBuffer", 0).unwrap();
        assert_eq!(bound, produced.handle());
        assert_eq!(
            calls.journal(2),
            vec!["[\"createBuffer\"]", "[\"bindBuffer\", 34962, WebGLBuffer]"]
        );
        assert_eq!(calls.context_of(2), Some(CanvasContext::WebGl));
    }

    #[test]
    fn variables_without_a_producing_call_get_stand_ins() {
        let doc = doc_with_canvas();
        let mut calls = CallReplayer::new();
        calls.create_context(&doc, 2, CanvasContext::WebGl).unwrap();
        calls.call(&doc, &call("clear", vec![SerializedArg::Number(0.0)])).unwrap();
        calls.create_variable(&doc, 2, "WebGLBuffer", 3);
        calls.call(&doc, &call("deleteBuffer", vec![buffer(3)])).unwrap();
        assert_eq!(calls.journal(2).last().unwrap(), "[\"deleteBuffer\", WebGLBuffer]");
    }

    #[test]
    fn unknown_references_are_errors() {
        let doc = doc_with_canvas();
        let mut calls = CallReplayer::new();
        assert_eq!(
            calls.call(&doc, &call("clear", Vec::new())),
            Err(ReplayError::NoContext(2))
        );
        assert_eq!(
            calls.create_context(&doc, 9, CanvasContext::TwoD),
            Err(ReplayError::MissingNode(9))
        );
        calls.create_context(&doc, 2, CanvasContext::WebGl).unwrap();
        assert_eq!(
            calls.create_context(&doc, 2, CanvasContext::TwoD),
            Err(ReplayError::ContextUnavailable {
                owner: 2,
                context: CanvasContext::TwoD,
            })
        );
        assert_eq!(
            calls.call(&doc, &call("bindBuffer", vec![SerializedArg::Number(1.0), buffer(7)])),
            Err(ReplayError::MissingVariable {
                class: "WebGLBuffer".into(),
                index: 7,
            })
        );
    }

    #[test]
    fn assignments_go_through_the_setter() {
        let doc = doc_with_canvas();
        let mut calls = CallReplayer::new();
        calls.create_context(&doc, 2, CanvasContext::TwoD).unwrap();
        let assign = CallMutation {
            owner: 2,
            context: CanvasContext::TwoD,
            member: "lineWidth".into(),
            args: vec![SerializedArg::Number(3.0)],
            is_assignment: true,
        };
        calls.call(&doc, &assign).unwrap();
        assert_eq!(calls.journal(2), vec!["[\"lineWidth =\", 3]"]);

        let empty = CallMutation {
            args: Vec::new(),
            ..assign
        };
        assert!(matches!(
            calls.call(&doc, &empty),
            Err(ReplayError::MissingValue { .. })
        ));
    }
}
