//! In-process implementations of the observed canvas interfaces.
//!
//! Each context object keeps a journal of the calls that reached the native
//! layer, so a recorded session and its replay can be compared call by call.

use crate::capability::CapabilityFamily;
use crate::host::{HostObject, ObjectRef, ProtoRef, Prototype, Value};
use core_types::CanvasContext;
use dom::NodeKey;
use std::collections::HashMap;
use std::rc::Rc;

const JOURNAL: &str = "__journal";
const CONTEXT: &str = "__context";

fn journal_push(this: &ObjectRef, entry: Value) {
    let mut entries = match this.slot(JOURNAL) {
        Some(Value::Array(entries)) => entries,
        _ => Vec::new(),
    };
    entries.push(entry);
    this.set_slot(JOURNAL, Value::Array(entries));
}

/// Human-readable journal of a context object: `member(arg, ...)` per call,
/// `member = value` per assignment. Objects render as their class name.
pub fn journal(obj: &ObjectRef) -> Vec<String> {
    match obj.slot(JOURNAL) {
        Some(Value::Array(entries)) => entries.iter().map(describe).collect(),
        _ => Vec::new(),
    }
}

/// Stable rendering of a value that does not depend on object identity.
pub fn describe(value: &Value) -> String {
    match value {
        Value::Object(obj) => obj.class().to_string(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Node(_) => "Node".to_string(),
        other => format!("{other:?}"),
    }
}

fn context_prototype(family: &'static CapabilityFamily) -> ProtoRef {
    let mut proto = Prototype::new(family.class);
    for &method in family.methods {
        let constructed = family.constructed_class(method);
        proto.define_method(method, move |this, args| {
            let mut entry = vec![Value::String(method.to_string())];
            entry.extend(args.iter().cloned());
            journal_push(this, Value::Array(entry));
            match constructed {
                Some(class) => {
                    let created = HostObject::plain(class);
                    created.set_owner(this.owner());
                    Value::Object(created)
                }
                None => Value::Undefined,
            }
        });
    }
    for &setter in family.setters {
        let get = Rc::new(move |this: &ObjectRef| this.slot(setter).unwrap_or(Value::Undefined));
        let set = Rc::new(move |this: &ObjectRef, value: Value| {
            journal_push(
                this,
                Value::Array(vec![
                    Value::String(format!("{setter} =")),
                    value.clone(),
                ]),
            );
            this.set_slot(setter, value);
        });
        proto.define_accessor(setter, Some(get), Some(set));
    }
    proto.into_ref()
}

/// One set of canvas interfaces: the element prototype plus a context
/// prototype per family. Recorder and replayer each own their own set.
pub struct NativeCanvas {
    element: ProtoRef,
    contexts: HashMap<CanvasContext, ProtoRef>,
}

impl NativeCanvas {
    pub fn new() -> Self {
        let mut contexts = HashMap::new();
        for context in [CanvasContext::TwoD, CanvasContext::WebGl, CanvasContext::WebGl2] {
            contexts.insert(
                context,
                context_prototype(CapabilityFamily::for_context(context)),
            );
        }

        let mut element = Prototype::new("HTMLCanvasElement");
        let lookup = contexts.clone();
        element.define_method("getContext", move |this, args| {
            let Some(kind) = args
                .first()
                .and_then(Value::as_str)
                .and_then(CanvasContext::from_context_type)
            else {
                return Value::Null;
            };
            // A canvas hands out one context for its lifetime.
            if let Some(Value::Object(existing)) = this.slot(CONTEXT) {
                let family = CapabilityFamily::for_context(kind);
                return if existing.class() == family.class {
                    Value::Object(existing)
                } else {
                    Value::Null
                };
            }
            let Some(proto) = lookup.get(&kind) else {
                return Value::Null;
            };
            let context = HostObject::new(CapabilityFamily::for_context(kind).class, proto);
            context.set_owner(this.owner());
            this.set_slot(CONTEXT, Value::Object(Rc::clone(&context)));
            Value::Object(context)
        });

        Self {
            element: element.into_ref(),
            contexts,
        }
    }

    pub fn element_prototype(&self) -> &ProtoRef {
        &self.element
    }

    pub fn context_prototype(&self, context: CanvasContext) -> Option<&ProtoRef> {
        self.contexts.get(&context)
    }

    /// Host object standing for the canvas element `node`.
    pub fn canvas(&self, node: NodeKey) -> ObjectRef {
        let canvas = HostObject::new("HTMLCanvasElement", &self.element);
        canvas.set_owner(Some(node));
        canvas
    }
}

impl Default for NativeCanvas {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Document;

    #[test]
    fn get_context_is_sticky_per_canvas() {
        let mut doc = Document::new();
        let node = doc.create_element("canvas");
        let native = NativeCanvas::new();
        let canvas = native.canvas(node);

        let gl = canvas.call("getContext", &[Value::String("webgl".into())]).unwrap();
        let again = canvas
            .call("getContext", &[Value::String("experimental-webgl".into())])
            .unwrap();
        assert_eq!(gl, again);
        assert_eq!(
            canvas.call("getContext", &[Value::String("2d".into())]).unwrap(),
            Value::Null
        );
        assert_eq!(gl.as_object().unwrap().owner(), Some(node));
    }

    #[test]
    fn constructors_return_owned_objects_and_journal() {
        let mut doc = Document::new();
        let node = doc.create_element("canvas");
        let native = NativeCanvas::new();
        let canvas = native.canvas(node);
        let gl = canvas.call("getContext", &[Value::String("webgl".into())]).unwrap();
        let gl = gl.as_object().unwrap();

        let buffer = gl.call("createBuffer", &[]).unwrap();
        let buffer = buffer.as_object().unwrap();
        assert_eq!(buffer.class(), "WebGLBuffer");
        assert_eq!(buffer.owner(), Some(node));

        gl.call("bindBuffer", &[Value::Number(34962.0), Value::Object(Rc::clone(buffer))])
            .unwrap();
        assert_eq!(
            journal(gl),
            vec!["[\"createBuffer\"]", "[\"bindBuffer\", 34962, WebGLBuffer]"]
        );
    }

    #[test]
    fn setters_store_and_journal() {
        let mut doc = Document::new();
        let node = doc.create_element("canvas");
        let native = NativeCanvas::new();
        let ctx = native.canvas(node).call("getContext", &[Value::String("2d".into())]).unwrap();
        let ctx = ctx.as_object().unwrap();
        ctx.set("lineWidth", Value::Number(4.0)).unwrap();
        assert_eq!(ctx.get("lineWidth"), Value::Number(4.0));
        assert_eq!(journal(ctx), vec!["[\"lineWidth =\", 4]"]);
    }
}
