use crate::capability::CapabilityFamily;
use crate::collect::MutationBatch;
use crate::config::{ConfigError, RecorderConfig};
use crate::filter::{BlockPolicy, is_blocked};
use crate::host::{ObjectRef, ProtoRef, Value};
use crate::intercept::{Deferred, Handlers, Undo, wrap, wrap_setter_with};
use crate::native::NativeCanvas;
use crate::queue::TaskQueue;
use crate::serialize::ArgumentSerializer;
use bus::{CallMutation, MutationSink, RecordEvent};
use core_types::{CanvasContext, IGNORED_NODE, MirrorId, NOT_MIRRORED};
use dom::{Document, NodeKey};
use mirror::{NodeMirror, prune_dead_nodes};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type SharedSink = Rc<RefCell<dyn MutationSink>>;

/// Finds the document node an observed object belongs to.
pub type OwnerFn = Rc<dyn Fn(&ObjectRef) -> Option<NodeKey>>;

struct Shared {
    doc: Rc<RefCell<Document>>,
    nodes: Rc<RefCell<NodeMirror>>,
    serializer: RefCell<ArgumentSerializer>,
    contexts: RefCell<HashMap<NodeKey, CanvasContext>>,
    /// Canvases whose `ContextCreated` has been emitted.
    announced: RefCell<HashSet<NodeKey>>,
    policy: BlockPolicy,
    sink: SharedSink,
}

impl Shared {
    /// Mirror id of `owner` if it may be recorded right now.
    fn recordable_owner(&self, owner: NodeKey) -> Option<MirrorId> {
        let doc = self.doc.borrow();
        if is_blocked(&doc, owner, &self.policy) {
            log::trace!(target: "record.recorder", "{owner:?} blocked");
            return None;
        }
        match self.nodes.borrow().get_id(owner) {
            NOT_MIRRORED | IGNORED_NODE => {
                log::debug!(target: "record.recorder", "{owner:?} not mirrored, call dropped");
                None
            }
            id => Some(id),
        }
    }

    fn resolve_owner(&self, owner: &OwnerFn, this: &ObjectRef, member: &str) -> Option<MirrorId> {
        let Some(owner_key) = owner(this) else {
            log::debug!(target: "record.recorder", "{}.{member} has no owner", this.class());
            return None;
        };
        self.recordable_owner(owner_key)
    }

    fn record_call(
        &self,
        family: &CapabilityFamily,
        owner: &OwnerFn,
        this: &ObjectRef,
        member: &str,
        args: &[Value],
        result: Option<&Value>,
    ) {
        if let Some(owner_id) = self.resolve_owner(owner, this, member) {
            self.emit_call(family, owner_id, member, args, result);
        }
    }

    fn emit_call(
        &self,
        family: &CapabilityFamily,
        owner_id: MirrorId,
        member: &str,
        args: &[Value],
        result: Option<&Value>,
    ) {
        let (serialized, result_created) = {
            let nodes = self.nodes.borrow();
            let mut serializer = self.serializer.borrow_mut();
            let serialized = serializer.serialize_args(args, family, &nodes);
            let created = result.and_then(|value| serializer.save_result(value, family));
            (serialized, created)
        };

        let mut sink = self.sink.borrow_mut();
        for created in serialized.created {
            sink.emit(RecordEvent::VariableCreated {
                owner: owner_id,
                context: family.context,
                class: created.class,
                index: created.index,
            });
        }
        sink.emit(RecordEvent::Call(CallMutation {
            owner: owner_id,
            context: family.context,
            member: member.to_string(),
            args: serialized.args,
            is_assignment: result.is_none(),
        }));
        if let Some(created) = result_created {
            sink.emit(RecordEvent::VariableCreated {
                owner: owner_id,
                context: family.context,
                class: created.class,
                index: created.index,
            });
        }
    }

    fn note_context(&self, owner: NodeKey, context: CanvasContext) {
        if !self.contexts.borrow().contains_key(&owner) {
            if is_blocked(&self.doc.borrow(), owner, &self.policy) {
                return;
            }
            self.contexts.borrow_mut().insert(owner, context);
        }
        self.announce_context(owner);
    }

    /// Emit `ContextCreated` for `owner` once it has a mirror id.
    fn announce_context(&self, owner: NodeKey) {
        if self.announced.borrow().contains(&owner) {
            return;
        }
        let Some(context) = self.contexts.borrow().get(&owner).copied() else {
            return;
        };
        if is_blocked(&self.doc.borrow(), owner, &self.policy) {
            return;
        }
        let id = self.nodes.borrow().get_id(owner);
        if id == NOT_MIRRORED || id == IGNORED_NODE {
            log::trace!(target: "record.recorder", "context of {owner:?} waits for a mirror id");
            return;
        }
        self.announced.borrow_mut().insert(owner);
        self.sink
            .borrow_mut()
            .emit(RecordEvent::ContextCreated { owner: id, context });
    }

    /// Announce contexts taken on canvases that were not mirrored at the time.
    fn announce_pending_contexts(&self) {
        let announced = self.announced.borrow();
        let nodes = self.nodes.borrow();
        let mut pending: Vec<(MirrorId, NodeKey)> = self
            .contexts
            .borrow()
            .keys()
            .filter(|key| !announced.contains(*key))
            .map(|&key| (nodes.get_id(key), key))
            .filter(|&(id, _)| id != NOT_MIRRORED && id != IGNORED_NODE)
            .collect();
        drop(nodes);
        drop(announced);
        pending.sort_unstable_by_key(|&(id, _)| id);
        for (_, owner) in pending {
            self.announce_context(owner);
        }
    }
}

/// Records calls and assignments on observed prototypes, and document
/// change batches, into a sink.
///
/// Calls are emitted synchronously from inside the wrapped method.
/// Assignments are emitted on the next turn of the task queue, after the
/// value has been stored. Blocking and owner lookup happen per call or
/// assignment, at the moment it is made, so changes to the tree after
/// installation are honored. A context taken on a canvas that is not
/// mirrored yet is announced by the batch that mirrors it.
pub struct MutationRecorder {
    shared: Rc<Shared>,
    queue: TaskQueue,
}

impl MutationRecorder {
    pub fn new(
        doc: Rc<RefCell<Document>>,
        nodes: Rc<RefCell<NodeMirror>>,
        policy: BlockPolicy,
        sink: SharedSink,
        queue: TaskQueue,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                doc,
                nodes,
                serializer: RefCell::new(ArgumentSerializer::new()),
                contexts: RefCell::new(HashMap::new()),
                announced: RefCell::new(HashSet::new()),
                policy,
                sink,
            }),
            queue,
        }
    }

    pub fn from_config(
        config: &RecorderConfig,
        doc: Rc<RefCell<Document>>,
        sink: SharedSink,
        queue: TaskQueue,
    ) -> Result<Self, ConfigError> {
        let policy = config.policy()?;
        let nodes = Rc::new(RefCell::new(config.node_mirror()));
        Ok(Self::new(doc, nodes, policy, sink, queue))
    }

    pub fn nodes(&self) -> &Rc<RefCell<NodeMirror>> {
        &self.shared.nodes
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.shared.doc
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.shared.policy
    }

    /// Observe `prototype` using each object's own owner node.
    pub fn observe(&self, prototype: &ProtoRef, family: &'static CapabilityFamily) -> Handlers {
        self.observe_with(prototype, family, |obj: &ObjectRef| obj.owner())
    }

    pub fn observe_with(
        &self,
        prototype: &ProtoRef,
        family: &'static CapabilityFamily,
        owner: impl Fn(&ObjectRef) -> Option<NodeKey> + 'static,
    ) -> Handlers {
        let owner: OwnerFn = Rc::new(owner);
        let mut handlers = Handlers::new();

        for &member in family.methods {
            let shared = Rc::clone(&self.shared);
            let owner = Rc::clone(&owner);
            handlers.push(wrap(prototype, member, move |original| {
                Rc::new(move |this: &ObjectRef, args: &[Value]| {
                    let result = original.invoke(this, args);
                    shared.record_call(family, &owner, this, member, args, Some(&result));
                    result
                })
            }));
        }

        for &member in family.setters {
            let shared = Rc::clone(&self.shared);
            let owner = Rc::clone(&owner);
            handlers.push(wrap_setter_with(
                prototype,
                member,
                move |this, value| {
                    // Owner and blocking are judged when the value is assigned.
                    let owner_id = shared.resolve_owner(&owner, this, member)?;
                    let shared = Rc::clone(&shared);
                    let value = value.clone();
                    Some(Box::new(move || {
                        shared.emit_call(family, owner_id, member, std::slice::from_ref(&value), None);
                    }) as Deferred)
                },
                &self.queue,
            ));
        }

        log::debug!(
            target: "record.recorder",
            "observing {} ({} of {} members present)",
            family.class,
            handlers.armed(),
            handlers.len()
        );
        handlers
    }

    /// Note the first context type requested on each canvas element and
    /// announce it once.
    pub fn observe_contexts(&self, canvas: &ProtoRef) -> Undo {
        let shared = Rc::clone(&self.shared);
        wrap(canvas, "getContext", move |original| {
            Rc::new(move |this: &ObjectRef, args: &[Value]| {
                let requested = args
                    .first()
                    .and_then(Value::as_str)
                    .and_then(CanvasContext::from_context_type);
                if let (Some(owner), Some(context)) = (this.owner(), requested) {
                    shared.note_context(owner, context);
                }
                original.invoke(this, args)
            })
        })
    }

    /// Observe a full set of canvas interfaces.
    pub fn observe_canvas(&self, native: &NativeCanvas) -> Handlers {
        let mut handlers = Handlers::new();
        handlers.push(self.observe_contexts(native.element_prototype()));
        for context in [CanvasContext::TwoD, CanvasContext::WebGl, CanvasContext::WebGl2] {
            if let Some(proto) = native.context_prototype(context) {
                handlers.extend(self.observe(proto, CapabilityFamily::for_context(context)));
            }
        }
        handlers
    }

    pub fn context_of(&self, node: NodeKey) -> Option<CanvasContext> {
        self.shared.contexts.borrow().get(&node).copied()
    }

    /// Emit the whole current document as one add batch.
    pub fn take_full_snapshot(&self) -> bool {
        let root = self.shared.doc.borrow().root();
        let mut batch = MutationBatch::new();
        batch.node_added(root);
        self.flush(batch)
    }

    /// Resolve a batch of change notifications and emit it. Returns whether
    /// anything was emitted.
    pub fn flush(&self, batch: MutationBatch) -> bool {
        let data = {
            let doc = self.shared.doc.borrow();
            let mut nodes = self.shared.nodes.borrow_mut();
            batch.finish(&doc, &mut nodes, &self.shared.policy)
        };
        if data.is_empty() {
            return false;
        }
        log::trace!(
            target: "record.recorder",
            "batch: {} adds, {} removes, {} texts, {} attributes",
            data.adds.len(),
            data.removes.len(),
            data.texts.len(),
            data.attributes.len()
        );
        self.shared.sink.borrow_mut().emit(RecordEvent::Mutation(data));
        self.shared.announce_pending_contexts();
        true
    }

    /// Forget nodes and objects that no longer exist.
    pub fn prune(&self) {
        let doc = self.shared.doc.borrow();
        prune_dead_nodes(&mut self.shared.nodes.borrow_mut(), &doc);
        self.shared
            .contexts
            .borrow_mut()
            .retain(|node, _| doc.contains(*node));
        self.shared
            .announced
            .borrow_mut()
            .retain(|node| doc.contains(*node));
        let dropped = self.shared.serializer.borrow_mut().prune();
        if dropped > 0 {
            log::trace!(target: "record.recorder", "pruned {dropped} variables");
        }
    }

    /// Start a new session: every mirror and the context table are cleared.
    pub fn reset(&self) {
        self.shared.nodes.borrow_mut().reset();
        self.shared.serializer.borrow_mut().reset();
        self.shared.contexts.borrow_mut().clear();
        self.shared.announced.borrow_mut().clear();
    }

    pub fn variable_index(&self, obj: &ObjectRef) -> MirrorId {
        self.shared.serializer.borrow().index_of(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CANVAS_2D;
    use crate::host::TypedArray;
    use bus::{ElementType, SerializedArg, TaggedArg};
    use dom::Selector;

    struct Session {
        doc: Rc<RefCell<Document>>,
        events: Rc<RefCell<Vec<RecordEvent>>>,
        recorder: MutationRecorder,
        native: NativeCanvas,
        canvas: NodeKey,
        _handlers: Handlers,
    }

    fn session(policy: BlockPolicy) -> Session {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.create_element("body");
        let canvas = doc.create_element_with("canvas", &[("id", "c")]);
        doc.append_child(root, body).unwrap();
        doc.append_child(body, canvas).unwrap();
        let doc = Rc::new(RefCell::new(doc));

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink: SharedSink = events.clone();
        let nodes = Rc::new(RefCell::new(NodeMirror::new()));
        let recorder = MutationRecorder::new(Rc::clone(&doc), nodes, policy, sink, TaskQueue::new());
        recorder.take_full_snapshot();
        events.borrow_mut().clear();

        let native = NativeCanvas::new();
        let handlers = recorder.observe_canvas(&native);
        Session {
            doc,
            events,
            recorder,
            native,
            canvas,
            _handlers: handlers,
        }
    }

    fn context(s: &Session, kind: &str) -> ObjectRef {
        let canvas = s.native.canvas(s.canvas);
        let ctx = canvas.call("getContext", &[Value::String(kind.into())]).unwrap();
        Rc::clone(ctx.as_object().unwrap())
    }

    fn calls(s: &Session) -> Vec<CallMutation> {
        s.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RecordEvent::Call(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn method_calls_are_recorded_after_forwarding() {
        let s = session(BlockPolicy::none());
        let gl = context(&s, "webgl");
        let canvas_id = s.recorder.nodes().borrow().get_id(s.canvas);

        gl.call("clearColor", &[1.0, 0.0, 0.0, 1.0].map(Value::Number)).unwrap();
        assert_eq!(crate::native::journal(&gl).len(), 1);
        assert_eq!(
            calls(&s),
            vec![CallMutation {
                owner: canvas_id,
                context: CanvasContext::WebGl,
                member: "clearColor".into(),
                args: [1.0, 0.0, 0.0, 1.0].map(SerializedArg::Number).to_vec(),
                is_assignment: false,
            }]
        );
    }

    #[test]
    fn created_objects_are_announced_around_the_call() {
        let s = session(BlockPolicy::none());
        let gl = context(&s, "webgl");
        let buffer = gl.call("createBuffer", &[]).unwrap();
        gl.call("bindBuffer", &[Value::Number(34962.0), buffer.clone()]).unwrap();
        gl.call(
            "bufferData",
            &[
                Value::Number(34962.0),
                Value::Typed(TypedArray::new(ElementType::Float32, vec![0.0, 1.0])),
                Value::Number(35044.0),
            ],
        )
        .unwrap();

        let events = s.events.borrow();
        let kinds: Vec<String> = events
            .iter()
            .map(|e| match e {
                RecordEvent::Call(c) => c.member.clone(),
                RecordEvent::VariableCreated { class, index, .. } => format!("new {class}#{index}"),
                RecordEvent::ContextCreated { context, .. } => format!("ctx {}", context.as_str()),
                RecordEvent::Mutation(_) => "mutation".into(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["ctx webgl", "createBuffer", "new WebGLBuffer#0", "bindBuffer", "bufferData"]
        );
        let RecordEvent::Call(bind) = &events[3] else {
            panic!("expected call");
        };
        assert_eq!(
            bind.args[1],
            SerializedArg::Object(TaggedArg::Variable { class: "WebGLBuffer".into(), index: 0 })
        );
        assert_eq!(s.recorder.variable_index(buffer.as_object().unwrap()), 0);
    }

    #[test]
    fn setters_are_recorded_on_the_next_turn() {
        let s = session(BlockPolicy::none());
        let ctx = context(&s, "2d");
        ctx.set("lineWidth", Value::Number(3.0)).unwrap();

        assert_eq!(ctx.get("lineWidth"), Value::Number(3.0));
        assert!(calls(&s).is_empty());
        s.recorder.queue().run_turn();
        let recorded = calls(&s);
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].is_assignment);
        assert_eq!(recorded[0].member, "lineWidth");
        assert_eq!(recorded[0].args, vec![SerializedArg::Number(3.0)]);
    }

    #[test]
    fn blocking_is_checked_per_call() {
        let policy = BlockPolicy::selector(Selector::parse(".private").unwrap(), true);
        let s = session(policy);
        let gl = context(&s, "webgl");
        gl.call("clear", &[Value::Number(16384.0)]).unwrap();
        assert_eq!(calls(&s).len(), 1);

        s.doc
            .borrow_mut()
            .set_attribute(s.canvas, "class", "private")
            .unwrap();
        gl.call("clear", &[Value::Number(16384.0)]).unwrap();
        let buffer = gl.call("createBuffer", &[]).unwrap();
        assert_eq!(calls(&s).len(), 1);
        // Nothing was minted for the blocked call.
        assert_eq!(s.recorder.variable_index(buffer.as_object().unwrap()), NOT_MIRRORED);
        // The call itself still reached the native layer.
        assert_eq!(crate::native::journal(&gl).len(), 3);
    }

    #[test]
    fn unmirrored_owners_produce_no_records() {
        let s = session(BlockPolicy::none());
        let loose = s.doc.borrow_mut().create_element("canvas");
        let ctx = s
            .native
            .canvas(loose)
            .call("getContext", &[Value::String("2d".into())])
            .unwrap();
        let ctx = ctx.as_object().unwrap();
        ctx.call("fillRect", &[0.0, 0.0, 5.0, 5.0].map(Value::Number)).unwrap();
        assert!(s.events.borrow().is_empty());
        assert_eq!(s.recorder.context_of(loose), Some(CanvasContext::TwoD));
    }

    #[test]
    fn context_is_announced_once() {
        let s = session(BlockPolicy::none());
        let canvas = s.native.canvas(s.canvas);
        canvas.call("getContext", &[Value::String("2d".into())]).unwrap();
        canvas.call("getContext", &[Value::String("2d".into())]).unwrap();
        canvas.call("getContext", &[Value::String("webgl".into())]).unwrap();
        let created: Vec<_> = s
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, RecordEvent::ContextCreated { .. }))
            .cloned()
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(s.recorder.context_of(s.canvas), Some(CanvasContext::TwoD));
    }

    #[test]
    fn context_taken_before_mirroring_is_announced_by_the_batch() {
        let s = session(BlockPolicy::none());
        let late = s.doc.borrow_mut().create_element("canvas");
        let ctx = s
            .native
            .canvas(late)
            .call("getContext", &[Value::String("2d".into())])
            .unwrap();
        let ctx = Rc::clone(ctx.as_object().unwrap());
        ctx.call("fillRect", &[0.0, 0.0, 1.0, 1.0].map(Value::Number)).unwrap();
        assert!(s.events.borrow().is_empty());

        let body = s.doc.borrow().parent(s.canvas).unwrap();
        s.doc.borrow_mut().append_child(body, late).unwrap();
        let mut batch = MutationBatch::new();
        batch.node_added(late);
        assert!(s.recorder.flush(batch));
        ctx.call("fillRect", &[1.0, 1.0, 2.0, 2.0].map(Value::Number)).unwrap();
        // A second request must not announce the canvas again.
        s.native
            .canvas(late)
            .call("getContext", &[Value::String("2d".into())])
            .unwrap();

        let late_id = s.recorder.nodes().borrow().get_id(late);
        assert!(late_id > 0);
        let events = s.events.borrow();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], RecordEvent::Mutation(_)));
        assert_eq!(
            events[1],
            RecordEvent::ContextCreated {
                owner: late_id,
                context: CanvasContext::TwoD,
            }
        );
        let RecordEvent::Call(call) = &events[2] else {
            panic!("expected call, got {:?}", events[2]);
        };
        assert_eq!(call.owner, late_id);
        assert_eq!(call.member, "fillRect");
    }

    #[test]
    fn assignments_use_the_block_state_at_assignment_time() {
        let policy = BlockPolicy::selector(Selector::parse(".private").unwrap(), true);
        let s = session(policy);
        let ctx = context(&s, "2d");
        let set_class = |class: &str| {
            s.doc
                .borrow_mut()
                .set_attribute(s.canvas, "class", class)
                .unwrap();
        };

        set_class("private");
        ctx.set("lineWidth", Value::Number(7.0)).unwrap();
        set_class("open");
        s.recorder.queue().run_until_idle();
        assert!(calls(&s).is_empty());
        assert_eq!(ctx.get("lineWidth"), Value::Number(7.0));

        ctx.set("lineWidth", Value::Number(3.0)).unwrap();
        set_class("private");
        s.recorder.queue().run_until_idle();
        let recorded = calls(&s);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].member, "lineWidth");
        assert_eq!(recorded[0].args, vec![SerializedArg::Number(3.0)]);
    }

    #[test]
    fn restoring_handlers_stops_recording() {
        let mut s = session(BlockPolicy::none());
        let gl = context(&s, "webgl");
        s._handlers.restore_all();
        gl.call("clear", &[Value::Number(0.0)]).unwrap();
        assert!(calls(&s).is_empty());
        assert_eq!(crate::native::journal(&gl).len(), 1);
    }

    #[test]
    fn custom_owner_resolution() {
        let s = session(BlockPolicy::none());
        let proto = s.native.context_prototype(CanvasContext::TwoD).unwrap();
        let fixed = s.canvas;
        // Wrap a second time with an owner function that ignores the object.
        let _extra = s.recorder.observe_with(proto, &CANVAS_2D, move |_| Some(fixed));
        let ctx = crate::host::HostObject::new(CANVAS_2D.class, proto);
        ctx.call("beginPath", &[]).unwrap();
        // The outer wrapper records; the inner one sees no owner.
        assert_eq!(calls(&s).len(), 1);
    }

    #[test]
    fn batches_flow_to_the_sink() {
        let s = session(BlockPolicy::none());
        let p = {
            let mut doc = s.doc.borrow_mut();
            let p = doc.create_element("p");
            let body = doc.parent(s.canvas).unwrap();
            doc.append_child(body, p).unwrap();
            p
        };
        let mut batch = MutationBatch::new();
        batch.node_added(p);
        assert!(s.recorder.flush(batch));
        assert!(!s.recorder.flush(MutationBatch::new()));
        let events = s.events.borrow();
        let RecordEvent::Mutation(data) = &events[0] else {
            panic!("expected mutation");
        };
        assert_eq!(data.adds.len(), 1);
        assert_eq!(data.adds[0].id(), s.recorder.nodes().borrow().get_id(p));
    }

    #[test]
    fn prune_and_reset() {
        let s = session(BlockPolicy::none());
        let gl = context(&s, "webgl");
        let buffer = gl.call("createBuffer", &[]).unwrap();
        let body = s.doc.borrow().parent(s.canvas).unwrap();
        s.doc.borrow_mut().remove(body).unwrap();
        s.recorder.prune();
        assert!(!s.recorder.nodes().borrow().has(s.canvas));
        assert_eq!(s.recorder.context_of(s.canvas), None);
        assert_eq!(s.recorder.variable_index(buffer.as_object().unwrap()), 0);

        s.recorder.reset();
        assert!(s.recorder.nodes().borrow().is_empty());
        assert_eq!(s.recorder.variable_index(buffer.as_object().unwrap()), NOT_MIRRORED);
    }
}
