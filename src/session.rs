//! Scripted page activity used by the command line tool.

use bus::RecordEvent;
use core_types::MirrorId;
use dom::{Document, DomError, DomSnapshot, NodeKey};
use record::host::TypedArray;
use record::{
    Handlers, MutationBatch, MutationRecorder, NativeCanvas, ObjectRef,
    RecorderConfig, SharedSink, TaskQueue, Value,
};
use std::cell::RefCell;
use std::rc::Rc;

pub struct Recording {
    pub events: Vec<RecordEvent>,
    /// The document as the recorder saw it at the end of the session.
    pub snapshot: DomSnapshot,
    /// Native call journal per recorded canvas id.
    pub journals: Vec<(MirrorId, Vec<String>)>,
}

struct Page {
    body: NodeKey,
    scene: NodeKey,
    private: NodeKey,
    status: NodeKey,
}

fn build_page(doc: &mut Document) -> Result<Page, DomError> {
    let root = doc.root();
    let html = doc.create_element("html");
    let body = doc.create_element("body");
    let scene = doc.create_element_with("canvas", &[("id", "scene"), ("width", "300")]);
    let vault = doc.create_element_with("section", &[("class", "rr-block")]);
    let private = doc.create_element_with("canvas", &[("id", "signature")]);
    let p = doc.create_element("p");
    let status = doc.create_text("loading");
    doc.append_child(root, html)?;
    doc.append_child(html, body)?;
    doc.append_child(body, scene)?;
    doc.append_child(body, vault)?;
    doc.append_child(vault, private)?;
    doc.append_child(body, p)?;
    doc.append_child(p, status)?;
    Ok(Page {
        body,
        scene,
        private,
        status,
    })
}

fn context(native: &NativeCanvas, node: NodeKey, kind: &str) -> Option<ObjectRef> {
    let ctx = native
        .canvas(node)
        .call("getContext", &[Value::String(kind.to_string())])
        .ok()?;
    ctx.as_object().cloned()
}

fn draw_triangle(gl: &ObjectRef) -> Result<(), record::HostError> {
    let buffer = gl.call("createBuffer", &[])?;
    gl.call("bindBuffer", &[Value::Number(34962.0), buffer])?;
    gl.call(
        "bufferData",
        &[
            Value::Number(34962.0),
            Value::Typed(TypedArray::new(
                bus::ElementType::Float32,
                vec![0.0, 0.5, -0.5, -0.5, 0.5, -0.5],
            )),
            Value::Number(35044.0),
        ],
    )?;
    gl.call("clearColor", &[0.1, 0.1, 0.1, 1.0].map(Value::Number))?;
    gl.call("clear", &[Value::Number(16384.0)])?;
    gl.call("drawArrays", &[4.0, 0.0, 3.0].map(Value::Number))?;
    Ok(())
}

fn draw_badge(ctx: &ObjectRef) -> Result<(), record::HostError> {
    ctx.call("beginPath", &[])?;
    ctx.call("arc", &[20.0, 20.0, 10.0, 0.0, 6.283].map(Value::Number))?;
    let gradient = ctx.call("createLinearGradient", &[0.0, 0.0, 40.0, 0.0].map(Value::Number))?;
    ctx.call("fill", &[])?;
    ctx.set("fillStyle", gradient)?;
    ctx.set("lineWidth", Value::Number(2.0))?;
    Ok(())
}

/// Record one session: full snapshot, WebGL drawing, a change batch that
/// adds a 2D overlay, and drawing on that overlay.
pub fn record(config: &RecorderConfig) -> anyhow::Result<Recording> {
    let doc = Rc::new(RefCell::new(Document::new()));
    let page = build_page(&mut doc.borrow_mut())?;
    let events = Rc::new(RefCell::new(Vec::<RecordEvent>::new()));
    let sink: SharedSink = events.clone();
    let recorder = MutationRecorder::from_config(config, Rc::clone(&doc), sink, TaskQueue::new())?;

    let native = NativeCanvas::new();
    let _handlers = if config.record_canvas {
        recorder.observe_canvas(&native)
    } else {
        Handlers::new()
    };
    recorder.take_full_snapshot();

    let mut contexts = Vec::new();
    for (node, kind) in [(page.scene, "webgl"), (page.private, "webgl")] {
        let Some(gl) = context(&native, node, kind) else {
            continue;
        };
        draw_triangle(&gl)?;
        contexts.push((node, gl));
    }

    let overlay = {
        let mut doc = doc.borrow_mut();
        let overlay = doc.create_element_with("canvas", &[("id", "overlay")]);
        doc.insert_before(page.body, overlay, Some(page.scene))?;
        doc.set_text(page.status, "ready")?;
        doc.set_attribute(page.scene, "data-state", "drawn")?;
        overlay
    };
    let mut batch = MutationBatch::new();
    batch
        .node_added(overlay)
        .text_changed(page.status)
        .attributes_changed(page.scene);
    recorder.flush(batch);

    if let Some(ctx) = context(&native, overlay, "2d") {
        draw_badge(&ctx)?;
        contexts.push((overlay, ctx));
    }
    let turns = recorder.queue().run_until_idle();
    log::debug!(target: "retrace", "queue drained in {turns} turns");

    let nodes = recorder.nodes().borrow();
    let journals = contexts
        .iter()
        .map(|(node, ctx)| (nodes.get_id(*node), record::native::journal(ctx)))
        .collect();
    let doc = doc.borrow();
    let events = events.borrow().clone();
    Ok(Recording {
        events,
        snapshot: DomSnapshot::new(&doc, doc.root()),
        journals,
    })
}
