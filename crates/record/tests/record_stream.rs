use bus::{Bus, MutationSink, RecordEvent};
use dom::{Document, NodeKey};
use record::host::TypedArray;
use record::{
    MutationBatch, MutationRecorder, NativeCanvas, RecorderConfig, SharedSink, TaskQueue, Value,
};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use test_support::{assert_lines_eq, event_lines, parse_expected_stream};

struct Page {
    head: NodeKey,
    body: NodeKey,
    canvas: NodeKey,
    p: NodeKey,
    text: NodeKey,
}

fn page(doc: &mut Document) -> Page {
    let root = doc.root();
    let html = doc.create_element("html");
    let head = doc.create_element("head");
    let body = doc.create_element("body");
    let canvas = doc.create_element_with("canvas", &[("id", "c")]);
    let p = doc.create_element("p");
    let text = doc.create_text("hello");
    doc.append_child(root, html).unwrap();
    doc.append_child(html, head).unwrap();
    doc.append_child(html, body).unwrap();
    doc.append_child(body, canvas).unwrap();
    doc.append_child(body, p).unwrap();
    doc.append_child(p, text).unwrap();
    Page {
        head,
        body,
        canvas,
        p,
        text,
    }
}

fn record_session(sink: SharedSink) {
    let config = RecorderConfig::from_toml_str(r#"block_class = "^rr-block$""#).unwrap();
    let doc = Rc::new(RefCell::new(Document::new()));
    let page = page(&mut doc.borrow_mut());
    let recorder = MutationRecorder::from_config(&config, Rc::clone(&doc), sink, TaskQueue::new())
        .unwrap();
    let native = NativeCanvas::new();
    let _handlers = recorder.observe_canvas(&native);

    assert!(recorder.take_full_snapshot());

    let gl = native
        .canvas(page.canvas)
        .call("getContext", &[Value::String("webgl".into())])
        .unwrap();
    let gl = gl.as_object().unwrap();
    let buffer = gl.call("createBuffer", &[]).unwrap();
    gl.call("bindBuffer", &[Value::Number(34962.0), buffer]).unwrap();
    gl.call(
        "bufferData",
        &[
            Value::Number(34962.0),
            Value::Typed(TypedArray::new(bus::ElementType::Float32, vec![0.0, 1.0, 0.5])),
            Value::Number(35044.0),
        ],
    )
    .unwrap();

    let second = {
        let mut doc = doc.borrow_mut();
        let html = doc.parent(page.head).unwrap();
        doc.remove(page.head).unwrap();
        let div = doc.create_element_with("div", &[("class", "overlay")]);
        let second = doc.create_element_with("canvas", &[("id", "d")]);
        let secret = doc.create_element_with("span", &[("class", "rr-block")]);
        let hidden = doc.create_text("secret");
        doc.append_child(div, second).unwrap();
        doc.append_child(div, secret).unwrap();
        doc.append_child(secret, hidden).unwrap();
        doc.insert_before(page.body, div, Some(page.canvas)).unwrap();
        doc.set_text(page.text, "bye").unwrap();
        doc.set_attribute(page.p, "title", "t").unwrap();

        let mut batch = MutationBatch::new();
        batch
            .node_removed(html, page.head)
            .node_added(div)
            .text_changed(page.text)
            .attributes_changed(page.p);
        drop(doc);
        assert!(recorder.flush(batch));
        second
    };

    let ctx = native
        .canvas(second)
        .call("getContext", &[Value::String("2d".into())])
        .unwrap();
    let ctx = ctx.as_object().unwrap();
    ctx.set("lineWidth", Value::Number(4.0)).unwrap();
    ctx.call("fillRect", &[0.0, 0.0, 10.0, 10.0].map(Value::Number)).unwrap();
    let gradient = ctx
        .call("createLinearGradient", &[0.0, 0.0, 10.0, 0.0].map(Value::Number))
        .unwrap();
    ctx.set("fillStyle", gradient).unwrap();
    recorder.queue().run_until_idle();
}

#[test]
fn canvas_session_matches_golden_stream() {
    let events = Rc::new(RefCell::new(Vec::<RecordEvent>::new()));
    record_session(events.clone());

    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/canvas_session.stream");
    let expected = parse_expected_stream(&path);
    let actual = event_lines(&events.borrow());
    assert_lines_eq(&expected, &actual, "canvas session stream");
}

#[test]
fn stream_survives_json_transport() {
    let bus = Bus::new();
    let sender: Rc<RefCell<dyn MutationSink>> = Rc::new(RefCell::new(bus.evt_tx.clone()));
    record_session(sender);

    let events = bus.drain();
    assert!(!events.is_empty());
    let decoded: Vec<RecordEvent> = events
        .iter()
        .map(|event| {
            let line = serde_json::to_string(event).unwrap();
            serde_json::from_str(&line).unwrap()
        })
        .collect();
    assert_eq!(decoded, events);
}
