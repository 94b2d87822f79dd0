use bus::{AddedNodeMutation, SerializedNode};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dom::{Document, NodePayload};
use mirror::NodeMirror;
use record::{BlockPolicy, collect_adds, resolve};

const WIDE_SIBLINGS: i32 = 2_000;
const DEEP_BLOCKS: usize = 500;

/// One parent with many children, each naming the next as its sibling,
/// delivered last child first.
fn make_wide_batch(count: i32) -> Vec<AddedNodeMutation> {
    let mut batch: Vec<AddedNodeMutation> = (0..count)
        .map(|i| {
            let id = i + 2;
            AddedNodeMutation {
                parent_id: Some(1),
                next_id: (i + 1 < count).then_some(id + 1),
                node: SerializedNode {
                    id,
                    payload: NodePayload::Text {
                        text: format!("t{i}"),
                    },
                },
            }
        })
        .collect();
    batch.reverse();
    batch.push(AddedNodeMutation {
        parent_id: None,
        next_id: None,
        node: SerializedNode {
            id: 1,
            payload: NodePayload::Element {
                tag_name: "ul".into(),
                attributes: Vec::new(),
            },
        },
    });
    batch
}

/// `<div class=box><span>hello</span><canvas></canvas></div>` repeated.
fn make_blocks(doc: &mut Document, blocks: usize) {
    let root = doc.root();
    let body = doc.create_element("body");
    doc.append_child(root, body).unwrap();
    for _ in 0..blocks {
        let div = doc.create_element_with("div", &[("class", "box")]);
        let span = doc.create_element("span");
        let text = doc.create_text("hello");
        let canvas = doc.create_element("canvas");
        doc.append_child(body, div).unwrap();
        doc.append_child(div, span).unwrap();
        doc.append_child(span, text).unwrap();
        doc.append_child(div, canvas).unwrap();
    }
}

fn bench_resolve_wide_reversed(c: &mut Criterion) {
    let batch = make_wide_batch(WIDE_SIBLINGS);
    c.bench_function("bench_resolve_wide_reversed", |b| {
        b.iter_batched(
            || batch.clone(),
            |batch| black_box(resolve(batch)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_collect_full_snapshot(c: &mut Criterion) {
    let mut doc = Document::new();
    make_blocks(&mut doc, DEEP_BLOCKS);
    let policy = BlockPolicy::none();
    c.bench_function("bench_collect_full_snapshot", |b| {
        b.iter_batched(
            NodeMirror::new,
            |mut nodes| {
                let adds = collect_adds(&doc, &mut nodes, &policy, &[doc.root()]);
                black_box(resolve(adds))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_resolve_wide_reversed,
    bench_collect_full_snapshot
);
criterion_main!(benches);
