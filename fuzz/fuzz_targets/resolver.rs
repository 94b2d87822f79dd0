#![no_main]

use bus::{AddedNodeMutation, SerializedNode};
use dom::NodePayload;
use libfuzzer_sys::fuzz_target;
use replay::ReplayDocument;
use std::collections::HashSet;

const MAX_RECORDS: usize = 256;

fn decode(data: &[u8]) -> Vec<AddedNodeMutation> {
    let mut records = vec![AddedNodeMutation {
        parent_id: None,
        next_id: None,
        node: SerializedNode {
            id: 1,
            payload: NodePayload::Document,
        },
    }];
    for chunk in data.chunks_exact(3).take(MAX_RECORDS) {
        let pick = |byte: u8| match byte {
            0 => None,
            b => Some(i32::from(b % 64) + 1),
        };
        records.push(AddedNodeMutation {
            parent_id: pick(chunk[1]),
            next_id: pick(chunk[2]),
            node: SerializedNode {
                id: i32::from(chunk[0] % 64) + 2,
                payload: NodePayload::Element {
                    tag_name: "x".into(),
                    attributes: Vec::new(),
                },
            },
        });
    }
    records
}

fuzz_target!(|data: &[u8]| {
    let records = decode(data);
    let distinct: HashSet<i32> = records.iter().map(AddedNodeMutation::id).collect();

    let resolved = record::resolve(records.clone());
    let ids: Vec<i32> = resolved.iter().map(AddedNodeMutation::id).collect();
    let unique: HashSet<i32> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "resolver emitted an id twice");
    assert_eq!(unique, distinct, "resolver lost or invented ids");

    let mut doc = ReplayDocument::new();
    let stats = doc.apply_adds(&records);
    assert_eq!(stats.applied + stats.dropped, records.len());
});
