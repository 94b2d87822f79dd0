use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bus::{AddedNodeMutation, MutationData, RecordEvent, SerializedArg, TaggedArg};
use core_types::MirrorId;
use dom::NodePayload;

use crate::escape_text;

pub const EXPECTED_STREAM_FORMAT_V1: &str = "retrace-stream-v1";

/// One line per record, stable across runs.
///
/// Change batches expand to one line per entry, in emission order:
/// removes, adds, texts, attributes.
pub fn event_lines(events: &[RecordEvent]) -> Vec<String> {
    let mut out = Vec::new();
    for event in events {
        match event {
            RecordEvent::Mutation(data) => mutation_lines(data, &mut out),
            RecordEvent::Call(call) if call.is_assignment => {
                let value = call.args.first().map(arg_text).unwrap_or_default();
                out.push(format!(
                    "set owner={} {} {} = {value}",
                    call.owner,
                    call.context.as_str(),
                    call.member
                ));
            }
            RecordEvent::Call(call) => {
                let args: Vec<String> = call.args.iter().map(arg_text).collect();
                out.push(format!(
                    "call owner={} {} {}({})",
                    call.owner,
                    call.context.as_str(),
                    call.member,
                    args.join(", ")
                ));
            }
            RecordEvent::VariableCreated {
                owner,
                context,
                class,
                index,
            } => out.push(format!("create owner={owner} {} {class}#{index}", context.as_str())),
            RecordEvent::ContextCreated { owner, context } => {
                out.push(format!("context owner={owner} {}", context.as_str()))
            }
        }
    }
    out
}

fn mutation_lines(data: &MutationData, out: &mut Vec<String>) {
    for remove in &data.removes {
        out.push(format!("remove id={} parent={}", remove.id, remove.parent_id));
    }
    for add in &data.adds {
        out.push(add_line(add));
    }
    for text in &data.texts {
        out.push(format!("text id={} \"{}\"", text.id, escape_text(&text.value)));
    }
    for change in &data.attributes {
        let mut line = format!("attributes id={}", change.id);
        for (name, value) in &change.attributes {
            match value {
                Some(value) => line.push_str(&format!(" {name}=\"{}\"", escape_text(value))),
                None => line.push_str(&format!(" {name}")),
            }
        }
        out.push(line);
    }
}

fn id_text(id: Option<MirrorId>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn add_line(add: &AddedNodeMutation) -> String {
    format!(
        "add id={} parent={} next={} {}",
        add.id(),
        id_text(add.parent_id),
        id_text(add.next_id),
        payload_text(&add.node.payload)
    )
}

fn payload_text(payload: &NodePayload) -> String {
    match payload {
        NodePayload::Document => "#document".to_string(),
        NodePayload::Element {
            tag_name,
            attributes,
        } => {
            let mut text = format!("<{tag_name}");
            for (name, value) in attributes {
                match value {
                    Some(value) => text.push_str(&format!(" {name}=\"{}\"", escape_text(value))),
                    None => text.push_str(&format!(" {name}")),
                }
            }
            text.push('>');
            text
        }
        NodePayload::Text { text } => format!("\"{}\"", escape_text(text)),
        NodePayload::Comment { text } => format!("<!-- {} -->", escape_text(text)),
        NodePayload::ShadowRoot => "#shadow-root".to_string(),
    }
}

fn arg_text(arg: &SerializedArg) -> String {
    match arg {
        SerializedArg::Null => "null".to_string(),
        SerializedArg::Bool(b) => b.to_string(),
        SerializedArg::Number(n) => format!("{n}"),
        SerializedArg::String(s) => format!("\"{}\"", escape_text(s)),
        SerializedArg::Array(items) => {
            let items: Vec<String> = items.iter().map(arg_text).collect();
            format!("[{}]", items.join(", "))
        }
        SerializedArg::Object(tagged) => match tagged {
            TaggedArg::Undefined => "undefined".to_string(),
            TaggedArg::TypedArray { element, values } => {
                let values: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
                format!("{element:?}Array[{}]", values.join(", "))
            }
            TaggedArg::ArrayBuffer { bytes } => format!("ArrayBuffer{bytes:?}"),
            TaggedArg::Variable { class, index } => format!("{class}#{index}"),
            TaggedArg::Node { id } => format!("node#{id}"),
            TaggedArg::Unsupported { class } => format!("<{class}>"),
        },
    }
}

/// Read a golden stream file.
///
/// Header lines look like `# key: value`; `format` must come first. Other
/// `#` lines and blank lines are skipped.
pub fn parse_expected_stream(path: &Path) -> Vec<String> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read expected stream file {path:?}: {err}"));
    let (headers, lines) = parse_headers_and_lines(&content, path, &["format", "description"]);
    let format = headers.get("format").expect("format header validated");
    assert_eq!(
        format, EXPECTED_STREAM_FORMAT_V1,
        "unsupported format in {path:?}"
    );
    assert!(
        !lines.is_empty(),
        "expected stream file {path:?} has no record lines"
    );
    lines
}

fn parse_headers_and_lines(
    content: &str,
    path: &Path,
    supported_headers: &[&str],
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut lines = Vec::new();
    let mut headers = BTreeMap::<String, String>::new();

    for raw_line in content.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        let Some(stripped) = line.strip_prefix('#') else {
            lines.push(line.to_string());
            continue;
        };
        let Some((key, value)) = stripped.trim().split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        assert!(
            supported_headers.contains(&key.as_str()),
            "unsupported header '{key}' in {path:?}"
        );
        if headers.is_empty() {
            assert_eq!(
                key, "format",
                "first header must be 'format' in {path:?}, found '{key}'"
            );
        }
        if headers.insert(key.clone(), value.trim().to_string()).is_some() {
            panic!("duplicate header '{key}' in {path:?}");
        }
    }

    assert!(
        headers.contains_key("format"),
        "missing required 'format' header in {path:?}"
    );
    (headers, lines)
}
