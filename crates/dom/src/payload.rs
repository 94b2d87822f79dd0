//! Minimal per-node serialization carried by add-node records.
//!
//! This is not a full document serialization grammar: only what a replay
//! consumer needs to recreate a node of the same kind with the same data.

use crate::{Document, DomError, NodeKey, NodeKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodePayload {
    Document,
    #[serde(rename_all = "camelCase")]
    Element {
        tag_name: String,
        attributes: Vec<(String, Option<String>)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
    ShadowRoot,
}

impl Document {
    pub fn payload(&self, key: NodeKey) -> Option<NodePayload> {
        let payload = match self.kind(key)? {
            NodeKind::Document => NodePayload::Document,
            NodeKind::Element { name, attributes } => NodePayload::Element {
                tag_name: name.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            },
            NodeKind::Text { text } => NodePayload::Text { text: text.clone() },
            NodeKind::Comment { text } => NodePayload::Comment { text: text.clone() },
            NodeKind::ShadowRoot { .. } => NodePayload::ShadowRoot,
        };
        Some(payload)
    }

    /// Create a detached node from a payload.
    ///
    /// Document payloads resolve to this document's root; shadow-root
    /// payloads need a host and are attached through `attach_shadow`.
    pub fn create_from_payload(
        &mut self,
        payload: &NodePayload,
        host: Option<NodeKey>,
    ) -> Result<NodeKey, DomError> {
        match payload {
            NodePayload::Document => Ok(self.root()),
            NodePayload::Element {
                tag_name,
                attributes,
            } => {
                let key = self.create_element(tag_name);
                self.replace_attributes(
                    key,
                    attributes
                        .iter()
                        .map(|(k, v)| (Arc::from(k.to_ascii_lowercase()), v.clone()))
                        .collect(),
                )?;
                Ok(key)
            }
            NodePayload::Text { text } => Ok(self.create_text(text)),
            NodePayload::Comment { text } => Ok(self.create_comment(text)),
            NodePayload::ShadowRoot => {
                let host = host.ok_or(DomError::WrongNodeKind(self.root()))?;
                self.attach_shadow(host)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_payload_json_shape() {
        let mut doc = Document::new();
        let el = doc.create_element_with("canvas", &[("width", "300")]);
        let payload = doc.payload(el).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "element",
                "tagName": "canvas",
                "attributes": [["width", "300"]],
            })
        );
    }

    #[test]
    fn payload_recreates_equivalent_node() {
        let mut source = Document::new();
        let el = source.create_element_with("input", &[("type", "text")]);
        let payload = source.payload(el).unwrap();

        let mut target = Document::new();
        let copy = target.create_from_payload(&payload, None).unwrap();
        assert_eq!(target.payload(copy).unwrap(), payload);
        assert_eq!(
            target.create_from_payload(&NodePayload::Document, None).unwrap(),
            target.root()
        );
    }

    #[test]
    fn valueless_attributes_survive() {
        let payload = NodePayload::Element {
            tag_name: "input".into(),
            attributes: vec![("disabled".into(), None), ("type".into(), Some("checkbox".into()))],
        };
        let mut doc = Document::new();
        let key = doc.create_from_payload(&payload, None).unwrap();
        assert_eq!(doc.payload(key).unwrap(), payload);
    }
}
