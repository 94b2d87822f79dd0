use core_types::MirrorId;
use serde::{Deserialize, Serialize};

/// Element type of a typed buffer snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl ElementType {
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::Uint8 | ElementType::Uint8Clamped => 1,
            ElementType::Int16 | ElementType::Uint16 => 2,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }
}

/// Serializable form of one call argument.
///
/// Primitives and arrays are written untagged; everything else is an object
/// carrying an `rr_type` tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerializedArg {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<SerializedArg>),
    Object(TaggedArg),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rr_type")]
pub enum TaggedArg {
    Undefined,
    /// Copy of a typed view, taken at call time.
    TypedArray {
        element: ElementType,
        values: Vec<f64>,
    },
    /// Copy of a raw byte buffer, taken at call time.
    ArrayBuffer { bytes: Vec<u8> },
    /// Reference to an opaque object through the variable mirror.
    Variable { class: String, index: MirrorId },
    /// Reference to a document node through the node mirror.
    Node { id: MirrorId },
    /// A value the serializer cannot represent.
    Unsupported { class: String },
}

impl SerializedArg {
    pub fn undefined() -> Self {
        SerializedArg::Object(TaggedArg::Undefined)
    }

    pub fn unsupported(class: impl Into<String>) -> Self {
        SerializedArg::Object(TaggedArg::Unsupported {
            class: class.into(),
        })
    }

    pub fn is_unsupported(&self) -> bool {
        match self {
            SerializedArg::Object(TaggedArg::Unsupported { .. }) => true,
            SerializedArg::Array(items) => items.iter().any(SerializedArg::is_unsupported),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_primitives_and_tagged_objects() {
        let args = vec![
            SerializedArg::Null,
            SerializedArg::Number(1.5),
            SerializedArg::String("s".into()),
            SerializedArg::Array(vec![SerializedArg::Bool(true)]),
            SerializedArg::Object(TaggedArg::Variable {
                class: "WebGLBuffer".into(),
                index: 0,
            }),
            SerializedArg::undefined(),
        ];
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                null,
                1.5,
                "s",
                [true],
                { "rr_type": "Variable", "class": "WebGLBuffer", "index": 0 },
                { "rr_type": "Undefined" },
            ])
        );
        let back: Vec<SerializedArg> = serde_json::from_value(json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn unsupported_is_detected_in_arrays() {
        let nested = SerializedArg::Array(vec![
            SerializedArg::Number(0.0),
            SerializedArg::unsupported("Symbol"),
        ]);
        assert!(nested.is_unsupported());
        assert!(!SerializedArg::Null.is_unsupported());
    }
}
