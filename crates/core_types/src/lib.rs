use serde::{Deserialize, Serialize};

pub type SessionId = u64;

/// Integer identity of a mirrored object inside a serialized stream.
pub type MirrorId = i32;

/// Returned by mirror lookups for objects that were never registered.
pub const NOT_MIRRORED: MirrorId = -1;

/// Registered on purpose, but excluded from the serialized tree.
pub const IGNORED_NODE: MirrorId = -2;

/// Rendering context family a call record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanvasContext {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "webgl")]
    WebGl,
    #[serde(rename = "webgl2")]
    WebGl2,
}

impl CanvasContext {
    /// Parse the context type string passed to `getContext`.
    pub fn from_context_type(name: &str) -> Option<Self> {
        match name {
            "2d" => Some(CanvasContext::TwoD),
            "webgl" | "experimental-webgl" => Some(CanvasContext::WebGl),
            "webgl2" => Some(CanvasContext::WebGl2),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanvasContext::TwoD => "2d",
            CanvasContext::WebGl => "webgl",
            CanvasContext::WebGl2 => "webgl2",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_type_aliases() {
        assert_eq!(
            CanvasContext::from_context_type("experimental-webgl"),
            Some(CanvasContext::WebGl)
        );
        assert_eq!(CanvasContext::from_context_type("bitmaprenderer"), None);
        assert_eq!(CanvasContext::WebGl2.as_str(), "webgl2");
    }
}
