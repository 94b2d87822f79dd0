//! Declared member tables for every observed object kind.
//!
//! Coverage is whatever is listed here: the recorder never enumerates a
//! prototype to decide what to intercept.

use core_types::CanvasContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFamily {
    pub context: CanvasContext,
    /// Class name of the observed context object.
    pub class: &'static str,
    pub methods: &'static [&'static str],
    /// Members recorded as assignments.
    pub setters: &'static [&'static str],
    /// Opaque classes tracked through the variable mirror.
    pub variable_classes: &'static [&'static str],
    /// Methods whose return value is a fresh variable, with its class.
    pub constructors: &'static [(&'static str, &'static str)],
}

impl CapabilityFamily {
    pub fn for_context(context: CanvasContext) -> &'static CapabilityFamily {
        match context {
            CanvasContext::TwoD => &CANVAS_2D,
            CanvasContext::WebGl => &WEBGL,
            CanvasContext::WebGl2 => &WEBGL2,
        }
    }

    pub fn is_variable_class(&self, class: &str) -> bool {
        self.variable_classes.contains(&class)
    }

    /// Class produced by `method`, if it constructs a variable.
    pub fn constructed_class(&self, method: &str) -> Option<&'static str> {
        self.constructors
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, class)| *class)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(&name)
    }

    pub fn has_setter(&self, name: &str) -> bool {
        self.setters.contains(&name)
    }
}

const WEBGL_CLASSES: &[&str] = &[
    "WebGLActiveInfo",
    "WebGLBuffer",
    "WebGLFramebuffer",
    "WebGLProgram",
    "WebGLRenderbuffer",
    "WebGLShader",
    "WebGLShaderPrecisionFormat",
    "WebGLTexture",
    "WebGLUniformLocation",
    "WebGLVertexArrayObject",
];

const WEBGL_CONSTRUCTORS: &[(&str, &str)] = &[
    ("createBuffer", "WebGLBuffer"),
    ("createFramebuffer", "WebGLFramebuffer"),
    ("createProgram", "WebGLProgram"),
    ("createRenderbuffer", "WebGLRenderbuffer"),
    ("createShader", "WebGLShader"),
    ("createTexture", "WebGLTexture"),
    ("getUniformLocation", "WebGLUniformLocation"),
    ("getActiveAttrib", "WebGLActiveInfo"),
    ("getActiveUniform", "WebGLActiveInfo"),
    ("getShaderPrecisionFormat", "WebGLShaderPrecisionFormat"),
];

const WEBGL_METHODS: &[&str] = &[
    "activeTexture",
    "attachShader",
    "bindBuffer",
    "bindFramebuffer",
    "bindRenderbuffer",
    "bindTexture",
    "blendFunc",
    "bufferData",
    "bufferSubData",
    "clear",
    "clearColor",
    "clearDepth",
    "compileShader",
    "createBuffer",
    "createFramebuffer",
    "createProgram",
    "createRenderbuffer",
    "createShader",
    "createTexture",
    "deleteBuffer",
    "deleteProgram",
    "deleteShader",
    "deleteTexture",
    "disable",
    "drawArrays",
    "drawElements",
    "enable",
    "enableVertexAttribArray",
    "framebufferTexture2D",
    "getActiveAttrib",
    "getActiveUniform",
    "getShaderPrecisionFormat",
    "getUniformLocation",
    "linkProgram",
    "pixelStorei",
    "shaderSource",
    "texImage2D",
    "texParameteri",
    "uniform1f",
    "uniform1i",
    "uniform4fv",
    "uniformMatrix4fv",
    "useProgram",
    "vertexAttribPointer",
    "viewport",
];

const WEBGL2_METHODS: &[&str] = &[
    "activeTexture",
    "attachShader",
    "beginQuery",
    "bindBuffer",
    "bindFramebuffer",
    "bindRenderbuffer",
    "bindSampler",
    "bindTexture",
    "bindVertexArray",
    "blendFunc",
    "bufferData",
    "bufferSubData",
    "clear",
    "clearColor",
    "clearDepth",
    "compileShader",
    "createBuffer",
    "createFramebuffer",
    "createProgram",
    "createQuery",
    "createRenderbuffer",
    "createSampler",
    "createShader",
    "createTexture",
    "createTransformFeedback",
    "createVertexArray",
    "deleteBuffer",
    "deleteProgram",
    "deleteShader",
    "deleteTexture",
    "disable",
    "drawArrays",
    "drawArraysInstanced",
    "drawElements",
    "enable",
    "enableVertexAttribArray",
    "endQuery",
    "fenceSync",
    "framebufferTexture2D",
    "getActiveAttrib",
    "getActiveUniform",
    "getShaderPrecisionFormat",
    "getUniformLocation",
    "linkProgram",
    "pixelStorei",
    "shaderSource",
    "texImage2D",
    "texParameteri",
    "texStorage2D",
    "uniform1f",
    "uniform1i",
    "uniform4fv",
    "uniformMatrix4fv",
    "useProgram",
    "vertexAttribDivisor",
    "vertexAttribPointer",
    "viewport",
];

const WEBGL2_CLASSES: &[&str] = &[
    "WebGLActiveInfo",
    "WebGLBuffer",
    "WebGLFramebuffer",
    "WebGLProgram",
    "WebGLQuery",
    "WebGLRenderbuffer",
    "WebGLSampler",
    "WebGLShader",
    "WebGLShaderPrecisionFormat",
    "WebGLSync",
    "WebGLTexture",
    "WebGLTransformFeedback",
    "WebGLUniformLocation",
    "WebGLVertexArrayObject",
];

const WEBGL2_CONSTRUCTORS: &[(&str, &str)] = &[
    ("createBuffer", "WebGLBuffer"),
    ("createFramebuffer", "WebGLFramebuffer"),
    ("createProgram", "WebGLProgram"),
    ("createQuery", "WebGLQuery"),
    ("createRenderbuffer", "WebGLRenderbuffer"),
    ("createSampler", "WebGLSampler"),
    ("createShader", "WebGLShader"),
    ("createTexture", "WebGLTexture"),
    ("createTransformFeedback", "WebGLTransformFeedback"),
    ("createVertexArray", "WebGLVertexArrayObject"),
    ("fenceSync", "WebGLSync"),
    ("getUniformLocation", "WebGLUniformLocation"),
    ("getActiveAttrib", "WebGLActiveInfo"),
    ("getActiveUniform", "WebGLActiveInfo"),
    ("getShaderPrecisionFormat", "WebGLShaderPrecisionFormat"),
];

pub const WEBGL: CapabilityFamily = CapabilityFamily {
    context: CanvasContext::WebGl,
    class: "WebGLRenderingContext",
    methods: WEBGL_METHODS,
    setters: &[],
    variable_classes: WEBGL_CLASSES,
    constructors: WEBGL_CONSTRUCTORS,
};

pub const WEBGL2: CapabilityFamily = CapabilityFamily {
    context: CanvasContext::WebGl2,
    class: "WebGL2RenderingContext",
    methods: WEBGL2_METHODS,
    setters: &[],
    variable_classes: WEBGL2_CLASSES,
    constructors: WEBGL2_CONSTRUCTORS,
};

pub const CANVAS_2D: CapabilityFamily = CapabilityFamily {
    context: CanvasContext::TwoD,
    class: "CanvasRenderingContext2D",
    methods: &[
        "arc",
        "beginPath",
        "bezierCurveTo",
        "clearRect",
        "closePath",
        "createLinearGradient",
        "createPattern",
        "createRadialGradient",
        "drawImage",
        "fill",
        "fillRect",
        "fillText",
        "lineTo",
        "moveTo",
        "putImageData",
        "quadraticCurveTo",
        "rect",
        "restore",
        "rotate",
        "save",
        "scale",
        "setLineDash",
        "setTransform",
        "stroke",
        "strokeRect",
        "strokeText",
        "transform",
        "translate",
    ],
    setters: &[
        "direction",
        "fillStyle",
        "filter",
        "font",
        "globalAlpha",
        "globalCompositeOperation",
        "imageSmoothingEnabled",
        "lineCap",
        "lineDashOffset",
        "lineJoin",
        "lineWidth",
        "miterLimit",
        "shadowBlur",
        "shadowColor",
        "shadowOffsetX",
        "shadowOffsetY",
        "strokeStyle",
        "textAlign",
        "textBaseline",
    ],
    variable_classes: &["CanvasGradient", "CanvasPattern"],
    constructors: &[
        ("createLinearGradient", "CanvasGradient"),
        ("createPattern", "CanvasPattern"),
        ("createRadialGradient", "CanvasGradient"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_produce_declared_classes() {
        for family in [&WEBGL, &WEBGL2, &CANVAS_2D] {
            for (method, class) in family.constructors {
                assert!(family.has_method(method), "{method} missing from {}", family.class);
                assert!(family.is_variable_class(class), "{class} not tracked");
            }
        }
    }

    #[test]
    fn lookup_by_context() {
        assert_eq!(CapabilityFamily::for_context(CanvasContext::WebGl).class, WEBGL.class);
        assert_eq!(CapabilityFamily::for_context(CanvasContext::TwoD), &CANVAS_2D);
        assert_eq!(WEBGL2.constructed_class("createVertexArray"), Some("WebGLVertexArrayObject"));
        assert_eq!(WEBGL.constructed_class("createVertexArray"), None);
        assert!(CANVAS_2D.has_setter("fillStyle"));
        assert!(!CANVAS_2D.has_method("fillStyle"));
    }
}
