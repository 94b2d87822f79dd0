//! Recording side: interception of observed native interfaces, argument
//! serialization, change-batch collection, and insertion ordering.

pub mod capability;
pub mod collect;
pub mod filter;
pub mod host;
pub mod intercept;
pub mod native;
pub mod resolver;
pub mod serialize;

mod config;
mod queue;
mod recorder;

pub use capability::{CANVAS_2D, CapabilityFamily, WEBGL, WEBGL2};
pub use collect::{MutationBatch, collect_adds};
pub use config::{ConfigError, RecorderConfig};
pub use filter::{BlockPolicy, is_ancestor_removed, is_blocked};
pub use host::{HostError, HostObject, ObjectHandle, ObjectRef, ProtoRef, Prototype, Value};
pub use intercept::{Deferred, Handlers, Undo, wrap, wrap_setter, wrap_setter_with};
pub use native::NativeCanvas;
pub use queue::TaskQueue;
pub use recorder::{MutationRecorder, OwnerFn, SharedSink};
pub use resolver::{ResolveForest, resolve};
pub use serialize::{ArgumentSerializer, CreatedVariable, Serialized};
