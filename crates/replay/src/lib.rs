//! Replay side: rebuilds a document and re-issues canvas calls from a
//! record stream.

mod calls;
mod document;
mod error;
mod replayer;

pub use calls::CallReplayer;
pub use document::{ApplyStats, ReplayDocument};
pub use error::ReplayError;
pub use replayer::Replayer;
