//! Stream records and the channel that carries them out of the recorder.
//!
//! Everything here is a plain serializable value: no live references, no
//! document handles. Ids refer to the recorder's mirrors.

mod args;
mod records;

use std::sync::mpsc::{self, Receiver, Sender};

pub use args::{ElementType, SerializedArg, TaggedArg};
pub use records::{
    AddedNodeMutation, AttributeMutation, CallMutation, MutationData, RecordEvent,
    RemovedNodeMutation, SerializedNode, TextMutation, unique_text_mutations,
};

/// Receiver of emitted records.
pub trait MutationSink {
    fn emit(&mut self, event: RecordEvent);
}

impl MutationSink for Vec<RecordEvent> {
    fn emit(&mut self, event: RecordEvent) {
        self.push(event);
    }
}

impl MutationSink for Sender<RecordEvent> {
    fn emit(&mut self, event: RecordEvent) {
        // A dropped receiver means the transport is gone; recording goes on.
        let _ = self.send(event);
    }
}

impl<F: FnMut(RecordEvent)> MutationSink for F {
    fn emit(&mut self, event: RecordEvent) {
        self(event)
    }
}

pub struct Bus {
    pub evt_tx: Sender<RecordEvent>,
    pub evt_rx: Receiver<RecordEvent>,
}

impl Bus {
    pub fn new() -> Self {
        let (evt_tx, evt_rx) = mpsc::channel();
        Self { evt_tx, evt_rx }
    }

    /// Take every record currently queued without blocking.
    pub fn drain(&self) -> Vec<RecordEvent> {
        self.evt_rx.try_iter().collect()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
