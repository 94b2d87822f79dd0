use crate::calls::CallReplayer;
use crate::document::{ApplyStats, ReplayDocument};
use crate::error::ReplayError;
use bus::RecordEvent;
use core_types::MirrorId;
use dom::DomSnapshot;

/// Consumes a record stream in emission order.
///
/// Change batches never fail: unplaceable records are dropped and counted.
/// Call records fail when they reference something the stream has not
/// announced.
#[derive(Default)]
pub struct Replayer {
    document: ReplayDocument,
    calls: CallReplayer,
    stats: ApplyStats,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &RecordEvent) -> Result<(), ReplayError> {
        match event {
            RecordEvent::Mutation(data) => {
                self.stats += self.document.apply(data);
                Ok(())
            }
            RecordEvent::ContextCreated { owner, context } => {
                self.calls.create_context(&self.document, *owner, *context)
            }
            RecordEvent::VariableCreated {
                owner, class, index, ..
            } => {
                self.calls.create_variable(&self.document, *owner, class, *index);
                Ok(())
            }
            RecordEvent::Call(call) => self.calls.call(&self.document, call),
        }
    }

    /// Apply every event, logging and skipping the ones that fail. Returns
    /// how many failed.
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a RecordEvent>) -> usize {
        let mut failed = 0;
        for event in events {
            if let Err(err) = self.apply(event) {
                log::warn!(target: "replay.calls", "{err}");
                failed += 1;
            }
        }
        failed
    }

    pub fn document(&self) -> &ReplayDocument {
        &self.document
    }

    pub fn snapshot(&self) -> DomSnapshot {
        self.document.snapshot()
    }

    pub fn journal(&self, owner: MirrorId) -> Vec<String> {
        self.calls.journal(owner)
    }

    pub fn calls(&self) -> &CallReplayer {
        &self.calls
    }

    /// Totals over every change batch applied so far.
    pub fn stats(&self) -> ApplyStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.document.reset();
        self.calls.reset();
        self.stats = ApplyStats::default();
    }
}
