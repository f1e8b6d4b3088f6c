//! Optimistic write buffer bookkeeping.
//!
//! Tracks every in-flight send from provisional append to its terminal
//! state, and keeps the provisional↔durable id mapping alive until the
//! corresponding push echo has been observed, so the echo can be
//! deduplicated no matter which side of the race it lands on.

use std::collections::BTreeSet;

#[derive(Debug)]
struct OutboxEntry {
    provisional_id: String,
    /// Set when the durable write confirms.
    durable_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
    /// Durable ids whose push echo arrived before the write confirmed.
    early_echoes: BTreeSet<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisional message was appended; the write is now in flight.
    pub fn register(&mut self, provisional_id: &str) {
        self.entries.push(OutboxEntry {
            provisional_id: provisional_id.to_owned(),
            durable_id: None,
        });
    }

    /// The durable write succeeded. Returns true when the push echo for
    /// this message was already observed (the mapping is complete and the
    /// entry is dropped immediately).
    pub fn confirm(&mut self, provisional_id: &str, durable_id: &str) -> bool {
        if self.early_echoes.remove(durable_id) {
            self.entries.retain(|e| e.provisional_id != provisional_id);
            return true;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.provisional_id == provisional_id)
        {
            entry.durable_id = Some(durable_id.to_owned());
        }
        false
    }

    /// The durable write failed; the entry is rolled back. With nothing
    /// left in flight any remembered early echo is stale and dropped too.
    pub fn fail(&mut self, provisional_id: &str) {
        self.entries.retain(|e| e.provisional_id != provisional_id);
        if self.entries.is_empty() {
            self.early_echoes.clear();
        }
    }

    /// An `inserted` event from the local sender arrived. Returns true if
    /// its durable id is mapped to one of our confirmed sends (and must
    /// not produce a second visible copy); the completed entry is dropped.
    ///
    /// Unmapped ids are never guessed at: an own-sender row can just as
    /// well be history from a page merge or a send from another session.
    /// The caller correlates those against its pending entries and records
    /// a genuine early echo explicitly.
    pub fn observe_echo(&mut self, durable_id: &str) -> bool {
        if let Some(at) = self
            .entries
            .iter()
            .position(|e| e.durable_id.as_deref() == Some(durable_id))
        {
            self.entries.remove(at);
            return true;
        }
        false
    }

    /// The echo of an in-flight send raced ahead of the insert response;
    /// remember its durable id so the upcoming `confirm` completes the
    /// mapping.
    pub fn record_early_echo(&mut self, durable_id: &str) {
        self.early_echoes.insert(durable_id.to_owned());
    }

    /// Provisional id still mapped to this durable id (echo not yet seen).
    pub fn provisional_for(&self, durable_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.durable_id.as_deref() == Some(durable_id))
            .map(|e| e.provisional_id.as_str())
    }

    pub fn has_in_flight(&self) -> bool {
        self.entries.iter().any(|e| e.durable_id.is_none())
    }

    /// Provisional ids of sends whose durable write has not confirmed yet.
    pub fn in_flight_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|e| e.durable_id.is_none())
            .map(|e| e.provisional_id.as_str())
    }
}
