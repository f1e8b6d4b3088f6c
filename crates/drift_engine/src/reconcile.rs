//! Merge rules for the room event stream.
//!
//! Arrival order is not causal order: the push channel may deliver late,
//! duplicated, or reordered events, and the local user's own durable echo
//! races against the insert response. The reconciler owns the room's
//! timeline and outbox and folds whatever arrives into one consistent view.

use drift_proto::{Message, RoomEvent};
use tracing::debug;

use crate::outbox::Outbox;
use crate::timeline::Timeline;

/// What applying one event did to the visible timeline — the caller fires
/// notification side effects off `Appended`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No visible change (duplicate, unknown target, or own-echo discard).
    Ignored,
    /// A remote participant's message became visible.
    Appended(Message),
    Updated(String),
    Deleted(String),
    /// The durable echo of one of our own sends; mapping completed.
    EchoConfirmed,
}

pub struct Reconciler {
    timeline: Timeline,
    outbox: Outbox,
    local_participant_id: String,
}

impl Reconciler {
    pub fn new(local_participant_id: impl Into<String>) -> Self {
        Self {
            timeline: Timeline::new(),
            outbox: Outbox::new(),
            local_participant_id: local_participant_id.into(),
        }
    }

    pub fn visible(&self) -> &[Message] {
        self.timeline.visible()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.timeline.get(id)
    }

    /// Mutable access by durable id, with the same provisional fallback as
    /// the stream path. For local optimistic merges (reactions).
    pub fn entry_mut(&mut self, id: &str) -> Option<&mut Message> {
        let target = self.target_entry(id)?;
        self.timeline.get_mut(&target)
    }

    pub fn has_in_flight_sends(&self) -> bool {
        self.outbox.has_in_flight()
    }

    // ── Own write path ───────────────────────────────────────────────────────

    /// Step 2 of the send algorithm: show the provisional message now.
    pub fn push_pending(&mut self, message: Message) {
        debug_assert!(message.id.is_provisional());
        self.outbox.register(message.id.as_str());
        self.timeline.insert(message);
    }

    /// Step 4: the durable write succeeded — swap the provisional entry for
    /// the durable row and remember the id mapping for echo dedup.
    pub fn confirm_send(&mut self, provisional_id: &str, durable: Message) {
        self.outbox.confirm(provisional_id, durable.id.as_str());
        if self.timeline.contains(durable.id.as_str()) {
            // The durable copy already landed via echo-merge or gap repair;
            // keeping both would show the message twice.
            self.timeline.remove(provisional_id);
        } else {
            self.timeline.replace(provisional_id, durable);
        }
    }

    /// Step 5: the durable write failed — the provisional entry disappears.
    pub fn fail_send(&mut self, provisional_id: &str) {
        self.outbox.fail(provisional_id);
        self.timeline.remove(provisional_id);
    }

    // ── Stream path ──────────────────────────────────────────────────────────

    pub fn apply(&mut self, event: RoomEvent) -> ReconcileOutcome {
        match event {
            RoomEvent::Inserted { message } => {
                if message.sender_id == self.local_participant_id {
                    // Durable echo of an optimistic send: never appended,
                    // only used to complete the provisional↔durable mapping.
                    if self.outbox.observe_echo(message.id.as_str()) {
                        return ReconcileOutcome::EchoConfirmed;
                    }
                    if let Some(provisional_id) = self.match_in_flight(&message) {
                        debug!(
                            id = message.id.as_str(),
                            provisional_id = provisional_id.as_str(),
                            "echo raced ahead of the insert response"
                        );
                        self.outbox.record_early_echo(message.id.as_str());
                        return ReconcileOutcome::EchoConfirmed;
                    }
                    // Not ours in flight: the local participant sent this
                    // from another session, or it is plain history.
                }
                if self.timeline.insert(message.clone()) {
                    ReconcileOutcome::Appended(message)
                } else {
                    ReconcileOutcome::Ignored
                }
            }
            RoomEvent::Updated { message } => {
                match self.target_entry(message.id.as_str()) {
                    Some(target) => {
                        if let Some(entry) = self.timeline.get_mut(&target) {
                            entry.apply_update(&message);
                        }
                        ReconcileOutcome::Updated(target)
                    }
                    None => {
                        debug!(id = message.id.as_str(), "update for unloaded message ignored");
                        ReconcileOutcome::Ignored
                    }
                }
            }
            RoomEvent::Deleted { id } => match self.target_entry(&id) {
                Some(target) if self.timeline.mark_deleted(&target) => {
                    ReconcileOutcome::Deleted(target)
                }
                _ => ReconcileOutcome::Ignored,
            },
        }
    }

    /// Locate a message by durable id, falling back to its provisional id
    /// when our own write has confirmed but hasn't been echo-reconciled.
    fn target_entry(&self, durable_id: &str) -> Option<String> {
        if self.timeline.contains(durable_id) {
            Some(durable_id.to_owned())
        } else {
            self.outbox.provisional_for(durable_id).map(str::to_owned)
        }
    }

    /// Fold a freshly-fetched page into the timeline: union by durable id,
    /// pending entries preserved. Used on open and for gap repair after a
    /// stream drop or resubscription.
    pub fn merge_page(&mut self, page: Vec<Message>) {
        for message in page {
            let id = message.id.as_str().to_owned();
            if let Some(existing) = self.timeline.get_mut(&id) {
                existing.apply_update(&message);
                continue;
            }
            if message.sender_id == self.local_participant_id {
                if self.outbox.observe_echo(&id) {
                    continue;
                }
                if self.match_in_flight(&message).is_some() {
                    // The durable copy of an in-flight send; the pending
                    // entry stays the visible copy until the response lands.
                    self.outbox.record_early_echo(&id);
                    continue;
                }
                // Own history merges like anyone else's.
            }
            self.timeline.insert(message);
        }
    }

    /// Correlate an own-sender durable row with a specific in-flight send:
    /// same content and kind as a pending entry whose write has not
    /// confirmed. Anything weaker would swallow the local user's history
    /// whenever a send happens to be in flight.
    fn match_in_flight(&self, incoming: &Message) -> Option<String> {
        self.outbox.in_flight_ids().find_map(|provisional_id| {
            let pending = self.timeline.get(provisional_id)?;
            (pending.content == incoming.content && pending.kind == incoming.kind)
                .then(|| provisional_id.to_owned())
        })
    }
}
