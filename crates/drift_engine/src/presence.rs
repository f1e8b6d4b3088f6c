//! Typing tracker: debounced local broadcast, last-writer-wins remote
//! state, fixed auto-expiry.
//!
//! Remote rule per participant: `idle → typing` on a typing-start payload;
//! `typing → idle` on an explicit stop or after TYPING_TTL of local
//! silence, whichever comes first. The local side broadcasts on input
//! activity (debounced) and owes the channel an explicit stop when the
//! same window elapses without further activity.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use drift_proto::{PresenceEvent, PresencePayload, TypingState};

/// Inactivity window after which typing state expires, locally and for the
/// local participant's own stop broadcast.
pub const TYPING_TTL_SECS: i64 = 3;

/// Minimum gap between repeated typing-start broadcasts while the user
/// keeps hammering the keyboard.
pub const TYPING_DEBOUNCE_MS: i64 = 800;

pub fn typing_ttl() -> Duration {
    Duration::seconds(TYPING_TTL_SECS)
}

pub struct TypingTracker {
    room_id: String,
    local_participant_id: String,
    local_display_name: String,
    /// Latest payload per remote participant; superseded by anything newer.
    remote: HashMap<String, TypingState>,
    /// Whether our own typing-start is currently broadcast.
    local_broadcasting: bool,
    last_broadcast: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
}

impl TypingTracker {
    pub fn new(
        room_id: impl Into<String>,
        local_participant_id: impl Into<String>,
        local_display_name: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            local_participant_id: local_participant_id.into(),
            local_display_name: local_display_name.into(),
            remote: HashMap::new(),
            local_broadcasting: false,
            last_broadcast: None,
            last_activity: None,
        }
    }

    // ── Remote state ─────────────────────────────────────────────────────────

    pub fn apply(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Sync { payloads } => {
                self.remote.clear();
                for payload in payloads {
                    self.upsert(payload);
                }
            }
            PresenceEvent::Join { payload } => self.upsert(payload),
            PresenceEvent::Leave { participant_id } => {
                self.remote.remove(&participant_id);
            }
        }
    }

    fn upsert(&mut self, payload: PresencePayload) {
        let PresencePayload::Typing(state) = payload;
        if state.participant_id == self.local_participant_id {
            return;
        }
        match self.remote.get(&state.participant_id) {
            // Stale payloads never supersede newer ones.
            Some(existing) if existing.at > state.at => {}
            _ => {
                self.remote.insert(state.participant_id.clone(), state);
            }
        }
    }

    /// Remote participants currently typing: started, not explicitly
    /// stopped, and not silent past the TTL.
    pub fn typing_participants(&self, now: DateTime<Utc>) -> Vec<&TypingState> {
        let mut typing: Vec<&TypingState> = self
            .remote
            .values()
            .filter(|s| s.is_typing && now - s.at < typing_ttl())
            .collect();
        typing.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        typing
    }

    /// Drop everything we know about remote presence (unsubscribe).
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    // ── Local state ──────────────────────────────────────────────────────────

    /// Record a keystroke. Returns a typing-start payload to broadcast
    /// unless one went out within the debounce window.
    pub fn input_activity(&mut self, now: DateTime<Utc>) -> Option<PresencePayload> {
        self.last_activity = Some(now);
        let debounced = self
            .last_broadcast
            .is_some_and(|at| now - at < Duration::milliseconds(TYPING_DEBOUNCE_MS));
        if self.local_broadcasting && debounced {
            return None;
        }
        self.local_broadcasting = true;
        self.last_broadcast = Some(now);
        Some(self.payload(true, now))
    }

    /// Explicit stop (message sent, input cleared). Returns the stop
    /// payload to broadcast, if we were broadcasting at all.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<PresencePayload> {
        if !self.local_broadcasting {
            return None;
        }
        self.local_broadcasting = false;
        self.last_broadcast = Some(now);
        Some(self.payload(false, now))
    }

    /// When the pending local stop broadcast is due, if any.
    pub fn stop_deadline(&self) -> Option<DateTime<Utc>> {
        if !self.local_broadcasting {
            return None;
        }
        self.last_activity.map(|at| at + typing_ttl())
    }

    /// Fire the local inactivity timeout: emits the stop payload once the
    /// deadline has passed, otherwise nothing.
    pub fn maybe_timeout(&mut self, now: DateTime<Utc>) -> Option<PresencePayload> {
        match self.stop_deadline() {
            Some(deadline) if now >= deadline => self.stop(now),
            _ => None,
        }
    }

    fn payload(&self, is_typing: bool, at: DateTime<Utc>) -> PresencePayload {
        PresencePayload::Typing(TypingState {
            room_id: self.room_id.clone(),
            participant_id: self.local_participant_id.clone(),
            display_name: self.local_display_name.clone(),
            is_typing,
            at,
        })
    }
}
