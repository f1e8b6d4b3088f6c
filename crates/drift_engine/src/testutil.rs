//! Shared fakes for engine tests: scriptable store, push channel, identity
//! and notifier collaborators, plus message fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use drift_proto::api::{
    MembershipPatch, MessagePatch, NewMembershipRequest, NewMessageRequest, NewParticipantRequest,
};
use drift_proto::{
    Identity, Membership, Message, MessageId, MessageKind, MessageState, PageCursor, Participant,
    PresenceEvent, PresencePayload, Role, Room, RoomEvent, RoomKind,
};
use drift_store::{
    IdentityProvider, MessageStore, Notifier, PushChannel, RoomSubscription, StoreError,
};

use crate::clock::Clock;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn confirmed_message(id: &str, sender: &str, secs: i64) -> Message {
    let at = base_time() + Duration::seconds(secs);
    Message {
        id: MessageId::durable(id),
        room_id: "r-1".into(),
        sender_id: sender.into(),
        content: format!("content of {id}"),
        kind: MessageKind::Text,
        reply_to: None,
        state: MessageState::Confirmed,
        is_edited: false,
        is_pinned: false,
        reactions: Default::default(),
        mentions: vec![],
        created_at: at,
        updated_at: at,
        sender: None,
    }
}

pub fn pending_message(sender: &str, content: &str, secs: i64) -> Message {
    let at = base_time() + Duration::seconds(secs);
    Message {
        id: MessageId::provisional(),
        room_id: "r-1".into(),
        sender_id: sender.into(),
        content: content.into(),
        kind: MessageKind::Text,
        reply_to: None,
        state: MessageState::Pending,
        is_edited: false,
        is_pinned: false,
        reactions: Default::default(),
        mentions: vec![],
        created_at: at,
        updated_at: at,
        sender: None,
    }
}

pub fn identity(id: &str, name: Option<&str>, email: Option<&str>) -> Identity {
    Identity {
        id: id.into(),
        name: name.map(Into::into),
        email: email.map(Into::into),
    }
}

/// Give spawned tasks a chance to run on the current-thread runtime.
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

// ── FakeStore ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct CallCounts {
    pub find_participant: usize,
    pub create_participant: usize,
    pub insert_message: usize,
    pub fetch_page: usize,
}

#[derive(Default)]
struct FakeStoreState {
    participants: HashMap<String, Participant>,
    conflict_profiles: HashMap<String, Participant>,
    memberships: Vec<Membership>,
    messages: Vec<Message>,
    rooms: Vec<Room>,
    fail_next_insert: bool,
    next_id: u64,
    counts: CallCounts,
}

pub struct FakeStore {
    clock: Arc<dyn Clock>,
    state: Mutex<FakeStoreState>,
    /// Hold this lock in a test to stall `insert_message` mid-flight.
    pub insert_gate: tokio::sync::Mutex<()>,
}

impl FakeStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let store = Self {
            clock,
            state: Mutex::new(FakeStoreState::default()),
            insert_gate: tokio::sync::Mutex::new(()),
        };
        store.state.lock().rooms.push(Room {
            id: "r-1".into(),
            name: "general".into(),
            kind: RoomKind::Group,
            owner_id: None,
            is_active: true,
            member_count: Some(1),
            max_members: None,
        });
        store
    }

    pub fn counts(&self) -> CallCounts {
        self.state.lock().counts
    }

    pub fn fail_next_insert(&self) {
        self.state.lock().fail_next_insert = true;
    }

    /// Simulate another client winning the participant-creation race.
    pub fn preset_participant_conflict(&self, identity_id: &str, display_name: &str) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let participant = Participant {
            id: format!("p-{}", state.next_id),
            display_name: display_name.into(),
            avatar_url: None,
        };
        state
            .conflict_profiles
            .insert(identity_id.to_owned(), participant);
    }

    /// Add a durable row without emitting a push event (a "missed" message
    /// for gap-repair tests).
    pub fn push_stored_message(&self, message: Message) {
        self.state.lock().messages.push(message);
    }

    pub fn active_membership_count(&self, room_id: &str, participant_id: &str) -> usize {
        self.state
            .lock()
            .memberships
            .iter()
            .filter(|m| m.room_id == room_id && m.participant_id == participant_id && m.is_active)
            .count()
    }

    pub fn membership_row_count(&self, room_id: &str, participant_id: &str) -> usize {
        self.state
            .lock()
            .memberships
            .iter()
            .filter(|m| m.room_id == room_id && m.participant_id == participant_id)
            .count()
    }

    pub fn set_membership_role(&self, room_id: &str, participant_id: &str, role: Role) {
        let mut state = self.state.lock();
        if let Some(m) = state
            .memberships
            .iter_mut()
            .find(|m| m.room_id == room_id && m.participant_id == participant_id)
        {
            m.role = role;
        }
    }

    pub fn set_membership_muted(&self, room_id: &str, participant_id: &str, until: Option<DateTime<Utc>>) {
        let mut state = self.state.lock();
        if let Some(m) = state
            .memberships
            .iter_mut()
            .find(|m| m.room_id == room_id && m.participant_id == participant_id)
        {
            m.is_muted = true;
            m.muted_until = until;
        }
    }
}

#[async_trait]
impl MessageStore for FakeStore {
    async fn fetch_page(
        &self,
        room_id: &str,
        before: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let mut state = self.state.lock();
        state.counts.fetch_page += 1;
        let mut page: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id && !m.is_deleted())
            .filter(|m| match before {
                Some(c) => (m.created_at, m.id.as_str()) < (c.created_at, c.id.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        page.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn insert_message(&self, req: NewMessageRequest) -> Result<Message, StoreError> {
        let _gate = self.insert_gate.lock().await;
        let mut state = self.state.lock();
        state.counts.insert_message += 1;
        if state.fail_next_insert {
            state.fail_next_insert = false;
            return Err(StoreError::Api {
                status: 500,
                message: "insert failed".into(),
            });
        }
        state.next_id += 1;
        let now = self.clock.now();
        let message = Message {
            id: MessageId::durable(format!("m-{}", state.next_id)),
            room_id: req.room_id,
            sender_id: req.sender_id,
            content: req.content,
            kind: req.message_type,
            reply_to: req.reply_to_id.map(MessageId::durable),
            state: MessageState::Confirmed,
            is_edited: false,
            is_pinned: false,
            reactions: Default::default(),
            mentions: req.mentions,
            created_at: now,
            updated_at: now,
            sender: None,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn soft_delete_message(&self, message_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        match state
            .messages
            .iter_mut()
            .find(|m| m.id.as_str() == message_id)
        {
            Some(m) => {
                m.mark_deleted();
                Ok(())
            }
            None => Err(StoreError::NotFound(message_id.into())),
        }
    }

    async fn update_message(
        &self,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let m = state
            .messages
            .iter_mut()
            .find(|m| m.id.as_str() == message_id)
            .ok_or_else(|| StoreError::NotFound(message_id.into()))?;
        if let Some(content) = patch.content {
            m.content = content;
            m.is_edited = true;
        }
        if let Some(pinned) = patch.is_pinned {
            m.is_pinned = pinned;
        }
        m.updated_at = now;
        Ok(m.clone())
    }

    async fn add_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let m = state
            .messages
            .iter_mut()
            .find(|m| m.id.as_str() == message_id)
            .ok_or_else(|| StoreError::NotFound(message_id.into()))?;
        m.reactions
            .entry(emoji.to_owned())
            .or_default()
            .insert(participant_id.to_owned());
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let m = state
            .messages
            .iter_mut()
            .find(|m| m.id.as_str() == message_id)
            .ok_or_else(|| StoreError::NotFound(message_id.into()))?;
        if let Some(reactors) = m.reactions.get_mut(emoji) {
            reactors.remove(participant_id);
            if reactors.is_empty() {
                m.reactions.remove(emoji);
            }
        }
        Ok(())
    }

    async fn find_participant(
        &self,
        identity_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        self.state.lock().counts.find_participant += 1;
        tokio::task::yield_now().await;
        Ok(self.state.lock().participants.get(identity_id).cloned())
    }

    async fn create_participant(
        &self,
        req: NewParticipantRequest,
    ) -> Result<Participant, StoreError> {
        let mut state = self.state.lock();
        state.counts.create_participant += 1;
        if let Some(winner) = state.conflict_profiles.remove(&req.identity_id) {
            state
                .participants
                .insert(req.identity_id.clone(), winner);
            return Err(StoreError::Conflict("participant exists".into()));
        }
        if state.participants.contains_key(&req.identity_id) {
            return Err(StoreError::Conflict("participant exists".into()));
        }
        state.next_id += 1;
        let participant = Participant {
            id: format!("p-{}", state.next_id),
            display_name: req.display_name,
            avatar_url: req.avatar_url,
        };
        state
            .participants
            .insert(req.identity_id, participant.clone());
        Ok(participant)
    }

    async fn find_membership(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        // Yield so two concurrent joins can interleave between find and
        // insert, exercising the conflict path.
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .memberships
            .iter()
            .find(|m| m.room_id == room_id && m.participant_id == participant_id)
            .cloned())
    }

    async fn insert_membership(
        &self,
        req: NewMembershipRequest,
    ) -> Result<Membership, StoreError> {
        let mut state = self.state.lock();
        if state
            .memberships
            .iter()
            .any(|m| m.room_id == req.room_id && m.participant_id == req.participant_id)
        {
            return Err(StoreError::Conflict("membership exists".into()));
        }
        let membership = Membership {
            room_id: req.room_id,
            participant_id: req.participant_id,
            role: req.role,
            is_banned: false,
            is_muted: false,
            muted_until: None,
            joined_at: self.clock.now(),
            is_active: true,
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn update_membership(
        &self,
        room_id: &str,
        participant_id: &str,
        patch: MembershipPatch,
    ) -> Result<Membership, StoreError> {
        let mut state = self.state.lock();
        let m = state
            .memberships
            .iter_mut()
            .find(|m| m.room_id == room_id && m.participant_id == participant_id)
            .ok_or_else(|| StoreError::NotFound(format!("{participant_id} in {room_id}")))?;
        if let Some(role) = patch.role {
            m.role = role;
        }
        if let Some(banned) = patch.is_banned {
            m.is_banned = banned;
        }
        if let Some(muted) = patch.is_muted {
            m.is_muted = muted;
            m.muted_until = patch.muted_until;
        }
        if let Some(active) = patch.is_active {
            m.is_active = active;
        }
        Ok(m.clone())
    }

    async fn fetch_room(&self, room_id: &str) -> Result<Room, StoreError> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(room_id.into()))
    }

    async fn list_rooms(&self, _participant_id: &str) -> Result<Vec<Room>, StoreError> {
        Ok(self
            .state
            .lock()
            .rooms
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }
}

// ── FakeChannel ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeChannelInner {
    event_tx: Option<mpsc::Sender<RoomEvent>>,
    presence_tx: Option<mpsc::Sender<PresenceEvent>>,
    tracked: Vec<PresencePayload>,
    subscribe_count: usize,
}

#[derive(Default)]
pub struct FakeChannel {
    inner: Mutex<FakeChannelInner>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_event(&self, event: RoomEvent) {
        let tx = self
            .inner
            .lock()
            .event_tx
            .clone()
            .expect("no live subscription");
        tx.send(event).await.expect("subscription receiver gone");
    }

    pub async fn push_presence(&self, event: PresenceEvent) {
        let tx = self
            .inner
            .lock()
            .presence_tx
            .clone()
            .expect("no live subscription");
        tx.send(event).await.expect("subscription receiver gone");
    }

    /// Simulate a transient stream drop: both receivers observe channel
    /// closure.
    pub fn drop_stream(&self) {
        let mut inner = self.inner.lock();
        inner.event_tx = None;
        inner.presence_tx = None;
    }

    pub fn tracked(&self) -> Vec<PresencePayload> {
        self.inner.lock().tracked.clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.inner.lock().subscribe_count
    }
}

#[async_trait]
impl PushChannel for FakeChannel {
    async fn subscribe(&self, room_id: &str) -> Result<RoomSubscription, StoreError> {
        let (event_tx, events) = mpsc::channel(64);
        let (presence_tx, presence) = mpsc::channel(64);
        let mut inner = self.inner.lock();
        inner.event_tx = Some(event_tx);
        inner.presence_tx = Some(presence_tx);
        inner.subscribe_count += 1;
        Ok(RoomSubscription {
            room_id: room_id.to_owned(),
            events,
            presence,
        })
    }

    async fn track(&self, _room_id: &str, payload: PresencePayload) -> Result<(), StoreError> {
        self.inner.lock().tracked.push(payload);
        Ok(())
    }
}

// ── FakeIdentity / FakeNotifier ──────────────────────────────────────────────

pub struct FakeIdentity(pub Option<Identity>);

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyRecord {
    Received { message_id: String },
    Mentioned { message_id: String, participant_id: String },
}

#[derive(Default)]
pub struct FakeNotifier {
    records: Mutex<Vec<NotifyRecord>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NotifyRecord> {
        self.records.lock().clone()
    }

    pub fn received_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| matches!(r, NotifyRecord::Received { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn message_received(&self, _room_id: &str, message: &Message) {
        self.records.lock().push(NotifyRecord::Received {
            message_id: message.id.as_str().to_owned(),
        });
    }

    async fn mentioned(&self, _room_id: &str, message: &Message, participant_id: &str) {
        self.records.lock().push(NotifyRecord::Mentioned {
            message_id: message.id.as_str().to_owned(),
            participant_id: participant_id.to_owned(),
        });
    }
}
