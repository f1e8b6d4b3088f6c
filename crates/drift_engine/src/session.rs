//! `ChatClient` / `RoomSession`: the wiring surface over the collaborator
//! contracts.
//!
//! A `RoomSession` owns one room's live state behind a single async mutex
//! and a background pump task that folds the push stream into it. Every
//! await point releases the lock, so the send path, the pump, and callers
//! snapshotting the timeline interleave freely without ever observing a
//! half-applied merge.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use drift_proto::api::{MessagePatch, NewMessageRequest};
use drift_proto::{
    mentions, Membership, Message, MessageId, MessageKind, MessageState, PageCursor, Participant,
    Role, Room, RoomEvent, TypingState,
};
use drift_store::{IdentityProvider, MessageStore, Notifier, PushChannel, RoomSubscription};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::membership::{check_can_send, MembershipManager};
use crate::moderation::{can_delete_message, can_moderate_room};
use crate::presence::TypingTracker;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::resolver::ParticipantResolver;

/// Messages fetched per history page.
pub const PAGE_SIZE: u32 = 50;

/// How long resolved participant profiles stay cached.
const PROFILE_CACHE_TTL_MINS: i64 = 5;

/// Pump wakeup ceiling when no typing-stop deadline is pending.
const IDLE_TICK: StdDuration = StdDuration::from_secs(3600);

/// Everything the engine talks to. All collaborators are trait objects so
/// tests swap in scripted fakes.
pub struct ChatDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn MessageStore>,
    pub channel: Arc<dyn PushChannel>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

// ── ChatClient ───────────────────────────────────────────────────────────────

/// Account-level entry point: resolves the signed-in participant and opens
/// room sessions.
pub struct ChatClient {
    deps: Arc<ChatDeps>,
    resolver: ParticipantResolver,
    memberships: MembershipManager,
}

impl ChatClient {
    pub fn new(deps: ChatDeps) -> Self {
        let deps = Arc::new(deps);
        let resolver = ParticipantResolver::new(
            deps.store.clone(),
            deps.clock.clone(),
            chrono::Duration::minutes(PROFILE_CACHE_TTL_MINS),
        );
        let memberships = MembershipManager::new(deps.store.clone());
        Self { deps, resolver, memberships }
    }

    /// The chat participant for the signed-in identity, created on first
    /// use.
    pub async fn current_participant(&self) -> Result<Participant, EngineError> {
        let identity = self
            .deps
            .identity
            .current_identity()
            .await
            .ok_or_else(|| EngineError::Validation("not signed in".into()))?;
        self.resolver.resolve(&identity).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, EngineError> {
        let participant = self.current_participant().await?;
        Ok(self.deps.store.list_rooms(&participant.id).await?)
    }

    /// Open a live session: ensure membership, load the first history page,
    /// subscribe to the push stream, and start the event pump.
    pub async fn open_room(&self, room_id: &str) -> Result<RoomSession, EngineError> {
        let participant = self.current_participant().await?;
        let membership = self
            .memberships
            .ensure_membership(room_id, &participant.id)
            .await?;
        let room = self.deps.store.fetch_room(room_id).await?;
        if !room.is_active {
            return Err(EngineError::Validation("room is not active".into()));
        }

        let page = self.deps.store.fetch_page(room_id, None, PAGE_SIZE).await?;
        let mut reconciler = Reconciler::new(participant.id.clone());
        reconciler.merge_page(page);

        let typing = TypingTracker::new(room_id, &participant.id, &participant.display_name);
        let subscription = self.deps.channel.subscribe(room_id).await?;

        let state = Arc::new(Mutex::new(SessionState {
            open: true,
            reconciler,
            typing,
            membership,
        }));
        let wake = Arc::new(Notify::new());
        let pump = tokio::spawn(pump_events(
            self.deps.clone(),
            room.clone(),
            participant.clone(),
            state.clone(),
            wake.clone(),
            subscription,
        ));

        Ok(RoomSession {
            deps: self.deps.clone(),
            room,
            participant,
            memberships: MembershipManager::new(self.deps.store.clone()),
            state,
            wake,
            pump: parking_lot::Mutex::new(Some(pump)),
        })
    }
}

// ── RoomSession ──────────────────────────────────────────────────────────────

struct SessionState {
    open: bool,
    reconciler: Reconciler,
    typing: TypingTracker,
    membership: Membership,
}

pub struct RoomSession {
    deps: Arc<ChatDeps>,
    room: Room,
    participant: Participant,
    memberships: MembershipManager,
    state: Arc<Mutex<SessionState>>,
    wake: Arc<Notify>,
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RoomSession {
    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub async fn membership(&self) -> Membership {
        self.state.lock().await.membership.clone()
    }

    /// Snapshot of the visible timeline in display order.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.reconciler.visible().to_vec()
    }

    /// Remote participants currently typing.
    pub async fn typing_participants(&self) -> Vec<TypingState> {
        let now = self.deps.clock.now();
        self.state
            .lock()
            .await
            .typing
            .typing_participants(now)
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Sending ──────────────────────────────────────────────────────────────

    /// Optimistic send: the message appears immediately as pending, is
    /// swapped for the durable row on success, and disappears on failure.
    /// Exactly one durable write is attempted per call.
    pub async fn send_message(
        &self,
        content: &str,
        kind: MessageKind,
        reply_to: Option<MessageId>,
    ) -> Result<Message, EngineError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(EngineError::Validation("message content is empty".into()));
        }
        let now = self.deps.clock.now();
        let mention_list = mentions::extract_mentions(trimmed);

        let provisional = Message {
            id: MessageId::provisional(),
            room_id: self.room.id.clone(),
            sender_id: self.participant.id.clone(),
            content: trimmed.to_owned(),
            kind,
            reply_to: reply_to.clone(),
            state: MessageState::Pending,
            is_edited: false,
            is_pinned: false,
            reactions: Default::default(),
            mentions: mention_list.clone(),
            created_at: now,
            updated_at: now,
            sender: Some(self.participant.clone()),
        };
        let provisional_id = provisional.id.as_str().to_owned();

        {
            let mut st = self.state.lock().await;
            if !st.open {
                return Err(EngineError::Validation("room is closed".into()));
            }
            check_can_send(&st.membership, now)?;
            st.reconciler.push_pending(provisional);
        }

        let request = NewMessageRequest {
            room_id: self.room.id.clone(),
            sender_id: self.participant.id.clone(),
            content: trimmed.to_owned(),
            message_type: kind,
            reply_to_id: reply_to.map(|id| id.as_str().to_owned()),
            mentions: mention_list,
        };
        match self.deps.store.insert_message(request).await {
            Ok(durable) => {
                let mut st = self.state.lock().await;
                if !st.open {
                    // The room closed while the write was in flight. The
                    // durable row stands; the dead local view is left alone.
                    debug!(id = durable.id.as_str(), "send confirmed after close, discarded");
                    return Ok(durable);
                }
                st.reconciler.confirm_send(&provisional_id, durable.clone());
                Ok(durable)
            }
            Err(e) => {
                let mut st = self.state.lock().await;
                if st.open {
                    st.reconciler.fail_send(&provisional_id);
                }
                warn!(error = %e, "message send failed, provisional entry rolled back");
                Err(e.into())
            }
        }
    }

    // ── Message operations ───────────────────────────────────────────────────

    /// Soft-delete: author or privileged role. The entry stays in place
    /// with its content hidden.
    pub async fn delete_message(&self, id: &MessageId) -> Result<(), EngineError> {
        if id.is_provisional() {
            return Err(EngineError::Validation("message is still sending".into()));
        }
        {
            let st = self.state.lock().await;
            let message = st
                .reconciler
                .get(id.as_str())
                .ok_or_else(|| EngineError::NotFound(format!("message {id} not loaded")))?;
            if !can_delete_message(message, &st.membership) {
                return Err(EngineError::Permission(
                    "only the author or a moderator can delete a message".into(),
                ));
            }
        }
        self.deps.store.soft_delete_message(id.as_str()).await?;
        let mut st = self.state.lock().await;
        st.reconciler.apply(RoomEvent::Deleted { id: id.as_str().to_owned() });
        Ok(())
    }

    /// Author-only content edit.
    pub async fn edit_message(
        &self,
        id: &MessageId,
        content: &str,
    ) -> Result<Message, EngineError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(EngineError::Validation("message content is empty".into()));
        }
        if id.is_provisional() {
            return Err(EngineError::Validation("message is still sending".into()));
        }
        {
            let st = self.state.lock().await;
            let message = st
                .reconciler
                .get(id.as_str())
                .ok_or_else(|| EngineError::NotFound(format!("message {id} not loaded")))?;
            if message.sender_id != self.participant.id {
                return Err(EngineError::Permission("only the author can edit a message".into()));
            }
            if message.is_deleted() {
                return Err(EngineError::Validation("message was deleted".into()));
            }
        }
        let patch = MessagePatch { content: Some(trimmed.to_owned()), is_pinned: None };
        let updated = self.deps.store.update_message(id.as_str(), patch).await?;
        let mut st = self.state.lock().await;
        st.reconciler.apply(RoomEvent::Updated { message: updated.clone() });
        Ok(updated)
    }

    /// Pin or unpin (privileged roles only).
    pub async fn set_pinned(&self, id: &MessageId, pinned: bool) -> Result<Message, EngineError> {
        if id.is_provisional() {
            return Err(EngineError::Validation("message is still sending".into()));
        }
        {
            let st = self.state.lock().await;
            if !can_moderate_room(&st.membership) {
                return Err(EngineError::Permission(
                    "pinning requires a privileged role".into(),
                ));
            }
        }
        let patch = MessagePatch { content: None, is_pinned: Some(pinned) };
        let updated = self.deps.store.update_message(id.as_str(), patch).await?;
        let mut st = self.state.lock().await;
        st.reconciler.apply(RoomEvent::Updated { message: updated.clone() });
        Ok(updated)
    }

    pub async fn add_reaction(&self, id: &MessageId, emoji: &str) -> Result<(), EngineError> {
        if id.is_provisional() {
            return Err(EngineError::Validation("message is still sending".into()));
        }
        self.deps
            .store
            .add_reaction(id.as_str(), &self.participant.id, emoji)
            .await?;
        let mut st = self.state.lock().await;
        if let Some(entry) = st.reconciler.entry_mut(id.as_str()) {
            entry
                .reactions
                .entry(emoji.to_owned())
                .or_default()
                .insert(self.participant.id.clone());
        }
        Ok(())
    }

    pub async fn remove_reaction(&self, id: &MessageId, emoji: &str) -> Result<(), EngineError> {
        if id.is_provisional() {
            return Err(EngineError::Validation("message is still sending".into()));
        }
        self.deps
            .store
            .remove_reaction(id.as_str(), &self.participant.id, emoji)
            .await?;
        let mut st = self.state.lock().await;
        if let Some(entry) = st.reconciler.entry_mut(id.as_str()) {
            if let Some(reactors) = entry.reactions.get_mut(emoji) {
                reactors.remove(&self.participant.id);
                if reactors.is_empty() {
                    entry.reactions.remove(emoji);
                }
            }
        }
        Ok(())
    }

    /// Fetch the page preceding the oldest loaded durable message and merge
    /// it in. Returns how many rows the store sent back.
    pub async fn load_older(&self) -> Result<usize, EngineError> {
        let cursor = {
            let st = self.state.lock().await;
            st.reconciler
                .visible()
                .iter()
                .find(|m| !m.id.is_provisional())
                .map(|m| PageCursor {
                    created_at: m.created_at,
                    id: m.id.as_str().to_owned(),
                })
        };
        let page = self
            .deps
            .store
            .fetch_page(&self.room.id, cursor.as_ref(), PAGE_SIZE)
            .await?;
        let fetched = page.len();
        let mut st = self.state.lock().await;
        if st.open {
            st.reconciler.merge_page(page);
        }
        Ok(fetched)
    }

    // ── Typing ───────────────────────────────────────────────────────────────

    /// Report a keystroke in the composer. Broadcasts typing-start unless
    /// debounced, and arms the auto-stop timer.
    pub async fn input_activity(&self) -> Result<(), EngineError> {
        let now = self.deps.clock.now();
        let payload = {
            let mut st = self.state.lock().await;
            if !st.open {
                return Ok(());
            }
            st.typing.input_activity(now)
        };
        if let Some(payload) = payload {
            self.deps.channel.track(&self.room.id, payload).await?;
        }
        // Re-arm the pump's stop-deadline timer.
        self.wake.notify_one();
        Ok(())
    }

    /// Explicit typing stop (message sent, composer cleared).
    pub async fn stop_typing(&self) -> Result<(), EngineError> {
        let now = self.deps.clock.now();
        let payload = {
            let mut st = self.state.lock().await;
            if !st.open {
                return Ok(());
            }
            st.typing.stop(now)
        };
        if let Some(payload) = payload {
            self.deps.channel.track(&self.room.id, payload).await?;
        }
        self.wake.notify_one();
        Ok(())
    }

    // ── Moderation ───────────────────────────────────────────────────────────

    pub async fn set_member_role(
        &self,
        participant_id: &str,
        role: Role,
    ) -> Result<Membership, EngineError> {
        let target = self.moderation_target(participant_id).await?;
        self.memberships.set_role(&target, role).await
    }

    /// Mute until `until`, or indefinitely when `until` is `None`.
    pub async fn mute_member(
        &self,
        participant_id: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<Membership, EngineError> {
        let target = self.moderation_target(participant_id).await?;
        self.memberships.mute(&target, until).await
    }

    pub async fn unmute_member(&self, participant_id: &str) -> Result<Membership, EngineError> {
        let target = self.moderation_target(participant_id).await?;
        self.memberships.unmute(&target).await
    }

    pub async fn ban_member(&self, participant_id: &str) -> Result<Membership, EngineError> {
        let target = self.moderation_target(participant_id).await?;
        self.memberships.ban(&target).await
    }

    pub async fn unban_member(&self, participant_id: &str) -> Result<Membership, EngineError> {
        let target = self.moderation_target(participant_id).await?;
        self.memberships.unban(&target).await
    }

    async fn moderation_target(&self, participant_id: &str) -> Result<Membership, EngineError> {
        {
            let st = self.state.lock().await;
            if !can_moderate_room(&st.membership) {
                return Err(EngineError::Permission(
                    "room moderation requires a privileged role".into(),
                ));
            }
        }
        self.deps
            .store
            .find_membership(&self.room.id, participant_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "{participant_id} is not a member of {}",
                    self.room.id
                ))
            })
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Deactivate our membership and close the session.
    pub async fn leave(&self) -> Result<Membership, EngineError> {
        let membership = self.state.lock().await.membership.clone();
        let updated = self.memberships.leave(&membership).await?;
        self.close().await;
        Ok(updated)
    }

    /// Tear the session down: broadcast a typing stop if one is owed, drop
    /// local state, stop the pump. In-flight sends complete against the
    /// store but no longer touch the local view. Idempotent.
    pub async fn close(&self) {
        let stop = {
            let mut st = self.state.lock().await;
            if !st.open {
                None
            } else {
                st.open = false;
                st.typing.clear_remote();
                st.reconciler = Reconciler::new(self.participant.id.clone());
                st.typing.stop(self.deps.clock.now())
            }
        };
        if let Some(payload) = stop {
            if let Err(e) = self.deps.channel.track(&self.room.id, payload).await {
                warn!(error = %e, "typing stop broadcast failed during close");
            }
        }
        self.wake.notify_one();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

// ── Event pump ───────────────────────────────────────────────────────────────

/// The session's single background task: folds room events and presence
/// into the state, fires notifications, owes the channel the typing-stop
/// broadcast, and repairs the subscription when the stream drops.
async fn pump_events(
    deps: Arc<ChatDeps>,
    room: Room,
    participant: Participant,
    state: Arc<Mutex<SessionState>>,
    wake: Arc<Notify>,
    mut subscription: RoomSubscription,
) {
    let mut presence_open = true;
    loop {
        let sleep_for = {
            let st = state.lock().await;
            if !st.open {
                break;
            }
            match st.typing.stop_deadline() {
                Some(deadline) => (deadline - deps.clock.now())
                    .to_std()
                    .unwrap_or(StdDuration::ZERO),
                None => IDLE_TICK,
            }
        };

        tokio::select! {
            event = subscription.events.recv() => match event {
                Some(event) => handle_room_event(&deps, &room, &participant, &state, event).await,
                None => match repair_subscription(&deps, &room, &state).await {
                    Some(repaired) => {
                        subscription = repaired;
                        presence_open = true;
                    }
                    None => break,
                },
            },
            presence = subscription.presence.recv(), if presence_open => match presence {
                Some(event) => state.lock().await.typing.apply(event),
                None => presence_open = false,
            },
            _ = wake.notified() => {
                // Deadline changed; recompute on the next iteration.
            }
            _ = tokio::time::sleep(sleep_for) => {
                let payload = {
                    let mut st = state.lock().await;
                    st.typing.maybe_timeout(deps.clock.now())
                };
                if let Some(payload) = payload {
                    if let Err(e) = deps.channel.track(&room.id, payload).await {
                        warn!(error = %e, "typing stop broadcast failed");
                    }
                }
            }
        }
    }
}

async fn handle_room_event(
    deps: &Arc<ChatDeps>,
    room: &Room,
    participant: &Participant,
    state: &Arc<Mutex<SessionState>>,
    event: RoomEvent,
) {
    let outcome = {
        let mut st = state.lock().await;
        if !st.open {
            return;
        }
        st.reconciler.apply(event)
    };
    if let ReconcileOutcome::Appended(message) = outcome {
        // Appends from our own other sessions are merged silently.
        if message.sender_id == participant.id {
            return;
        }
        deps.notifier.message_received(&room.id, &message).await;
        let mentioned = message.mentions.iter().any(|m| {
            m.eq_ignore_ascii_case(&participant.display_name) || m == &participant.id
        });
        if mentioned {
            deps.notifier
                .mentioned(&room.id, &message, &participant.id)
                .await;
        }
    }
}

/// The event stream closed under an open session: resubscribe once and
/// merge a fresh page to cover anything missed in the gap.
async fn repair_subscription(
    deps: &Arc<ChatDeps>,
    room: &Room,
    state: &Arc<Mutex<SessionState>>,
) -> Option<RoomSubscription> {
    if !state.lock().await.open {
        return None;
    }
    warn!(room_id = room.id.as_str(), "event stream dropped, resubscribing");
    let subscription = match deps.channel.subscribe(&room.id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "resubscribe failed, session goes stale");
            return None;
        }
    };
    match deps.store.fetch_page(&room.id, None, PAGE_SIZE).await {
        Ok(page) => {
            let mut st = state.lock().await;
            if st.open {
                st.reconciler.merge_page(page);
            }
        }
        Err(e) => warn!(error = %e, "gap repair fetch failed"),
    }
    Some(subscription)
}

// ── Tests ────────────────────────────────────────────────────────────────────
