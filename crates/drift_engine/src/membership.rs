//! Join/leave, roles, and moderation flags over the store contract.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use drift_proto::api::{MembershipPatch, NewMembershipRequest};
use drift_proto::{Membership, Role};
use drift_store::MessageStore;
use tracing::debug;

use crate::error::EngineError;

pub struct MembershipManager {
    store: Arc<dyn MessageStore>,
}

impl MembershipManager {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Idempotent join: an existing active membership is returned
    /// unchanged; an inactive one is re-activated (never re-inserted, so
    /// the one-active-membership-per-pair invariant holds); otherwise a
    /// member-role membership is created. A concurrent join surfacing as a
    /// conflict resolves by re-fetching.
    pub async fn ensure_membership(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<Membership, EngineError> {
        if let Some(existing) = self.store.find_membership(room_id, participant_id).await? {
            if existing.is_active {
                return Ok(existing);
            }
            let patch = MembershipPatch {
                is_active: Some(true),
                ..MembershipPatch::default()
            };
            return Ok(self
                .store
                .update_membership(room_id, participant_id, patch)
                .await?);
        }

        let request = NewMembershipRequest {
            room_id: room_id.to_owned(),
            participant_id: participant_id.to_owned(),
            role: Role::Member,
        };
        match self.store.insert_membership(request).await {
            Ok(created) => Ok(created),
            Err(e) if e.is_conflict() => {
                debug!(room_id, participant_id, "membership insert conflict, re-fetching");
                self.store
                    .find_membership(room_id, participant_id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::NotFound(format!(
                            "membership for {participant_id} in {room_id} missing after conflict"
                        ))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Leave the room. A leader or owner must transfer leadership first —
    /// this is a hard precondition, not a crash. Leaving deactivates the
    /// membership; the row survives for audit.
    pub async fn leave(&self, membership: &Membership) -> Result<Membership, EngineError> {
        if matches!(membership.role, Role::Leader | Role::Owner) {
            return Err(EngineError::Validation(
                "transfer leadership before leaving the room".into(),
            ));
        }
        Ok(self
            .store
            .update_membership(
                &membership.room_id,
                &membership.participant_id,
                MembershipPatch::deactivate(),
            )
            .await?)
    }

    pub async fn set_role(
        &self,
        membership: &Membership,
        role: Role,
    ) -> Result<Membership, EngineError> {
        self.patch(membership, MembershipPatch::role(role)).await
    }

    /// Mute until `until`, or indefinitely when `until` is `None`.
    pub async fn mute(
        &self,
        membership: &Membership,
        until: Option<DateTime<Utc>>,
    ) -> Result<Membership, EngineError> {
        self.patch(membership, MembershipPatch::mute_until(until)).await
    }

    pub async fn unmute(&self, membership: &Membership) -> Result<Membership, EngineError> {
        self.patch(membership, MembershipPatch::unmute()).await
    }

    pub async fn ban(&self, membership: &Membership) -> Result<Membership, EngineError> {
        self.patch(membership, MembershipPatch::banned(true)).await
    }

    pub async fn unban(&self, membership: &Membership) -> Result<Membership, EngineError> {
        self.patch(membership, MembershipPatch::banned(false)).await
    }

    async fn patch(
        &self,
        membership: &Membership,
        patch: MembershipPatch,
    ) -> Result<Membership, EngineError> {
        Ok(self
            .store
            .update_membership(&membership.room_id, &membership.participant_id, patch)
            .await?)
    }
}

/// Send-path gate, checked locally before any durable write: a banned or
/// currently-muted participant is rejected without a round trip the store
/// would deny anyway.
pub fn check_can_send(membership: &Membership, now: DateTime<Utc>) -> Result<(), EngineError> {
    if !membership.is_active {
        return Err(EngineError::Validation("not a member of this room".into()));
    }
    if membership.is_banned {
        return Err(EngineError::Validation("banned from this room".into()));
    }
    if membership.is_muted_at(now) {
        return Err(EngineError::Validation("muted in this room".into()));
    }
    Ok(())
}
