//! reqwest-backed `MessageStore` against the platform REST surface.
//! Thin wrappers: build request, send once, map the response. The only
//! retry at this layer is a single token refresh on 401.

use std::sync::Arc;

use async_trait::async_trait;
use drift_proto::api::{
    ErrorResponse, MembershipPatch, MembershipRowDto, MessagePatch, MessageRowDto,
    NewMembershipRequest, NewMessageRequest, NewParticipantRequest, ParticipantRowDto,
    ReactionRequest, RoomRowDto,
};
use drift_proto::{Membership, Message, PageCursor, Participant, Room};
use reqwest::{Method, Response, StatusCode};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::MessageStore;

/// Bearer-token source. The platform auth layer owns issuance and refresh;
/// the store client only asks for the current token and, on a 401, for a
/// refreshed one.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    async fn refresh(&self) -> Result<String, StoreError>;
}

/// Fixed token, no refresh — for tests and service-to-service use.
pub struct StaticTokenSource(pub String);

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }

    async fn refresh(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpMessageStore {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().use_rustls_tls().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            tokens,
        })
    }

    async fn authed_request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, StoreError> {
        let token = self.tokens.access_token().await.unwrap_or_default();

        let mut req = self.client.request(method.clone(), url).bearer_auth(&token);
        if let Some(ref b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(url, "access token rejected, refreshing once");
            let new_token = self.tokens.refresh().await?;
            let mut req = self.client.request(method, url).bearer_auth(&new_token);
            if let Some(b) = body {
                req = req.json(&b);
            }
            return Ok(req.send().await?);
        }

        Ok(resp)
    }

    /// Send and expect a JSON body of type `T` on success.
    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, StoreError> {
        let resp = self.authed_request(method, url, body).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json::<T>().await?)
    }

    /// Send and expect no body on success.
    async fn request_unit(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        let resp = self.authed_request(method, url, body).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }
}

/// Decode the platform error body and fold the status code into our
/// taxonomy.
async fn api_error(resp: Response) -> StoreError {
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let message = serde_json::from_value::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("request failed ({status})"));
    map_status(status, message)
}

fn map_status(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Denied(message),
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        _ => StoreError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn fetch_page(
        &self,
        room_id: &str,
        before: Option<&PageCursor>,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let mut url = format!("{}/rooms/{}/messages?limit={}", self.base_url, room_id, limit);
        if let Some(cursor) = before {
            url.push_str(&format!("&before={}", cursor.encode()));
        }
        let rows: Vec<MessageRowDto> = self.request_json(Method::GET, &url, None).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_message(&self, req: NewMessageRequest) -> Result<Message, StoreError> {
        let url = format!("{}/rooms/{}/messages", self.base_url, req.room_id);
        let row: MessageRowDto = self
            .request_json(Method::POST, &url, Some(serde_json::to_value(&req)?))
            .await?;
        Ok(row.into())
    }

    async fn soft_delete_message(&self, message_id: &str) -> Result<(), StoreError> {
        let url = format!("{}/messages/{}", self.base_url, message_id);
        self.request_unit(Method::DELETE, &url, None).await
    }

    async fn update_message(
        &self,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, StoreError> {
        let url = format!("{}/messages/{}", self.base_url, message_id);
        let row: MessageRowDto = self
            .request_json(Method::PATCH, &url, Some(serde_json::to_value(&patch)?))
            .await?;
        Ok(row.into())
    }

    async fn add_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError> {
        let url = format!("{}/messages/{}/reactions", self.base_url, message_id);
        let body = serde_json::to_value(ReactionRequest {
            participant_id: participant_id.into(),
            emoji: emoji.into(),
        })?;
        match self.request_unit(Method::POST, &url, Some(body)).await {
            // Reacting twice with the same emoji is a no-op, not an error.
            Err(e) if e.is_conflict() => Ok(()),
            other => other,
        }
    }

    async fn remove_reaction(
        &self,
        message_id: &str,
        participant_id: &str,
        emoji: &str,
    ) -> Result<(), StoreError> {
        let url = format!("{}/messages/{}/reactions", self.base_url, message_id);
        let body = serde_json::to_value(ReactionRequest {
            participant_id: participant_id.into(),
            emoji: emoji.into(),
        })?;
        self.request_unit(Method::DELETE, &url, Some(body)).await
    }

    async fn find_participant(
        &self,
        identity_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let url = format!("{}/participants?identity_id={}", self.base_url, identity_id);
        match self
            .request_json::<ParticipantRowDto>(Method::GET, &url, None)
            .await
        {
            Ok(row) => Ok(Some(row.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_participant(
        &self,
        req: NewParticipantRequest,
    ) -> Result<Participant, StoreError> {
        let url = format!("{}/participants", self.base_url);
        let row: ParticipantRowDto = self
            .request_json(Method::POST, &url, Some(serde_json::to_value(&req)?))
            .await?;
        Ok(row.into())
    }

    async fn find_membership(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let url = format!(
            "{}/rooms/{}/members/{}",
            self.base_url, room_id, participant_id
        );
        match self
            .request_json::<MembershipRowDto>(Method::GET, &url, None)
            .await
        {
            Ok(row) => Ok(Some(row.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert_membership(
        &self,
        req: NewMembershipRequest,
    ) -> Result<Membership, StoreError> {
        let url = format!("{}/rooms/{}/members", self.base_url, req.room_id);
        let row: MembershipRowDto = self
            .request_json(Method::POST, &url, Some(serde_json::to_value(&req)?))
            .await?;
        Ok(row.into())
    }

    async fn update_membership(
        &self,
        room_id: &str,
        participant_id: &str,
        patch: MembershipPatch,
    ) -> Result<Membership, StoreError> {
        let url = format!(
            "{}/rooms/{}/members/{}",
            self.base_url, room_id, participant_id
        );
        let row: MembershipRowDto = self
            .request_json(Method::PATCH, &url, Some(serde_json::to_value(&patch)?))
            .await?;
        Ok(row.into())
    }

    async fn fetch_room(&self, room_id: &str) -> Result<Room, StoreError> {
        let url = format!("{}/rooms/{}", self.base_url, room_id);
        let row: RoomRowDto = self.request_json(Method::GET, &url, None).await?;
        Ok(row.into())
    }

    async fn list_rooms(&self, participant_id: &str) -> Result<Vec<Room>, StoreError> {
        let url = format!("{}/participants/{}/rooms", self.base_url, participant_id);
        let rows: Vec<RoomRowDto> = self.request_json(Method::GET, &url, None).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_fold_into_the_error_taxonomy() {
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "no".into()),
            StoreError::Denied(_)
        ));
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "no".into()),
            StoreError::Denied(_)
        ));
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "gone".into()),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::CONFLICT, "dup".into()),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            StoreError::Api { status: 500, .. }
        ));
    }
}
