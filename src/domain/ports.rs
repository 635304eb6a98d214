use crate::domain::model::{Coordinates, Session};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Persists the authenticated session between runs.
///
/// Writes are last-writer-wins; two processes saving different sessions
/// overwrite each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Source of the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    pub connection_id: String,
    #[serde(default)]
    pub connection_token: Option<String>,
}

impl NegotiateResponse {
    /// Token used in the `id` query parameter; older servers only return the id.
    pub fn token(&self) -> &str {
        self.connection_token
            .as_deref()
            .unwrap_or(&self.connection_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Raw frames, possibly empty when the poll timed out idle.
    Messages(String),
    /// The server ended the connection.
    Closed,
}

/// Wire transport underneath a hub connection.
#[async_trait]
pub trait HubTransport: Send + Sync {
    async fn negotiate(&self) -> Result<NegotiateResponse>;
    async fn send(&self, token: &str, payload: &str) -> Result<()>;
    async fn poll(&self, token: &str) -> Result<PollOutcome>;
    async fn close(&self, token: &str) -> Result<()>;
}
