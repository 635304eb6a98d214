use crate::adapters::http::{build_client, check_status};
use crate::config::ClientConfig;
use crate::domain::model::Session;
use crate::domain::ports::{HubTransport, NegotiateResponse, PollOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

/// Long-polling transport for a hub endpoint such as `/hubs/orders`.
pub struct LongPollingTransport {
    client: Client,
    hub_url: String,
    session: Option<Session>,
    poll_timeout: Duration,
}

impl LongPollingTransport {
    pub fn new(hub_url: impl Into<String>, session: Option<Session>) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            hub_url: hub_url.into().trim_end_matches('/').to_string(),
            session,
            poll_timeout: Duration::from_secs(110),
        })
    }

    pub fn for_orders_hub(config: &ClientConfig, session: Option<Session>) -> Result<Self> {
        Self::for_hub(config, config.orders_hub_url(), session)
    }

    pub fn for_chat_hub(config: &ClientConfig, session: Option<Session>) -> Result<Self> {
        Self::for_hub(config, config.chat_hub_url(), session)
    }

    fn for_hub(config: &ClientConfig, hub_url: String, session: Option<Session>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.request_timeout())?,
            hub_url,
            session,
            poll_timeout: config.poll_timeout(),
        })
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(session) => builder.header(AUTHORIZATION, session.bearer()),
            None => builder,
        }
    }
}

#[async_trait]
impl HubTransport for LongPollingTransport {
    async fn negotiate(&self) -> Result<NegotiateResponse> {
        let url = format!("{}/negotiate", self.hub_url);
        tracing::debug!("Negotiating hub connection at {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .query(&[("negotiateVersion", "1")])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn send(&self, token: &str, payload: &str) -> Result<()> {
        let response = self
            .authorize(self.client.post(&self.hub_url))
            .query(&[("id", token)])
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(payload.to_string())
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn poll(&self, token: &str) -> Result<PollOutcome> {
        let response = self
            .authorize(self.client.get(&self.hub_url))
            .query(&[("id", token)])
            .timeout(self.poll_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(PollOutcome::Closed);
        }

        let body = check_status(response).await?.text().await?;
        Ok(PollOutcome::Messages(body))
    }

    async fn close(&self, token: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(&self.hub_url))
            .query(&[("id", token)])
            .send()
            .await?;

        // Already gone on the server side.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}
