use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use smart_queue_client::domain::model::{UserProfile, UserRole};
use smart_queue_client::domain::ports::{HubTransport, PollOutcome};
use smart_queue_client::{LongPollingTransport, Session, SqmError};
use std::time::Duration;

fn vendor_session() -> Session {
    Session {
        access_token: "hub-token".to_string(),
        refresh_token: None,
        user: UserProfile {
            id: "v-owner".to_string(),
            email: "owner@example.com".to_string(),
            full_name: "Owner".to_string(),
            role: UserRole::Vendor,
        },
    }
}

#[tokio::test]
async fn test_negotiate_sends_version_and_bearer() -> Result<()> {
    let server = MockServer::start();
    let negotiate_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/hubs/orders/negotiate")
            .query_param("negotiateVersion", "1")
            .header("Authorization", "Bearer hub-token");
        then.status(200).json_body(json!({
            "negotiateVersion": 1,
            "connectionId": "conn-1",
            "connectionToken": "tok-1",
            "availableTransports": [{"transport": "LongPolling", "transferFormats": ["Text"]}]
        }));
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), Some(vendor_session()))?;
    let negotiated = transport.negotiate().await?;

    negotiate_mock.assert();
    assert_eq!(negotiated.connection_id, "conn-1");
    assert_eq!(negotiated.token(), "tok-1");
    Ok(())
}

#[tokio::test]
async fn test_negotiate_without_token_falls_back_to_id() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/hubs/orders/negotiate");
        then.status(200).json_body(json!({"connectionId": "legacy-id"}));
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), None)?;
    assert_eq!(transport.negotiate().await?.token(), "legacy-id");
    Ok(())
}

#[tokio::test]
async fn test_send_posts_framed_payload() -> Result<()> {
    let server = MockServer::start();
    let send_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/hubs/orders")
            .query_param("id", "tok-1")
            .body("{\"protocol\":\"json\",\"version\":1}\u{1e}");
        then.status(200);
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), None)?;
    transport
        .send("tok-1", "{\"protocol\":\"json\",\"version\":1}\u{1e}")
        .await?;

    send_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_poll_returns_messages_and_detects_close() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/hubs/orders").query_param("id", "open");
        then.status(200).body("{\"type\":6}\u{1e}");
    });
    server.mock(|when, then| {
        when.method(GET).path("/hubs/orders").query_param("id", "gone");
        then.status(204);
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), None)?
        .with_poll_timeout(Duration::from_secs(5));

    assert_eq!(
        transport.poll("open").await?,
        PollOutcome::Messages("{\"type\":6}\u{1e}".to_string())
    );
    assert_eq!(transport.poll("gone").await?, PollOutcome::Closed);
    Ok(())
}

#[tokio::test]
async fn test_poll_failure_is_an_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/hubs/orders");
        then.status(404).body("No Connection with that ID");
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), None)?;
    match transport.poll("stale").await {
        Err(SqmError::Api { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected result {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_close_tolerates_missing_connection() -> Result<()> {
    let server = MockServer::start();
    let delete_mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/hubs/orders")
            .query_param("id", "tok-1");
        then.status(404);
    });

    let transport = LongPollingTransport::new(server.url("/hubs/orders"), None)?;
    transport.close("tok-1").await?;

    delete_mock.assert();
    Ok(())
}

#[test]
fn test_transports_from_config_target_each_hub() -> Result<()> {
    let config = smart_queue_client::ClientConfig::from_toml_str(
        "[api]\nbase_url = \"https://queue.example.org/\"\n\n[hub]\nchat_path = \"/realtime/chat\"\n",
    )?;

    let orders = LongPollingTransport::for_orders_hub(&config, None)?;
    let chat = LongPollingTransport::for_chat_hub(&config, Some(vendor_session()))?;
    assert_eq!(orders.hub_url(), "https://queue.example.org/hubs/orders");
    assert_eq!(chat.hub_url(), "https://queue.example.org/realtime/chat");
    Ok(())
}
