use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use smart_queue_client::domain::model::{
    CreateOrderRequest, OrderItem, OrderStatus, UserProfile, UserRole,
};
use smart_queue_client::{ApiClient, Coordinates, Session, SqmError};

fn customer_session() -> Session {
    Session {
        access_token: "token-abc".to_string(),
        refresh_token: None,
        user: UserProfile {
            id: "c-1".to_string(),
            email: "minh@example.com".to_string(),
            full_name: "Minh".to_string(),
            role: UserRole::Customer,
        },
    }
}

fn order_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "vendorId": "v-1",
        "customerId": "c-1",
        "status": status,
        "items": [{"menuItemId": "m-1", "quantity": 2}],
        "totalAmount": 60000.0,
        "queuePosition": 4,
        "estimatedMinutes": 12,
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

#[tokio::test]
async fn test_login_returns_session() -> Result<()> {
    let server = MockServer::start();
    let login_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/login")
            .json_body(json!({"email": "minh@example.com", "password": "secret"}));
        then.status(200).json_body(json!({
            "accessToken": "token-abc",
            "refreshToken": "refresh-xyz",
            "user": {
                "id": "c-1",
                "email": "minh@example.com",
                "fullName": "Minh",
                "role": "Customer"
            }
        }));
    });

    let client = ApiClient::new(&server.base_url(), None)?;
    let session = client.login("minh@example.com", "secret").await?;

    login_mock.assert();
    assert_eq!(session.access_token, "token-abc");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-xyz"));
    assert_eq!(session.user.role, UserRole::Customer);
    Ok(())
}

#[tokio::test]
async fn test_bearer_token_is_attached() -> Result<()> {
    let server = MockServer::start();
    let orders_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/orders/my")
            .header("Authorization", "Bearer token-abc");
        then.status(200)
            .json_body(json!([order_json("o-1", "Pending"), order_json("o-2", "Ready")]));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let orders = client.my_orders().await?;

    orders_mock.assert();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].status, OrderStatus::Ready);
    assert_eq!(orders[0].estimated_minutes, Some(12));
    Ok(())
}

#[tokio::test]
async fn test_unauthorized_maps_to_dedicated_error() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/wallet");
        then.status(401);
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let err = client.wallet_balance().await.unwrap_err();
    assert!(matches!(err, SqmError::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn test_api_error_message_is_extracted() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/orders");
        then.status(409)
            .json_body(json!({"message": "Vendor is not accepting orders"}));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let request = CreateOrderRequest {
        vendor_id: "v-1".to_string(),
        items: vec![OrderItem {
            menu_item_id: "m-1".to_string(),
            quantity: 1,
            name: None,
            unit_price: None,
            note: None,
        }],
        note: None,
        pay_with_wallet: true,
    };

    match client.create_order(&request).await {
        Err(SqmError::Api { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "Vendor is not accepting orders");
        }
        other => panic!("unexpected result {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/vendors/v-404");
        then.status(404).body("Vendor not found");
    });

    let client = ApiClient::new(&server.base_url(), None)?;
    let err = client.get_vendor("v-404").await.unwrap_err();
    assert_eq!(err.user_friendly_message(), "Vendor not found");
    Ok(())
}

#[tokio::test]
async fn test_nearby_vendors_ranks_client_side() -> Result<()> {
    let server = MockServer::start();
    let vendors_mock = server.mock(|when, then| {
        when.method(GET).path("/api/vendors");
        then.status(200).json_body(json!([
            {"id": "v-far", "name": "Far Pho", "latitude": 21.1285, "longitude": 105.8542, "isOpen": true},
            {"id": "v-near", "name": "Near Banh Mi", "latitude": 21.0295, "longitude": 105.8542, "isOpen": true},
            {"id": "v-mid", "name": "Mid Bun Cha", "latitude": 21.0385, "longitude": 105.8542, "isOpen": false},
            {"id": "v-bad", "name": "Broken", "latitude": 123.0, "longitude": 0.0}
        ]));
    });

    let client = ApiClient::new(&server.base_url(), None)?;
    let origin = Coordinates::new(21.0285, 105.8542)?;
    let nearby = client.nearby_vendors(origin, 2.0).await?;

    vendors_mock.assert();
    let ids: Vec<&str> = nearby.iter().map(|r| r.item.id.as_str()).collect();
    assert_eq!(ids, vec!["v-near", "v-mid"]);
    assert_eq!(nearby[0].formatted_distance(), "111 m");
    assert_eq!(nearby[1].formatted_distance(), "1.1 km");
    assert_eq!(nearby[1].eta_minutes, 13);
    Ok(())
}

#[tokio::test]
async fn test_update_order_status() -> Result<()> {
    let server = MockServer::start();
    let status_mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/orders/o-5/status")
            .json_body(json!({"status": "Preparing"}));
        then.status(200).json_body(order_json("o-5", "Preparing"));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let order = client
        .update_order_status("o-5", OrderStatus::Preparing)
        .await?;

    status_mock.assert();
    assert_eq!(order.status, OrderStatus::Preparing);
    Ok(())
}

#[tokio::test]
async fn test_cancel_and_rate_order() -> Result<()> {
    let server = MockServer::start();
    let cancel_mock = server.mock(|when, then| {
        when.method(POST).path("/api/orders/o-1/cancel");
        then.status(204);
    });
    let rating_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/ratings")
            .json_body(json!({"orderId": "o-1", "stars": 4, "comment": "Fast"}));
        then.status(201);
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    client.cancel_order("o-1").await?;
    client.rate_order("o-1", 4, Some("Fast")).await?;

    cancel_mock.assert();
    rating_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_wallet_top_up_returns_redirect() -> Result<()> {
    let server = MockServer::start();
    let topup_mock = server.mock(|when, then| {
        when.method(POST).path("/api/wallet/topup").json_body(json!({
            "amount": 100000.0,
            "returnUrl": "https://app.example.com/wallet"
        }));
        then.status(200).json_body(json!({
            "paymentUrl": "https://pay.example.com/checkout/123",
            "transactionId": "t-123"
        }));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let redirect = client
        .top_up(100000.0, "https://app.example.com/wallet")
        .await?;

    topup_mock.assert();
    assert_eq!(redirect.payment_url, "https://pay.example.com/checkout/123");
    assert_eq!(redirect.transaction_id.as_deref(), Some("t-123"));
    Ok(())
}

#[tokio::test]
async fn test_wallet_transactions() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/wallet/transactions");
        then.status(200).json_body(json!([
            {"id": "t-1", "kind": "TopUp", "amount": 50000.0, "createdAt": "2024-05-01T09:00:00Z"},
            {"id": "t-2", "kind": "Payment", "amount": -30000.0, "orderId": "o-1", "createdAt": "2024-05-01T10:00:00Z"},
            {"id": "t-3", "kind": "Cashback", "amount": 1000.0, "createdAt": "2024-05-01T11:00:00Z"}
        ]));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let transactions = client.wallet_transactions().await?;

    use smart_queue_client::domain::model::TransactionKind;
    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[1].order_id.as_deref(), Some("o-1"));
    assert_eq!(transactions[2].kind, TransactionKind::Other);
    Ok(())
}

#[tokio::test]
async fn test_vendor_image_upload_is_multipart() -> Result<()> {
    let server = MockServer::start();
    let upload_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/vendors/v-1/image")
            .header("Authorization", "Bearer token-abc")
            .body_contains("name=\"file\"")
            .body_contains("stall.png");
        then.status(200).json_body(json!({
            "id": "v-1",
            "name": "Stall",
            "latitude": 21.0,
            "longitude": 105.0,
            "imageUrl": "https://cdn.example.com/stall.png"
        }));
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    let vendor = client
        .upload_vendor_image("v-1", "stall.png", b"not really a png".to_vec())
        .await?;

    upload_mock.assert();
    assert_eq!(
        vendor.image_url.as_deref(),
        Some("https://cdn.example.com/stall.png")
    );
    Ok(())
}

#[tokio::test]
async fn test_admin_moderation() -> Result<()> {
    let server = MockServer::start();
    let approve_mock = server.mock(|when, then| {
        when.method(POST).path("/api/admin/vendors/v-9/approve");
        then.status(200);
    });
    let reject_mock = server.mock(|when, then| {
        when.method(POST).path("/api/admin/vendors/v-10/reject");
        then.status(200);
    });

    let client = ApiClient::new(&server.base_url(), Some(customer_session()))?;
    client.moderate_vendor("v-9", true).await?;
    client.moderate_vendor("v-10", false).await?;

    approve_mock.assert();
    reject_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_with_session_swaps_credentials() -> Result<()> {
    let server = MockServer::start();
    let me_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/auth/me")
            .header("Authorization", "Bearer token-abc");
        then.status(200).json_body(json!({
            "id": "c-1",
            "email": "minh@example.com",
            "fullName": "Minh",
            "role": "Customer"
        }));
    });

    let anonymous = ApiClient::new(&server.base_url(), None)?;
    assert!(matches!(
        anonymous.current_user().await,
        Err(SqmError::NotAuthenticated)
    ));

    let client = anonymous.with_session(Some(customer_session()));
    let user = client.current_user().await?;

    me_mock.assert_hits(1);
    assert_eq!(user.full_name, "Minh");
    Ok(())
}
