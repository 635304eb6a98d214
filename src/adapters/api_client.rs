//! HTTP client for the queue platform's REST API.
//!
//! The session is handed in explicitly; nothing here reads tokens from
//! ambient storage.

use crate::adapters::http::{build_client, check_status};
use crate::config::ClientConfig;
use crate::core::geo::{self, Ranked};
use crate::domain::model::{
    Coordinates, CreateOrderRequest, LoginRequest, MenuItem, Order, OrderStatus, PaymentRedirect,
    QueueEntry, QueuePosition, Rating, RegisterRequest, Session, TopUpRequest,
    UpdateOrderStatusRequest, UserProfile, Vendor, VendorAnalytics, WalletBalance,
    WalletTransaction,
};
use crate::utils::error::{Result, SqmError};
use crate::utils::validation;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Send the bearer token when a session is present.
    Optional,
    /// Fail with `NotAuthenticated` before sending when there is no session.
    Required,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Option<Session>) -> Result<Self> {
        Self::with_timeout(base_url, session, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, session: Option<Session>, timeout: Duration) -> Result<Self> {
        validation::validate_url("api.base_url", base_url)?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(config: &ClientConfig, session: Option<Session>) -> Result<Self> {
        Self::with_timeout(config.base_url(), session, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Same HTTP client, different session.
    pub fn with_session(&self, session: Option<Session>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session,
        }
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        validation::validate_non_empty_string("email", email)?;
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: Session = self
            .post_json(&["api", "auth", "login"], &request, Auth::Optional)
            .await?;
        tracing::info!("Logged in as {} ({:?})", session.user.email, session.user.role);
        Ok(session)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Session> {
        validation::validate_non_empty_string("email", &request.email)?;
        validation::validate_non_empty_string("full_name", &request.full_name)?;
        self.post_json(&["api", "auth", "register"], request, Auth::Optional)
            .await
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        self.get_json(&["api", "auth", "me"], Auth::Required).await
    }

    // --- Vendors & menus ---

    pub async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        self.get_json(&["api", "vendors"], Auth::Optional).await
    }

    pub async fn get_vendor(&self, vendor_id: &str) -> Result<Vendor> {
        self.get_json(&["api", "vendors", vendor_id], Auth::Optional)
            .await
    }

    /// Vendors within `radius_km` of `origin`, nearest first.
    pub async fn nearby_vendors(
        &self,
        origin: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Ranked<Vendor>>> {
        if !origin.is_valid() {
            return Err(SqmError::InvalidCoordinates {
                latitude: origin.latitude,
                longitude: origin.longitude,
            });
        }
        let vendors = self.list_vendors().await?;
        let total = vendors.len();
        let nearby = geo::within_radius(&origin, vendors, Vendor::location, radius_km);
        tracing::debug!(
            "{} of {} vendors within {}",
            nearby.len(),
            total,
            geo::format_distance(radius_km)
        );
        Ok(nearby)
    }

    pub async fn vendor_menu(&self, vendor_id: &str) -> Result<Vec<MenuItem>> {
        self.get_json(&["api", "vendors", vendor_id, "menu"], Auth::Optional)
            .await
    }

    pub async fn upload_vendor_image(
        &self,
        vendor_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vendor> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let builder = self
            .request(
                self.client
                    .post(self.url(&["api", "vendors", vendor_id, "image"])?),
                Auth::Required,
            )?
            .multipart(form);
        Self::read_json(builder).await
    }

    // --- Queue ---

    pub async fn vendor_queue(&self, vendor_id: &str) -> Result<Vec<QueueEntry>> {
        self.get_json(&["api", "vendors", vendor_id, "queue"], Auth::Required)
            .await
    }

    pub async fn queue_position(&self, order_id: &str) -> Result<QueuePosition> {
        self.get_json(
            &["api", "orders", order_id, "queue-position"],
            Auth::Required,
        )
        .await
    }

    // --- Orders ---

    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        if request.items.is_empty() {
            return Err(SqmError::validation("An order needs at least one item"));
        }
        if request.items.iter().any(|item| item.quantity == 0) {
            return Err(SqmError::validation("Item quantities must be at least 1"));
        }
        self.post_json(&["api", "orders"], request, Auth::Required).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.get_json(&["api", "orders", order_id], Auth::Required)
            .await
    }

    pub async fn my_orders(&self) -> Result<Vec<Order>> {
        self.get_json(&["api", "orders", "my"], Auth::Required).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.post_unit(
            &["api", "orders", order_id, "cancel"],
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<Order> {
        if status == OrderStatus::Unknown {
            return Err(SqmError::validation("Cannot set an order to an unknown status"));
        }
        let builder = self
            .request(
                self.client
                    .put(self.url(&["api", "orders", order_id, "status"])?),
                Auth::Required,
            )?
            .json(&UpdateOrderStatusRequest { status });
        Self::read_json(builder).await
    }

    // --- Wallet ---

    pub async fn wallet_balance(&self) -> Result<WalletBalance> {
        self.get_json(&["api", "wallet"], Auth::Required).await
    }

    pub async fn wallet_transactions(&self) -> Result<Vec<WalletTransaction>> {
        self.get_json(&["api", "wallet", "transactions"], Auth::Required)
            .await
    }

    /// Starts a top-up; the caller sends the user to the returned payment URL.
    pub async fn top_up(&self, amount: f64, return_url: &str) -> Result<PaymentRedirect> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(SqmError::validation("Top-up amount must be positive"));
        }
        validation::validate_url("return_url", return_url)?;
        self.post_json(
            &["api", "wallet", "topup"],
            &TopUpRequest {
                amount,
                return_url: return_url.to_string(),
            },
            Auth::Required,
        )
        .await
    }

    // --- Ratings & analytics ---

    pub async fn rate_order(&self, order_id: &str, stars: u8, comment: Option<&str>) -> Result<()> {
        if !(1..=5).contains(&stars) {
            return Err(SqmError::validation("Rating must be between 1 and 5 stars"));
        }
        let rating = Rating {
            order_id: order_id.to_string(),
            stars,
            comment: comment.map(str::to_string),
        };
        self.post_unit(&["api", "ratings"], &rating).await
    }

    pub async fn vendor_analytics(&self, vendor_id: &str) -> Result<VendorAnalytics> {
        self.get_json(
            &["api", "vendors", vendor_id, "analytics"],
            Auth::Required,
        )
        .await
    }

    // --- Admin ---

    pub async fn pending_vendors(&self) -> Result<Vec<Vendor>> {
        self.get_json(&["api", "admin", "vendors", "pending"], Auth::Required)
            .await
    }

    pub async fn moderate_vendor(&self, vendor_id: &str, approve: bool) -> Result<()> {
        let action = if approve { "approve" } else { "reject" };
        self.post_unit(
            &["api", "admin", "vendors", vendor_id, action],
            &serde_json::json!({}),
        )
        .await
    }

    // --- Internal helpers ---

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SqmError::InvalidConfigValue {
            field: "api.base_url".to_string(),
            value: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| SqmError::config("API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, builder: RequestBuilder, auth: Auth) -> Result<RequestBuilder> {
        match (&self.session, auth) {
            (Some(session), _) => Ok(builder.header(AUTHORIZATION, session.bearer())),
            (None, Auth::Optional) => Ok(builder),
            (None, Auth::Required) => Err(SqmError::NotAuthenticated),
        }
    }

    async fn read_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = check_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str], auth: Auth) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!("GET {}", url);
        let builder = self.request(self.client.get(url), auth)?;
        Self::read_json(builder).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
        auth: Auth,
    ) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);
        let builder = self
            .request(self.client.post(url), auth)?
            .json(body);
        Self::read_json(builder).await
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &[&str], body: &B) -> Result<()> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);
        let builder = self
            .request(self.client.post(url), Auth::Required)?
            .json(body);
        check_status(builder.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ApiClient::new("https://api.example.com/", None).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_client_rejects_invalid_base_url() {
        assert!(ApiClient::new("api.example.com", None).is_err());
    }

    #[test]
    fn test_path_segments_are_percent_encoded() {
        let client = ApiClient::new("https://api.example.com/", None).unwrap();
        assert_eq!(
            client.url(&["api", "orders", "o-1/cancel?x=1", "status"]).unwrap().as_str(),
            "https://api.example.com/api/orders/o-1%2Fcancel%3Fx=1/status"
        );

        let prefixed = ApiClient::new("https://example.com/queue", None).unwrap();
        assert_eq!(
            prefixed.url(&["api", "vendors"]).unwrap().as_str(),
            "https://example.com/queue/api/vendors"
        );
    }

    #[tokio::test]
    async fn test_authenticated_calls_fail_fast_without_session() {
        let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(
            client.my_orders().await,
            Err(SqmError::NotAuthenticated)
        ));
        assert!(matches!(
            client.wallet_balance().await,
            Err(SqmError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_client_side_validation() {
        let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(
            client.rate_order("o-1", 6, None).await,
            Err(SqmError::Validation { .. })
        ));
        assert!(matches!(
            client.top_up(-5.0, "https://app.example.com/wallet").await,
            Err(SqmError::Validation { .. })
        ));
        let origin = Coordinates {
            latitude: 95.0,
            longitude: 0.0,
        };
        assert!(matches!(
            client.nearby_vendors(origin, 1.0).await,
            Err(SqmError::InvalidCoordinates { .. })
        ));
    }
}
