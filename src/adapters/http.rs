use crate::utils::error::{Result, SqmError};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "Message", alias = "title")]
    message: Option<String>,
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("smart-queue-client/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Passes successful responses through and turns the rest into [`SqmError`].
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SqmError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        });

    tracing::debug!("Request failed with {}: {}", status, message);
    Err(SqmError::Api {
        status: status.as_u16(),
        message,
    })
}
