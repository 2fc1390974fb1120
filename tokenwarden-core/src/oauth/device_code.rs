//! Device Authorization Grant flow (RFC 8628).
//!
//! # Flow Overview
//!
//! 1. Request device and user codes from the authorization server
//! 2. Display the user code and verification URL to the user
//! 3. User visits the URL on another device and enters the code
//! 4. Poll the token endpoint until the user authorizes or denies
//! 5. Receive tokens once authorization is complete

use oauth2::reqwest::async_http_client;
use oauth2::{Scope, StandardDeviceAuthorizationResponse};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::{AadClient, GrantedTokens, map_request_error};
use crate::model::ClientId;
use crate::token::TokenError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra wait added on a `slow_down` answer.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Device authorization response.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    /// The device verification code (keep this secret).
    pub device_code: String,

    /// The user verification code to display to the user.
    pub user_code: String,

    /// The URI where the user should go to authorize.
    pub verification_uri: String,

    /// Minimum interval between polling requests.
    pub interval: Duration,

    /// Time until the device code expires.
    pub expires_in: Duration,
}

impl From<StandardDeviceAuthorizationResponse> for DeviceAuthorization {
    fn from(response: StandardDeviceAuthorizationResponse) -> Self {
        Self {
            device_code: response.device_code().secret().to_string(),
            user_code: response.user_code().secret().to_string(),
            verification_uri: response.verification_uri().to_string(),
            interval: response.interval(),
            expires_in: response.expires_in(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Request device and user codes from the authorization server.
pub async fn request_device_code(
    client: &AadClient,
    scopes: &[String],
) -> Result<DeviceAuthorization, TokenError> {
    let request = client.exchange_device_code().map_err(|e| TokenError::OAuthError {
        message: format!("failed to create device code request: {}", e),
    })?;

    let response: StandardDeviceAuthorizationResponse = request
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .request_async(async_http_client)
        .await
        .map_err(map_request_error)?;

    Ok(response.into())
}

/// Poll the token endpoint until the user authorizes or the code expires.
///
/// # Errors
///
/// Returns an error if:
/// - The user denies the request ([`TokenError::Declined`])
/// - The device code expires ([`TokenError::TimedOut`])
/// - The authorization server returns any other error
pub async fn poll_for_token(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &ClientId,
    device_auth: &DeviceAuthorization,
) -> Result<GrantedTokens, TokenError> {
    let client_id = client_id.to_string();
    let mut interval = device_auth.interval;
    let deadline = Instant::now() + device_auth.expires_in;

    loop {
        if Instant::now() > deadline {
            return Err(TokenError::TimedOut {
                what: "device code authorization".to_string(),
            });
        }

        sleep(interval).await;

        let response = http
            .post(token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("device_code", device_auth.device_code.as_str()),
                ("grant_type", DEVICE_CODE_GRANT),
            ])
            .send()
            .await
            .map_err(|e| TokenError::NetworkError {
                message: format!("network error during polling: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TokenError::NetworkError {
            message: format!("failed to read token response: {}", e),
        })?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| TokenError::InvalidResponse {
                message: format!("failed to parse token response: {}", e),
            });
        }

        let error: ErrorBody =
            serde_json::from_str(&body).map_err(|_| TokenError::InvalidResponse {
                message: format!("unexpected error response ({}): {}", status, body),
            })?;

        match error.error.as_str() {
            "authorization_pending" => {
                tracing::debug!("Authorization pending, continuing to poll");
            }
            "slow_down" => {
                interval += SLOW_DOWN_STEP;
                tracing::warn!(interval_secs = interval.as_secs(), "Polling too fast, slowing down");
            }
            "authorization_declined" | "access_denied" => return Err(TokenError::Declined),
            "expired_token" | "code_expired" => {
                return Err(TokenError::TimedOut {
                    what: "device code authorization".to_string(),
                });
            }
            other => {
                return Err(TokenError::OAuthError {
                    message: match error.error_description {
                        Some(description) => format!("{}: {}", other, description),
                        None => other.to_string(),
                    },
                });
            }
        }
    }
}

/// Run the device code flow end to end.
pub async fn authorize(
    client: &AadClient,
    http: &reqwest::Client,
    token_url: &str,
    client_id: &ClientId,
    scopes: &[String],
) -> Result<GrantedTokens, TokenError> {
    let device_auth = request_device_code(client, scopes).await?;

    eprintln!(
        "To sign in, open {} and enter the code {}",
        device_auth.verification_uri, device_auth.user_code
    );

    poll_for_token(http, token_url, client_id, &device_auth).await
}
