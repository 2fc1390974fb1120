//! Client credentials grant with a client secret.

use chrono::Utc;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthType, Scope};

use super::{GrantedTokens, create_oauth_client, map_request_error};
use crate::model::CredentialClient;
use crate::provider::AuthorityEndpoints;
use crate::store::Secret;
use crate::token::{CredentialToken, TokenError};

/// Request an application token.
///
/// The secret is sent in the request body, not as HTTP basic auth.
pub async fn acquire(
    client: &CredentialClient,
    secret: &Secret,
) -> Result<CredentialToken, TokenError> {
    let endpoints = AuthorityEndpoints {
        authorize_url: client.token_url.clone(),
        token_url: client.token_url.clone(),
        device_code_url: client.token_url.clone(),
    };
    let oauth = create_oauth_client(&endpoints, &client.client_id, Some(secret))?
        .set_auth_type(AuthType::RequestBody);

    tracing::debug!(client_id = %client.client_id, "Requesting client credentials token");

    let response = oauth
        .exchange_client_credentials()
        .add_scopes(client.scopes.iter().cloned().map(Scope::new))
        .request_async(async_http_client)
        .await
        .map_err(map_request_error)?;

    let granted: GrantedTokens = response.into();

    let expires_at = match granted.expires_in {
        Some(duration) => Some(
            Utc::now()
                + chrono::Duration::from_std(duration).map_err(|e| {
                    TokenError::InvalidResponse {
                        message: format!("invalid expiration duration: {}", e),
                    }
                })?,
        ),
        None => None,
    };

    Ok(CredentialToken {
        access_token: Secret::new(granted.access_token),
        token_type: granted.token_type,
        expires_at,
        scopes: granted.scopes.unwrap_or_else(|| client.scopes.clone()),
    })
}
