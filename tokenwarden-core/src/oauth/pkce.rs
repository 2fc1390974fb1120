//! Authorization Code flow with PKCE (Proof Key for Code Exchange).
//!
//! # Flow Overview
//!
//! 1. Bind a loopback listener and use `http://localhost:{port}` as redirect URI
//! 2. Generate PKCE code verifier and challenge
//! 3. Build authorization URL with state and PKCE challenge, open it in the browser
//! 4. Receive the authorization code on the loopback listener
//! 5. Exchange the code for tokens using the PKCE verifier

use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope};
use tokio::net::TcpListener;

use super::{AadClient, GrantedTokens, loopback, map_request_error};
use crate::backend::InteractiveOptions;
use crate::token::TokenError;

/// Authorization request ready to be shown to the user.
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub redirect_uri: String,
    verifier: oauth2::PkceCodeVerifier,
    client: AadClient,
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &self.url)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Build an authorization URL redirecting to `port` on localhost.
pub fn build_authorization_request(
    client: &AadClient,
    scopes: &[String],
    port: u16,
) -> Result<AuthorizationRequest, TokenError> {
    let redirect_uri = format!("http://localhost:{}", port);
    let redirect_url = RedirectUrl::new(redirect_uri.clone()).map_err(|e| TokenError::OAuthError {
        message: format!("invalid redirect URL: {}", e),
    })?;
    let client = client.clone().set_redirect_uri(redirect_url);

    let (pkce_challenge, verifier) = PkceCodeChallenge::new_random_sha256();

    let (url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok(AuthorizationRequest {
        url: url.to_string(),
        state: csrf_state.secret().to_string(),
        redirect_uri,
        verifier,
        client,
    })
}

impl AuthorizationRequest {
    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        self,
        code: impl Into<String>,
        scopes: &[String],
    ) -> Result<GrantedTokens, TokenError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.into()))
            .set_pkce_verifier(self.verifier)
            .add_extra_param("scope", scopes.join(" "))
            .request_async(async_http_client)
            .await
            .map_err(map_request_error)?;

        Ok(response.into())
    }
}

/// Run the browser flow end to end.
pub async fn authorize(
    client: &AadClient,
    scopes: &[String],
    options: &InteractiveOptions,
) -> Result<GrantedTokens, TokenError> {
    let listener = TcpListener::bind(("127.0.0.1", options.redirect_port))
        .await
        .map_err(|e| TokenError::OAuthError {
            message: format!("failed to bind loopback port {}: {}", options.redirect_port, e),
        })?;
    let port = listener
        .local_addr()
        .map_err(|e| TokenError::OAuthError {
            message: format!("failed to read loopback address: {}", e),
        })?
        .port();

    let request = build_authorization_request(client, scopes, port)?;
    tracing::info!(redirect_uri = %request.redirect_uri, "Listening for authorization redirect");

    present(&request.url, options.open_browser);

    let code = loopback::wait_for_code(&listener, &request.state, options.timeout).await?;
    request.exchange_code(code, scopes).await
}

fn present(url: &str, open_browser: bool) {
    if open_browser {
        match webbrowser::open(url) {
            Ok(()) => {
                eprintln!("Opened a browser window to sign in.");
                return;
            }
            Err(e) => tracing::warn!("Could not open browser automatically: {}", e),
        }
    }
    eprintln!("To sign in, open this URL in a browser:\n{}", url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClientId;
    use crate::oauth::create_oauth_client;
    use crate::provider::AuthorityEndpoints;
    use uuid::Uuid;

    fn client() -> AadClient {
        let endpoints = AuthorityEndpoints::from_authority(
            "https://login.microsoftonline.com/d144e8ad-92a5-49c7-9e33-02e965f9679e",
        );
        let client_id =
            ClientId::new(Uuid::parse_str("62d51730-37d6-430c-b3c5-d2bcaaf4bdb1").unwrap());
        create_oauth_client(&endpoints, &client_id, None).unwrap()
    }

    #[test]
    fn test_build_authorization_url() {
        let scopes = vec![
            "https://greenfield.example.com/.default".to_string(),
            "openid".to_string(),
        ];
        let request = build_authorization_request(&client(), &scopes, 8400).unwrap();

        assert!(request.url.starts_with(
            "https://login.microsoftonline.com/d144e8ad-92a5-49c7-9e33-02e965f9679e/oauth2/v2.0/authorize"
        ));
        assert!(request.url.contains("client_id=62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"));
        assert!(request.url.contains("code_challenge_method=S256"));
        assert!(request.url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8400"));
        assert!(request.url.contains("openid"));
        assert_eq!(request.redirect_uri, "http://localhost:8400");
        assert!(!request.state.is_empty());
    }

    #[test]
    fn test_states_are_unique() {
        let a = build_authorization_request(&client(), &[], 1).unwrap();
        let b = build_authorization_request(&client(), &[], 1).unwrap();
        assert_ne!(a.state, b.state);
    }
}
