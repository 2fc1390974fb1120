//! Loopback listener receiving the authorization redirect.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::token::TokenError;

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><body><h1>Authentication successful!</h1>\
     <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<!DOCTYPE html><html><body><h1>Authentication failed</h1>\
     <p>Return to the terminal for details.</p></body></html>";

/// Query parameters of an authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// The user authorized; `code` is to be redeemed.
    Code { code: String, state: Option<String> },

    /// The authorization server reported an error.
    Error {
        error: String,
        description: Option<String>,
    },
}

/// Parse the request line of an HTTP request into a [`Callback`].
///
/// Returns `None` for requests that are not a redirect, like `/favicon.ico`.
pub fn parse_callback(request: &str) -> Option<Callback> {
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Callback::Error { error, description });
    }

    code.map(|code| Callback::Code { code, state })
}

/// Wait for the redirect and return the authorization code.
///
/// Requests without a code or error are answered with 400 and ignored.
pub async fn wait_for_code(
    listener: &TcpListener,
    expected_state: &str,
    timeout: Option<Duration>,
) -> Result<String, TokenError> {
    let accept = accept_code(listener, expected_state);

    match timeout {
        Some(limit) => tokio::time::timeout(limit, accept).await.map_err(|_| {
            TokenError::TimedOut {
                what: format!("the browser redirect after {}s", limit.as_secs()),
            }
        })?,
        None => accept.await,
    }
}

async fn accept_code(listener: &TcpListener, expected_state: &str) -> Result<String, TokenError> {
    loop {
        let (mut stream, _) = listener.accept().await.map_err(|e| TokenError::OAuthError {
            message: format!("failed to accept connection: {}", e),
        })?;

        let mut buf = vec![0u8; 8192];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| TokenError::OAuthError {
                message: format!("failed to read request: {}", e),
            })?;
        let request = String::from_utf8_lossy(&buf[..n]);

        match parse_callback(&request) {
            Some(Callback::Code { code, state }) => {
                if state.as_deref() != Some(expected_state) {
                    respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                    return Err(TokenError::OAuthError {
                        message: "state parameter mismatch".to_string(),
                    });
                }

                respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                return Ok(code);
            }
            Some(Callback::Error { error, description }) => {
                respond(&mut stream, "200 OK", FAILURE_PAGE).await;

                if error == "access_denied" {
                    return Err(TokenError::Declined);
                }
                return Err(TokenError::OAuthError {
                    message: match description {
                        Some(description) => format!("{}: {}", error, description),
                        None => error,
                    },
                });
            }
            None => {
                tracing::debug!("Ignoring request without authorization response");
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
            }
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer loopback request: {}", e);
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_code_and_state() {
        let request = "GET /?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\n";
        assert_eq!(
            parse_callback(request),
            Some(Callback::Code {
                code: "abc123".to_string(),
                state: Some("xyz".to_string()),
            })
        );
    }

    #[test]
    fn parse_code_urlencoded() {
        let request = "GET /?code=abc%20123&state=s HTTP/1.1\r\n";
        match parse_callback(request) {
            Some(Callback::Code { code, .. }) => assert_eq!(code, "abc 123"),
            other => panic!("unexpected callback: {:?}", other),
        }
    }

    #[test]
    fn parse_error_param() {
        let request =
            "GET /?error=access_denied&error_description=user+said+no&state=xyz HTTP/1.1\r\n";
        assert_eq!(
            parse_callback(request),
            Some(Callback::Error {
                error: "access_denied".to_string(),
                description: Some("user said no".to_string()),
            })
        );
    }

    #[test]
    fn parse_unrelated_request() {
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1\r\n"), None);
        assert_eq!(parse_callback("GET /?code=&state=xyz HTTP/1.1\r\n"), None);
        assert_eq!(parse_callback(""), None);
    }

    #[tokio::test]
    async fn wait_for_code_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let browser = tokio::spawn(async move {
            let mut favicon = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            favicon
                .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut sink = Vec::new();
            favicon.read_to_end(&mut sink).await.unwrap();

            let mut redirect = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            redirect
                .write_all(b"GET /?code=c0de&state=expected HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut page = String::new();
            redirect.read_to_string(&mut page).await.unwrap();
            page
        });

        let code = wait_for_code(&listener, "expected", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(code, "c0de");

        let page = browser.await.unwrap();
        assert!(page.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn wait_for_code_rejects_wrong_state() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut redirect = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            redirect
                .write_all(b"GET /?code=c0de&state=forged HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
        });

        let err = wait_for_code(&listener, "expected", Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("state parameter mismatch"));
    }

    #[tokio::test]
    async fn wait_for_code_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let err = wait_for_code(&listener, "expected", Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::TimedOut { .. }));
    }
}
