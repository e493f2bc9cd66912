//! HTTP proxy implementation using `reqwest`.
//!
//! This module provides [`HttpProxy`], a [`PlayerProxy`] implementation
//! that speaks the backend proxy's REST shape. Credentials travel as
//! session cookies, so the client is built with a cookie store; no token
//! is ever held by this crate.
//!
//! # Feature gate
//!
//! This module is only available when the `proxy-http` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), spotify_session_client::SessionError> {
//! use spotify_session_client::{HttpProxy, PlayerProxy};
//!
//! let proxy = HttpProxy::new("http://localhost:4000/api")?;
//! if let Some(snapshot) = proxy.player_snapshot().await? {
//!     println!("playing: {}", snapshot.is_playing);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::error::SessionError;
use crate::model::{CallbackRequest, CommandAck, LoginUrlResponse, PlayerSnapshot, TransportCommand};
use crate::proxy::PlayerProxy;

/// Default timeout applied to every proxy request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of body bytes echoed into a `Status` error message.
const ERROR_BODY_LIMIT: usize = 256;

/// A [`PlayerProxy`] implementation backed by the backend's REST endpoints.
///
/// | Proxy method      | Request                          |
/// |-------------------|----------------------------------|
/// | `login_url`       | `GET  <base>/spotify/login`      |
/// | `player_snapshot` | `GET  <base>/spotify/player`     |
/// | `transport`       | `PUT  <base>/spotify/play\|pause`, `POST <base>/spotify/next\|prev` |
/// | `exchange_code`   | `POST <base>/spotify/callback`   |
///
/// # Construction
///
/// Use [`HttpProxy::new`] with the API base URL:
///
/// ```rust,no_run
/// # fn example() -> Result<(), spotify_session_client::SessionError> {
/// use spotify_session_client::HttpProxy;
///
/// let proxy = HttpProxy::new("http://localhost:4000/api")?;
/// # Ok(())
/// # }
/// ```
///
/// For custom TLS, proxies, or headers, build the [`Client`] yourself and
/// use [`HttpProxy::from_client`]. The client must have a cookie store if
/// the backend identifies users by session cookie.
#[derive(Debug, Clone)]
pub struct HttpProxy {
    client: Client,
    base: Url,
}

impl HttpProxy {
    /// Create a proxy for the given API base URL.
    ///
    /// The base path is normalized to end with `/` so endpoint paths join
    /// under it rather than replacing its last segment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Request`] if the URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, SessionError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Self::from_client(client, base_url)
    }

    /// Create a proxy from an already-configured [`Client`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Request`] if the URL does not parse.
    pub fn from_client(client: Client, base_url: &str) -> Result<Self, SessionError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| SessionError::Request(format!("invalid base URL: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        self.base
            .join(path)
            .map_err(|e| SessionError::Request(format!("invalid endpoint path: {e}")))
    }
}

#[async_trait]
impl PlayerProxy for HttpProxy {
    async fn login_url(&self) -> Result<String, SessionError> {
        let url = self.endpoint("spotify/login")?;
        let response = self.client.get(url).send().await.map_err(request_error)?;
        let response = check_status(response).await?;
        let body = response.text().await.map_err(request_error)?;
        let login: LoginUrlResponse = serde_json::from_str(&body)?;
        Ok(login.url)
    }

    async fn player_snapshot(&self) -> Result<Option<PlayerSnapshot>, SessionError> {
        let url = self.endpoint("spotify/player")?;
        let response = self.client.get(url).send().await.map_err(request_error)?;

        // No active device: the proxy answers 204 or an empty body. That
        // is "connected but idle", not a snapshot and not an error.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let body = response.text().await.map_err(request_error)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let snapshot: PlayerSnapshot = serde_json::from_str(&body)?;
        Ok(Some(snapshot))
    }

    async fn transport(&self, command: TransportCommand) -> Result<(), SessionError> {
        let url = self.endpoint(&format!("spotify/{command}"))?;
        match command {
            TransportCommand::Play | TransportCommand::Pause => {
                let response = self.client.put(url).send().await.map_err(request_error)?;
                let response = check_status(response).await?;
                parse_ack(response).await
            }
            TransportCommand::Next | TransportCommand::Previous => {
                // Skips are fire-and-forget by contract: the response body
                // is ignored, only transport-level failures surface.
                let response = self.client.post(url).send().await.map_err(request_error)?;
                check_status(response).await?;
                Ok(())
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<(), SessionError> {
        let url = self.endpoint("spotify/callback")?;
        let response = self
            .client
            .post(url)
            .json(&CallbackRequest { code: code.into() })
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;
        parse_ack(response).await
    }
}

/// Map a [`reqwest::Error`] into the crate error, keeping the error type
/// transport-agnostic.
fn request_error(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Timeout
    } else {
        SessionError::Request(e.to_string())
    }
}

/// Reject non-success statuses, echoing a truncated body for diagnosis.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut message = response.text().await.unwrap_or_default();
    // `String::truncate` panics unless the cut lands on a char boundary,
    // so back the limit off to the nearest one.
    let mut end = ERROR_BODY_LIMIT.min(message.len());
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    Err(SessionError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Parse a `{ "success": bool }` acknowledgment body.
///
/// A bare 2xx without a body counts as acknowledged.
async fn parse_ack(response: reqwest::Response) -> Result<(), SessionError> {
    let body = response.text().await.map_err(request_error)?;
    if body.trim().is_empty() {
        return Ok(());
    }
    let ack: CommandAck = serde_json::from_str(&body)?;
    if ack.success {
        Ok(())
    } else {
        Err(SessionError::CommandRejected(
            ack.message
                .unwrap_or_else(|| "command was not executed".into()),
        ))
    }
}

#[cfg(test)]
#[cfg(feature = "proxy-http")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn http_proxy_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpProxy>();
    }

    #[test]
    fn http_proxy_is_debug() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<HttpProxy>();
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpProxy::new("not a url");
        assert!(matches!(result, Err(SessionError::Request(_))));
    }

    #[test]
    fn base_path_gains_trailing_slash() {
        let proxy = HttpProxy::new("http://localhost:4000/api").unwrap();
        let url = proxy.endpoint("spotify/login").unwrap();
        // Without normalization `join` would replace the `/api` segment.
        assert_eq!(url.as_str(), "http://localhost:4000/api/spotify/login");
    }

    #[test]
    fn base_path_with_trailing_slash_is_untouched() {
        let proxy = HttpProxy::new("http://localhost:4000/api/").unwrap();
        let url = proxy.endpoint("spotify/player").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/api/spotify/player");
    }

    // ── Mock-server helpers ─────────────────────────────────────────

    /// Serve each canned HTTP response on a fresh accepted connection and
    /// return the base URL to point the proxy at.
    async fn start_mock_server(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                // Drain the request head before answering.
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        format!("http://{addr}/api")
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn no_content_response() -> String {
        "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string()
    }

    // ── Mock-server tests ───────────────────────────────────────────

    #[tokio::test]
    async fn login_url_returns_vendor_url() {
        let base = start_mock_server(vec![http_response(
            "200 OK",
            r#"{"url":"https://accounts.example.com/authorize?client_id=abc"}"#,
        )])
        .await;

        let proxy = HttpProxy::new(&base).unwrap();
        let url = proxy.login_url().await.unwrap();
        assert_eq!(url, "https://accounts.example.com/authorize?client_id=abc");
    }

    #[tokio::test]
    async fn player_snapshot_parses_playing_body() {
        let body = r#"{
            "is_playing": true,
            "item": {
                "id": "123",
                "name": "Test Song",
                "artists": [{"name": "Test Artist"}],
                "album": {"name": "Test Album", "images": [{"url": "http://x/art.jpg"}]},
                "duration_ms": 200000
            },
            "progress_ms": 1000
        }"#;
        let base = start_mock_server(vec![http_response("200 OK", body)]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        let snapshot = proxy.player_snapshot().await.unwrap().unwrap();

        assert!(snapshot.is_playing);
        assert!(!snapshot.is_disconnected());
        assert_eq!(snapshot.progress_ms, Some(1_000));
        assert_eq!(snapshot.item.unwrap().name, "Test Song");
    }

    #[tokio::test]
    async fn player_snapshot_maps_no_content_to_idle() {
        let base = start_mock_server(vec![no_content_response()]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        let snapshot = proxy.player_snapshot().await.unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn player_snapshot_maps_empty_body_to_idle() {
        let base = start_mock_server(vec![http_response("200 OK", "")]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        let snapshot = proxy.player_snapshot().await.unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn player_snapshot_surfaces_disconnected_body() {
        let base =
            start_mock_server(vec![http_response("200 OK", r#"{"connected":false}"#)]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        let snapshot = proxy.player_snapshot().await.unwrap().unwrap();
        assert!(snapshot.is_disconnected());
    }

    #[tokio::test]
    async fn rejected_play_maps_to_command_rejected() {
        let base = start_mock_server(vec![http_response(
            "200 OK",
            r#"{"success":false,"message":"No active device"}"#,
        )])
        .await;

        let proxy = HttpProxy::new(&base).unwrap();
        let err = proxy.transport(TransportCommand::Play).await.unwrap_err();

        match err {
            SessionError::CommandRejected(message) => assert_eq!(message, "No active device"),
            other => panic!("expected CommandRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acknowledged_pause_succeeds() {
        let base = start_mock_server(vec![http_response("200 OK", r#"{"success":true}"#)]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        proxy.transport(TransportCommand::Pause).await.unwrap();
    }

    #[tokio::test]
    async fn skip_ignores_response_body() {
        let base = start_mock_server(vec![http_response("200 OK", "whatever")]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        proxy.transport(TransportCommand::Next).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let base = start_mock_server(vec![http_response(
            "503 Service Unavailable",
            "spotify upstream down",
        )])
        .await;

        let proxy = HttpProxy::new(&base).unwrap();
        let err = proxy.player_snapshot().await.unwrap_err();

        match err {
            SessionError::Status { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "spotify upstream down");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_error_clips_multibyte_body_on_char_boundary() {
        // 1 + 150 two-byte chars = 301 bytes; the raw limit falls inside
        // a code point, so a naive byte cut would panic.
        let body = format!("a{}", "é".repeat(150));
        let base = start_mock_server(vec![http_response("503 Service Unavailable", &body)]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        let err = proxy.player_snapshot().await.unwrap_err();

        match err {
            SessionError::Status { status, message } => {
                assert_eq!(status, 503);
                assert!(message.len() <= ERROR_BODY_LIMIT);
                assert_eq!(message, format!("a{}", "é".repeat(127)));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_code_accepts_ack() {
        let base = start_mock_server(vec![http_response("200 OK", r#"{"success":true}"#)]).await;

        let proxy = HttpProxy::new(&base).unwrap();
        proxy.exchange_code("auth-code-123").await.unwrap();
    }

    #[tokio::test]
    async fn exchange_code_surfaces_rejection() {
        let base = start_mock_server(vec![http_response(
            "200 OK",
            r#"{"success":false,"message":"invalid code"}"#,
        )])
        .await;

        let proxy = HttpProxy::new(&base).unwrap();
        let err = proxy.exchange_code("expired").await.unwrap_err();
        assert!(matches!(err, SessionError::CommandRejected(_)));
    }

    #[tokio::test]
    async fn request_timeout_maps_to_timeout() {
        // Non-routable address per RFC 5737; the connect attempt hangs
        // until the client timeout fires.
        let client = Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let proxy = HttpProxy::from_client(client, "http://192.0.2.1:1/api").unwrap();

        let err = proxy.player_snapshot().await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout));
    }
}
