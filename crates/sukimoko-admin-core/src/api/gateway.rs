//! The single choke point for credentialed HTTP calls.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{decode_identity, SessionStore};
use crate::navigator::{Navigator, LOGIN_PATH};

use super::{ApiError, ApiRequest, ApiResponse, AuthFailure, GatewayError, HttpTransport};

/// Wraps every call that needs the bearer token.
///
/// Policy, in order:
/// 1. no token: redirect to login, nothing is sent
/// 2. caller-supplied `Authorization` is refused
/// 3. JSON content type by default, caller headers on top, bearer token last
/// 4. 401: token cleared, redirect to login, response dropped
/// 5. anything else comes back untouched, including 404 and 5xx
#[derive(Clone)]
pub struct Gateway {
    session: SessionStore,
    transport: Arc<dyn HttpTransport>,
    navigator: Option<Arc<dyn Navigator>>,
    base_url: String,
    proactive_expiry_check: bool,
}

impl Gateway {
    pub fn new(
        session: SessionStore,
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            session,
            transport,
            navigator: None,
            base_url: base_url.into(),
            proactive_expiry_check: false,
        }
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Refuse tokens whose `exp` claim has passed before sending them.
    /// Off by default: expiry is normally discovered from a 401.
    pub fn with_proactive_expiry_check(mut self, enabled: bool) -> Self {
        self.proactive_expiry_check = enabled;
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Only `http://` and `https://` URLs pass through as-is. Anything else,
    /// including scheme-relative `//host/x`, is a path under the base URL.
    pub fn resolve_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.trim_start_matches('/')
        )
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let Some(token) = self.session.get_token() else {
            debug!(url = %request.url, "No session token, request not sent");
            return Err(self.bounce(AuthFailure::NoCredential));
        };

        if self.proactive_expiry_check && token_has_expired(&token) {
            debug!(url = %request.url, "Session token past its expiry, request not sent");
            return Err(self.reject());
        }

        if request.headers.contains_key(header::AUTHORIZATION) {
            warn!(url = %request.url, "Refusing caller-supplied Authorization header");
            return Err(GatewayError::ForbiddenHeader);
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(request.headers);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(ApiError::from)?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);

        let url = self.resolve_url(&request.url);
        let response = self
            .transport
            .execute(ApiRequest {
                method: request.method,
                url: url.clone(),
                headers,
                body: request.body,
            })
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Credential rejected, clearing session");
            return Err(self.reject());
        }

        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::get(url)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::post(url).json(body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::put(url).json(body)?).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::patch(url).json(body)?).await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::delete(url)).await
    }

    /// Clear the stored credential and send the user back to login.
    fn reject(&self) -> GatewayError {
        // Two concurrent 401s both land here; clearing twice is harmless
        if let Err(e) = self.session.clear_token() {
            warn!(error = %e, "Failed to clear rejected session token");
        }
        if let Some(ref navigator) = self.navigator {
            navigator.notify_session_expired();
        }
        self.bounce(AuthFailure::CredentialRejected)
    }

    fn bounce(&self, failure: AuthFailure) -> GatewayError {
        if let Some(ref navigator) = self.navigator {
            navigator.redirect(LOGIN_PATH);
        }
        GatewayError::Auth(failure)
    }
}

fn token_has_expired(token: &str) -> bool {
    decode_identity(token)
        .map(|identity| identity.is_expired())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::auth::identity::make_token;
    use crate::navigator::RecordingNavigator;
    use reqwest::header::HeaderName;
    use reqwest::Method;

    const BASE_URL: &str = "http://localhost:3001";

    struct Harness {
        session: SessionStore,
        transport: Arc<ScriptedTransport>,
        navigator: Arc<RecordingNavigator>,
        gateway: Gateway,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        let session = SessionStore::in_memory();
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::new());
        let gateway = Gateway::new(session.clone(), transport.clone(), BASE_URL)
            .with_navigator(navigator.clone());
        Harness {
            session,
            transport,
            navigator,
            gateway,
        }
    }

    #[tokio::test]
    async fn test_no_token_sends_nothing_and_redirects() {
        let h = harness(ScriptedTransport::new());

        let result = h.gateway.get("/api/user/profile").await;

        assert!(matches!(result, Err(GatewayError::Auth(AuthFailure::NoCredential))));
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.navigator.redirects(), vec![LOGIN_PATH.to_string()]);
        assert_eq!(h.navigator.expired_notices(), 0);
    }

    #[tokio::test]
    async fn test_bearer_header_uses_current_token() {
        let h = harness(ScriptedTransport::new());
        h.session.set_token("tok-1").unwrap();
        h.gateway.get("/api/order").await.unwrap();

        h.session.set_token("tok-2").unwrap();
        h.gateway
            .post_json("/api/news", &serde_json::json!({ "title": "x" }))
            .await
            .unwrap();

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].headers[header::AUTHORIZATION], "Bearer tok-1");
        assert_eq!(sent[1].headers[header::AUTHORIZATION], "Bearer tok-2");
        assert_eq!(sent[1].method, Method::POST);
        assert_eq!(sent[1].body.as_ref().unwrap()["title"], "x");
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_default_and_caller_headers() {
        let h = harness(ScriptedTransport::new());
        h.session.set_token("tok").unwrap();

        h.gateway.get("/api/contact").await.unwrap();
        h.gateway
            .send(
                ApiRequest::post("/api/product/upload-image?id=3")
                    .header(header::CONTENT_TYPE, HeaderValue::from_static("multipart/form-data"))
                    .header(HeaderName::from_static("x-request-id"), HeaderValue::from_static("r1")),
            )
            .await
            .unwrap();

        let sent = h.transport.sent();
        assert_eq!(sent[0].headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(sent[1].headers[header::CONTENT_TYPE], "multipart/form-data");
        assert_eq!(sent[1].headers["x-request-id"], "r1");
        assert_eq!(sent[1].headers[header::AUTHORIZATION], "Bearer tok");
    }

    #[tokio::test]
    async fn test_caller_authorization_is_refused() {
        let h = harness(ScriptedTransport::new());
        h.session.set_token("tok").unwrap();

        let result = h
            .gateway
            .send(ApiRequest::get("/api/user").header(
                header::AUTHORIZATION,
                HeaderValue::from_static("Bearer forged"),
            ))
            .await;

        assert!(matches!(result, Err(GatewayError::ForbiddenHeader)));
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.session.get_token().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_redirects() {
        let h = harness(ScriptedTransport::new().respond(StatusCode::UNAUTHORIZED, r#"{"message":"jwt expired"}"#));
        h.session.set_token("stale").unwrap();

        let result = h.gateway.get("/api/user/profile").await;

        assert!(matches!(result, Err(GatewayError::Auth(AuthFailure::CredentialRejected))));
        assert_eq!(h.session.get_token(), None);
        assert_eq!(h.navigator.last_redirect().as_deref(), Some(LOGIN_PATH));
        assert_eq!(h.navigator.expired_notices(), 1);
        assert_eq!(h.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_other_error_statuses_pass_through() {
        let h = harness(
            ScriptedTransport::new()
                .respond(StatusCode::NOT_FOUND, r#"{"message":"order not found"}"#)
                .respond(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        );
        h.session.set_token("tok").unwrap();

        let missing = h.gateway.get("/api/order/99").await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.text(), r#"{"message":"order not found"}"#);

        let broken = h.gateway.delete("/api/user").await.unwrap();
        assert_eq!(broken.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(broken.body(), b"boom");

        assert_eq!(h.session.get_token().as_deref(), Some("tok"));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let h = harness(ScriptedTransport::new().fail("connection refused"));
        h.session.set_token("tok").unwrap();

        let result = h.gateway.get("/api/dashboard/product-count").await;

        assert!(matches!(result, Err(GatewayError::Api(ApiError::Connection(_)))));
        assert_eq!(h.session.get_token().as_deref(), Some("tok"));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_works_without_navigator() {
        let session = SessionStore::in_memory();
        let transport = Arc::new(ScriptedTransport::new().respond(StatusCode::UNAUTHORIZED, ""));
        let gateway = Gateway::new(session.clone(), transport, BASE_URL);

        assert_eq!(
            gateway.get("/api/order").await.unwrap_err().auth_failure(),
            Some(AuthFailure::NoCredential)
        );

        session.set_token("tok").unwrap();
        assert_eq!(
            gateway.get("/api/order").await.unwrap_err().auth_failure(),
            Some(AuthFailure::CredentialRejected)
        );
        assert_eq!(session.get_token(), None);
    }

    #[tokio::test]
    async fn test_concurrent_rejections_are_safe() {
        let h = harness(
            ScriptedTransport::new()
                .respond(StatusCode::UNAUTHORIZED, "")
                .respond(StatusCode::UNAUTHORIZED, ""),
        );
        h.session.set_token("tok").unwrap();

        let (a, b) = tokio::join!(h.gateway.get("/api/order"), h.gateway.get("/api/user"));

        assert_eq!(a.unwrap_err().auth_failure(), Some(AuthFailure::CredentialRejected));
        assert_eq!(b.unwrap_err().auth_failure(), Some(AuthFailure::CredentialRejected));
        assert_eq!(h.session.get_token(), None);
        assert_eq!(h.navigator.redirects(), vec![LOGIN_PATH, LOGIN_PATH]);
    }

    #[tokio::test]
    async fn test_proactive_expiry_check() {
        let expired = make_token(r#"{"email":"a@b.com","exp":1000}"#);

        // Off by default: the expired token is still sent
        let h = harness(ScriptedTransport::new());
        h.session.set_token(&expired).unwrap();
        h.gateway.get("/api/order").await.unwrap();
        assert_eq!(h.transport.sent().len(), 1);

        let h = harness(ScriptedTransport::new());
        let gateway = h.gateway.clone().with_proactive_expiry_check(true);
        h.session.set_token(&expired).unwrap();
        let result = gateway.get("/api/order").await;
        assert_eq!(result.unwrap_err().auth_failure(), Some(AuthFailure::CredentialRejected));
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.session.get_token(), None);

        // Opaque tokens cannot be checked and are sent as-is
        h.session.set_token("opaque").unwrap();
        gateway.get("/api/order").await.unwrap();
        assert_eq!(h.transport.sent().len(), 1);
    }

    #[test]
    fn test_resolve_url() {
        let h = harness(ScriptedTransport::new());
        assert_eq!(h.gateway.resolve_url("/api/order"), "http://localhost:3001/api/order");
        assert_eq!(h.gateway.resolve_url("api/order"), "http://localhost:3001/api/order");
        assert_eq!(
            h.gateway.resolve_url("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );

        assert_eq!(
            h.gateway.resolve_url("//evil.example.com/x"),
            "http://localhost:3001/evil.example.com/x"
        );
        assert_eq!(
            h.gateway.resolve_url("ftp://files/x"),
            "http://localhost:3001/ftp://files/x"
        );

        let trailing = Gateway::new(SessionStore::in_memory(), h.transport.clone(), "http://api/");
        assert_eq!(trailing.resolve_url("/api/news"), "http://api/api/news");
    }
}
