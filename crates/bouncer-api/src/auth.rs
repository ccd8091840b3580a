//! Credential login and refresh-token exchange.

use crate::error::{ApiError, ApiResult, Endpoint};
use crate::types::{Credentials, Envelope, LoginPayload};
use bouncer_session::{SessionStore, TokenPair};
use tracing::{debug, error, info};

/// Client for the authentication endpoints.
///
/// Updates the injected [`SessionStore`] on every outcome: a successful
/// login or refresh stores the new token pair, and any failure clears the
/// store entirely so no partial session survives.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

/// Result of a successful login, as surfaced to the presentation layer.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user_id: String,
    pub access_token: String,
}

impl AuthClient {
    /// Create a new auth client against `base_url`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Exchange credentials for a token pair.
    ///
    /// On success the pair and user id are stored in the session. On any
    /// failure the session is cleared and a classified error is returned.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<LoginSession> {
        let url = self.endpoint("auth/credentials");
        debug!(%url, "Logging in");

        let response = match self.http.post(&url).json(credentials).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.session.clear();
                error!(error = %e, "Login request failed");
                return Err(ApiError::from_transport(e));
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            self.session.clear();
            error!(status, "Login rejected");
            return Err(ApiError::from_status(Endpoint::Login, status, body));
        }

        let envelope: Envelope<LoginPayload> = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                self.session.clear();
                return Err(ApiError::from_transport(e));
            }
        };

        let payload = envelope.payload;
        self.session.set_session(
            TokenPair {
                access_token: payload.access_token.clone(),
                refresh_token: payload.refresh_token,
            },
            payload.user_id.clone(),
        );
        info!(user_id = %payload.user_id, "Login successful");

        Ok(LoginSession {
            user_id: payload.user_id,
            access_token: payload.access_token,
        })
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// The refresh token is presented as the bearer credential. On success
    /// the new pair replaces the stored one; on failure the session is
    /// cleared and `RefreshFailed` (or a transport error) is returned.
    pub async fn refresh(&self) -> ApiResult<TokenPair> {
        let Some(tokens) = self.session.current() else {
            return Err(ApiError::Unauthenticated);
        };

        let url = self.endpoint("auth/refresh");
        debug!(%url, "Refreshing tokens");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&tokens.refresh_token)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.session.clear();
                error!(error = %e, "Refresh request failed");
                return Err(ApiError::from_transport(e));
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            self.session.clear();
            error!(status, "Refresh rejected");
            return Err(ApiError::from_status(Endpoint::Refresh, status, body));
        }

        let envelope: Envelope<TokenPair> = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                self.session.clear();
                return Err(ApiError::from_transport(e));
            }
        };

        let pair = envelope.payload;
        self.session.set(pair.clone());
        debug!("Tokens refreshed");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn login_ok_body() -> serde_json::Value {
        json!({
            "statusCode": 200,
            "message": "ok",
            "payload": {
                "userId": "user-1",
                "accessToken": "access-1",
                "refreshToken": "refresh-1"
            }
        })
    }

    async fn client_against(server: &MockServer) -> (AuthClient, SessionStore) {
        let session = SessionStore::new();
        let client = AuthClient::new(reqwest::Client::new(), server.uri(), session.clone());
        (client, session)
    }

    #[tokio::test]
    async fn login_success_populates_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .and(body_json(json!({
                "email": "user@example.com",
                "password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_ok_body()))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        let outcome = client.login(&credentials()).await.unwrap();

        assert_eq!(outcome.user_id, "user-1");
        assert_eq!(outcome.access_token, "access-1");

        let stored = session.current().unwrap();
        assert_eq!(stored.access_token, "access-1");
        assert_eq!(stored.refresh_token, "refresh-1");
        assert_eq!(session.user_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn login_401_is_invalid_credentials_and_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        session.set_session(
            TokenPair {
                access_token: "stale".to_string(),
                refresh_token: "stale".to_string(),
            },
            "user-old",
        );

        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn login_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn login_423_is_account_locked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(ResponseTemplate::new(423))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::AccountLocked));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn login_5xx_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        let err = client.login(&credentials()).await.unwrap_err();
        match err {
            ApiError::ServerError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn login_timeout_classifies_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(login_ok_body())
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let session = SessionStore::new();
        let client = AuthClient::new(http, server.uri(), session.clone());

        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn login_unreachable_server_is_network_unavailable() {
        // Nothing listens on this port.
        let session = SessionStore::new();
        let client = AuthClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            session.clone(),
        );

        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkUnavailable));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_presents_refresh_token_as_bearer_and_rotates_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(bearer_token("refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 200,
                "message": "ok",
                "payload": { "accessToken": "access-2", "refreshToken": "refresh-2" }
            })))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        session.set_session(
            TokenPair {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
            },
            "user-1",
        );

        let pair = client.refresh().await.unwrap();
        assert_eq!(pair.access_token, "access-2");

        let stored = session.current().unwrap();
        assert_eq!(stored.refresh_token, "refresh-2");
        // User identity survives token rotation.
        assert_eq!(session.user_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn refresh_401_is_refresh_failed_and_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        session.set_session(
            TokenPair {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
            },
            "user-1",
        );

        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn refresh_without_session_is_unauthenticated() {
        let server = MockServer::start().await;
        let (client, _session) = client_against(&server).await;

        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn login_with_undecodable_body_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let (client, session) = client_against(&server).await;
        let err = client.login(&credentials()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(!session.is_authenticated());
    }
}
