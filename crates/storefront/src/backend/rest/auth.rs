//! GoTrue auth API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;

use trendmart_core::Email;

use super::{RestClient, truncate_body};
use crate::models::{AuthSession, AuthUser, UserMetadata};
use crate::services::auth::{AuthError, AuthEvent, AuthEventKind, AuthProvider};

/// An [`AuthProvider`] backed by the hosted GoTrue API.
#[derive(Clone)]
pub struct RestAuth {
    client: RestClient,
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)))
            .unwrap_or(now);

        AuthSession {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up returns a session when email confirmation is off, or just the
/// user when it is on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Box<TokenResponse>),
    User(AuthUser),
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RestAuth {
    pub(super) const fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = map_auth_error(status, &body);
            tracing::debug!(status = %status, error = %err, "Auth API request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate_body(&body, 500),
                "Failed to parse auth API response"
            );
            AuthError::Decode(e)
        })
    }

    async fn grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let mut url = self.client.auth_url().join("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let request = self.client.request(Method::POST, url).await.json(&body);
        let token: TokenResponse = self.call(request).await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        self.grant(
            "refresh_token",
            json!({ "refresh_token": session.refresh_token.expose_secret() }),
        )
        .await
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.client.session().await else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        match self.refresh(&session).await {
            Ok(fresh) => {
                self.client.set_session(Some(fresh.clone())).await;
                self.client.emit(AuthEventKind::TokenRefreshed, true);
                tracing::debug!("Refreshed access token");
                Ok(Some(fresh))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; dropping session");
                self.client.set_session(None).await;
                self.client.emit(AuthEventKind::SignedOut, false);
                Err(e)
            }
        }
    }

    async fn get_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let url = self.client.auth_url().join("user")?;
        let request = self.client.request_with_token(
            Method::GET,
            url,
            session.access_token.expose_secret(),
        );
        match self.call::<AuthUser>(request).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::Provider { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let session = self
            .grant(
                "password",
                json!({ "email": email.as_str(), "password": password }),
            )
            .await?;
        let user = session.user.clone();

        self.client.set_session(Some(session)).await;
        self.client.emit(AuthEventKind::SignedIn, true);
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthUser, AuthError> {
        let url = self.client.auth_url().join("signup")?;
        let request = self.client.request(Method::POST, url).await.json(&json!({
            "email": email.as_str(),
            "password": password,
            "data": metadata,
        }));

        match self.call::<SignUpResponse>(request).await? {
            SignUpResponse::Session(token) => {
                let session = (*token).into_session(Utc::now());
                let user = session.user.clone();
                self.client.set_session(Some(session)).await;
                self.client.emit(AuthEventKind::SignedIn, true);
                Ok(user)
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "Sign up pending email confirmation");
                Ok(user)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.client.session().await else {
            return Ok(());
        };

        let url = self.client.auth_url().join("logout")?;
        let request = self.client.request_with_token(
            Method::POST,
            url,
            session.access_token.expose_secret(),
        );
        let remote = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(map_auth_error(status, &body))
            }
            Err(e) => Err(AuthError::Http(e)),
        };

        self.client.set_session(None).await;
        self.client.emit(AuthEventKind::SignedOut, false);
        remote
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.client.subscribe()
    }
}

/// Map a failed auth API response to an [`AuthError`].
///
/// The provider's message is preserved verbatim so it can be shown to the
/// user.
pub(crate) fn map_auth_error(status: StatusCode, body: &str) -> AuthError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                truncate_body(body, 200)
            }
        });

    match parsed.error_code.as_deref() {
        Some("invalid_credentials") => return AuthError::InvalidCredentials,
        Some("user_already_exists" | "email_exists") => return AuthError::UserAlreadyExists,
        Some("weak_password") => return AuthError::WeakPassword(message),
        Some("session_not_found") => return AuthError::NoSession,
        _ => {}
    }

    match message.as_str() {
        "Invalid login credentials" => AuthError::InvalidCredentials,
        "User already registered" => AuthError::UserAlreadyExists,
        m if m.starts_with("Password should") => AuthError::WeakPassword(message),
        _ => AuthError::Provider {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_messages_map_to_variants() {
        let err = map_auth_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = map_auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let err = map_auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"msg":"Password should be at least 6 characters."}"#,
        );
        assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    }

    #[test]
    fn test_unknown_messages_pass_through() {
        let err = map_auth_error(
            StatusCode::BAD_REQUEST,
            r#"{"error_code":"email_not_confirmed","msg":"Email not confirmed"}"#,
        );
        match err {
            AuthError::Provider { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Email not confirmed");
            }
            other => panic!("expected provider error, got {other:?}"),
        }

        let err = map_auth_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "503 Service Unavailable");
    }

    #[test]
    fn test_token_response_into_session() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": "u1", "email": "a@x.com" }
        }))
        .unwrap();

        let now = Utc::now();
        let session = token.into_session(now);
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
        assert_eq!(session.access_token.expose_secret(), "at");
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let with_session: SignUpResponse = serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_at": 1_900_000_000,
            "user": { "id": "u1" }
        }))
        .unwrap();
        assert!(matches!(with_session, SignUpResponse::Session(_)));

        let pending: SignUpResponse =
            serde_json::from_value(json!({ "id": "u2", "email": "b@x.com" })).unwrap();
        assert!(matches!(pending, SignUpResponse::User(_)));
    }
}
