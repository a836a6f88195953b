//! HTTP collaborators for a Supabase-compatible backend.
//!
//! [`RestClient`] holds the connection settings and the current auth
//! session. [`RestStore`] speaks the PostgREST data API and [`RestAuth`] the
//! GoTrue auth API; both share one client so data requests carry the signed-in
//! user's token.

mod auth;
mod store;

pub use auth::RestAuth;
pub use store::RestStore;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{RwLock, broadcast};
use url::Url;

use crate::models::AuthSession;
use crate::services::auth::{AUTH_EVENT_CAPACITY, AuthEvent, AuthEventKind};

/// Shared HTTP client and session for the data and auth APIs.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    http: reqwest::Client,
    rest_url: Url,
    auth_url: Url,
    anon_key: SecretString,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestClient {
    /// Create a client for the project at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API paths cannot be joined onto `api_url`.
    pub fn new(api_url: &Url, anon_key: SecretString) -> Result<Self, url::ParseError> {
        let mut base = api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(RestClientInner {
                http: reqwest::Client::new(),
                rest_url: base.join("rest/v1/")?,
                auth_url: base.join("auth/v1/")?,
                anon_key,
                session: RwLock::new(None),
                events,
            }),
        })
    }

    /// Data API client sharing this connection.
    #[must_use]
    pub fn store(&self) -> RestStore {
        RestStore::new(self.clone())
    }

    /// Auth API client sharing this connection.
    #[must_use]
    pub fn auth(&self) -> RestAuth {
        RestAuth::new(self.clone())
    }

    fn rest_url(&self) -> &Url {
        &self.inner.rest_url
    }

    fn auth_url(&self) -> &Url {
        &self.inner.auth_url
    }

    /// Start a request carrying the project key and the best available
    /// bearer token (the user's access token, else the anon key).
    async fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let token = match self.inner.session.read().await.as_ref() {
            Some(session) => session.access_token.expose_secret().to_owned(),
            None => self.inner.anon_key.expose_secret().to_owned(),
        };
        self.request_with_token(method, url, &token)
    }

    fn request_with_token(
        &self,
        method: reqwest::Method,
        url: Url,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let builder = self
            .inner
            .http
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret());

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => builder.header(AUTHORIZATION, value),
            Err(_) => {
                tracing::warn!("Access token is not a valid header value; sending without it");
                builder
            }
        }
    }

    async fn session(&self) -> Option<AuthSession> {
        self.inner.session.read().await.clone()
    }

    async fn set_session(&self, session: Option<AuthSession>) {
        *self.inner.session.write().await = session;
    }

    fn emit(&self, kind: AuthEventKind, session_present: bool) {
        // No receivers is fine.
        let _ = self.inner.events.send(AuthEvent::new(kind, session_present));
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }
}

/// Keep at most `max` characters of a response body for logs and errors.
fn truncate_body(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_paths_join_onto_base() {
        let client = RestClient::new(
            &Url::parse("https://abc.supabase.co").unwrap(),
            SecretString::from("anon".to_string()),
        )
        .unwrap();
        assert_eq!(client.rest_url().as_str(), "https://abc.supabase.co/rest/v1/");
        assert_eq!(client.auth_url().as_str(), "https://abc.supabase.co/auth/v1/");
    }

    #[test]
    fn test_base_path_is_preserved() {
        let client = RestClient::new(
            &Url::parse("http://localhost:54321/project").unwrap(),
            SecretString::from("anon".to_string()),
        )
        .unwrap();
        assert_eq!(
            client.rest_url().as_str(),
            "http://localhost:54321/project/rest/v1/"
        );
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("abcdef", 3), "abc");
        assert_eq!(truncate_body("ab", 3), "ab");
    }
}
