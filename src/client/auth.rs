/**
 * Authentication Client
 *
 * Login, registration, logout and profile calls against the auth endpoints
 * under `api/auth`.
 * A successful login or registration persists the token through
 * `TokenStore` and attaches it to this client's `Config`, which is then
 * handed to the REST adapter and the live client.
 */

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::client::config::Config;
use crate::client::error::{AuthError, TransportError};
use crate::client::token_store::{StoredSession, TokenStore};
use crate::client::transport::rest::{build_http_client, check_status, endpoint, read_envelope};
use crate::shared::messaging::ApiEnvelope;

const AUTH_API: [&str; 2] = ["api", "auth"];

/// Account as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub profile: ProfileDetails,
    #[serde(default, rename = "isOnline")]
    pub is_online: bool,
    #[serde(default, rename = "lastSeen", skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Phone-number-like id other users address this account by
    #[serde(default)]
    pub wa_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Registration form
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub wa_id: String,
}

/// Partial profile update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    user: UserProfile,
    token: String,
}

/// HTTP client for the auth endpoints
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    config: Config,
    store: TokenStore,
}

impl AuthClient {
    pub fn new(config: Config, store: TokenStore) -> Result<Self, AuthError> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config,
            store,
        })
    }

    /// Client whose session lives at the configured token file
    pub fn from_config(config: Config) -> Result<Self, AuthError> {
        let store = TokenStore::from_config(&config)?;
        Self::new(config, store)
    }

    /// Configuration carrying the current token, if any
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn token(&self) -> Option<&str> {
        self.config.get_token().map(String::as_str)
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.get_token().is_some()
    }

    /// Pick up a session saved by an earlier run
    pub fn restore(&mut self) -> Option<StoredSession> {
        let session = self.store.load()?;
        self.config.set_token(Some(session.token.clone()));
        tracing::debug!("[AUTH] Restored session from {}", self.store.path().display());
        Some(session)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let url = self.auth_endpoint("login")?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(TransportError::from)?;

        let payload = match read_envelope::<AuthPayload>(response).await {
            Ok(envelope) => envelope.data,
            Err(TransportError::Unauthorized) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };
        tracing::info!("[AUTH] Logged in as {}", payload.user.username);
        self.start_session(payload)
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> Result<UserProfile, AuthError> {
        let url = self.auth_endpoint("register")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let payload = read_envelope::<AuthPayload>(response).await?.data;
        tracing::info!("[AUTH] Registered {}", payload.user.username);
        self.start_session(payload)
    }

    /// Tell the server, then forget the token locally. The local token is
    /// removed even when the server call fails.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        if let Some(token) = self.config.get_token().cloned() {
            let url = self.auth_endpoint("logout")?;
            let result = match self.client.post(url).bearer_auth(token).send().await {
                Ok(response) => check_status(response).await.map(|_| ()),
                Err(e) => Err(TransportError::from(e)),
            };
            if let Err(e) = result {
                tracing::warn!("[AUTH] Server logout failed: {}", e);
            }
        }

        self.config.clear_token();
        self.store.clear()?;
        tracing::info!("[AUTH] Logged out");
        Ok(())
    }

    /// Fetch the current user. A rejected token is cleared locally.
    pub async fn profile(&mut self) -> Result<UserProfile, AuthError> {
        let token = self.config.get_token().cloned().ok_or(AuthError::NotAuthenticated)?;
        let url = self.auth_endpoint("profile")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(TransportError::from)?;

        let user = self.authorized_result(read_envelope::<UserProfile>(response).await)?;
        self.store.save(&StoredSession::new(token, Some(user.clone())))?;
        Ok(user)
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let token = self.config.get_token().cloned().ok_or(AuthError::NotAuthenticated)?;
        let url = self.auth_endpoint("profile")?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&token)
            .json(update)
            .send()
            .await
            .map_err(TransportError::from)?;

        let user = self.authorized_result(read_envelope::<UserProfile>(response).await)?;
        self.store.save(&StoredSession::new(token, Some(user.clone())))?;
        tracing::info!("[AUTH] Profile updated");
        Ok(user)
    }

    fn auth_endpoint(&self, action: &str) -> Result<Url, TransportError> {
        let mut path: Vec<&str> = AUTH_API.to_vec();
        path.push(action);
        endpoint(&self.config, &path)
    }

    fn start_session(&mut self, payload: AuthPayload) -> Result<UserProfile, AuthError> {
        self.store
            .save(&StoredSession::new(payload.token.clone(), Some(payload.user.clone())))?;
        self.config.set_token(Some(payload.token));
        Ok(payload.user)
    }

    fn authorized_result<T>(
        &mut self,
        result: Result<ApiEnvelope<T>, TransportError>,
    ) -> Result<T, AuthError> {
        match result {
            Ok(envelope) => Ok(envelope.data),
            Err(TransportError::Unauthorized) => {
                tracing::warn!("[AUTH] Token rejected, clearing session");
                self.config.clear_token();
                self.store.clear()?;
                Err(AuthError::NotAuthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }
}
