//! Authenticated session.
//!
//! A [`Session`] owns the platform base address, the bearer credentials, and
//! the locally cached trust score of its own identity. Everything that talks
//! to the platform goes through [`Session::authenticated_request`] or
//! [`Session::request`].
//!
//! ## Credential replacement
//!
//! Credentials and the trust score cached for them live behind one lock and
//! are replaced together. A reader clones an [`AuthSnapshot`] under the read
//! lock and releases it before any `.await`, so an in-flight request always
//! sees either the old or the new credentials in full, never a mix, and never
//! one identity's token paired with another identity's trust.
//!
//! The trust cache is filled only by trust lookups about the session's own
//! identity (see [`Session::cache_trust_for`]).

use std::sync::{Arc, PoisonError, RwLock};

use colab::{
    ApiRequest, ApiResponse, AuthToken, BotId, BotProfile, ColabError, HttpMethod, Registration,
    Transport, TrustScore,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::ClientConfig;

/// Bearer credentials adopted from a registration or from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: AuthToken,
    pub bot_id: Option<BotId>,
}

/// Credentials plus the trust score cached for exactly those credentials.
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    pub credentials: Option<Arc<Credentials>>,
    pub trust: Option<TrustScore>,
}

/// Whether a call needs a stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Fail with [`ColabError::Unauthenticated`] before sending if no token is
    /// stored.
    Required,
    /// Attach the token when one is stored; send without it otherwise.
    Optional,
}

/// Connection identity and authentication state.
pub struct Session {
    base_address: String,
    transport: Arc<dyn Transport>,
    auth: RwLock<AuthSnapshot>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_address", &self.base_address)
            .field("identity", &self.identity())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an unauthenticated session.
    pub fn new(base_address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_address: String = base_address.into();
        Self {
            base_address: base_address.trim().trim_end_matches('/').to_owned(),
            transport,
            auth: RwLock::default(),
        }
    }

    /// Creates a session, adopting any persisted credentials in `config`.
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let session = Self::new(&config.base_url, transport);
        if let Some(token) = &config.token {
            session.adopt(Credentials {
                token: token.clone(),
                bot_id: config.bot_id.clone(),
            });
        }
        session
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// Credentials and cached trust, read together.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.auth.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of the current credentials.
    pub fn credentials(&self) -> Option<Arc<Credentials>> {
        self.snapshot().credentials
    }

    pub fn identity(&self) -> Option<BotId> {
        self.credentials().and_then(|c| c.bot_id.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_some()
    }

    /// Replaces the stored credentials in one step.
    ///
    /// The cached trust score belongs to the previous identity and is dropped.
    pub fn adopt(&self, credentials: Credentials) {
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = AuthSnapshot {
            credentials: Some(Arc::new(credentials)),
            trust: None,
        };
    }

    /// Forgets the stored credentials and cached trust.
    pub fn sign_out(&self) {
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = AuthSnapshot::default();
    }

    /// Trust score of this session's identity, if it has been observed.
    pub fn cached_trust(&self) -> Option<TrustScore> {
        self.snapshot().trust
    }

    /// Caches `score` for the current credentials, whatever they are.
    pub fn cache_trust(&self, score: TrustScore) {
        self.auth.write().unwrap_or_else(PoisonError::into_inner).trust = Some(score);
    }

    /// Caches `score` only if `holder` are still the stored credentials.
    ///
    /// Returns `false` (and caches nothing) when the credentials were replaced
    /// or cleared after `holder` was read.
    pub fn cache_trust_for(&self, holder: &Arc<Credentials>, score: TrustScore) -> bool {
        let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        match &auth.credentials {
            Some(current) if Arc::ptr_eq(current, holder) => {
                auth.trust = Some(score);
                true
            }
            _ => false,
        }
    }

    /// Registers a bot and, on success, adopts the returned credentials.
    ///
    /// The trust score echoed by registration is not cached; the gate only
    /// uses scores from [`Session::cache_trust_for`] after a trust lookup.
    ///
    /// A 4xx answer (other than rate limiting) is an [`ColabError::Auth`]:
    /// the platform refused the name or kind. Session state is untouched on
    /// any failure.
    #[instrument(skip_all, fields(name = %profile.name, kind = %profile.kind))]
    pub async fn register(&self, profile: &BotProfile) -> Result<Registration, ColabError> {
        const PATH: &str = "/api/bots/register";

        let body = serde_json::to_value(profile)
            .map_err(|e| ColabError::validation(format!("unserialisable profile: {e}")))?;
        let response = self
            .dispatch(
                HttpMethod::Post,
                PATH,
                Vec::new(),
                Some(body),
                self.credentials().map(|c| c.token.clone()),
                AuthMode::Optional,
            )
            .await?;

        if !response.is_success() {
            let refused = (400..500).contains(&response.status) && response.status != 429;
            return Err(if refused {
                ColabError::Auth {
                    status: response.status,
                    message: response.body,
                }
            } else {
                rejection(response)
            });
        }

        let registration: Registration = decode(PATH, &response)?;
        self.adopt(Credentials {
            token: registration.token.clone(),
            bot_id: Some(registration.id.clone()),
        });
        info!(bot_id = %registration.id, "registered and adopted credentials");
        Ok(registration)
    }

    /// Sends a request, attaching the bearer token when one is stored.
    ///
    /// Non-success statuses become [`ColabError::Auth`] (401) or
    /// [`ColabError::RemoteRejection`].
    pub async fn authenticated_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        auth: AuthMode,
    ) -> Result<ApiResponse, ColabError> {
        self.request(method, path, Vec::new(), body, auth).await
    }

    /// Sends a request with the credentials captured in `snapshot` rather
    /// than the ones stored now.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request_as(
        &self,
        snapshot: &AuthSnapshot,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
        auth: AuthMode,
    ) -> Result<ApiResponse, ColabError> {
        let bearer = snapshot.credentials.as_ref().map(|c| c.token.clone());
        let response = self.dispatch(method, path, query, body, bearer, auth).await?;
        check_status(response)
    }

    /// Like [`Session::authenticated_request`], with query parameters.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
        auth: AuthMode,
    ) -> Result<ApiResponse, ColabError> {
        let bearer = self.credentials().map(|c| c.token.clone());
        let response = self.dispatch(method, path, query, body, bearer, auth).await?;
        check_status(response)
    }

    async fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
        bearer: Option<AuthToken>,
        auth: AuthMode,
    ) -> Result<ApiResponse, ColabError> {
        if auth == AuthMode::Required && bearer.is_none() {
            return Err(ColabError::Unauthenticated {
                operation: format!("{method} {path}"),
            });
        }

        let request = ApiRequest {
            method,
            url: format!("{}{}", self.base_address, path),
            query,
            bearer,
            body,
        };
        let response = self.transport.send(request).await?;
        debug!(status = response.status, "platform responded");
        Ok(response)
    }
}

fn check_status(response: ApiResponse) -> Result<ApiResponse, ColabError> {
    if response.is_success() {
        return Ok(response);
    }
    if response.status == 401 {
        return Err(ColabError::Auth {
            status: response.status,
            message: response.body,
        });
    }
    Err(rejection(response))
}

fn rejection(response: ApiResponse) -> ColabError {
    ColabError::RemoteRejection {
        status: response.status,
        message: response.body,
        retry_after: response.retry_after,
    }
}

/// Builds an absolute path from `segments`, percent-encoding each one so that
/// an id can never span segments, climb with `..`, or start a query.
pub(crate) fn segment_path(segments: &[&str]) -> Result<String, ColabError> {
    if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
        return Err(ColabError::validation(format!(
            "invalid path segment '{bad}'"
        )));
    }
    let mut url = reqwest::Url::parse("http://segments.invalid/")
        .map_err(|e| ColabError::configuration(format!("path builder: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ColabError::configuration("path builder: URL cannot carry a path"))?
        .clear()
        .extend(segments);
    Ok(url.path().to_owned())
}

/// Decodes a success body, mapping failures to [`ColabError::MalformedResponse`].
pub(crate) fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T, ColabError> {
    serde_json::from_str(&response.body).map_err(|e| ColabError::MalformedResponse {
        path: path.to_owned(),
        message: e.to_string(),
    })
}
