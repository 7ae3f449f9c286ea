//! Shared application state
//!
//! Stores and identity are injected as trait objects so tests and
//! deployments can swap them; the defaults are in-memory.

use crate::config::ServerConfig;
use crate::error::ApiError;
use moka::future::Cache;
use std::sync::Arc;
use vibe_core::{
    CoreConfig, Critic, EditSession, GalleryStore, HeaderIdentity, IdentityProvider, InMemoryGalleryStore,
    InMemoryProjectStore, InMemoryUserDirectory, ProjectStore, SessionId, StoreError, UsageLimiter, UserDirectory,
    UserId,
};
use vibe_genai::GenerationService;
use vibe_sandbox::SandboxRenderer;

/// Header carrying the caller's identity
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the billing webhook's shared secret
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Owner recorded for anonymous callers when anonymous access is enabled
pub const ANONYMOUS_USER: &str = "anonymous";

/// State cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<CoreConfig>,
    pub critic: Critic,
    pub renderer: SandboxRenderer,
    pub projects: Arc<dyn ProjectStore>,
    pub gallery: Arc<dyn GalleryStore>,
    pub users: Arc<dyn UserDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
    pub limiter: UsageLimiter,
    pub sessions: Cache<SessionId, Arc<EditSession>>,
    pub allow_anonymous: bool,
    pub webhook_secret: Option<Arc<str>>,
    pub body_limit: u64,
    pub gallery_page: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("critic", &self.critic)
            .field("sessions", &self.sessions.entry_count())
            .field("allow_anonymous", &self.allow_anonymous)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state around `generator`
    #[must_use]
    pub fn new(generator: Arc<dyn GenerationService>, config: &ServerConfig) -> Self {
        let projects: Arc<dyn ProjectStore> = Arc::new(InMemoryProjectStore::new());
        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
        let limiter = UsageLimiter::new(Arc::clone(&users), Arc::clone(&projects), config.core.free_project_limit);
        Self {
            core: Arc::new(config.core.clone()),
            critic: Critic::new(generator, &config.core),
            renderer: SandboxRenderer::default(),
            projects,
            gallery: Arc::new(InMemoryGalleryStore::new()),
            users,
            identity: Arc::new(HeaderIdentity),
            limiter,
            sessions: Cache::builder()
                .max_capacity(config.max_sessions)
                .time_to_idle(config.session_idle)
                .build(),
            allow_anonymous: config.allow_anonymous,
            webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
            body_limit: config.body_limit,
            gallery_page: config.gallery_page,
        }
    }

    /// Replace the project store; the usage limiter follows it
    #[must_use]
    pub fn with_projects(mut self, projects: Arc<dyn ProjectStore>) -> Self {
        self.projects = projects;
        self.rebuild_limiter();
        self
    }

    /// Replace the user directory; the usage limiter follows it
    #[must_use]
    pub fn with_users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = users;
        self.rebuild_limiter();
        self
    }

    #[must_use]
    pub fn with_gallery(mut self, gallery: Arc<dyn GalleryStore>) -> Self {
        self.gallery = gallery;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    fn rebuild_limiter(&mut self) {
        self.limiter = UsageLimiter::new(
            Arc::clone(&self.users),
            Arc::clone(&self.projects),
            self.core.free_project_limit,
        );
    }

    /// Caller identity. `None` only when anonymous access is enabled and no
    /// credential was sent.
    ///
    /// # Errors
    /// [`ApiError::Unauthenticated`] for a missing or unresolvable credential
    pub async fn caller(&self, credential: Option<&str>) -> Result<Option<UserId>, ApiError> {
        match self.identity.resolve(credential).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) if self.allow_anonymous => Ok(None),
            Ok(None) | Err(StoreError::Unauthenticated) => Err(ApiError::Unauthenticated),
            Err(err) => Err(err.into()),
        }
    }

    /// Caller identity, with anonymous callers mapped to [`ANONYMOUS_USER`]
    ///
    /// # Errors
    /// As [`Self::caller`]
    pub async fn owner(&self, credential: Option<&str>) -> Result<UserId, ApiError> {
        match self.caller(credential).await? {
            Some(user) => Ok(user),
            None => Ok(UserId::new(ANONYMOUS_USER)?),
        }
    }

    /// Enforce the monthly limit for identified callers
    ///
    /// # Errors
    /// [`vibe_core::CoreError::LimitReached`] for a free user over the limit
    pub async fn check_usage(&self, user: Option<&UserId>) -> Result<(), ApiError> {
        if let Some(user) = user {
            self.limiter.check(user).await?;
        }
        Ok(())
    }

    /// Session `id` if `caller` may act on it
    ///
    /// # Errors
    /// Not found for unknown ids and for sessions owned by someone else
    pub async fn session(&self, id: &str, caller: Option<&UserId>) -> Result<Arc<EditSession>, ApiError> {
        let not_found = || ApiError::from(StoreError::not_found("session", id));
        let session_id: SessionId = id.parse().map_err(|_| not_found())?;
        let session = self.sessions.get(&session_id).await.ok_or_else(not_found)?;
        if session.is_owned_by(caller) {
            Ok(session)
        } else {
            Err(not_found())
        }
    }

    /// Session `id` regardless of owner; for the sandboxed preview, which
    /// cannot carry credentials and only reads
    ///
    /// # Errors
    /// Not found for unknown ids
    pub async fn session_by_id(&self, id: &str) -> Result<Arc<EditSession>, ApiError> {
        let not_found = || ApiError::from(StoreError::not_found("session", id));
        let session_id: SessionId = id.parse().map_err(|_| not_found())?;
        self.sessions.get(&session_id).await.ok_or_else(not_found)
    }

    /// Session `id` if `token` is its edit token; for the editor page,
    /// which acts on one session without the owner's identity
    ///
    /// # Errors
    /// Not found for unknown ids and for a missing or wrong token
    pub async fn session_with_token(&self, id: &str, token: Option<&str>) -> Result<Arc<EditSession>, ApiError> {
        let session = self.session_by_id(id).await?;
        match token {
            Some(token) if session.accepts_token(token) => Ok(session),
            _ => Err(StoreError::not_found("session", id).into()),
        }
    }

    /// Check a webhook's shared secret in constant time
    #[must_use]
    pub fn webhook_authorized(&self, presented: Option<&str>) -> bool {
        match (self.webhook_secret.as_deref(), presented) {
            (Some(expected), Some(presented)) => {
                blake3::hash(expected.as_bytes()) == blake3::hash(presented.as_bytes())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_test_utils::ScriptedGenerator;

    fn state(config: &ServerConfig) -> AppState {
        AppState::new(Arc::new(ScriptedGenerator::new(Vec::<String>::new())), config)
    }

    #[tokio::test]
    async fn anonymous_callers_need_opt_in() {
        let closed = state(&ServerConfig::default());
        assert!(matches!(closed.caller(None).await, Err(ApiError::Unauthenticated)));
        assert_eq!(closed.caller(Some("u1")).await.unwrap(), Some(UserId::new("u1").unwrap()));

        let open = state(&ServerConfig {
            allow_anonymous: true,
            ..ServerConfig::default()
        });
        assert_eq!(open.caller(None).await.unwrap(), None);
        assert_eq!(open.owner(None).await.unwrap().as_str(), ANONYMOUS_USER);
    }

    #[tokio::test]
    async fn edit_token_opens_only_its_session() {
        let state = state(&ServerConfig::default());
        let config = CoreConfig::default();
        let session = Arc::new(EditSession::new(
            Some(UserId::new("u1").unwrap()),
            state.critic.clone(),
            &config,
        ));
        state.sessions.insert(session.id(), Arc::clone(&session)).await;
        let id = session.id().to_string();

        let found = state.session_with_token(&id, Some(session.edit_token())).await.unwrap();
        assert_eq!(found.id(), session.id());
        assert!(state.session_with_token(&id, Some("guess")).await.is_err());
        assert!(state.session_with_token(&id, None).await.is_err());
        assert!(state.session(&id, Some(&UserId::new("u2").unwrap())).await.is_err());
    }

    #[test]
    fn webhook_secret_must_match() {
        let unset = state(&ServerConfig::default());
        assert!(!unset.webhook_authorized(Some("anything")));

        let set = state(&ServerConfig {
            webhook_secret: Some("whsec".into()),
            ..ServerConfig::default()
        });
        assert!(set.webhook_authorized(Some("whsec")));
        assert!(!set.webhook_authorized(Some("whsec2")));
        assert!(!set.webhook_authorized(None));
    }
}
