//! Admin authentication: credential check, cookie sessions, login throttling.

pub mod admin;
pub mod rate_limit;
pub mod session;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use std::{net::IpAddr, sync::Arc, time::Duration};
use thiserror::Error;

pub use admin::{AdminDirectory, AdminIdentity};
pub use rate_limit::RateLimiter;
pub use session::{MemorySessionStore, PgSessionStore, SessionRecord, SessionStore};

use crate::{config::SessionConfig, error::AppError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("too many login attempts")]
    RateLimited { retry_after: Duration },

    #[error("session store failure: {0}")]
    Store(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Result of a successful login; `token` goes into the session cookie.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub record: SessionRecord,
}

pub struct AuthGate {
    admins: AdminDirectory,
    sessions: Arc<dyn SessionStore>,
    limiter: RateLimiter,
    config: SessionConfig,
}

impl AuthGate {
    pub fn new(
        admins: AdminDirectory,
        sessions: Arc<dyn SessionStore>,
        limiter: RateLimiter,
        config: SessionConfig,
    ) -> Self {
        Self {
            admins,
            sessions,
            limiter,
            config,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn session_store_kind(&self) -> &'static str {
        self.sessions.kind()
    }

    pub async fn login(
        &self,
        client: IpAddr,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<NewSession, AuthError> {
        if let Err(retry_after) = self.limiter.check(client).await {
            tracing::warn!(client = %client, "login rate limit exceeded");
            return Err(AuthError::RateLimited { retry_after });
        }

        let (username, password) = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            _ => return Err(AuthError::MissingCredentials),
        };

        let identity = self.admins.find(username).await?;
        let hash = identity
            .as_ref()
            .map(|identity| identity.password_hash.clone())
            .unwrap_or_else(|| self.admins.fallback_hash().to_string());

        // bcrypt is CPU-bound; keep it off the async executor.
        let password = password.to_string();
        let password_ok =
            tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
                .await
                .unwrap_or(false);

        let identity = match identity {
            Some(identity) if password_ok => identity,
            _ => {
                tracing::warn!(client = %client, "failed admin login attempt");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = session::generate_token();
        let record = SessionRecord {
            username: identity.username,
            expires_at: Utc::now()
                + chrono::Duration::from_std(self.config.ttl)
                    .unwrap_or_else(|_| chrono::Duration::hours(24)),
        };
        self.sessions
            .insert(&session::hash_token(&token), record.clone())
            .await?;

        tracing::info!(username = %record.username, client = %client, "admin logged in");
        Ok(NewSession { token, record })
    }

    /// Destroy the session behind `token`, if any.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = token {
            self.sessions.remove(&session::hash_token(token)).await?;
        }
        Ok(())
    }

    /// Live session behind `token`. Expired sessions are removed on sight.
    pub async fn session(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let key = session::hash_token(token);
        match self.sessions.get(&key).await? {
            Some(record) if record.is_expired(Utc::now()) => {
                self.sessions.remove(&key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn session_from_jar(&self, jar: &CookieJar) -> Result<Option<SessionRecord>, AuthError> {
        match jar.get(self.cookie_name()) {
            Some(cookie) => self.session(cookie.value()).await,
            None => Ok(None),
        }
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie)
            .max_age(time::Duration::seconds(self.config.ttl.as_secs() as i64))
            .build()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), ""))
            .path("/")
            .build()
    }

    /// Periodic cleanup of idle rate-limit windows and expired sessions.
    pub async fn sweep(&self) {
        let windows = self.limiter.purge_expired().await;
        match self.sessions.purge_expired(Utc::now()).await {
            Ok(sessions) if windows > 0 || sessions > 0 => {
                tracing::debug!(windows, sessions, "auth sweep removed expired entries");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "failed to purge expired sessions"),
        }
    }
}

/// Guard for admin-only routes; rejects with 401 unless the request carries
/// a live session cookie.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub SessionRecord);

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<AuthGate>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        match gate.session_from_jar(&jar).await {
            Ok(Some(record)) => Ok(RequireAdmin(record)),
            Ok(None) => Err(AppError::Unauthorized("Unauthorized")),
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                Err(AppError::Backend(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    pub(crate) const PASSWORD: &str = "s3cret-pass";

    pub(crate) fn gate_with_limit(max_attempts: u32) -> AuthGate {
        AuthGate::new(
            AdminDirectory::Static(AdminIdentity {
                username: "admin".into(),
                password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
            }),
            Arc::new(MemorySessionStore::new()),
            RateLimiter::new(RateLimitConfig {
                max_attempts,
                window: Duration::from_secs(15 * 60),
            }),
            SessionConfig {
                cookie_name: "portfolio.sid".into(),
                ttl: Duration::from_secs(24 * 3600),
                secure_cookie: false,
            },
        )
    }

    fn client() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    #[tokio::test]
    async fn test_login_creates_session() {
        let gate = gate_with_limit(10);
        let session = gate
            .login(client(), Some("admin"), Some(PASSWORD))
            .await
            .unwrap();
        let record = gate.session(&session.token).await.unwrap().unwrap();
        assert_eq!(record.username, "admin");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_username_alike() {
        let gate = gate_with_limit(10);
        assert!(matches!(
            gate.login(client(), Some("admin"), Some("nope")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            gate.login(client(), Some("root"), Some(PASSWORD)).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let gate = gate_with_limit(10);
        assert!(matches!(
            gate.login(client(), None, Some(PASSWORD)).await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            gate.login(client(), Some("admin"), Some("")).await,
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_throttle_applies_before_credential_check() {
        let gate = gate_with_limit(2);
        for _ in 0..2 {
            assert!(matches!(
                gate.login(client(), Some("admin"), Some("bad")).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            gate.login(client(), Some("admin"), Some(PASSWORD)).await,
            Err(AuthError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let gate = gate_with_limit(10);
        let session = gate
            .login(client(), Some("admin"), Some(PASSWORD))
            .await
            .unwrap();
        gate.logout(Some(&session.token)).await.unwrap();
        assert!(gate.session(&session.token).await.unwrap().is_none());

        // Logging out without a session is still fine.
        gate.logout(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_token_has_no_session() {
        let gate = gate_with_limit(10);
        assert!(gate.session("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_anonymous_and_removed() {
        let store = Arc::new(MemorySessionStore::new());
        let gate = AuthGate::new(
            AdminDirectory::Static(AdminIdentity {
                username: "admin".into(),
                password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
            }),
            store.clone(),
            RateLimiter::new(RateLimitConfig {
                max_attempts: 10,
                window: Duration::from_secs(15 * 60),
            }),
            SessionConfig {
                cookie_name: "portfolio.sid".into(),
                ttl: Duration::from_secs(24 * 3600),
                secure_cookie: false,
            },
        );

        let key = session::hash_token("stale-token");
        store
            .insert(
                &key,
                SessionRecord {
                    username: "admin".into(),
                    expires_at: Utc::now() - chrono::Duration::minutes(1),
                },
            )
            .await
            .unwrap();

        assert!(gate.session("stale-token").await.unwrap().is_none());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let gate = gate_with_limit(10);
        let cookie = gate.session_cookie("tok".into());
        assert_eq!(cookie.name(), "portfolio.sid");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(24 * 3600))
        );
    }
}
