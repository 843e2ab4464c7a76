//! Admin access guard.
//!
//! A request reaches the admin surface only with a bearer session the auth
//! server recognises and an `admin` grant in the store. Verified sessions
//! are cached briefly under a fingerprint of the token; role grants are
//! looked up on every request so a revoked grant takes effect at once.

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{AppRole, AuthUser};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use sha2::{Digest, Sha256};

/// A request that passed [`require_admin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub user: AuthUser,
}

/// Extracts the access token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::Unauthorized(
            "Authorization header is not a bearer token".to_string(),
        ));
    }

    Ok(token)
}

/// SHA-256 hex digest of a token, used as the session cache key.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

async fn resolve_session(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let fingerprint = token_fingerprint(token);
    if let Some(user) = state.session_cache.get(&fingerprint).await {
        tracing::debug!("Session cache hit for user {}", user.id);
        return Ok(user);
    }

    let verifier = state.session_verifier.as_ref().ok_or_else(|| {
        AppError::Unauthorized("No auth server configured; admin access disabled".to_string())
    })?;

    let user = verifier.verify(token).await?;
    state.session_cache.insert(fingerprint, user.clone()).await;
    Ok(user)
}

/// Admits the request only for a verified session holding the admin role.
///
/// Missing or rejected sessions are `Unauthorized`; a valid session
/// without the grant is `Forbidden`.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminSession, AppError> {
    let token = bearer_token(headers)?;
    let user = resolve_session(state, token).await?;

    if !state.store.has_role(user.id, AppRole::Admin).await? {
        return Err(AppError::Forbidden(format!(
            "User {} lacks the admin role",
            user.id
        )));
    }

    tracing::debug!("Admin access granted to {}", user.id);
    Ok(AdminSession { user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_client::SessionVerifier;
    use crate::config::Config;
    use crate::store::LocalResponseStore;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    struct FixedVerifier {
        user: AuthUser,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionVerifier for FixedVerifier {
        async fn verify(&self, access_token: &str) -> Result<AuthUser, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if access_token == "good-token" {
                Ok(self.user.clone())
            } else {
                Err(AppError::Unauthorized("unknown token".to_string()))
            }
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn state(admins: Vec<Uuid>, user: AuthUser) -> (AppState, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let verifier = FixedVerifier {
            user,
            calls: calls.clone(),
        };
        let state = AppState::new(
            Arc::new(LocalResponseStore::in_memory().with_admins(admins)),
            Config::local(),
            Some(Arc::new(verifier)),
        );
        (state, calls)
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer   xyz ")).unwrap(), "xyz");
        assert!(bearer_token(&HeaderMap::new()).is_err());
        assert!(bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers("Bearer")).is_err());
    }

    #[test]
    fn test_fingerprint_hides_token() {
        let fp = token_fingerprint("secret-token");
        assert_eq!(fp.len(), 64);
        assert!(!fp.contains("secret"));
        assert_eq!(fp, token_fingerprint("secret-token"));
        assert_ne!(fp, token_fingerprint("secret-token2"));
    }

    #[tokio::test]
    async fn test_admin_admitted_and_session_cached() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("admin@city.gov.ph".to_string()),
        };
        let (state, calls) = state(vec![user.id], user.clone());

        let session = require_admin(&state, &headers("Bearer good-token")).await.unwrap();
        assert_eq!(session.user, user);
        require_admin(&state, &headers("Bearer good-token")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: None,
        };
        let (state, _) = state(vec![], user);

        let err = require_admin(&state, &headers("Bearer good-token")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_bad_or_missing_session_is_unauthorized() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: None,
        };
        let (state, _) = state(vec![user.id], user);

        let err = require_admin(&state, &headers("Bearer stale")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let unconfigured = AppState::new(
            Arc::new(LocalResponseStore::in_memory()),
            Config::local(),
            None,
        );
        let err = require_admin(&unconfigured, &headers("Bearer good-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
