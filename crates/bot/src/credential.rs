//! Commerce-backend credential cache.
//!
//! The access token is the only process-wide shared mutable state. The
//! read-check-refresh-write sequence runs under one async mutex, so when
//! several expired callers race, exactly one token request is issued and
//! every caller observes the refreshed credential.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::commerce::CommerceError;

/// A bearer token with its absolute expiry time.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Opaque access token.
    pub access_token: String,
    /// Absolute expiry timestamp reported by the token endpoint.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the credential is still usable at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Source of fresh credentials (the commerce backend's token endpoint).
pub trait TokenSource {
    /// Exchange client credentials for a fresh token.
    fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &SecretString,
    ) -> impl Future<Output = Result<Credential, CommerceError>> + Send;
}

/// Process-wide credential cache.
///
/// Safe to call before every privileged operation; callers never reason
/// about staleness themselves.
pub struct CredentialCache<S> {
    source: S,
    client_id: String,
    client_secret: SecretString,
    slot: Mutex<Option<Credential>>,
}

impl<S: TokenSource> CredentialCache<S> {
    /// Create an empty cache; the first `access_token` call fetches.
    pub fn new(source: S, client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            source,
            client_id: client_id.into(),
            client_secret,
            slot: Mutex::new(None),
        }
    }

    /// Return a valid access token, refreshing it first if expired.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Auth` if the token endpoint rejects the
    /// client credentials or is unreachable.
    pub async fn access_token(&self) -> Result<String, CommerceError> {
        let mut slot = self.slot.lock().await;

        if let Some(credential) = slot.as_ref() {
            if credential.is_fresh(Utc::now()) {
                return Ok(credential.access_token.clone());
            }
            tracing::info!("commerce credential expired, refreshing");
        }

        let fresh = self
            .source
            .fetch_token(&self.client_id, &self.client_secret)
            .await?;
        let token = fresh.access_token.clone();
        *slot = Some(fresh);

        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;

    use super::*;

    /// Token source that counts endpoint hits.
    struct CountingSource {
        hits: AtomicUsize,
    }

    impl TokenSource for Arc<CountingSource> {
        async fn fetch_token(
            &self,
            _client_id: &str,
            _client_secret: &SecretString,
        ) -> Result<Credential, CommerceError> {
            let n = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential {
                access_token: format!("token-{n}"),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    struct RejectingSource;

    impl TokenSource for RejectingSource {
        async fn fetch_token(
            &self,
            _client_id: &str,
            _client_secret: &SecretString,
        ) -> Result<Credential, CommerceError> {
            Err(CommerceError::Auth {
                status: 401,
                body: "invalid client".to_string(),
            })
        }
    }

    fn cache_with(source: Arc<CountingSource>) -> CredentialCache<Arc<CountingSource>> {
        CredentialCache::new(source, "client-id", SecretString::from("client-secret"))
    }

    #[test]
    fn freshness_is_strict_on_expiry_instant() {
        let now = Utc::now();
        let credential = Credential {
            access_token: "t".to_string(),
            expires_at: now,
        };
        // now >= expires_at means stale.
        assert!(!credential.is_fresh(now));
        assert!(credential.is_fresh(now - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn concurrent_refresh_hits_endpoint_once() {
        let source = Arc::new(CountingSource {
            hits: AtomicUsize::new(0),
        });
        let cache = Arc::new(cache_with(Arc::clone(&source)));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.access_token().await.unwrap()
            }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap());
        }

        assert_eq!(source.hits.load(Ordering::SeqCst), 1);
        assert!(tokens.iter().all(|t| t == "token-1"));
    }

    #[tokio::test]
    async fn fresh_credential_is_reused_without_fetch() {
        let source = Arc::new(CountingSource {
            hits: AtomicUsize::new(0),
        });
        let cache = cache_with(Arc::clone(&source));

        let first = cache.access_token().await.unwrap();
        let second = cache.access_token().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_credentials_propagate_auth_error() {
        let cache =
            CredentialCache::new(RejectingSource, "client-id", SecretString::from("bad"));
        let err = cache.access_token().await.unwrap_err();
        assert!(matches!(err, CommerceError::Auth { status: 401, .. }));
    }
}
