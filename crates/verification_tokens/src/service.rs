use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::store::TokenStore;
use crate::types::{LinkConfig, NewVerificationToken, TokenError, VerificationLink};

const TOKEN_LENGTH: usize = 32;
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Issues verification tokens and the links that carry them.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    store: Arc<dyn TokenStore>,
    link_config: LinkConfig,
    ttl: Duration,
}

impl TokenLifecycleManager {
    /// Creates a manager persisting into `store` and issuing tokens valid for `ttl`.
    pub fn new(store: Arc<dyn TokenStore>, link_config: LinkConfig, ttl: Duration) -> Self {
        Self {
            store,
            link_config,
            ttl,
        }
    }

    /// Issues a new token for `subject_id` and returns its verification link.
    ///
    /// Every expired token and every earlier token of the subject is swept
    /// before the new one is stored.
    pub async fn issue_verification(
        &self,
        subject_id: &str,
        contact: &str,
    ) -> Result<VerificationLink, TokenError> {
        self.issue_verification_at(subject_id, contact, Utc::now())
            .await
    }

    /// Same as [`Self::issue_verification`] with an explicit issuance instant.
    pub async fn issue_verification_at(
        &self,
        subject_id: &str,
        contact: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationLink, TokenError> {
        if subject_id.is_empty() {
            return Err(TokenError::InvalidInput("subject id is empty".to_string()));
        }
        if contact.is_empty() {
            return Err(TokenError::InvalidInput("contact is empty".to_string()));
        }

        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            TokenError::InvalidInput(format!(
                "validity window of {}s overflows the expiry timestamp",
                self.ttl.num_seconds()
            ))
        })?;

        let pending = NewVerificationToken {
            subject_id: subject_id.to_string(),
            token: Self::generate_token(),
            expires_at,
            created_at: now,
        };

        let stored = self
            .store
            .replace_for_subject(pending, now)
            .await
            .inspect_err(|e| {
                log::error!("❌ Failed to persist token for subject {}: {}", subject_id, e)
            })?;

        log::info!(
            "🔑 Issued verification token for subject {} <{}>, expires at {}",
            subject_id,
            contact,
            stored.expires_at
        );

        Ok(VerificationLink {
            url: self.link_config.verification_link(&stored.token),
            token: stored.token,
            expires_at: stored.expires_at,
        })
    }

    /// Generates a 32 character alphanumeric token.
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        (0..TOKEN_LENGTH)
            .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use crate::types::VerificationToken;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn link_config() -> LinkConfig {
        LinkConfig {
            scheme: "https".to_string(),
            domain: "verify.example.com".to_string(),
            port: Some(8080),
        }
    }

    fn manager(store: Arc<dyn TokenStore>) -> TokenLifecycleManager {
        TokenLifecycleManager::new(store, link_config(), Duration::minutes(2))
    }

    /// Records the calls it receives, failing on insert when asked to.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
        fail_insert: bool,
    }

    #[async_trait]
    impl TokenStore for RecordingStore {
        async fn sweep(&self, subject_id: &str, _now: DateTime<Utc>) -> Result<u64, TokenError> {
            self.calls.lock().unwrap().push(format!("sweep:{}", subject_id));
            Ok(0)
        }

        async fn insert(
            &self,
            token: NewVerificationToken,
        ) -> Result<VerificationToken, TokenError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("insert:{}", token.subject_id));
            if self.fail_insert {
                return Err(TokenError::Store("connection refused".to_string()));
            }
            Ok(token.into_record())
        }
    }

    #[test]
    fn test_generate_token_shape() {
        let token = TokenLifecycleManager::generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, TokenLifecycleManager::generate_token());
    }

    #[tokio::test]
    async fn test_issue_returns_link_matching_template() {
        let store = Arc::new(MemoryTokenStore::new());
        let link = manager(store.clone())
            .issue_verification("u1", "a@b.com")
            .await
            .unwrap();

        assert_eq!(
            link.url,
            format!("https://verify.example.com:8080/verify/{}", link.token)
        );
        assert_eq!(store.tokens_for_subject("u1").unwrap()[0].token, link.token);
    }

    #[tokio::test]
    async fn test_issue_sets_expiry_to_validity_window() {
        let store = Arc::new(MemoryTokenStore::new());
        let now = Utc::now();

        let link = manager(store.clone())
            .issue_verification_at("u1", "a@b.com", now)
            .await
            .unwrap();

        assert_eq!(link.expires_at, now + Duration::minutes(2));
        let stored = store.tokens_for_subject("u1").unwrap();
        assert_eq!(stored[0].expires_at, now + Duration::minutes(2));
        assert_eq!(stored[0].created_at, now);
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = manager(store.clone());

        let first = manager.issue_verification("u1", "a@b.com").await.unwrap();
        let second = manager.issue_verification("u1", "a@b.com").await.unwrap();

        let tokens = store.tokens_for_subject("u1").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, second.token);
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn test_issue_sweeps_expired_tokens_of_other_subjects() {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = manager(store.clone());
        let now = Utc::now();

        manager
            .issue_verification_at("old", "old@b.com", now - Duration::minutes(5))
            .await
            .unwrap();
        manager
            .issue_verification_at("fresh", "fresh@b.com", now - Duration::seconds(30))
            .await
            .unwrap();
        manager
            .issue_verification_at("u1", "a@b.com", now)
            .await
            .unwrap();

        assert!(store.tokens_for_subject("old").unwrap().is_empty());
        assert_eq!(store.tokens_for_subject("fresh").unwrap().len(), 1);
        assert_eq!(store.tokens().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_issue_sweeps_before_insert() {
        let store = Arc::new(RecordingStore::default());
        manager(store.clone())
            .issue_verification("u1", "a@b.com")
            .await
            .unwrap();

        assert_eq!(
            *store.calls.lock().unwrap(),
            vec!["sweep:u1".to_string(), "insert:u1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_store_failure_aborts_issuance() {
        let store = Arc::new(RecordingStore {
            fail_insert: true,
            ..Default::default()
        });

        let result = manager(store).issue_verification("u1", "a@b.com").await;

        assert!(matches!(result, Err(TokenError::Store(_))));
    }

    #[tokio::test]
    async fn test_overflowing_validity_window_is_an_error() {
        let store = Arc::new(RecordingStore::default());
        let manager = TokenLifecycleManager::new(
            store.clone(),
            link_config(),
            Duration::seconds(9_000_000_000_000_000),
        );

        let result = manager.issue_verification("u1", "a@b.com").await;

        assert!(matches!(result, Err(TokenError::InvalidInput(_))));
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_inputs_are_rejected() {
        let store = Arc::new(RecordingStore::default());
        let manager = manager(store.clone());

        assert!(matches!(
            manager.issue_verification("", "a@b.com").await,
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.issue_verification("u1", "").await,
            Err(TokenError::InvalidInput(_))
        ));
        assert!(store.calls.lock().unwrap().is_empty());
    }
}
