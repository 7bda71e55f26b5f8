use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{NewVerificationToken, TokenError, VerificationToken};

/// Persistence seam for verification tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Removes every token expired at `now` and every token of `subject_id`.
    /// Returns the number of removed tokens.
    async fn sweep(&self, subject_id: &str, now: DateTime<Utc>) -> Result<u64, TokenError>;

    /// Persists a new token.
    async fn insert(&self, token: NewVerificationToken) -> Result<VerificationToken, TokenError>;

    /// Sweeps stale tokens for the subject and inserts `token` in their place.
    ///
    /// The default runs [`TokenStore::sweep`] then [`TokenStore::insert`] as two
    /// separate steps. Stores that can do both atomically should override it.
    async fn replace_for_subject(
        &self,
        token: NewVerificationToken,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, TokenError> {
        let removed = self.sweep(&token.subject_id, now).await?;
        log::debug!(
            "🧹 Swept {} stale token(s) before issuing for subject {}",
            removed,
            token.subject_id
        );
        self.insert(token).await
    }
}

/// Token store kept in process memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<Vec<VerificationToken>>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored token.
    pub fn tokens(&self) -> Result<Vec<VerificationToken>, TokenError> {
        Ok(self.lock()?.clone())
    }

    /// Returns the stored tokens of one subject.
    pub fn tokens_for_subject(&self, subject_id: &str) -> Result<Vec<VerificationToken>, TokenError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| t.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<VerificationToken>>, TokenError> {
        self.tokens
            .lock()
            .map_err(|_| TokenError::Store("token store lock poisoned".to_string()))
    }

    fn sweep_locked(tokens: &mut Vec<VerificationToken>, subject_id: &str, now: DateTime<Utc>) -> u64 {
        let before = tokens.len();
        tokens.retain(|t| t.subject_id != subject_id && !t.is_expired_at(now));
        (before - tokens.len()) as u64
    }

    fn insert_locked(
        tokens: &mut Vec<VerificationToken>,
        token: NewVerificationToken,
    ) -> Result<VerificationToken, TokenError> {
        if tokens.iter().any(|t| t.token == token.token) {
            return Err(TokenError::Store("duplicate token value".to_string()));
        }

        let record = token.into_record();
        tokens.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn sweep(&self, subject_id: &str, now: DateTime<Utc>) -> Result<u64, TokenError> {
        let mut tokens = self.lock()?;
        Ok(Self::sweep_locked(&mut tokens, subject_id, now))
    }

    async fn insert(&self, token: NewVerificationToken) -> Result<VerificationToken, TokenError> {
        let mut tokens = self.lock()?;
        Self::insert_locked(&mut tokens, token)
    }

    async fn replace_for_subject(
        &self,
        token: NewVerificationToken,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, TokenError> {
        let mut tokens = self.lock()?;

        // Work on a copy so a failed insert leaves the swept tokens in place.
        let mut staged = tokens.clone();
        Self::sweep_locked(&mut staged, &token.subject_id, now);
        let stored = Self::insert_locked(&mut staged, token)?;

        *tokens = staged;
        Ok(stored)
    }
}
