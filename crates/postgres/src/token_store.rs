use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row};
use verification_tokens::{NewVerificationToken, TokenError, TokenStore, VerificationToken};

/// Removes expired tokens (`$1` = now) and every token of one subject (`$2`).
const DELETE_STALE_TOKENS: &str =
    "DELETE FROM verification_tokens WHERE expires_at <= $1 OR subject_id = $2";

const INSERT_TOKEN: &str = r#"
    INSERT INTO verification_tokens (id, subject_id, token, expires_at, created_at)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, subject_id, token, expires_at, created_at
"#;

/// Verification token store backed by the `verification_tokens` table.
#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Creates a new store using the provided connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn delete_stale<'e>(
        executor: impl PgExecutor<'e>,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(DELETE_STALE_TOKENS)
            .bind(now)
            .bind(subject_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_token<'e>(
        executor: impl PgExecutor<'e>,
        token: NewVerificationToken,
    ) -> Result<VerificationToken, sqlx::Error> {
        let record = token.into_record();

        let row = sqlx::query(INSERT_TOKEN)
            .bind(record.id)
            .bind(&record.subject_id)
            .bind(&record.token)
            .bind(record.expires_at)
            .bind(record.created_at)
            .fetch_one(executor)
            .await?;

        Ok(VerificationToken {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            token: row.get("token"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        })
    }
}

fn store_error(e: sqlx::Error) -> TokenError {
    TokenError::Store(format!("Database error: {}", e))
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn sweep(&self, subject_id: &str, now: DateTime<Utc>) -> Result<u64, TokenError> {
        Self::delete_stale(&self.pool, subject_id, now)
            .await
            .map_err(store_error)
    }

    async fn insert(&self, token: NewVerificationToken) -> Result<VerificationToken, TokenError> {
        Self::insert_token(&self.pool, token)
            .await
            .map_err(store_error)
    }

    /// Runs the sweep and the insert in one transaction.
    async fn replace_for_subject(
        &self,
        token: NewVerificationToken,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken, TokenError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let removed = Self::delete_stale(&mut *tx, &token.subject_id, now)
            .await
            .map_err(store_error)?;
        let stored = Self::insert_token(&mut *tx, token)
            .await
            .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;

        log::debug!(
            "🧹 Replaced {} stale token(s) for subject {}",
            removed,
            stored.subject_id
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_connection_pool, ensure_schema};
    use chrono::Duration;

    /// Connects to `DATABASE_URL`, or returns `None` when it is not set.
    async fn store() -> Option<PgTokenStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL token store test");
            return None;
        };
        let pool = create_connection_pool(&url).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        Some(PgTokenStore::new(pool))
    }

    fn random_token() -> String {
        verification_tokens::TokenLifecycleManager::generate_token()
    }

    fn pending(subject_id: &str, token: &str, expires_at: DateTime<Utc>) -> NewVerificationToken {
        NewVerificationToken {
            subject_id: subject_id.to_string(),
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    async fn tokens_of(store: &PgTokenStore, subject_id: &str) -> Vec<String> {
        sqlx::query_scalar("SELECT token FROM verification_tokens WHERE subject_id = $1")
            .bind(subject_id)
            .fetch_all(&store.pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_sweep_predicate_covers_expired_and_subject_rows() {
        assert!(DELETE_STALE_TOKENS.contains("expires_at <= $1"));
        assert!(DELETE_STALE_TOKENS.contains("OR subject_id = $2"));
    }

    #[tokio::test]
    async fn test_replace_keeps_single_token_per_subject() {
        let Some(store) = store().await else { return };
        let now = Utc::now();
        let subject = format!("pg-test-{}", random_token());

        store
            .replace_for_subject(pending(&subject, &random_token(), now + Duration::minutes(2)), now)
            .await
            .unwrap();
        let second = store
            .replace_for_subject(pending(&subject, &random_token(), now + Duration::minutes(2)), now)
            .await
            .unwrap();

        assert_eq!(tokens_of(&store, &subject).await, vec![second.token]);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_rows_and_keeps_live_ones() {
        let Some(store) = store().await else { return };
        let now = Utc::now();
        let expired = format!("pg-expired-{}", random_token());
        let live = format!("pg-live-{}", random_token());

        store
            .insert(pending(&expired, &random_token(), now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .insert(pending(&live, &random_token(), now + Duration::minutes(1)))
            .await
            .unwrap();

        let removed = store.sweep("nobody", now).await.unwrap();

        assert!(removed >= 1);
        assert!(tokens_of(&store, &expired).await.is_empty());
        assert_eq!(tokens_of(&store, &live).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_sweep() {
        let Some(store) = store().await else { return };
        let now = Utc::now();
        let subject = format!("pg-rollback-{}", random_token());
        let other = format!("pg-other-{}", random_token());
        let previous = random_token();
        let taken = random_token();

        store
            .insert(pending(&subject, &previous, now + Duration::minutes(2)))
            .await
            .unwrap();
        store
            .insert(pending(&other, &taken, now + Duration::minutes(2)))
            .await
            .unwrap();

        let result = store
            .replace_for_subject(pending(&subject, &taken, now + Duration::minutes(2)), now)
            .await;

        assert!(matches!(result, Err(TokenError::Store(_))));
        assert_eq!(tokens_of(&store, &subject).await, vec![previous]);
    }
}
