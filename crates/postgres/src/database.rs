use sqlx::{PgPool, Row};

const CREATE_TOKENS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS verification_tokens (
        id UUID PRIMARY KEY,
        subject_id TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_SUBJECT_INDEX: &str = "CREATE INDEX IF NOT EXISTS verification_tokens_subject_idx ON verification_tokens (subject_id)";

const CREATE_EXPIRY_INDEX: &str = "CREATE INDEX IF NOT EXISTS verification_tokens_expires_idx ON verification_tokens (expires_at)";

/// Creates a connection pool to the PostgreSQL database at `database_url`.
pub async fn create_connection_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}

/// Tests the database connection by executing a simple query.
pub async fn test_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    let row = sqlx::query("SELECT 1 as test").fetch_one(pool).await?;

    let test_value: i32 = row.get("test");
    log::info!(
        "✅ Database connection successful! Test value: {}",
        test_value
    );

    Ok(())
}

/// Creates the verification token table and its indexes if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in [CREATE_TOKENS_TABLE, CREATE_SUBJECT_INDEX, CREATE_EXPIRY_INDEX] {
        sqlx::query(statement).execute(pool).await?;
    }

    log::info!("🗃️ Verification token schema is in place");
    Ok(())
}
