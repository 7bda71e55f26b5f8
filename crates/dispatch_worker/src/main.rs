//! Entry point of the verification dispatcher.
//! Reads an SNS event document, dispatches the verification email and prints
//! the status-coded result as JSON.

use anyhow::Context;
use event_handlers::{DispatchConfig, EmailProvider, TokenStoreKind, VerificationDispatchHandler};
use notification_services::{EmailSender, SendGridEmailSender, SesEmailSender, VerificationMailer};
use postgres::{PgTokenStore, create_connection_pool, ensure_schema, test_connection};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use verification_tokens::{MemoryTokenStore, TokenLifecycleManager, TokenStore};

const DEFAULT_EVENT_PATH: &str = "event.json";

async fn build_token_store(config: &DispatchConfig) -> anyhow::Result<Arc<dyn TokenStore>> {
    match config.token_store {
        TokenStoreKind::Postgres => {
            let pool = create_connection_pool(&config.database_url)
                .await
                .context("Failed to create database pool")?;
            log::info!("🗃️ Database pool created successfully");

            if let Err(e) = test_connection(&pool).await {
                log::error!("❌ Database connection test failed: {}", e);
            }
            ensure_schema(&pool)
                .await
                .context("Failed to create verification token schema")?;

            Ok(Arc::new(PgTokenStore::new(pool)))
        }
        TokenStoreKind::Memory => {
            log::warn!("🔧 Using in-memory token store, tokens are lost on exit");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
    }
}

async fn build_email_sender(
    config: &DispatchConfig,
    api_key: Option<String>,
) -> Arc<dyn EmailSender> {
    match config.email_provider {
        EmailProvider::SendGrid => {
            if api_key.is_none() {
                log::warn!(
                    "🔧 {} is missing, verification emails will fail to send",
                    config.sendgrid_api_key_var
                );
            }
            let sender =
                SendGridEmailSender::new(api_key.unwrap_or_default(), config.from_email.clone());
            Arc::new(sender)
        }
        EmailProvider::Ses => {
            let sender = SesEmailSender::new(config.from_email.clone()).await;
            log::info!("📧 SES sender initialized");
            Arc::new(sender)
        }
    }
}

async fn read_event(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read event file {}", source))
    }
}

async fn run() -> anyhow::Result<bool> {
    let config = DispatchConfig::from_env()?;
    let api_key = std::env::var(&config.sendgrid_api_key_var).ok();
    config.log_summary(api_key.as_deref());

    let store = build_token_store(&config).await?;
    let sender = build_email_sender(&config, api_key).await;

    let handler = VerificationDispatchHandler::new(
        TokenLifecycleManager::new(store, config.link.clone(), config.token_ttl),
        VerificationMailer::new(sender),
    );

    let source = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_EVENT_PATH.to_string());
    let raw = read_event(&source).await?;

    let response = handler.handle_raw(&raw).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(response.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting verification dispatcher...");

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("❌ Dispatcher failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
