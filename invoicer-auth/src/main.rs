use std::net::SocketAddr;
use std::sync::Arc;

use invoicer_auth::config::{AppConfig, DeliveryBackend};
use invoicer_auth::delivery::{CodeSender, MemoryCodeSender, ResendCodeSender, SmtpCodeSender};
use invoicer_auth::rate_limit::{MemoryRateLimiter, RateLimiter, RedisRateLimiter};
use invoicer_auth::store::{CredentialStore, PgStore};
use invoicer_auth::{router, AppState};
use invoicer_shared::clients::db::create_pool;
use invoicer_shared::clients::email::EmailClient;
use invoicer_shared::clients::redis::RedisClient;
use invoicer_shared::clients::smtp::SmtpMailer;

fn code_sender(config: &AppConfig) -> anyhow::Result<Arc<dyn CodeSender>> {
    let sender: Arc<dyn CodeSender> = match config.delivery_backend() {
        DeliveryBackend::Smtp => Arc::new(SmtpCodeSender::new(SmtpMailer::new(config.smtp_config())?)),
        DeliveryBackend::Resend => Arc::new(ResendCodeSender::new(EmailClient::new(
            &config.resend_api_key,
            &config.from_email,
            &config.from_name,
        ))),
        DeliveryBackend::Console => {
            tracing::warn!("no mail backend configured, otp codes are only logged");
            Arc::new(MemoryCodeSender::new(chrono::Duration::seconds(config.otp_ttl_secs)))
        }
    };
    tracing::info!(backend = ?config.delivery_backend(), "otp delivery configured");
    Ok(sender)
}

async fn rate_limiter(config: &AppConfig) -> anyhow::Result<Arc<dyn RateLimiter>> {
    let limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(url) => Arc::new(RedisRateLimiter::new(
            RedisClient::connect(url).await?,
            config.otp_send_limit,
            config.otp_send_window_secs,
        )),
        None => {
            tracing::warn!("no redis configured, otp throttling is per process");
            Arc::new(MemoryRateLimiter::new(
                config.otp_send_limit,
                config.otp_send_window_secs,
            ))
        }
    };
    Ok(limiter)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    invoicer_shared::middleware::init_tracing("invoicer-auth");
    let metrics = invoicer_shared::middleware::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let store = PgStore::new(pool);
    store.seed_roles()?;

    let sender = code_sender(&config)?;
    let limiter = rate_limiter(&config).await?;

    let state = AppState::new(config, Arc::new(store), sender, limiter);
    let app = router(state, Some(metrics));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "invoicer-auth starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
