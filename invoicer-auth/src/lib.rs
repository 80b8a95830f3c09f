use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod audit;
pub mod config;
pub mod delivery;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::AppConfig;
use delivery::CodeSender;
use invoicer_shared::tokens::TokenIssuer;
use rate_limit::RateLimiter;
use services::otp_service::OtpPolicy;
use services::{AuthService, OtpService};
use store::AuthStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    #[from_ref(skip)]
    pub config: Arc<AppConfig>,
    #[from_ref(skip)]
    pub store: Arc<dyn AuthStore>,
    #[from_ref(skip)]
    pub auth: AuthService,
    #[from_ref(skip)]
    pub otp: OtpService,
    #[from_ref(skip)]
    pub limiter: Arc<dyn RateLimiter>,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AuthStore>,
        sender: Arc<dyn CodeSender>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.token_settings());
        let policy = OtpPolicy {
            ttl: chrono::Duration::seconds(config.otp_ttl_secs),
            max_attempts: config.otp_max_attempts,
        };

        Self {
            auth: AuthService::new(store.clone(), tokens.clone()),
            otp: OtpService::new(store.clone(), sender, limiter.clone(), policy),
            limiter,
            config: Arc::new(config),
            store,
            tokens,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Full HTTP surface. `/metrics` is mounted only when a recorder is installed.
pub fn router(state: AppState, metrics: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new()
        .route("/auth/register", post(routes::register::register))
        .route("/auth/check-email", post(routes::check_email::check_email))
        .route("/auth/send-otp", post(routes::otp::send_otp))
        .route("/auth/verify-otp", post(routes::otp::verify_otp))
        .route("/auth/reset-password", post(routes::reset_password::reset_password))
        .route("/auth/login", post(routes::login::login))
        .route("/auth/oauth-login", post(routes::oauth::oauth_login))
        .route("/auth/refresh", post(routes::refresh::refresh_token))
        .route("/auth/logout", post(routes::logout::logout))
        .route("/auth/logout-all", post(routes::logout::logout_all))
        .route("/me", get(routes::me::me))
        .route("/me/merchant-status", get(routes::me::merchant_status))
        .layer(axum::middleware::from_fn_with_state(state.clone(), audit::audit_log))
        .route("/health", get(routes::health::health_check));

    if let Some(handle) = metrics {
        app = app
            .route("/metrics", get(move || std::future::ready(handle.render())))
            .route_layer(axum::middleware::from_fn(
                invoicer_shared::middleware::metrics_middleware,
            ));
    }

    app.layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
