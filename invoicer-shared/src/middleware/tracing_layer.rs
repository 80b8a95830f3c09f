use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `INVOICER_ENV=production` switches to JSON output.
pub fn init_tracing(service_name: &str) {
    // Crate targets use underscores even when the package name has dashes.
    let target = service_name.replace('-', "_");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("info,{target}=debug,invoicer_shared=debug,tower_http=info"))
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_production = std::env::var("INVOICER_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    if is_production {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!(service = service_name, "tracing initialized");
}
