use anyhow::Context;
use tenant_portal::config::AppConfig;
use tenant_portal::server::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    eprintln!("Tenant Portal v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.bind_addr);
    eprintln!("   Root domain: {}", config.domain.root_domain);
    eprintln!(
        "   Locales: {} (default {})",
        config.locale.locales.join(", "),
        config.locale.default_locale
    );
    eprintln!("   Identity backend: {}", config.identity.url);

    let app = build_app(&config).context("building application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Portal server started");
    axum::serve(listener, app).await?;

    Ok(())
}
