mod bridge;
mod handlers;
mod routes;

use anyhow::{Context, Result};
use compilebot_common::config::BotConfig;
use compilebot_pipeline::{
    CompilerCatalog, Fixer, GradingValidator, Pipeline, RemoteCompilationClient,
    WebhookCompileLog,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::bridge::BridgePlatform;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("CompileBot API booting...");

    let config = BotConfig::from_env();
    let http = reqwest::Client::builder()
        .user_agent(concat!("compilebot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let catalog = CompilerCatalog::load_or_fetch(
        &config.compilers_file,
        &http,
        &config.compiler_list_url,
    )
    .await
    .context("Failed to build compiler catalog")?;
    info!(
        compilers = catalog.len(),
        languages = catalog.languages().len(),
        "Compiler catalog ready"
    );

    let validator = GradingValidator::from_config(&config, &http).await;
    info!(levels = validator.levels().len(), "Grading dataset ready");

    let backend = Arc::new(RemoteCompilationClient::new(
        http.clone(),
        config.backend_url.clone(),
        config.request_timeout,
    ));
    let platform = Arc::new(
        BridgePlatform::new(
            http.clone(),
            &config.bridge_url,
            config.token.clone(),
            config.request_timeout,
        )
        .context("Failed to configure platform bridge")?,
    );

    let mut pipeline = Pipeline::new(
        config.prefix.clone(),
        Arc::new(catalog),
        Arc::new(validator),
        backend,
        platform,
    )
    .with_fixer(Fixer::new(config.max_fix_attempts))
    .with_loading_emote(config.loading_emote.clone())
    .with_http(http.clone(), config.fetch_timeout);

    if let Some(url) = &config.compile_log_url {
        info!(url = %url, "Compile log enabled");
        pipeline = pipeline.with_compile_log(Arc::new(WebhookCompileLog::new(
            http.clone(),
            url.clone(),
            config.token.clone(),
            config.request_timeout,
        )));
    }

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
    });

    // Build router
    let app = routes::routes().with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);
    info!(prefix = %config.prefix, "Ready to accept events");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
