use std::sync::Arc;

use anyhow::Context;

use mail_restyle::config::AppConfig;
use mail_restyle::llm::{LlmConfig, create_provider};
use mail_restyle::mail::HttpMailTransport;
use mail_restyle::pipeline::{PipelineConfig, RestylePipeline};
use mail_restyle::server::app_routes;
use mail_restyle::store::{LibSqlStyleStore, StyleStore};
use mail_restyle::styles::{StyleApplier, StyleGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    eprintln!("📬 mail-restyle v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Style model:   {}", config.style_model);
    eprintln!("   Restyle model: {}", config.restyle_model);
    eprintln!("   API: http://0.0.0.0:{}", config.port);

    // ── LLM providers ────────────────────────────────────────────────────
    // One cheap/fast model for generating style configs, one stronger model
    // for rewriting whole email bodies.
    let style_llm = create_provider(&LlmConfig {
        backend: config.llm_backend,
        api_key: config.llm_api_key.clone(),
        model: config.style_model.clone(),
    })
    .context("Failed to create style LLM provider")?;

    let restyle_llm = create_provider(&LlmConfig {
        backend: config.llm_backend,
        api_key: config.llm_api_key.clone(),
        model: config.restyle_model.clone(),
    })
    .context("Failed to create restyle LLM provider")?;

    // ── Store ────────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn StyleStore> = Arc::new(
        LibSqlStyleStore::new_local(db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path))?,
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Mail transport ───────────────────────────────────────────────────
    let transport = Arc::new(HttpMailTransport::new(
        config.mail.clone(),
        config.call_timeout,
    ));
    eprintln!(
        "   Mail: fetch via {}, send via SMTP {}:{}, forward to {}",
        config.mail.api_base_url,
        config.mail.smtp_host,
        config.mail.smtp_port,
        config
            .mail
            .forward_to
            .as_deref()
            .unwrap_or("(original sender)"),
    );

    // ── Pipeline + generator ─────────────────────────────────────────────
    let generator = Arc::new(StyleGenerator::new(style_llm, config.call_timeout));
    let applier = StyleApplier::new(restyle_llm, config.call_timeout);
    let pipeline = Arc::new(RestylePipeline::new(
        Arc::clone(&store),
        transport,
        applier,
        PipelineConfig {
            forward_to: config.mail.forward_to.clone(),
            subject_prefix: config.mail.subject_prefix.clone(),
            dedup_retention: config.dedup_retention,
        },
    ));

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = app_routes(store, generator, pipeline);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
