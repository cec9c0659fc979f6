pub mod api; // HTTP API
pub mod config;
pub mod core_state; // Session registry + shared inference client
pub mod details; // Placeholder-substituted record view
pub mod models;
pub mod pipeline; // Normalize → extract → enrich → answer
pub mod session; // Per-user card state machine + transcript

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::core_state::CoreState;
use crate::pipeline::inference::{GeminiClient, InferenceClient};

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = serve(settings) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Serve the API until Ctrl-C.
fn serve(settings: Settings) -> Result<(), String> {
    // The blocking HTTP client owns an internal runtime: it must be built
    // and dropped outside tokio.
    let client: Arc<dyn InferenceClient> = Arc::new(
        GeminiClient::from_settings(&settings)
            .map_err(|e| format!("Cannot create inference client: {e}"))?,
    );
    tracing::info!(model = %client.model(), url = %settings.gemini_url, "Inference client ready");

    let core = Arc::new(CoreState::new(
        client,
        Duration::from_secs(settings.session_idle_secs),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Cannot start async runtime: {e}"))?;

    let result = runtime.block_on(async {
        let mut server = api::start_api_server(
            core.clone(),
            settings.bind_addr,
            settings.max_upload_bytes,
        )
        .await?;
        tracing::info!(addr = %server.addr, "Vaccination card assistant listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for shutdown signal: {e}");
        }
        server.shutdown();
        server.stopped().await;
        Ok::<(), String>(())
    });

    drop(runtime);
    drop(core);
    result
}
