use allerdex_shell::{config::ShellConfig, error::ShellError, shell::Shell};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,allerdex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "shell failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> allerdex_core::Result<(), ShellError> {
    // Load configuration from environment
    let config = ShellConfig::from_env().map_err(|e| ShellError::Configuration {
        details: e.to_string(),
    })?;
    tracing::info!(
        base_url = %config.api.base_url,
        storage_dir = %config.storage_dir.display(),
        "Loaded configuration"
    );

    Shell::new(&config)?.run().await
}
