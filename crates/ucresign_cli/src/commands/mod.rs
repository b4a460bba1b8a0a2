pub mod refresh;
pub mod serve;
pub mod verify;

use std::sync::Arc;

use miette::{IntoDiagnostic, Result, WrapErr};
use ucresign_core::{AppConfig, SourceHandle, UpdateCenter};

/// Everything a refresh needs, assembled from configuration.
pub struct App {
    pub config: AppConfig,
    pub source: SourceHandle,
    pub center: Arc<UpdateCenter>,
}

/// Validate `config`, load the signing material and open the source.
pub async fn start(config: AppConfig) -> Result<App> {
    config.validate().into_diagnostic()?;
    config.prepare_data_dir().into_diagnostic()?;

    let signer = config
        .signer
        .load()
        .into_diagnostic()
        .wrap_err("Failed to load signing material")?;
    let patchers = config.patch.patchers().into_diagnostic()?;
    let source = config
        .source
        .open(&config.data_dir)
        .await
        .into_diagnostic()
        .wrap_err("Failed to open update-center source")?;

    let center = Arc::new(UpdateCenter::new(
        config.data_dir.clone(),
        config.source.fetch_timeout,
        source.provider(),
        Arc::new(signer),
        patchers,
    ));

    Ok(App {
        config,
        source,
        center,
    })
}
