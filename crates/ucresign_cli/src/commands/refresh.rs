//! One-shot refresh command

use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use ucresign_core::RefreshOutcome;

use crate::cli::AppArgs;
use crate::commands::start;
use crate::utils::create_tokio_runtime;

pub fn run_refresh(args: AppArgs) -> Result<()> {
    let mut config = args.to_config();
    // A single cycle gains nothing from the cache.
    config.source.cache_ttl = Duration::ZERO;

    create_tokio_runtime()?.block_on(async {
        let app = start(config).await?;
        let result = app.center.refresh(&CancellationToken::new()).await;
        app.source.shutdown().await;

        match result.into_diagnostic()? {
            RefreshOutcome::Updated { metadata } => info!(%metadata, "Update center refreshed"),
            outcome => info!(?outcome, "Nothing to publish"),
        }
        let paths = app.center.artifact_paths();
        println!("{}", paths.jsonp.display());
        println!("{}", paths.html.display());
        Ok(())
    })
}
