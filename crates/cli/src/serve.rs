use anyhow::Context;
use std::path::PathBuf;
use structscope_core::{ConfigWatcher, Pipeline, Settings};
use structscope_server::SHUTDOWN_GRACE;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let settings = Settings::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!(
        "Watching {} (debounce {:?})",
        settings.watched_root.display(),
        settings.debounce_interval
    );

    let (config_watcher, settings_rx) = ConfigWatcher::new(&config_path, settings.clone());
    let pipeline = Pipeline::new(settings_rx)?;
    let cancel = pipeline.cancel_token();
    config_watcher.spawn(cancel.clone());

    pipeline
        .start()
        .await
        .with_context(|| format!("watching {}", settings.watched_root.display()))?;

    let listener = TcpListener::bind(&settings.addr)
        .await
        .with_context(|| format!("binding {}", settings.addr))?;
    let server = tokio::spawn(structscope_server::serve(
        pipeline.clone(),
        listener,
        cancel.clone(),
    ));

    shutdown_signal().await;
    info!("Shutdown requested");
    pipeline.shutdown();

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => info!("Server stopped"),
        Ok(Ok(Err(err))) => warn!("Server stopped with error: {}", err),
        Ok(Err(err)) => warn!("Server task failed: {}", err),
        Err(_) => warn!("Connections did not drain within {:?}", SHUTDOWN_GRACE),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
