use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_core::OnnxOracle;
use vigild::{CameraPipeline, Config, HttpMatchClient, Verifier};

mod dbus_interface;

const BUS_NAME: &str = "org.freedesktop.Vigil1";
const OBJECT_PATH: &str = "/org/freedesktop/Vigil1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    // Models load once at startup (fail-fast); the camera opens per session.
    let oracle = OnnxOracle::from_dir(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    tracing::info!(dir = %config.model_dir.display(), "landmark oracle loaded");

    let pipeline = CameraPipeline::new(
        config.camera_device.clone(),
        config.warmup_frames,
        config.quality,
        Box::new(oracle),
    );
    let matcher = HttpMatchClient::from_config(&config).context("building HTTP client")?;
    let verifier = Verifier::from_config(&config, Arc::new(pipeline), Arc::new(matcher));

    let service = dbus_interface::VigilService::new(
        verifier,
        config.camera_device.clone(),
        config.match_url.clone(),
    );

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("registering {BUS_NAME} on the D-Bus"))?;

    tracing::info!(
        bus = if config.session_bus { "session" } else { "system" },
        camera = %config.camera_device,
        match_url = %config.match_url,
        "vigild ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("vigild shutting down");

    Ok(())
}
