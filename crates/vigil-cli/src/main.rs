use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil_core::quality::{self, QualityConfig};
use vigil_core::{compute_features, LandmarkOracle, OnnxOracle};
use vigil_hw::{Camera, FrameSource};

#[zbus::proxy(
    interface = "org.freedesktop.Vigil1",
    default_service = "org.freedesktop.Vigil1",
    default_path = "/org/freedesktop/Vigil1"
)]
trait Vigil {
    async fn start_session(&self, voter_id: &str) -> zbus::Result<String>;
    async fn cancel(&self, session_id: &str) -> zbus::Result<bool>;
    async fn await_result(&self, session_id: &str) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil liveness verification CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session_bus: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a liveness verification for a voter and wait for the result
    Verify {
        /// Claimed voter ID
        voter_id: String,
    },
    /// Cancel a running session
    Cancel {
        /// Session ID returned by `verify`
        session_id: String,
    },
    /// Show daemon status
    Status,
    /// List V4L2 capture devices
    Devices,
    /// Camera + landmark diagnostics (bypasses the daemon)
    Test {
        /// V4L2 device path
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Number of frames to analyse
        #[arg(short, long, default_value_t = 30)]
        frames: usize,
        /// Directory holding the ONNX models
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { voter_id } => {
            let proxy = connect(cli.session_bus).await?;
            let session_id = proxy.start_session(&voter_id).await?;
            tracing::debug!(session = %session_id, voter_id = %voter_id, "verification started");
            println!("Session {session_id} started. Look at the camera, blink, then smile.");

            let result = tokio::select! {
                r = proxy.await_result(&session_id) => r?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(session = %session_id, "interrupted; cancelling session");
                    proxy.cancel(&session_id).await?;
                    proxy.await_result(&session_id).await?
                }
            };
            print_result(&result)?;
        }
        Commands::Cancel { session_id } => {
            let proxy = connect(cli.session_bus).await?;
            tracing::debug!(session = %session_id, "cancel requested");
            if proxy.cancel(&session_id).await? {
                println!("Session {session_id} cancelled");
            } else {
                println!("Session {session_id} had already finished");
            }
        }
        Commands::Status => {
            let proxy = connect(cli.session_bus).await?;
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Test {
            device,
            frames,
            model_dir,
        } => run_diagnostics(&device, frames, model_dir)?,
    }

    Ok(())
}

async fn connect(session_bus: bool) -> Result<VigilProxy<'static>> {
    let conn = if session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("connecting to D-Bus")?;
    VigilProxy::new(&conn)
        .await
        .context("vigild is not reachable on the bus")
}

fn print_result(json: &str) -> Result<()> {
    let result: serde_json::Value = serde_json::from_str(json)?;
    match result["status"].as_str() {
        Some("accepted") => println!(
            "Verified (match confidence {:.1}%)",
            result["matchScore"].as_f64().unwrap_or_default()
        ),
        Some(status) => println!(
            "Not verified: {status} ({})",
            result["reasonCode"].as_str().unwrap_or("unknown")
        ),
        None => println!("{json}"),
    }
    Ok(())
}

/// Open the camera directly and print per-frame features.
fn run_diagnostics(device: &str, frames: usize, model_dir: Option<PathBuf>) -> Result<()> {
    let model_dir = model_dir.unwrap_or_else(vigil_core::default_model_dir);
    println!("Loading models from {}", model_dir.display());
    let mut oracle = OnnxOracle::from_dir(&model_dir)?;
    tracing::debug!(dir = %model_dir.display(), "models loaded");

    let mut camera = Camera::open(device)?;
    println!("Camera {device}: {}x{}", camera.width, camera.height);

    let gate = QualityConfig::default();
    let mut faces = 0usize;
    for i in 0..frames {
        let frame = camera.next_frame()?;
        let q = quality::assess(&frame.data, frame.width, frame.height, &gate);
        let features = oracle
            .detect(&frame.data, frame.width, frame.height)?
            .map(|l| compute_features(&l));

        let summary = match features {
            Some(Ok(f)) => {
                faces += 1;
                let brow = f
                    .brow_raise
                    .map_or_else(|| "-".to_string(), |r| format!("{r:.3}"));
                let raised = if f.brows_raised() { " BROWS" } else { "" };
                format!("ear={:.3} smile={:.3} brow={brow}{raised}", f.ear, f.smile_ratio)
            }
            Some(Err(_)) => "face found, degenerate landmarks".to_string(),
            None => "no face".to_string(),
        };
        println!(
            "frame {i:>3}: luma={:>5.1} sharpness={:>7.1}{}{}  {summary}",
            q.mean_luma,
            q.sharpness,
            if q.dark { " DARK" } else { "" },
            if q.blurry { " BLURRY" } else { "" },
        );
    }
    println!("{faces}/{frames} frames with a usable face");
    Ok(())
}
