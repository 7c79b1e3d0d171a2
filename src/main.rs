//! Visor Matrix HTTP API Server
//!
//! Runs a web server that edits, stores, and uploads frames to an LED
//! visor attached over a serial/USB link.
//!
//! ## Architecture
//! - **Index maps**: built once from the panel geometry before anything
//!   else starts; a wiring mismatch aborts startup
//! - **Device thread** (std::thread): owns the transport, processes commands
//! - **HTTP server** (tokio/axum): accepts API requests, sends commands via channel
//!
//! ## Usage
//! ```sh
//! ./target/release/visor-matrix --device /dev/ttyACM0 --port 8080
//! ```

use clap::Parser;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use visor_matrix::device::{DeviceCommand, DeviceContext, DeviceStatus, device_loop};
use visor_matrix::mapping::IndexMaps;
use visor_matrix::presets::{PresetPaths, PresetStore};
use visor_matrix::server::{self, AppState};
use visor_matrix::transport::{Disconnected, SerialTransport, Transport};
use visor_matrix::{PanelGeometry, Rotation};

/// Visor Matrix HTTP API Server
#[derive(Parser)]
#[command(name = "visor-matrix")]
#[command(about = "HTTP API server for editing and uploading frames to an LED visor")]
#[command(version)]
struct Args {
    /// Serial device the visor is attached to (e.g. /dev/ttyACM0).
    /// Put the port in raw mode first: `stty -F /dev/ttyACM0 115200 raw -echo`
    #[arg(long)]
    device: Option<PathBuf>,

    /// Queue commands for the remote relay even when no device is attached
    #[arg(long)]
    remote_only: bool,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Directory holding the preset files
    #[arg(long, default_value = ".")]
    presets_dir: PathBuf,

    /// Number of LED columns
    #[arg(long, default_value = "32")]
    columns: usize,

    /// Number of LED rows
    #[arg(long, default_value = "8")]
    rows: usize,

    /// Alternate strands run in opposite directions
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    serpentine: bool,

    /// Strands run down columns instead of across rows
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    column_major: bool,

    /// Panel rotation in degrees (0 or 180)
    #[arg(long, default_value = "0")]
    rotation: Rotation,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing subscriber for request logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = PanelGeometry::new(
        args.columns,
        args.rows,
        args.serpentine,
        args.column_major,
        args.rotation,
    );

    // Every frame depends on these maps; a bad geometry must stop startup.
    let maps = Arc::new(
        IndexMaps::build(geometry)
            .map_err(|e| format!("Panel wiring configuration error: {e}"))?,
    );

    tracing::info!("Visor Matrix Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Panel: {}x{} serpentine={} column_major={} rotation={}",
        geometry.columns,
        geometry.rows,
        geometry.serpentine,
        geometry.column_major,
        geometry.rotation.degrees()
    );

    let presets_dir = args.presets_dir.canonicalize().unwrap_or_else(|_| {
        tracing::warn!("Could not canonicalize presets dir, using as-is");
        args.presets_dir.clone()
    });
    tracing::info!("Presets dir: {}", presets_dir.display());
    let presets = PresetStore::load(PresetPaths::in_dir(&presets_dir), maps.clone());

    let transport: Box<dyn Transport> = match &args.device {
        Some(path) => Box::new(
            SerialTransport::open(path)
                .map_err(|e| format!("Failed to open {}: {e}", path.display()))?,
        ),
        None => {
            tracing::warn!("No device given; commands will not reach a visor");
            Box::new(Disconnected)
        }
    };

    // Create the channel for sending commands to the device thread.
    let (tx, rx) = mpsc::channel();

    // Shared status: device thread writes, HTTP handlers read.
    let status = Arc::new(Mutex::new(DeviceStatus::new(
        transport.describe(),
        args.remote_only,
    )));
    let remote_queue = Arc::new(Mutex::new(VecDeque::new()));

    let ctx = DeviceContext {
        status: status.clone(),
        remote_queue: remote_queue.clone(),
    };
    let device_handle = std::thread::spawn(move || device_loop(rx, transport, ctx));

    let app_state = AppState {
        command_tx: tx.clone(),
        status,
        presets: Arc::new(Mutex::new(presets)),
        maps,
        remote_queue,
    };

    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down cleanly.");
        })
        .await?;

    let _ = tx.send(DeviceCommand::Shutdown);
    if device_handle.join().is_err() {
        tracing::error!("Device thread panicked");
    }

    Ok(())
}
