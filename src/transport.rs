//! Byte transports between this process and the visor.
//!
//! ## Rust concepts
//! - A trait as a capability interface, used through `Box<dyn Transport>`
//! - `File::try_clone()` to read and write one device from two threads
//! - `std::sync::mpsc` to hand bytes from a blocking reader to a poller

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Something that can carry protocol bytes to and from the device.
///
/// # Rust concept: trait objects
/// The device thread holds a `Box<dyn Transport>` and never needs to know
/// which link it is talking over.
pub trait Transport: Send {
    /// Write all of `bytes` to the device.
    fn send_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Return whatever bytes have arrived since the last call, without blocking.
    fn receive_bytes(&mut self) -> io::Result<Vec<u8>>;

    /// Whether the link is currently usable.
    fn is_ready(&self) -> bool;

    /// Short description for status and logs.
    fn describe(&self) -> String;
}

// ── Serial device ────────────────────────────────────────────────────

/// A serial or USB CDC character device (e.g. `/dev/ttyACM0`).
///
/// The port must be configured before opening: baud rate, raw mode and
/// no echo, e.g. `stty -F /dev/ttyACM0 115200 raw -echo`. Without
/// `-echo` the kernel echoes every device line back to the visor.
/// A background thread performs the blocking reads.
pub struct SerialTransport {
    path: PathBuf,
    writer: File,
    incoming: Receiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
}

impl SerialTransport {
    pub fn open(path: &Path) -> io::Result<Self> {
        let writer = OpenOptions::new().read(true).write(true).open(path)?;
        let reader = writer.try_clone()?;
        let connected = Arc::new(AtomicBool::new(true));
        let (tx, incoming) = mpsc::channel();

        let reader_connected = connected.clone();
        let reader_path = path.display().to_string();
        thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || read_loop(reader, tx, reader_connected, reader_path))?;

        tracing::info!("Opened serial device {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            incoming,
            connected,
        })
    }
}

fn read_loop(
    mut reader: File,
    tx: mpsc::Sender<Vec<u8>>,
    connected: Arc<AtomicBool>,
    path: String,
) {
    let mut buf = [0u8; 512];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                tracing::warn!("Serial device {} closed", path);
                break;
            }
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!("Serial read from {} failed: {}", path, e);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

impl Transport for SerialTransport {
    fn send_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.is_ready() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "Not connected"));
        }
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn receive_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            match self.incoming.try_recv() {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(bytes)
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.path.display())
    }
}

// ── No device ────────────────────────────────────────────────────────

/// Placeholder used when no device is attached (remote-only mode).
#[derive(Debug, Default)]
pub struct Disconnected;

impl Transport for Disconnected {
    fn send_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "Not connected"))
    }

    fn receive_bytes(&mut self) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}
