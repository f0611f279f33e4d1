//! Telemetry link handling with automatic backoff bookkeeping.
//!
//! The microcontroller streams line-oriented frames over a serial device
//! node. [`LinkReader`] owns the connection lifecycle: open the port, read
//! one frame at a time, fall back to disconnected on I/O failure, and track
//! the exponential backoff the monitoring loop sleeps between reconnect
//! attempts.
//!
//! The port itself hides behind the [`LinkTransport`] / [`LinkPort`] traits
//! so tests drive the reader with [`MockTransport`] instead of hardware.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};

use hygrobot_types::Reading;

use crate::error::{Error, Result};
use crate::parse::parse_frame;

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Device node path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Baud rate the host configures the port with.
    pub baud_rate: u32,
    /// How long a single frame read waits before reporting no data.
    pub timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Connection state and reconnect backoff bookkeeping.
///
/// Not persisted; lives for the process lifetime inside [`LinkReader`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkState {
    /// Whether the port is currently open and delivering data.
    pub is_connected: bool,
    /// Timestamp of the last successfully parsed reading.
    pub last_successful_read: Option<OffsetDateTime>,
    /// Consecutive failed connect attempts since the last success.
    pub reconnect_attempts: u32,
    /// Current reconnect delay, `2^attempts` seconds clamped to `[1, 60]`.
    pub backoff_delay: Duration,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            is_connected: false,
            last_successful_read: None,
            reconnect_attempts: 0,
            backoff_delay: Duration::from_secs(1),
        }
    }
}

impl LinkState {
    const MAX_BACKOFF: Duration = Duration::from_secs(60);

    fn calculate_backoff(&self) -> Duration {
        let secs = 2u64
            .checked_pow(self.reconnect_attempts)
            .map_or(Self::MAX_BACKOFF, Duration::from_secs);
        secs.clamp(Duration::from_secs(1), Self::MAX_BACKOFF)
    }

    /// Reset backoff after a successful connect.
    pub fn reset_backoff(&mut self) {
        self.reconnect_attempts = 0;
        self.backoff_delay = Duration::from_secs(1);
        self.is_connected = true;
    }

    /// Bump backoff after a failed connect.
    pub fn increment_backoff(&mut self) {
        self.reconnect_attempts += 1;
        self.backoff_delay = self.calculate_backoff();
        self.is_connected = false;
    }
}

/// Opens ports. Implemented by [`SerialTransport`] for hardware and
/// [`MockTransport`] for tests.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    /// Open the configured port.
    async fn open(&self, config: &LinkConfig) -> Result<Box<dyn LinkPort>>;
}

/// One open telemetry port.
#[async_trait]
pub trait LinkPort: Send + Sync {
    /// Read one frame. An empty buffer means no data arrived within the
    /// configured timeout; that is not an error.
    async fn read_frame(&mut self) -> Result<Vec<u8>>;

    /// Close the port. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Production transport reading the serial device node as a byte stream.
///
/// Blocking reads run on a dedicated thread feeding an mpsc channel, so a
/// stalled port never blocks the async runtime. Port setup (baud rate,
/// termios) is expected to be done by the host before the service starts.
#[derive(Debug, Default)]
pub struct SerialTransport;

#[async_trait]
impl LinkTransport for SerialTransport {
    async fn open(&self, config: &LinkConfig) -> Result<Box<dyn LinkPort>> {
        let path = config.port.clone();
        let file = tokio::task::spawn_blocking(move || std::fs::File::open(&path))
            .await
            .map_err(|join_err| Error::ConnectionFailed {
                port: config.port.clone(),
                reason: join_err.to_string(),
            })?
            .map_err(|io_err| Error::ConnectionFailed {
                port: config.port.clone(),
                reason: io_err.to_string(),
            })?;

        let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(16);
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader_shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("hygrobot-link-read".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(file);
                let mut line = Vec::new();
                while !reader_shutdown.load(Ordering::Relaxed) {
                    line.clear();
                    let result = reader.read_until(b'\n', &mut line);
                    let message = match result {
                        Ok(0) => Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)),
                        Ok(_) => Ok(line.clone()),
                        Err(err) => Err(err),
                    };
                    let failed = message.is_err();
                    if tx.blocking_send(message).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(Error::Io)?;

        Ok(Box::new(SerialPort {
            rx,
            shutdown,
            timeout: config.timeout,
        }))
    }
}

struct SerialPort {
    rx: mpsc::Receiver<std::io::Result<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
    timeout: Duration,
}

#[async_trait]
impl LinkPort for SerialPort {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Err(_elapsed) => Ok(Vec::new()),
            Ok(Some(Ok(bytes))) => Ok(bytes),
            Ok(Some(Err(io_err))) => Err(Error::Io(io_err)),
            Ok(None) => Err(Error::NotConnected),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        self.rx.close();
        Ok(())
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Reads telemetry frames and tracks connection health.
///
/// Shared via `Arc`: the monitoring loop drives reads while command and API
/// handlers consume [`LinkReader::latest_reading`].
pub struct LinkReader {
    config: LinkConfig,
    transport: Arc<dyn LinkTransport>,
    port: RwLock<Option<Box<dyn LinkPort>>>,
    state: RwLock<LinkState>,
    latest: RwLock<Option<Reading>>,
}

impl LinkReader {
    /// Create a reader over the given transport. No I/O happens until
    /// [`LinkReader::connect`].
    pub fn new(transport: Arc<dyn LinkTransport>, config: LinkConfig) -> Self {
        Self {
            config,
            transport,
            port: RwLock::new(None),
            state: RwLock::new(LinkState::default()),
            latest: RwLock::new(None),
        }
    }

    /// Try to open the port. Returns whether the link is now connected;
    /// a failure bumps the backoff instead of propagating.
    pub async fn connect(&self) -> bool {
        info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "connecting to sensor link"
        );
        match self.transport.open(&self.config).await {
            Ok(port) => {
                *self.port.write().await = Some(port);
                self.state.write().await.reset_backoff();
                info!(port = %self.config.port, "sensor link connected");
                true
            }
            Err(err) => {
                let mut state = self.state.write().await;
                state.increment_backoff();
                error!(
                    port = %self.config.port,
                    attempts = state.reconnect_attempts,
                    backoff = ?state.backoff_delay,
                    error = %err,
                    "failed to connect to sensor link"
                );
                false
            }
        }
    }

    /// Close the port if open. Idempotent.
    pub async fn disconnect(&self) {
        if let Some(mut port) = self.port.write().await.take() {
            if let Err(err) = port.close().await {
                warn!(error = %err, "error closing sensor link");
            }
            self.state.write().await.is_connected = false;
            info!("sensor link disconnected");
        }
    }

    /// Read and parse one frame.
    ///
    /// Returns `None` when disconnected, when no data arrived within the
    /// timeout, or when the frame did not parse. An I/O error drops the
    /// connection so the monitoring loop reconnects with backoff.
    pub async fn read_sensor_data(&self) -> Option<Reading> {
        let mut port_guard = self.port.write().await;
        let port = port_guard.as_mut()?;

        match port.read_frame().await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => {
                let line = String::from_utf8_lossy(&bytes);
                let reading = parse_frame(&line)?;
                debug!(
                    humidity = reading.humidity,
                    dht = reading.dht_temperature,
                    "read sensor frame"
                );
                let mut state = self.state.write().await;
                state.last_successful_read = Some(reading.timestamp);
                state.is_connected = true;
                drop(state);
                *self.latest.write().await = Some(reading.clone());
                Some(reading)
            }
            Err(err) => {
                error!(error = %err, "sensor link read failed");
                *port_guard = None;
                self.state.write().await.is_connected = false;
                None
            }
        }
    }

    /// Most recent successfully parsed reading, surviving later read failures.
    pub async fn latest_reading(&self) -> Option<Reading> {
        self.latest.read().await.clone()
    }

    /// Whether the port is currently open.
    pub async fn is_connected(&self) -> bool {
        self.port.read().await.is_some()
    }

    /// Current reconnect delay.
    pub async fn backoff_delay(&self) -> Duration {
        self.state.read().await.backoff_delay
    }

    /// Snapshot of the connection state.
    pub async fn state(&self) -> LinkState {
        self.state.read().await.clone()
    }
}

/// Scripted frames for [`MockPort`].
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// A line of telemetry.
    Line(String),
    /// No data within the read timeout.
    Silence,
    /// An I/O fault that tears down the connection.
    Fault,
}

/// Mock transport for testing without hardware.
///
/// Frames pushed onto the transport are served in order by every port it
/// opens; connect failures can be injected up front.
#[derive(Debug, Default)]
pub struct MockTransport {
    frames: Arc<Mutex<VecDeque<MockFrame>>>,
    connect_failures: AtomicU32,
    opened: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a telemetry line.
    pub async fn push_line(&self, line: impl Into<String>) {
        self.frames.lock().await.push_back(MockFrame::Line(line.into()));
    }

    /// Queue a read that yields no data.
    pub async fn push_silence(&self) {
        self.frames.lock().await.push_back(MockFrame::Silence);
    }

    /// Queue an I/O fault.
    pub async fn push_fault(&self) {
        self.frames.lock().await.push_back(MockFrame::Fault);
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// How many ports were opened so far.
    pub fn open_count(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkTransport for MockTransport {
    async fn open(&self, config: &LinkConfig) -> Result<Box<dyn LinkPort>> {
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::ConnectionFailed {
                port: config.port.clone(),
                reason: "mock connect failure".to_string(),
            });
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPort {
            frames: Arc::clone(&self.frames),
        }))
    }
}

/// Port side of [`MockTransport`].
pub struct MockPort {
    frames: Arc<Mutex<VecDeque<MockFrame>>>,
}

#[async_trait]
impl LinkPort for MockPort {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        match self.frames.lock().await.pop_front() {
            Some(MockFrame::Line(line)) => Ok(line.into_bytes()),
            Some(MockFrame::Silence) | None => Ok(Vec::new()),
            Some(MockFrame::Fault) => Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            ))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
