use crate::decoder::{self, SensorEvent};
use crate::session::ConnectionMethod;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Fixed transport parameters: 115200 8N1, no flow control.
pub const BAUD_RATE: u32 = 115_200;

/// The board is polled for new bytes on this schedule.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Upper bound on a single read attempt. Expiring is not an error; the
/// next poll simply tries again.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Settle time between opening the port and sending INIT.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Wait before the one-shot fallback to the simulated source.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(2000);

/// Outbound commands the board understands, newline-terminated on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    TestSensor,
    Status,
}

impl Command {
    pub fn wire(&self) -> &'static str {
        match self {
            Command::Init => "INIT",
            Command::TestSensor => "TEST_SENSOR",
            Command::Status => "STATUS",
        }
    }
}

/// Everything a pulse source can tell the app, real or otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A source is attached and producing events.
    Connected(ConnectionMethod),
    /// INIT went out after the settle delay; the board is game-ready.
    InitSent,
    /// No port was named and none could be detected. Stays disconnected.
    NoDeviceChosen,
    /// The transport would not open; the simulated fallback is scheduled.
    ConnectFailed(String),
    /// One decoded line from the board.
    Data { raw: String, event: SensorEvent },
    /// A write to the board failed. Logged, never fatal.
    CommandFailed(String),
    /// A non-timeout read failure. Logged, the poll loop keeps going.
    ReadError(String),
}

/// Pick the port to open: an explicitly named one wins, otherwise the
/// first detected port, otherwise nothing ("no device chosen").
pub fn resolve_port(explicit: Option<String>, detected: &[String]) -> Option<String> {
    explicit.or_else(|| detected.first().cloned())
}

/// Names of the serial ports currently present on the system.
pub fn detected_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

/// Split every complete line out of `buffer`, leaving a partial tail for
/// the next read. Lines are trimmed; blank ones are dropped.
pub fn drain_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.find(|c| c == '\r' || c == '\n') {
        let line = buffer[..pos].trim().to_string();
        buffer.drain(..=pos);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// A live serial connection: a background poll thread feeding decoded
/// events into the channel, plus a writer for outbound commands.
pub struct SerialLink {
    writer: Box<dyn SerialPort>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialLink {
    fn spawn(port: Box<dyn SerialPort>, tx: Sender<LinkEvent>) -> serialport::Result<Self> {
        let writer = port.try_clone()?;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = thread::spawn({
            let stop = Arc::clone(&stop);
            move || read_loop(port, tx, stop)
        });
        Ok(Self {
            writer,
            stop,
            reader: Some(reader),
        })
    }

    /// Send one command, newline-terminated.
    pub fn send(&mut self, cmd: Command) -> io::Result<()> {
        self.writer.write_all(cmd.wire().as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Tear down in order: stop the poll thread, then release the port.
    pub fn disconnect(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Stop the poll loop before the port goes away, so a late tick
        // can never touch a closed connection
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open the real transport and start polling it. On failure anything but
/// a missing device falls back to the simulated source, once, after
/// [`FALLBACK_DELAY`].
pub fn connect(port: Option<String>, tx: Sender<LinkEvent>) -> Option<SerialLink> {
    connect_with(port, FALLBACK_DELAY, tx)
}

pub(crate) fn connect_with(
    port: Option<String>,
    fallback_delay: Duration,
    tx: Sender<LinkEvent>,
) -> Option<SerialLink> {
    let Some(path) = resolve_port(port, &detected_ports()) else {
        log::warn!("no serial port named or detected");
        let _ = tx.send(LinkEvent::NoDeviceChosen);
        return None;
    };

    match open_port(&path) {
        Ok(port) => match SerialLink::spawn(port, tx.clone()) {
            Ok(link) => {
                log::info!("serial port {path} open");
                let _ = tx.send(LinkEvent::Connected(ConnectionMethod::Usb));
                Some(link)
            }
            Err(e) => {
                fail_and_fall_back(e.to_string(), fallback_delay, tx);
                None
            }
        },
        Err(e) => {
            fail_and_fall_back(e.to_string(), fallback_delay, tx);
            None
        }
    }
}

/// The simulated source: connected immediately, no transport, no
/// spontaneous pulses.
pub fn connect_simulated(tx: &Sender<LinkEvent>) {
    let _ = tx.send(LinkEvent::Connected(ConnectionMethod::Simulated));
}

/// The manual source: pulses come from the player's keyboard only.
pub fn connect_manual(tx: &Sender<LinkEvent>) {
    let _ = tx.send(LinkEvent::Connected(ConnectionMethod::Manual));
}

fn open_port(path: &str) -> serialport::Result<Box<dyn SerialPort>> {
    serialport::new(path, BAUD_RATE)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()
}

fn fail_and_fall_back(error: String, delay: Duration, tx: Sender<LinkEvent>) {
    log::warn!("serial connection failed: {error}");
    let _ = tx.send(LinkEvent::ConnectFailed(error));
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = tx.send(LinkEvent::Connected(ConnectionMethod::Simulated));
    });
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: Sender<LinkEvent>, stop: Arc<AtomicBool>) {
    let opened_at = Instant::now();
    let mut init_sent = false;
    let mut pending = String::new();
    let mut buf = [0u8; 256];

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(POLL_INTERVAL);
        if stop.load(Ordering::Relaxed) {
            break;
        }

        if !init_sent && opened_at.elapsed() >= SETTLE_DELAY {
            init_sent = true;
            let written = port
                .write_all(Command::Init.wire().as_bytes())
                .and_then(|()| port.write_all(b"\n"))
                .and_then(|()| port.flush());
            let ev = match written {
                Ok(()) => LinkEvent::InitSent,
                Err(e) => LinkEvent::CommandFailed(format!("INIT: {e}")),
            };
            if tx.send(ev).is_err() {
                return;
            }
        }

        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                for raw in drain_lines(&mut pending) {
                    let event = decoder::classify(&raw);
                    if tx.send(LinkEvent::Data { raw, event }).is_err() {
                        return;
                    }
                }
            }
            // An expired read is "no data this tick", never an error
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                if tx.send(LinkEvent::ReadError(e.to_string())).is_err() {
                    return;
                }
            }
        }
    }
}
