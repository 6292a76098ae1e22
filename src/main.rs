pub mod config;
pub mod connlog;
pub mod decoder;
pub mod link;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod speed;
pub mod ui;

use crate::{
    config::{Config, ConfigStore, FileConfigStore},
    connlog::RollingLog,
    decoder::SensorEvent,
    link::{Command, LinkEvent, SerialLink},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner, TICK_RATE_MS},
    session::{ConnectionMethod, Phase, Session},
};
use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use directories::ProjectDirs;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    sync::mpsc::{self, Sender},
    thread,
    time::{Duration, Instant},
};

/// The connection log keeps this many status lines.
const CONN_LOG_CAPACITY: usize = 5;

/// The raw serial window keeps this many recent lines.
const RAW_WINDOW_CAPACITY: usize = 10;

/// How long the LED indicator stays lit after a pulse.
const LED_FLASH: Duration = Duration::from_millis(300);

/// How long the rider animates after a pulse.
const PEDAL_FLASH: Duration = Duration::from_millis(500);

/// terminal bike race driven by a pedal sensor over a serial link
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal bike race: pedal pulses from a microcontroller over a serial \
                  link move the bike. Race the clock alone or a random-speed rival, or play \
                  without hardware in simulated/manual mode."
)]
pub struct Cli {
    /// serial port of the sensor board (e.g. /dev/ttyUSB0); defaults to the first detected port
    #[clap(short = 'p', long)]
    port: Option<String>,

    /// start connected to the simulated source (no hardware, no spontaneous pulses)
    #[clap(long, conflicts_with = "manual")]
    simulated: bool,

    /// start in manual mode: the space bar is the pedal sensor
    #[clap(long)]
    manual: bool,

    /// list detected serial ports and exit
    #[clap(long)]
    list_ports: bool,
}

/// Everything the binary owns: the session core plus presentation state
/// around it (status lines, LED flash, the live link handle).
pub struct App {
    pub session: Session,
    pub conn_log: RollingLog,
    pub raw_window: RollingLog,
    pub status: String,
    pub sensor_status: String,
    pub led: bool,
    pub last_pulse_at: Option<String>,
    pub detecting: bool,
    led_off_at: Option<Instant>,
    pedal_until: Option<Instant>,
    link: Option<SerialLink>,
    link_tx: Sender<LinkEvent>,
    port_pref: Option<String>,
}

impl App {
    pub fn new(port: Option<String>, link_tx: Sender<LinkEvent>) -> Self {
        Self {
            session: Session::new(),
            conn_log: RollingLog::new(CONN_LOG_CAPACITY),
            raw_window: RollingLog::new(RAW_WINDOW_CAPACITY),
            status: "Ready to connect the sensor board.".into(),
            sensor_status: "Waiting...".into(),
            led: false,
            last_pulse_at: None,
            detecting: false,
            led_off_at: None,
            pedal_until: None,
            link: None,
            link_tx,
            port_pref: port,
        }
    }

    fn log(&mut self, msg: impl AsRef<str>) {
        self.conn_log.push_stamped(msg);
    }

    pub fn is_pedaling(&self) -> bool {
        self.pedal_until.is_some()
    }

    pub fn usb_connected(&self) -> bool {
        self.session.state.connection_method == ConnectionMethod::Usb
    }

    fn connect_usb(&mut self) {
        if self.link.is_some() || self.detecting {
            return;
        }
        self.detecting = true;
        self.status = "Opening serial port...".into();
        self.log("requesting serial port");
        self.link = link::connect(self.port_pref.clone(), self.link_tx.clone());
    }

    fn connect_simulated(&mut self) {
        link::connect_simulated(&self.link_tx);
    }

    fn connect_manual(&mut self) {
        link::connect_manual(&self.link_tx);
    }

    /// Stop schedulers first, then release the transport.
    fn disconnect(&mut self) {
        self.session.disconnected();
        if let Some(link) = self.link.take() {
            link.disconnect();
            self.log("serial port closed");
        }
        self.raw_window.clear();
        self.led = false;
        self.led_off_at = None;
        self.status = "Disconnected.".into();
        self.sensor_status = "Disconnected".into();
    }

    fn start_session(&mut self, multiplayer: bool) {
        self.session.start(multiplayer, Instant::now());
        self.log(if multiplayer {
            "race started: beat the rival!"
        } else {
            "session started: pedal!"
        });
    }

    fn restart(&mut self) {
        self.disconnect();
        self.status = "Reconnect to ride again.".into();
    }

    fn send_command(&mut self, cmd: Command) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match link.send(cmd) {
            Ok(()) => {
                if cmd == Command::TestSensor {
                    self.sensor_status = "Test requested...".into();
                }
                self.log(format!("{} sent", cmd.wire()));
            }
            Err(e) => self.log(format!("error sending {}: {e}", cmd.wire())),
        }
    }

    fn manual_pulse(&mut self) {
        if self.session.state.connection_method != ConnectionMethod::Manual {
            return;
        }
        self.apply_pulse(Instant::now());
    }

    fn apply_pulse(&mut self, now: Instant) {
        self.pedal_until = Some(now + PEDAL_FLASH);
        self.led = true;
        self.led_off_at = Some(now + LED_FLASH);
        self.last_pulse_at = Some(Local::now().format("%H:%M:%S").to_string());
        self.sensor_status = "Pulse!".into();

        match self.session.on_pulse(now) {
            Some(effect) => self.log(format!(
                "pulse {}ms -> {:.0}km/h, +{:.2}m ({:.0}m total)",
                effect.interval_ms,
                effect.speed,
                effect.distance_gained,
                self.session.state.distance
            )),
            None => self.log(format!(
                "pulse outside session ({} lifetime)",
                self.session.state.total_pulse_count
            )),
        }
    }

    fn handle_link_event(&mut self, ev: LinkEvent) {
        match ev {
            LinkEvent::Connected(method) => {
                self.detecting = false;
                self.session.connected(method);
                self.status = match method {
                    ConnectionMethod::Usb => "Sensor board connected. Configuring...".into(),
                    ConnectionMethod::Simulated => {
                        "Simulated mode: virtual sensor connected.".into()
                    }
                    ConnectionMethod::Manual => "Manual mode: the space bar is the pedal.".into(),
                    ConnectionMethod::None => String::new(),
                };
                self.log(format!("connected ({method})"));
            }
            LinkEvent::InitSent => {
                self.status = "Board ready. Waiting for sensor data...".into();
                self.sensor_status = "Sensor ready".into();
                self.log("INIT sent");
            }
            LinkEvent::NoDeviceChosen => {
                self.detecting = false;
                self.status = "No device chosen.".into();
                self.log("no serial port named or detected");
            }
            LinkEvent::ConnectFailed(e) => {
                self.detecting = false;
                self.status = "Connection error. Falling back to simulated mode...".into();
                self.log(format!("error: {e}"));
            }
            LinkEvent::Data { raw, event } => {
                self.raw_window.push(raw.clone());
                self.log(format!("rx \"{raw}\""));
                self.handle_sensor_event(event);
            }
            LinkEvent::CommandFailed(e) => self.log(format!("command failed: {e}")),
            LinkEvent::ReadError(e) => self.log(format!("read error: {e}")),
        }
    }

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Pulse => self.apply_pulse(Instant::now()),
            SensorEvent::DeviceReady => {
                self.status = "Board initialised. Sensor reporting.".into();
                self.sensor_status = "Sensor ready".into();
            }
            SensorEvent::Peripheral { on } => {
                self.led = on;
                self.led_off_at = None;
            }
            SensorEvent::Diagnostic => self.log("board acknowledged test"),
            // raw line already went to the log and the window
            SensorEvent::Unclassified => {}
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        if self.session.on_tick(now) {
            self.log("time! session over");
        }
        if self.led_off_at.is_some_and(|t| now >= t) {
            self.led = false;
            self.led_off_at = None;
            if self.usb_connected() {
                self.sensor_status = "Waiting for sensor...".into();
            }
        }
        if self.pedal_until.is_some_and(|t| now >= t) {
            self.pedal_until = None;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    if cli.list_ports {
        let ports = link::detected_ports();
        if ports.is_empty() {
            println!("no serial ports detected");
        }
        for p in ports {
            println!("{p}");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let saved = store.load();
    let port = cli.port.clone().or_else(|| saved.port.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let app_tx = events.sender();

    // Bridge link traffic into the app channel
    let (link_tx, link_rx) = mpsc::channel::<LinkEvent>();
    thread::spawn(move || {
        for ev in link_rx {
            if app_tx.send(AppEvent::Link(ev)).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(port, link_tx);
    let start_simulated =
        cli.simulated || (!cli.manual && saved.start_mode.as_deref() == Some("simulated"));
    if start_simulated {
        app.connect_simulated();
    } else if cli.manual || saved.start_mode.as_deref() == Some("manual") {
        app.connect_manual();
    }

    let result = start_tui(&mut terminal, &mut app, events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let start_mode = if cli.simulated {
        Some("simulated".to_string())
    } else if cli.manual {
        Some("manual".to_string())
    } else {
        saved.start_mode
    };
    let _ = store.save(&Config {
        port: app.port_pref.clone(),
        start_mode,
    });

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: CrosstermEventSource,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Link(ev) => app.handle_link_event(ev),
            AppEvent::Key(key) => {
                if handle_key(app, key) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match app.session.phase {
        Phase::Idle => match key.code {
            KeyCode::Char('u') => app.connect_usb(),
            KeyCode::Char('s') => app.connect_simulated(),
            KeyCode::Char('m') => app.connect_manual(),
            KeyCode::Char('q') | KeyCode::Esc => return true,
            _ => {}
        },
        Phase::ModeSelect => match key.code {
            KeyCode::Char('1') => app.start_session(false),
            KeyCode::Char('2') => app.start_session(true),
            KeyCode::Char('t') => app.send_command(Command::TestSensor),
            KeyCode::Char('i') => app.send_command(Command::Status),
            KeyCode::Esc => app.disconnect(),
            _ => {}
        },
        Phase::Running => match key.code {
            KeyCode::Char(' ') => app.manual_pulse(),
            KeyCode::Char('t') => app.send_command(Command::TestSensor),
            KeyCode::Char('i') => app.send_command(Command::Status),
            KeyCode::Esc => app.disconnect(),
            _ => {}
        },
        Phase::Ended => match key.code {
            KeyCode::Char('r') | KeyCode::Enter => app.restart(),
            KeyCode::Char('q') | KeyCode::Esc => return true,
            _ => {}
        },
    }

    false
}

/// File-backed logging, opt-in via RUST_LOG. The TUI owns the terminal,
/// so records go to a file under the platform data dir.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let Some(pd) = ProjectDirs::from("", "", "pedal-race") else {
        return;
    };
    let dir = pd.data_dir();
    if std::fs::create_dir_all(dir).is_err() {
        return;
    }
    if let Ok(file) = std::fs::File::create(dir.join("pedal-race.log")) {
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
}
