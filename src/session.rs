use crate::scheduler::{Scheduler, Task};
use crate::speed;
use rand::Rng;
use std::time::{Duration, Instant};

/// Length of one timed play-through.
pub const SESSION_SECS: u32 = 60;

/// Countdown and rival ticks both run at 1 Hz.
const TIMER_INTERVAL: Duration = Duration::from_secs(1);

/// Coasting: the speed decays once per second of pulse silence.
const DECAY_DELAY: Duration = Duration::from_secs(1);

/// Below this the decayed speed snaps to zero and the decay task stops.
const DECAY_FLOOR_KMH: f64 = 0.1;

/// The rival draws a fresh speed in [0, 40) km/h every second.
const RIVAL_MAX_SPEED_KMH: f64 = 40.0;

/// Distances closer than this count as a tie.
const TIE_MARGIN_M: f64 = 1.0;

/// How the pulse source is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionMethod {
    None,
    Usb,
    Simulated,
    Manual,
}

/// Screen-level lifecycle of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ModeSelect,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Tie,
    Loss,
}

/// Shared game state, owned by the session and mutated only through it.
#[derive(Debug)]
pub struct GameState {
    pub device_detected: bool,
    pub speed: f64,
    pub distance: f64,
    pub average_speed: f64,
    pub final_distance: f64,
    pub rival_distance: f64,
    pub rival_speed: f64,
    pub active: bool,
    pub connection_method: ConnectionMethod,
    pub is_multiplayer: bool,
    /// Pulses landed while a session was active.
    pub pulse_count: u32,
    pub last_pulse: Instant,
    /// Pulses seen across the whole process lifetime. Never resets.
    pub total_pulse_count: u64,
}

impl GameState {
    fn new() -> Self {
        Self {
            device_detected: false,
            speed: 0.0,
            distance: 0.0,
            average_speed: 0.0,
            final_distance: 0.0,
            rival_distance: 0.0,
            rival_speed: 0.0,
            active: false,
            connection_method: ConnectionMethod::None,
            is_multiplayer: false,
            pulse_count: 0,
            last_pulse: Instant::now(),
            total_pulse_count: 0,
        }
    }
}

/// What a single pulse did to the game, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseEffect {
    pub interval_ms: u64,
    pub speed: f64,
    pub distance_gained: f64,
}

/// Owns the game state and every logical timer. All mutation funnels
/// through `on_pulse` / `on_tick` on the main thread, which keeps each
/// update atomic with respect to the others.
#[derive(Debug)]
pub struct Session {
    pub state: GameState,
    pub phase: Phase,
    pub seconds_remaining: u32,
    scheduler: Scheduler,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: GameState::new(),
            phase: Phase::Idle,
            seconds_remaining: SESSION_SECS,
            scheduler: Scheduler::new(),
        }
    }

    /// Idle -> ModeSelect, on any successful connection.
    pub fn connected(&mut self, method: ConnectionMethod) {
        self.state.device_detected = true;
        self.state.connection_method = method;
        if self.phase == Phase::Idle {
            self.phase = Phase::ModeSelect;
        }
    }

    /// Back to a disconnected idle state. Cumulative counters survive.
    pub fn disconnected(&mut self) {
        self.scheduler.cancel_all();
        self.state.device_detected = false;
        self.state.connection_method = ConnectionMethod::None;
        self.state.active = false;
        self.phase = Phase::Idle;
    }

    /// ModeSelect -> Running: fix the mode, zero the per-session fields
    /// and arm the timers.
    pub fn start(&mut self, multiplayer: bool, now: Instant) {
        self.state.active = true;
        self.state.is_multiplayer = multiplayer;
        self.state.speed = 0.0;
        self.state.distance = 0.0;
        self.state.rival_distance = 0.0;
        self.state.rival_speed = 0.0;
        self.state.pulse_count = 0;
        self.state.last_pulse = now;
        self.seconds_remaining = SESSION_SECS;
        self.phase = Phase::Running;

        self.scheduler
            .schedule_repeating(Task::Countdown, TIMER_INTERVAL, now);
        if multiplayer {
            self.scheduler
                .schedule_repeating(Task::Rival, TIMER_INTERVAL, now);
        }
        log::info!(
            "session started ({})",
            if multiplayer { "multiplayer" } else { "single" }
        );
    }

    /// One pulse from any source. Always counted in the lifetime total;
    /// only moves the bike while a session is active.
    pub fn on_pulse(&mut self, now: Instant) -> Option<PulseEffect> {
        self.state.total_pulse_count += 1;

        if !self.state.active {
            return None;
        }

        let interval_ms = now.duration_since(self.state.last_pulse).as_millis() as u64;
        let new_speed = speed::speed_from_interval(interval_ms);
        let gained = speed::distance_increment(new_speed);

        self.state.speed = new_speed;
        self.state.distance += gained;
        self.state.pulse_count += 1;
        self.state.last_pulse = now;

        // Speed changed: coasting decay restarts from this moment
        self.scheduler.schedule(Task::Decay, DECAY_DELAY, now);

        Some(PulseEffect {
            interval_ms,
            speed: new_speed,
            distance_gained: gained,
        })
    }

    /// Drives all logical timers. Call from the app tick (100ms); returns
    /// true when this tick ended the session.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let mut ended = false;
        for task in self.scheduler.fire(now) {
            match task {
                Task::Countdown => {
                    self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
                    if self.seconds_remaining == 0 && self.state.active {
                        self.end();
                        ended = true;
                    }
                }
                Task::Rival => {
                    let rival_speed = rand::thread_rng().gen_range(0.0..RIVAL_MAX_SPEED_KMH);
                    self.rival_advance(rival_speed);
                }
                Task::Decay => self.decay(now),
            }
        }
        ended
    }

    /// One second of rival travel at the given speed.
    fn rival_advance(&mut self, speed_kmh: f64) {
        self.state.rival_speed = speed_kmh;
        self.state.rival_distance += speed_kmh / 3.6;
    }

    /// Coasting: shave 5% off the speed, then keep decaying until the
    /// speed reaches the floor or a new pulse re-arms the timer.
    fn decay(&mut self, now: Instant) {
        if !self.state.active || self.state.speed <= 0.0 {
            return;
        }
        self.state.speed *= speed::DECAY_FACTOR;
        if self.state.speed < DECAY_FLOOR_KMH {
            self.state.speed = 0.0;
        } else {
            self.scheduler.schedule(Task::Decay, DECAY_DELAY, now);
        }
    }

    /// Running -> Ended: freeze the results and stop every timer.
    fn end(&mut self) {
        self.state.active = false;
        self.state.final_distance = self.state.distance.round();
        self.state.average_speed = if self.state.pulse_count > 0 {
            (self.state.distance / f64::from(SESSION_SECS) * 3.6).round()
        } else {
            0.0
        };
        self.scheduler.cancel_all();
        self.phase = Phase::Ended;
        log::info!(
            "session ended: {}m, avg {}km/h, {} pulses",
            self.state.final_distance,
            self.state.average_speed,
            self.state.pulse_count
        );
    }

    /// Ended -> Idle, on user request. Requires a fresh connection but
    /// keeps the lifetime pulse counter.
    pub fn restart(&mut self) {
        self.disconnected();
    }

    /// Race result, multiplayer only. Tie wins over a sub-metre lead.
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.state.is_multiplayer || self.phase != Phase::Ended {
            return None;
        }
        let diff = self.state.distance - self.state.rival_distance;
        Some(if diff.abs() < TIE_MARGIN_M {
            Outcome::Tie
        } else if diff > 0.0 {
            Outcome::Win
        } else {
            Outcome::Loss
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
