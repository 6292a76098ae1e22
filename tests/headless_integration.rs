use std::sync::mpsc;
use std::time::{Duration, Instant};

use pedal_race::decoder::SensorEvent;
use pedal_race::link::LinkEvent;
use pedal_race::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use pedal_race::session::{ConnectionMethod, Phase, Session, SESSION_SECS};

// Headless integration using the internal runtime + Session without a TTY.
// Drives a full ride through Runner/TestEventSource with a synthetic clock:
// one simulated second per Tick, 300ms between pedal pulses.
#[test]
fn headless_solo_ride_completes() {
    let mut session = Session::new();
    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));

    tx.send(AppEvent::Link(LinkEvent::Connected(ConnectionMethod::Manual)))
        .unwrap();
    for _ in 0..5 {
        tx.send(AppEvent::Link(LinkEvent::Data {
            raw: "click".to_string(),
            event: SensorEvent::Pulse,
        }))
        .unwrap();
    }

    let mut now = Instant::now();
    let mut steps = 0u32;
    while session.phase != Phase::Ended && steps < 1_000 {
        steps += 1;
        match runner.step() {
            AppEvent::Tick => {
                now += Duration::from_secs(1);
                session.on_tick(now);
            }
            AppEvent::Link(LinkEvent::Connected(method)) => {
                session.connected(method);
                session.start(false, now);
            }
            AppEvent::Link(LinkEvent::Data { event, .. }) => {
                if event == SensorEvent::Pulse {
                    now += Duration::from_millis(300);
                    session.on_pulse(now);
                }
            }
            _ => {}
        }
    }

    assert_eq!(session.phase, Phase::Ended);
    assert_eq!(session.seconds_remaining, 0);
    assert_eq!(session.state.pulse_count, 5);
    assert_eq!(session.state.total_pulse_count, 5);
    // 5 pulses in the 300ms tier: 5 * (3 + 35/8) = 36.875m, rounded
    assert_eq!(session.state.final_distance, 37.0);
    assert!(session.state.average_speed > 0.0);
    assert!(!session.state.active);
}

#[test]
fn headless_race_produces_an_outcome() {
    let mut session = Session::new();
    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));

    tx.send(AppEvent::Link(LinkEvent::Connected(
        ConnectionMethod::Simulated,
    )))
    .unwrap();
    for _ in 0..40 {
        tx.send(AppEvent::Link(LinkEvent::Data {
            raw: "1".to_string(),
            event: SensorEvent::Pulse,
        }))
        .unwrap();
    }

    let mut now = Instant::now();
    let mut steps = 0u32;
    while session.phase != Phase::Ended && steps < 1_000 {
        steps += 1;
        match runner.step() {
            AppEvent::Tick => {
                now += Duration::from_secs(1);
                session.on_tick(now);
            }
            AppEvent::Link(LinkEvent::Connected(method)) => {
                session.connected(method);
                session.start(true, now);
            }
            AppEvent::Link(LinkEvent::Data { event, .. }) => {
                if event == SensorEvent::Pulse {
                    now += Duration::from_millis(150);
                    session.on_pulse(now);
                }
            }
            _ => {}
        }
    }

    assert_eq!(session.phase, Phase::Ended);
    // The rival ran its own clock for the full minute
    assert!(session.state.rival_distance > 0.0);
    assert!(session.state.rival_distance <= f64::from(SESSION_SECS) * 40.0 / 3.6);
    assert!(session.outcome().is_some());
}

// Non-pulse lines reach the session layer as events but never move the bike.
#[test]
fn headless_noise_does_not_move_the_bike() {
    let mut session = Session::new();
    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));

    tx.send(AppEvent::Link(LinkEvent::Connected(ConnectionMethod::Usb)))
        .unwrap();
    for raw in ["sensor inicializado", "led_on", "prueba ok", "garbage"] {
        tx.send(AppEvent::Link(LinkEvent::Data {
            raw: raw.to_string(),
            event: pedal_race::decoder::classify(raw),
        }))
        .unwrap();
    }

    let now = Instant::now();
    for _ in 0..10 {
        match runner.step() {
            AppEvent::Link(LinkEvent::Connected(method)) => {
                session.connected(method);
                session.start(false, now);
            }
            AppEvent::Link(LinkEvent::Data { event, .. }) => {
                if event == SensorEvent::Pulse {
                    session.on_pulse(now);
                }
            }
            _ => {}
        }
    }

    assert_eq!(session.phase, Phase::Running);
    assert_eq!(session.state.pulse_count, 0);
    assert_eq!(session.state.distance, 0.0);
    assert_eq!(session.state.speed, 0.0);
}
