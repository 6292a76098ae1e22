// Minimal integration test that drives the compiled binary through a PTY.
// This exercises the real event loop and crossterm input handling across
// the main boundaries without relying on internal modules.
//
// Notes:
// - Requires a TTY; uses expectrl which allocates a pseudo terminal.
// - Marked Unix-only and ignored by default to avoid CI/platform issues.
// - Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn manual_ride_starts_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    // Resolve path to compiled binary (debug build during tests)
    let bin = assert_cmd::cargo::cargo_bin("pedal-race");
    let cmd = format!("{} --manual", bin.display());

    // Spawn the TUI inside a pseudo terminal
    let mut p = spawn(cmd)?;

    // Give the app a moment to initialize the terminal/alternate screen
    std::thread::sleep(Duration::from_millis(300));

    // Manual mode lands on mode select: start a solo ride
    p.send("1")?;
    std::thread::sleep(Duration::from_millis(200));

    // The space bar is the pedal in manual mode
    p.send("   ")?;
    std::thread::sleep(Duration::from_millis(200));

    // Give up mid-ride, then quit from the start screen
    p.send("\x1b")?; // ESC
    std::thread::sleep(Duration::from_millis(200));
    p.send("q")?;

    // Wait for the program to terminate cleanly
    p.expect(Eof)?;
    Ok(())
}
