/// Base distance gained per pedal pulse, before the speed bonus.
pub const BASE_DISTANCE_M: f64 = 3.0;

/// Multiplier applied to the current speed once per second of coasting.
pub const DECAY_FACTOR: f64 = 0.95;

/// Fastest tier of the speed table, used to scale the speed gauge.
pub const MAX_SPEED_KMH: f64 = 50.0;

/// Maps the interval between two pulses to a speed tier in km/h.
///
/// Pure step function: faster pedalling (shorter intervals) lands in a
/// higher tier. Any non-negative interval is valid; 0 is the fastest tier.
pub fn speed_from_interval(interval_ms: u64) -> f64 {
    match interval_ms {
        0..=199 => 50.0,
        200..=499 => 35.0,
        500..=999 => 25.0,
        1000..=1999 => 15.0,
        _ => 10.0,
    }
}

/// Distance in metres gained by a single pulse at the given speed.
pub fn distance_increment(speed_kmh: f64) -> f64 {
    BASE_DISTANCE_M + speed_kmh / 8.0
}
