/// A semantic event decoded from one line of sensor-board output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorEvent {
    /// One pedal revolution detected by the board.
    Pulse,
    /// The board finished initialising and is ready to report.
    DeviceReady,
    /// The board's on-board LED changed state. Advisory only.
    Peripheral { on: bool },
    /// The board acknowledged a test command.
    Diagnostic,
    /// Anything the board says that we don't understand. Logged, ignored.
    Unclassified,
}

/// Classifies one trimmed line of board output, case-insensitively.
///
/// First match wins, in this order: pulse keywords (exact), ready keywords
/// (substring), LED state (substring), test keywords (substring). A line
/// matching several categories yields only the highest-priority event, so
/// e.g. "test ready" is a `DeviceReady`, never also a `Diagnostic`.
pub fn classify(line: &str) -> SensorEvent {
    let lower = line.to_lowercase();

    if lower == "click" || lower == "sensor_activated" || lower == "1" {
        SensorEvent::Pulse
    } else if lower.contains("listo") || lower.contains("ready") || lower.contains("inicializado")
    {
        SensorEvent::DeviceReady
    } else if lower.contains("led_on") {
        SensorEvent::Peripheral { on: true }
    } else if lower.contains("led_off") {
        SensorEvent::Peripheral { on: false }
    } else if lower.contains("prueba") || lower.contains("test") {
        SensorEvent::Diagnostic
    } else {
        SensorEvent::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_keywords() {
        assert_eq!(classify("click"), SensorEvent::Pulse);
        assert_eq!(classify("CLICK"), SensorEvent::Pulse);
        assert_eq!(classify("sensor_activated"), SensorEvent::Pulse);
        assert_eq!(classify("1"), SensorEvent::Pulse);
    }

    #[test]
    fn test_pulse_requires_exact_match() {
        // "click!" is not a pulse; only the bare keyword counts
        assert_eq!(classify("click!"), SensorEvent::Unclassified);
        assert_eq!(classify("11"), SensorEvent::Unclassified);
        assert_eq!(classify("double click"), SensorEvent::Unclassified);
    }

    #[test]
    fn test_ready_keywords_match_substrings() {
        assert_eq!(
            classify("Sistema listo para detectar sensor"),
            SensorEvent::DeviceReady
        );
        assert_eq!(classify("READY"), SensorEvent::DeviceReady);
        assert_eq!(classify("sensor inicializado ok"), SensorEvent::DeviceReady);
    }

    #[test]
    fn test_peripheral_state() {
        assert_eq!(classify("led_on"), SensorEvent::Peripheral { on: true });
        assert_eq!(classify("LED_OFF"), SensorEvent::Peripheral { on: false });
        assert_eq!(
            classify("status: led_on now"),
            SensorEvent::Peripheral { on: true }
        );
    }

    #[test]
    fn test_diagnostic_keywords() {
        assert_eq!(classify("prueba recibida"), SensorEvent::Diagnostic);
        assert_eq!(classify("self-test passed"), SensorEvent::Diagnostic);
    }

    #[test]
    fn test_precedence_ready_beats_test() {
        // A line matching several rules is classified by the first one only
        assert_eq!(classify("test ready"), SensorEvent::DeviceReady);
    }

    #[test]
    fn test_precedence_led_beats_test() {
        assert_eq!(classify("test led_on"), SensorEvent::Peripheral { on: true });
    }

    #[test]
    fn test_unclassified() {
        assert_eq!(classify("garbage 0x2f"), SensorEvent::Unclassified);
        assert_eq!(classify(""), SensorEvent::Unclassified);
    }
}
