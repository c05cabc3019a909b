use crate::models::{Millis, RawKeystroke, TimingVector};

pub const DWELL_MIN: Millis = 10.0;
pub const DWELL_MAX: Millis = 1000.0;
pub const FLIGHT_MIN: Millis = -200.0;
pub const FLIGHT_MAX: Millis = 2000.0;
pub const DD_MIN: Millis = 10.0;
pub const DD_MAX: Millis = FLIGHT_MAX + DWELL_MAX;

/// Derive dwell, flight and down-down series from one attempt.
///
/// Out-of-range values are clamped, never rejected, and `total_time` never
/// goes below zero. Events are trusted by position, so a corrected keystroke
/// still counts for its slot.
pub fn extract_timings(keystrokes: &[RawKeystroke]) -> TimingVector {
    let (first, last) = match (keystrokes.first(), keystrokes.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return TimingVector::default(),
    };

    let count = keystrokes.len();
    let mut dwell_times = Vec::with_capacity(count);
    let mut flight_times = Vec::with_capacity(count.saturating_sub(1));
    let mut dd_latencies = Vec::with_capacity(count.saturating_sub(1));

    for (i, key) in keystrokes.iter().enumerate() {
        dwell_times.push((key.release_time - key.press_time).clamp(DWELL_MIN, DWELL_MAX));

        if let Some(next) = keystrokes.get(i + 1) {
            flight_times.push((next.press_time - key.release_time).clamp(FLIGHT_MIN, FLIGHT_MAX));
            dd_latencies.push((next.press_time - key.press_time).clamp(DD_MIN, DD_MAX));
        }
    }

    TimingVector {
        dwell_times,
        flight_times,
        dd_latencies,
        total_time: (last.release_time - first.press_time).max(0.0),
    }
}
