//! Wall-clock helpers shared by cache expiry and message timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch as a float.
///
/// Cache expiry timestamps and message timestamps use this clock. A system
/// clock set before the epoch yields `0.0`.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic_enough() {
        let a = now();
        let b = now();
        assert!(a > 1_600_000_000.0);
        assert!(b >= a);
    }
}
