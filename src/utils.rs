//! Small time helpers shared by storage and stats.

use chrono::Utc;

/// Current Unix time in seconds, with sub-second precision.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Unix time `hours` before now.
pub fn unix_hours_ago(hours: u32) -> f64 {
    unix_now() - f64::from(hours) * 60.0 * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_ago() {
        let diff = unix_now() - unix_hours_ago(24);
        assert!((diff - 86_400.0).abs() < 1.0);
    }
}
