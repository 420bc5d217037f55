// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{DateTime, Duration, Utc};

/// Elapsed share of a season, clamped to `[0, 1]`. A zero-length season is
/// immediately complete.
pub fn progress(planted_at: DateTime<Utc>, duration: Duration, now: DateTime<Utc>) -> f64 {
    let total = duration.num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (now - planted_at).num_milliseconds();
    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamped() {
        let planted = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let season = Duration::days(14);
        assert_eq!(progress(planted, season, planted - Duration::days(1)), 0.0);
        assert_eq!(progress(planted, season, planted + Duration::days(7)), 0.5);
        assert_eq!(progress(planted, season, planted + Duration::days(30)), 1.0);
        assert_eq!(progress(planted, Duration::zero(), planted), 1.0);
    }
}
