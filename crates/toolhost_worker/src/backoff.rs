use std::time::Duration;

/// Capped exponential backoff for restarting a worker that has crashed
/// after having been ready at least once: 1, 2, 4, 8, 16, 30, 30, ... s.
pub const BACKOFF_CAP_SECS: u64 = 30;

pub fn restart_backoff(restart_count: u32) -> Duration {
    let secs = (1u64 << restart_count.min(10)).min(BACKOFF_CAP_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_documented_sequence() {
        let expected = [1u64, 2, 4, 8, 16, 30, 30, 30];
        for (i, &secs) in expected.iter().enumerate() {
            assert_eq!(restart_backoff(i as u32).as_secs(), secs, "restart_count={i}");
        }
    }
}
