use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR:   u64 = 60 * MINUTE;
const DAY:    u64 = 24 * HOUR;

/// Compact "how long ago was the GPU busy" label.
///
/// A non-zero `max_usage` means the GPU is busy right now; otherwise the label
/// describes `since_activity`, floored to whole units.
pub fn classify(max_usage: u8, since_activity: Duration) -> String {
    if max_usage > 0 {
        return format!("Now ({max_usage}%)");
    }

    let secs = since_activity.as_secs();
    if secs < 5 {
        "Just now".to_string()
    } else if secs < MINUTE {
        format!("{secs}s ago")
    } else if secs < HOUR {
        format!("{}m ago", secs / MINUTE)
    } else if secs < DAY {
        format!("{}h ago", secs / HOUR)
    } else {
        format!("{}d ago", secs / DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn busy_gpu_reports_usage() {
        assert_eq!(classify(42, secs(0)), "Now (42%)");
        assert_eq!(classify(42, secs(999_999)), "Now (42%)");
    }

    #[test]
    fn recent_idle_is_just_now() {
        assert_eq!(classify(0, secs(4)), "Just now");
        assert_eq!(classify(0, Duration::from_millis(4_999)), "Just now");
    }

    #[test]
    fn seconds_minutes_hours_days() {
        assert_eq!(classify(0, secs(5)), "5s ago");
        assert_eq!(classify(0, secs(59)), "59s ago");
        assert_eq!(classify(0, secs(65)), "1m ago");
        assert_eq!(classify(0, secs(3_599)), "59m ago");
        assert_eq!(classify(0, secs(3_700)), "1h ago");
        assert_eq!(classify(0, secs(86_399)), "23h ago");
        assert_eq!(classify(0, secs(2 * 86_400 + 5)), "2d ago");
    }
}
