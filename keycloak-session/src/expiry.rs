use time::OffsetDateTime;

/// Renders the time left until `expires_at_epoch` (seconds since the Unix
/// epoch) relative to `now` as a compact human-readable countdown.
///
/// The largest applicable unit decides the breakdown: days+hours+minutes
/// from one day upwards, hours+minutes+seconds from one hour, then
/// minutes+seconds, then seconds only. Anything at or past its expiry
/// renders as "Expired".
pub fn format_expires_in(expires_at_epoch: i64, now: OffsetDateTime) -> String {
    let remaining = expires_at_epoch - now.unix_timestamp();
    if remaining <= 0 {
        return "Expired".to_owned();
    }

    let seconds = remaining;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h {}m", hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{hours}h {}m {}s", minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-01-01 12:00:00 UTC);

    fn render(remaining_seconds: i64) -> String {
        format_expires_in(NOW.unix_timestamp() + remaining_seconds, NOW)
    }

    #[test]
    fn expired_at_zero_and_below() {
        assert_that(render(0).as_str()).is_equal_to("Expired");
        assert_that(render(-1).as_str()).is_equal_to("Expired");
        assert_that(render(-86_400).as_str()).is_equal_to("Expired");
    }

    #[test]
    fn day_breakdown_uses_modular_arithmetic() {
        // 1 day, 1 hour, 1 minute, 1 second.
        assert_that(render(90_061).as_str()).is_equal_to("1d 1h 1m");
        assert_that(render(86_400).as_str()).is_equal_to("1d 0h 0m");
        assert_that(render(2 * 86_400 + 23 * 3600 + 59 * 60).as_str()).is_equal_to("2d 23h 59m");
    }

    #[test]
    fn hour_breakdown_includes_seconds() {
        assert_that(render(3_661).as_str()).is_equal_to("1h 1m 1s");
        assert_that(render(3_600).as_str()).is_equal_to("1h 0m 0s");
        assert_that(render(86_399).as_str()).is_equal_to("23h 59m 59s");
    }

    #[test]
    fn minute_breakdown() {
        assert_that(render(61).as_str()).is_equal_to("1m 1s");
        assert_that(render(3_599).as_str()).is_equal_to("59m 59s");
    }

    #[test]
    fn seconds_only_below_one_minute() {
        assert_that(render(42).as_str()).is_equal_to("42s");
        assert_that(render(1).as_str()).is_equal_to("1s");
    }
}
