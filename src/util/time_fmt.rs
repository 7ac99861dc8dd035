//! Timestamp rendering for messages and profiles.

#[cfg(test)]
#[path = "time_fmt_test.rs"]
mod time_fmt_test;

use time::{Duration, OffsetDateTime, UtcOffset};

/// Messages younger than this show only the time of day.
const SHORT_FORM_WINDOW: Duration = Duration::hours(24);

/// `HH:MM` for recent (or future-dated) messages, `DD.MM, HH:MM` otherwise,
/// both in the viewer's `offset`.
#[must_use]
pub fn format_message_time(created_at: OffsetDateTime, now: OffsetDateTime, offset: UtcOffset) -> String {
    let local = created_at.to_offset(offset);
    let clock = format!("{:02}:{:02}", local.hour(), local.minute());
    if now - created_at < SHORT_FORM_WINDOW {
        clock
    } else {
        format!("{:02}.{:02}, {clock}", local.day(), u8::from(local.month()))
    }
}

/// `DD.MM.YYYY, HH:MM` in the viewer's `offset`.
#[must_use]
pub fn format_member_since(created_at: OffsetDateTime, offset: UtcOffset) -> String {
    let local = created_at.to_offset(offset);
    format!(
        "{:02}.{:02}.{}, {:02}:{:02}",
        local.day(),
        u8::from(local.month()),
        local.year(),
        local.hour(),
        local.minute()
    )
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// The browser's current UTC offset; UTC when rendering on the server.
#[must_use]
pub fn local_offset() -> UtcOffset {
    #[cfg(feature = "hydrate")]
    {
        // getTimezoneOffset is minutes behind UTC, so the sign flips.
        #[allow(clippy::cast_possible_truncation)]
        let minutes = js_sys::Date::new_0().get_timezone_offset() as i32;
        UtcOffset::from_whole_seconds(-minutes * 60).unwrap_or(UtcOffset::UTC)
    }
    #[cfg(not(feature = "hydrate"))]
    {
        UtcOffset::UTC
    }
}
