//! Cookie string helpers

use chrono::{DateTime, TimeDelta, Utc};

/// Name of the refresh credential cookie issued by the users API
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Longest cookie lifetime in days, in either direction
pub const MAX_COOKIE_DAYS: i64 = 3650;

/// Format used by the `expires` attribute (RFC 7231 IMF-fixdate)
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Build a cookie string expiring `days` from now with path scope `/`.
///
/// A negative `days` yields an already expired cookie, which deletes it.
/// `days` is clamped to [`MAX_COOKIE_DAYS`] either way.
pub fn set_cookie(name: &str, value: &str, days: i64) -> String {
    set_cookie_at(name, value, days, Utc::now())
}

/// Same as [`set_cookie`] with an explicit clock
pub fn set_cookie_at(name: &str, value: &str, days: i64, now: DateTime<Utc>) -> String {
    let days = days.clamp(-MAX_COOKIE_DAYS, MAX_COOKIE_DAYS);
    let expires = now
        .checked_add_signed(TimeDelta::days(days))
        .unwrap_or(now);
    format!(
        "{name}={value};expires={};path=/",
        expires.format(EXPIRES_FORMAT)
    )
}

/// Look up `name` in a `;`-separated cookie header
pub fn get_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let pair = pair.trim_start_matches(' ');
        pair.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// Parse the `expires` attribute of a cookie string built by [`set_cookie`]
pub fn cookie_expiry(cookie: &str) -> Option<DateTime<Utc>> {
    let raw = cookie
        .split(';')
        .find_map(|attr| attr.trim().strip_prefix("expires="))?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
