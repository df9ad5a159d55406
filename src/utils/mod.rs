//! Project-specific utilities live here.

/// Formats a shared log prefix for project logs.
pub fn log_prefix(module: &str) -> String {
    format!("bookshelf::{module}")
}

/// Accept a post-login redirect target only if it stays on this site.
///
/// The target must be an absolute path: `//host` and `/\host` are treated by
/// browsers as other origins and are rejected. Browsers drop tabs and line
/// breaks from URLs before resolving them, so any control character or inner
/// whitespace rejects the target too.
pub fn safe_local_path(target: Option<&str>) -> Option<&str> {
    let target = target?.trim();
    if target.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }
    let mut chars = target.chars();
    match (chars.next(), chars.next()) {
        (Some('/'), Some('/' | '\\')) => None,
        (Some('/'), _) => Some(target),
        _ => None,
    }
}

/// Unix timestamp in seconds.
pub fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
