//! Keeps reporter-supplied strings (participant ids, flag names) on a single log line.

/// Longest preview kept for a single reporter-supplied value.
pub const MAX_LOG_PREVIEW: usize = 64;

/// Escape control characters and cap the length of an untrusted value before logging it.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LOG_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_LOG_PREVIEW {
            out.push('…');
            break;
        }
        if ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    out
}
