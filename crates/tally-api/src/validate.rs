//! Format validators for every value that crosses a trust boundary.
//!
//! All of these are pure predicates. They run on command input, on query
//! parameters, on fields returned by the GitHub API, and on values read
//! back from storage — a value is never trusted just because it was
//! validated once upstream.

/// Discord user IDs are snowflakes: exactly 17–19 ASCII digits.
pub fn discord_id(id: &str) -> bool {
    (17..=19).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

/// GitHub usernames: 1–39 characters, alphanumeric and hyphens, no leading
/// or trailing hyphen, no consecutive hyphens.
pub fn github_username(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 39 {
        return false;
    }
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    let mut prev_hyphen = false;
    for &b in bytes {
        if b == b'-' {
            if prev_hyphen {
                return false;
            }
            prev_hyphen = true;
        } else if b.is_ascii_alphanumeric() {
            prev_hyphen = false;
        } else {
            return false;
        }
    }
    true
}

/// Volunteer hours per entry: strictly positive, at most 24.
pub fn hours(value: f64) -> bool {
    value > 0.0 && value <= 24.0
}

/// History page size.
pub fn history_limit(limit: u32) -> bool {
    (1..=100).contains(&limit)
}

/// Git commit IDs: 7–40 hex characters (abbreviated or full SHA).
pub fn commit_id(sha: &str) -> bool {
    (7..=40).contains(&sha.len()) && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

/// OAuth state tokens: at least 20 URL-safe base64 characters.
pub fn oauth_state(state: &str) -> bool {
    state.len() >= 20
        && state
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Strip ASCII control characters, then truncate to `max_len` characters.
/// Tab, newline, and carriage return are not in the strip set; callers
/// decide how to render those. Empty input yields an empty string.
pub fn sanitize(text: &str, max_len: usize) -> String {
    text.chars()
        .filter(|c| {
            !matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
        })
        .take(max_len)
        .collect()
}
