use once_cell::sync::Lazy;
use regex::Regex;

/// Scrubber for credentials and PII in query text, HTTP bodies and log messages.
///
/// ### WARNING
/// This is a regex-based, **best-effort** pass. It catches the credential shapes the
/// engine and telemetry API actually emit (bearer headers, personal access tokens,
/// driver DSNs) and common PII, but it is not a guarantee.
static DSN_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"token:[^@\s]+@").unwrap());

static BEARER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").unwrap());

static ACCESS_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Personal access tokens: dapi + 32 hex chars, optional -N suffix
    Regex::new(r"\bdapi[0-9a-f]{32}(?:-\d+)?\b").unwrap()
});

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap());

pub fn scrub(input: &str) -> String {
    let mut scrubbed = DSN_TOKEN_REGEX
        .replace_all(input, "token:[REDACTED]@")
        .to_string();

    scrubbed = BEARER_REGEX
        .replace_all(&scrubbed, "Bearer [REDACTED]")
        .to_string();

    scrubbed = ACCESS_TOKEN_REGEX
        .replace_all(&scrubbed, "[TOKEN]")
        .to_string();

    scrubbed = EMAIL_REGEX.replace_all(&scrubbed, "[EMAIL]").to_string();

    scrubbed
}

/// Scrub and cap the length of an untrusted body before it lands in a log line or error.
pub fn scrub_truncated(input: &str, max_chars: usize) -> String {
    let scrubbed = scrub(input);
    if scrubbed.chars().count() <= max_chars {
        return scrubbed;
    }
    let mut truncated: String = scrubbed.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
