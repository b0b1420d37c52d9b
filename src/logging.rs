//! Structured logging setup and secret redaction.
//!
//! `tracing_subscriber::registry()` + `EnvFilter`, always emitting JSON —
//! there is no interactive terminal audience for a library whose primary
//! caller is an orchestrator, not a human watching a server start up — and
//! never writing to a rolling file, since a library has no log directory of
//! its own to own.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes the global `tracing` subscriber. Call once, near the start of
/// the process that embeds this crate. `level` is an `EnvFilter` directive
/// string, e.g. `"info"` or `"cribl_hc=debug,warn"`.
pub fn init(level: &str) {
    let filter = tracing_subscriber::EnvFilter::new(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Scrubs bearer tokens embedded in free-form text, e.g. a transport error
/// that happens to echo back a request header. This covers the case where
/// the caller doesn't hold the secret value itself, only a string that might
/// contain one — for a secret the caller does hold (an OAuth client secret,
/// a raw encryption key), use [`redact_secret`] instead, since there is no
/// `"Bearer "`-style marker to anchor on.
pub fn redact(input: &str) -> String {
    let mut out = input.to_string();
    for marker in ["Bearer ", "bearer "] {
        if let Some(start) = out.find(marker) {
            let token_start = start + marker.len();
            let token_end = out[token_start..]
                .find(|c: char| c.is_whitespace())
                .map(|i| token_start + i)
                .unwrap_or(out.len());
            out.replace_range(token_start..token_end, "***REDACTED***");
        }
    }
    out
}

/// Scrubs every occurrence of a known secret literal (an OAuth client
/// secret, a base64-encoded master encryption key) out of `input`. Unlike
/// [`redact`], this doesn't need a `"Bearer "`-style marker, since the
/// caller already knows the exact value to remove. A no-op for an empty
/// secret, so call sites can pass an optional secret unconditionally.
pub fn redact_secret(input: &str, secret: &str) -> String {
    if secret.is_empty() {
        return input.to_string();
    }
    input.replace(secret, "***REDACTED***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_token_but_keeps_surrounding_text() {
        let line = "calling GET /api/v1/system/info with Bearer abc123.def456 timed out";
        let redacted = redact(line);
        assert!(!redacted.contains("abc123.def456"));
        assert!(redacted.contains("calling GET /api/v1/system/info"));
        assert!(redacted.contains("timed out"));
    }

    #[test]
    fn leaves_lines_without_a_bearer_token_unchanged() {
        let line = "connection refused by 10.0.0.1:9000";
        assert_eq!(redact(line), line);
    }

    #[test]
    fn redact_secret_strips_every_occurrence_of_a_known_value() {
        let line = "posting client_secret=sup3r-s3cret to https://idp.example.com/token failed: sup3r-s3cret rejected";
        let redacted = redact_secret(line, "sup3r-s3cret");
        assert!(!redacted.contains("sup3r-s3cret"));
        assert!(redacted.contains("posting client_secret=***REDACTED*** to"));
    }

    #[test]
    fn redact_secret_is_a_no_op_for_an_empty_secret() {
        let line = "no secret configured for this profile";
        assert_eq!(redact_secret(line, ""), line);
    }

    proptest::proptest! {
        #[test]
        fn a_bearer_token_never_survives_redaction(
            // excludes b/B so random generation can never plant a second,
            // earlier "bearer " marker ahead of the one under test.
            prefix in "[a-ce-zA-CE-Z0-9 /:._-]{0,40}",
            token in "[a-ce-zA-CE-Z0-9._-]{1,40}",
            suffix in "[a-ce-zA-CE-Z0-9 /:._-]{0,40}",
        ) {
            let line = format!("{prefix}Bearer {token} {suffix}");
            let redacted = redact(&line);
            proptest::prop_assert!(!redacted.contains(&token));
            proptest::prop_assert!(redacted.contains("***REDACTED***"));
        }
    }
}
