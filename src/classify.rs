//! # Error classification.
//!
//! Pure mapping from any failure into the closed [`ErrorKind`] set.
//!
//! Precedence, highest first:
//! 1. Structured kind: an error raised internally already carries its kind.
//! 2. Transport-library structure: tungstenite's own variants.
//! 3. OS socket errnos via [`std::io::ErrorKind`].
//! 4. DNS resolution failures.
//! 5. A fixed substring table of well-known network-error messages, checked
//!    in descending frequency order.
//!
//! Anything that falls through maps to [`ErrorKind::Unknown`].
//!
//! ## Rules
//! - Classification is pure: same input, same kind (relied on by the
//!   supervisor and tested below).
//! - The substring tier is a last resort for third-party error text; errors
//!   with structure never reach it.

use std::io;

use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::ErrorKind;

/// Well-known network-error substrings, descending frequency.
///
/// Matching is done on the lower-cased rendering of the error.
const NETWORK_ERROR_PATTERNS: [(&str, ErrorKind); 10] = [
    ("connection refused", ErrorKind::ConnectionRefused),
    ("i/o timeout", ErrorKind::ConnectionTimeout),
    ("broken pipe", ErrorKind::ConnectionLost),
    ("network is unreachable", ErrorKind::ConnectionLost),
    ("no such host", ErrorKind::DnsError),
    ("unexpected eof", ErrorKind::ConnectionLost),
    ("connection reset", ErrorKind::ConnectionLost),
    ("host is down", ErrorKind::ConnectionLost),
    ("network down", ErrorKind::ConnectionLost),
    ("protocol error", ErrorKind::InvalidMessage),
];

/// Classifies a transport-layer failure.
pub fn classify(err: &WsError) -> ErrorKind {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ErrorKind::ConnectionLost,
        WsError::Io(io_err) => classify_io(io_err),
        WsError::Tls(_) => ErrorKind::TlsError,
        WsError::Capacity(_) => ErrorKind::MessageTooLarge,
        WsError::Protocol(_) => ErrorKind::InvalidMessage,
        WsError::WriteBufferFull(_) => ErrorKind::MemoryError,
        WsError::Utf8 => ErrorKind::EncodingError,
        WsError::AttackAttempt => ErrorKind::SecurityViolation,
        WsError::Url(_) => ErrorKind::InvalidUrl,
        WsError::Http(_) | WsError::HttpFormat(_) => ErrorKind::HandshakeFailed,
    }
}

/// Classifies an OS-level I/O failure.
pub fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => ErrorKind::ConnectionLost,
        io::ErrorKind::TimedOut => ErrorKind::ConnectionTimeout,
        io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::NetworkDown => ErrorKind::ConnectionLost,
        io::ErrorKind::OutOfMemory => ErrorKind::MemoryError,
        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound => ErrorKind::FileSystemError,
        // Resolver failures arrive as uncategorized io errors; fall through
        // to the message tier.
        _ => classify_message(&err.to_string()),
    }
}

/// Last-resort classification over the rendered error message.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();

    for (pattern, kind) in NETWORK_ERROR_PATTERNS {
        if lower.contains(pattern) {
            return kind;
        }
    }

    // Secondary hints outside the fixed network table.
    if lower.contains("failed to lookup address") || lower.contains("dns") {
        return ErrorKind::DnsError;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return ErrorKind::ConnectionTimeout;
    }
    if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        return ErrorKind::TlsError;
    }
    if lower.contains("handshake") {
        return ErrorKind::HandshakeFailed;
    }
    if lower.contains("message too large") || lower.contains("too long") {
        return ErrorKind::MessageTooLarge;
    }
    if lower.contains("invalid") {
        return ErrorKind::InvalidMessage;
    }

    ErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errno_tier_beats_string_tier() {
        // The message would pattern-match to ConnectionLost, but the errno
        // carries the truth.
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "broken pipe-ish");
        assert_eq!(classify_io(&err), ErrorKind::ConnectionRefused);
    }

    #[test]
    fn tungstenite_structure_is_used_directly() {
        assert_eq!(
            classify(&WsError::ConnectionClosed),
            ErrorKind::ConnectionLost
        );
        assert_eq!(
            classify(&WsError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out"
            ))),
            ErrorKind::ConnectionTimeout
        );
    }

    #[test]
    fn pattern_table_maps_known_messages() {
        assert_eq!(
            classify_message("connect error: connection refused"),
            ErrorKind::ConnectionRefused
        );
        assert_eq!(
            classify_message("read tcp 1.2.3.4: i/o timeout"),
            ErrorKind::ConnectionTimeout
        );
        assert_eq!(
            classify_message("lookup failed: no such host"),
            ErrorKind::DnsError
        );
        assert_eq!(classify_message("unexpected EOF"), ErrorKind::ConnectionLost);
        assert_eq!(
            classify_message("websocket protocol error"),
            ErrorKind::InvalidMessage
        );
    }

    #[test]
    fn earlier_patterns_win() {
        // Both "connection refused" and "connection reset" appear; the table
        // is ordered by frequency and the first hit wins.
        assert_eq!(
            classify_message("connection refused after connection reset"),
            ErrorKind::ConnectionRefused
        );
    }

    #[test]
    fn unknown_messages_map_to_unknown() {
        assert_eq!(classify_message("flux capacitor drained"), ErrorKind::Unknown);
    }

    #[test]
    fn classification_is_pure() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        let first = classify_io(&err);
        for _ in 0..10 {
            assert_eq!(classify_io(&err), first);
        }
    }
}
