//! # Audit log.
//!
//! The optional file-backed per-frame record, distinct from operational
//! logging. One line per frame, plus session start/end markers framing the
//! whole file so a single log can hold many process runs.
//!
//! ## Path contract
//! - absolute, under the process working directory (or a descendant)
//! - `.log` suffix, file-name length ≤ 255
//! - opened append-only, mode `0600`
//!
//! ## Line format
//! ```text
//! [YYYY-MM-DD HH:MM:SS.mmm] {SEND|RECV} {TEXT|BINARY|PING|PONG|CLOSE} (N bytes): <content>
//! ```
//! Text renders inline up to 500 bytes, then `...(truncated)`. Binary
//! renders as `HEX: <hex>` up to 32 bytes, otherwise
//! `BINARY: N bytes, preview: <hex-16>...`.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

use crate::error::{ConnectionError, ErrorKind, Op};
use crate::pool::BufferPool;
use crate::processor::FrameKind;
use crate::session::SessionId;

/// Inline ceiling for text content.
const TEXT_INLINE_LIMIT: usize = 500;
/// Full-hex ceiling for binary content.
const BINARY_HEX_LIMIT: usize = 32;
/// Preview length for larger binary content.
const BINARY_PREVIEW_LEN: usize = 16;

/// Frame direction in the audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

impl Direction {
    fn as_label(&self) -> &'static str {
        match self {
            Direction::Send => "SEND",
            Direction::Recv => "RECV",
        }
    }
}

/// Generates the default file name: `websocket_log_YYYYMMDD_HHMMSS.log`.
pub fn default_log_name() -> String {
    format!("websocket_log_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Validates a log path against `root` (normally the working directory).
///
/// Relative paths are resolved against `root` first. The returned path is
/// the absolute path to open.
pub fn validate_log_path(path: &Path, root: &Path) -> Result<PathBuf, ConnectionError> {
    let fs_err = |message: String| {
        ConnectionError::new(ErrorKind::FileSystemError, Op::Connect, "", message)
    };

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    if !absolute.starts_with(root) {
        return Err(fs_err(format!(
            "log path {} escapes the working directory",
            absolute.display()
        )));
    }
    if absolute.extension().and_then(|e| e.to_str()) != Some("log") {
        return Err(fs_err(format!(
            "log path {} must end in .log",
            absolute.display()
        )));
    }
    match absolute.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.len() <= 255 => {}
        Some(name) => {
            return Err(fs_err(format!("log file name too long ({})", name.len())));
        }
        None => return Err(fs_err("log path has no file name".to_string())),
    }

    Ok(absolute)
}

/// Append-only per-frame audit record.
pub struct AuditLog {
    file: Mutex<Option<File>>,
    session: SessionId,
}

impl AuditLog {
    /// Validates the path, opens the file (`0600`, append), and writes the
    /// session-start marker.
    pub fn create(
        path: &Path,
        root: &Path,
        session: SessionId,
        url: &str,
    ) -> Result<Self, ConnectionError> {
        let absolute = validate_log_path(path, root)?;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&absolute).map_err(|e| {
            ConnectionError::new(
                ErrorKind::FileSystemError,
                Op::Connect,
                "",
                format!("cannot open log file {}: {e}", absolute.display()),
            )
            .with_source(e)
        })?;

        let header = format!(
            "\n=== WebSocket 会话开始 [{}] ===\n会话ID: {}\n目标URL: {}\n开始时间: {}\n\n",
            env!("CARGO_PKG_VERSION"),
            session,
            url,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
        );
        file.write_all(header.as_bytes()).map_err(|e| {
            ConnectionError::new(
                ErrorKind::FileSystemError,
                Op::Connect,
                "",
                format!("cannot write log header: {e}"),
            )
            .with_source(e)
        })?;

        Ok(Self {
            file: Mutex::new(Some(file)),
            session,
        })
    }

    /// Appends one frame line. Write failures are logged and swallowed; a
    /// full disk must not take the session down.
    pub fn record(&self, direction: Direction, frame: FrameKind, data: &[u8]) {
        let line = render_line(direction, frame, data);
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!(error = %e, "audit_log_write_failed");
            }
        }
    }

    /// Writes the session-end marker, flushes and closes. Idempotent.
    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut file) = guard.take() {
            let footer = format!(
                "\n=== WebSocket 会话结束 [{}] ===\n结束时间: {}\n\n",
                self.session,
                Local::now().format("%Y-%m-%d %H:%M:%S"),
            );
            if let Err(e) = file.write_all(footer.as_bytes()).and_then(|_| file.flush()) {
                warn!(error = %e, "audit_log_close_failed");
            }
        }
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Renders one audit line, newline included.
pub fn render_line(direction: Direction, frame: FrameKind, data: &[u8]) -> String {
    let mut line = String::with_capacity(64 + data.len().min(TEXT_INLINE_LIMIT + 16));
    line.push('[');
    line.push_str(&Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string());
    line.push_str("] ");
    line.push_str(direction.as_label());
    line.push(' ');
    line.push_str(frame.as_label());
    line.push_str(" (");
    line.push_str(&data.len().to_string());
    line.push_str(" bytes): ");
    render_content(&mut line, frame, data);
    line.push('\n');
    line
}

fn render_content(out: &mut String, frame: FrameKind, data: &[u8]) {
    match frame {
        FrameKind::Binary => {
            if data.len() <= BINARY_HEX_LIMIT {
                out.push_str("HEX: ");
                push_hex(out, data);
            } else {
                out.push_str("BINARY: ");
                out.push_str(&data.len().to_string());
                out.push_str(" bytes, preview: ");
                push_hex(out, &data[..BINARY_PREVIEW_LEN]);
                out.push_str("...");
            }
        }
        _ => {
            if data.len() <= TEXT_INLINE_LIMIT {
                out.push_str(&String::from_utf8_lossy(data));
            } else {
                out.push_str(&String::from_utf8_lossy(&data[..TEXT_INLINE_LIMIT]));
                out.push_str("...(truncated)");
            }
        }
    }
}

fn push_hex(out: &mut String, data: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    // Hex expansion doubles the length; assemble through a pooled scratch
    // buffer instead of growing the line byte by byte.
    let mut scratch = BufferPool::global().get(data.len() * 2);
    for b in data {
        scratch.push(HEX[(b >> 4) as usize]);
        scratch.push(HEX[(b & 0xf) as usize]);
    }
    out.push_str(std::str::from_utf8(&scratch).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_log_path_under_root() {
        let root = Path::new("/work/dir");
        let path = validate_log_path(Path::new("session.log"), root).unwrap();
        assert_eq!(path, PathBuf::from("/work/dir/session.log"));
    }

    #[test]
    fn rejects_escaping_wrong_suffix_and_long_names() {
        let root = Path::new("/work/dir");
        assert!(validate_log_path(Path::new("/tmp/other.log"), root).is_err());
        assert!(validate_log_path(Path::new("notes.txt"), root).is_err());
        let long = format!("{}.log", "x".repeat(300));
        assert!(validate_log_path(Path::new(&long), root).is_err());
    }

    #[test]
    fn default_name_has_the_documented_shape() {
        let name = default_log_name();
        assert!(name.starts_with("websocket_log_"));
        assert!(name.ends_with(".log"));
        // websocket_log_ + YYYYMMDD_HHMMSS + .log
        assert_eq!(name.len(), "websocket_log_".len() + 15 + ".log".len());
    }

    #[test]
    fn text_lines_render_inline_and_truncate() {
        let line = render_line(Direction::Send, FrameKind::Text, b"hello");
        assert!(line.contains("SEND TEXT (5 bytes): hello"));

        let big = "a".repeat(600);
        let line = render_line(Direction::Recv, FrameKind::Text, big.as_bytes());
        assert!(line.contains("RECV TEXT (600 bytes): "));
        assert!(line.contains("...(truncated)"));
        assert!(!line.contains(&"a".repeat(501)));
    }

    #[test]
    fn binary_lines_render_hex_and_preview() {
        let line = render_line(Direction::Recv, FrameKind::Binary, &[0xde, 0xad, 0xbe, 0xef]);
        assert!(line.contains("HEX: deadbeef"));

        let big = vec![0xabu8; 64];
        let line = render_line(Direction::Recv, FrameKind::Binary, &big);
        assert!(line.contains("BINARY: 64 bytes, preview: "));
        assert!(line.contains(&"ab".repeat(16)));
        assert!(line.trim_end().ends_with("..."));
    }

    #[test]
    fn file_carries_markers_and_frame_lines() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::generate();
        let log = AuditLog::create(
            Path::new("audit.log"),
            dir.path(),
            session.clone(),
            "ws://example.test/ws",
        )
        .unwrap();

        log.record(Direction::Send, FrameKind::Text, b"hello");
        log.close();
        log.close(); // idempotent

        let content = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(content.contains("=== WebSocket 会话开始"));
        assert!(content.contains(session.as_str()));
        assert!(content.contains("ws://example.test/ws"));
        assert!(content.contains("SEND TEXT (5 bytes): hello"));
        assert!(content.contains("=== WebSocket 会话结束"));
    }

    #[cfg(unix)]
    #[test]
    fn file_mode_is_owner_read_write_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let _log = AuditLog::create(
            Path::new("perm.log"),
            dir.path(),
            SessionId::generate(),
            "ws://example.test",
        )
        .unwrap();
        let mode = std::fs::metadata(dir.path().join("perm.log"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
