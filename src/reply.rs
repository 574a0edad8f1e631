//! # Reply
//!
//! The reply framer: turns the raw control-channel byte stream into
//! structured `{code, lines}` replies.
//!
//! A reply is either a single line (`NNN text`) or spans multiple lines:
//! the first line has the form `NNN-text` and the reply runs until a line
//! that begins with the same three-digit code followed by a space.
//! Continuation lines are kept verbatim, leading spaces included.

use std::fmt;
use std::io::BufRead;

use crate::types::{Charset, FtpError, FtpResult};

/// A parsed reply from the server. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// Instantiates a new `Reply`.
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The three-digit reply code, in `100..=599`.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The reply text, one element per line, code prefixes stripped.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consume the reply and return its lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Whether the reply is positive (1xx, 2xx or 3xx).
    pub fn is_success(&self) -> bool {
        matches!(self.code / 100, 1..=3)
    }

    /// Whether the reply marks a completed operation (2xx).
    pub fn is_completed(&self) -> bool {
        self.code / 100 == 2
    }

    /// Read one complete reply from `reader`, decoding text through
    /// `charset`. `on_line` observes every raw line as it comes off the
    /// wire, CRLF stripped.
    pub(crate) fn read<R, F>(reader: &mut R, charset: Charset, mut on_line: F) -> FtpResult<Self>
    where
        R: BufRead,
        F: FnMut(&str),
    {
        let first = match read_line(reader)? {
            Some(line) => line,
            None => {
                return Err(FtpError::ConnectionError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while waiting for a reply",
                )))
            }
        };
        on_line(&charset.decode(&first));
        let code = parse_code(&first)?;
        let separator = first[3];
        let mut lines = vec![charset.decode(&first[4..])];
        match separator {
            b' ' => Ok(Reply::new(code, lines)),
            b'-' => {
                let terminator = [first[0], first[1], first[2], b' '];
                let continuation = [first[0], first[1], first[2], b'-'];
                loop {
                    let line = read_line(reader)?.ok_or(FtpError::IllegalReply)?;
                    on_line(&charset.decode(&line));
                    if line.starts_with(&terminator) {
                        lines.push(charset.decode(&line[4..]));
                        break Ok(Reply::new(code, lines));
                    } else if line.starts_with(&continuation) {
                        lines.push(charset.decode(&line[4..]));
                    } else {
                        lines.push(charset.decode(&line));
                    }
                }
            }
            _ => Err(FtpError::IllegalReply),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.code,
            self.lines.first().map(String::as_str).unwrap_or_default()
        )
    }
}

/// Read bytes until LF or EOF, stripping the CRLF terminator. Returns
/// `None` on EOF with no bytes read.
fn read_line<R: BufRead>(reader: &mut R) -> FtpResult<Option<Vec<u8>>> {
    let mut line: Vec<u8> = Vec::new();
    let len = reader
        .read_until(0x0A, &mut line)
        .map_err(FtpError::ConnectionError)?;
    if len == 0 {
        return Ok(None);
    }
    if line.ends_with(b"\n") {
        line.pop();
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
    Ok(Some(line))
}

/// Validate and parse the three-digit code plus separator of a reply line.
fn parse_code(line: &[u8]) -> FtpResult<u16> {
    if line.len() < 4 || !line[..3].iter().all(u8::is_ascii_digit) {
        return Err(FtpError::IllegalReply);
    }
    let code = (line[0] - b'0') as u16 * 100 + (line[1] - b'0') as u16 * 10 + (line[2] - b'0') as u16;
    if !(100..=599).contains(&code) {
        return Err(FtpError::IllegalReply);
    }
    Ok(code)
}
