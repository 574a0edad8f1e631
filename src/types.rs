//! # Types
//!
//! Common value types and the library-global error type.

use std::fmt;

use thiserror::Error;

use super::reply::Reply;

/// A shorthand for a Result whose error type is always an [`FtpError`].
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type describing the different kinds
/// of failures that might occur while talking to an FTP server.
#[derive(Debug, Error)]
pub enum FtpError {
    /// A command was issued in a state that forbids it (e.g. not connected,
    /// not authenticated, already connected).
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// Transport failure on the control connection
    #[error("connection error: {0}")]
    ConnectionError(#[source] std::io::Error),
    /// The server sent a structurally malformed reply, or a reply whose
    /// payload could not be parsed (PWD quoting, MDTM date, SIZE number,
    /// PASV sextuple)
    #[error("illegal reply from server")]
    IllegalReply,
    /// A well-formed reply with a non-success code in a context that
    /// requires success. Contains the server reply.
    #[error("server refused command: {0}")]
    Server(Reply),
    /// Transport failure on the data connection while a transfer was
    /// running. The control channel is in theory still usable.
    #[error("I/O error in data transfer: {0}")]
    DataTransferError(#[source] std::io::Error),
    /// The transfer was ended by a concurrent abort request
    #[error("transfer aborted")]
    Aborted,
    /// None of the registered parsers accepts the directory listing
    #[error("no registered parser accepts the listing")]
    ListParse,
}

impl FtpError {
    /// Returns the server reply attached to this error, if any.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            FtpError::Server(reply) => Some(reply),
            _ => None,
        }
    }
}

/// How the contents of a transfer are treated on the wire.
///
/// `Auto` picks between `Textual` and `Binary` per transfer, based on the
/// file name extension and the configured
/// [`TextualExtensionRecognizer`](crate::textual::TextualExtensionRecognizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferType {
    /// Pick `Textual` or `Binary` from the file name extension
    #[default]
    Auto,
    /// NVT-ASCII with charset conversion (`TYPE A`)
    Textual,
    /// Raw bytes (`TYPE I`)
    Binary,
}

/// The charset used for the control channel and for textual transfers.
///
/// Both supported charsets are stateless and ASCII-transparent, which is
/// what allows the control channel to swap them mid-session and the
/// textual pump to transcode chunk by chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8, negotiated through `FEAT`/`OPTS UTF8 ON`
    Utf8,
    /// ISO-8859-1; every byte decodes, unmappable characters encode as `?`
    Latin1,
}

impl Charset {
    /// Decode raw wire bytes into a string.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode a string into wire bytes.
    pub fn encode(&self, s: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => s.as_bytes().to_vec(),
            Charset::Latin1 => s
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "UTF-8"),
            Charset::Latin1 => write!(f, "ISO-8859-1"),
        }
    }
}
