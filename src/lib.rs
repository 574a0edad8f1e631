#![crate_name = "ftpigeon"]
#![crate_type = "lib"]

//! # ftpigeon
//!
//! ftpigeon is a blocking FTP client library for Rust. It speaks RFC 959
//! plus the extensions real-world servers actually use (`FEAT`, `SIZE`,
//! `MDTM`, `REST`, `PASV`, the UTF-8 option, `NLST`, `LIST`) and focuses
//! on the part of FTP that is genuinely hard to get right: keeping the
//! stateful control connection and the per-transfer data connection in
//! lockstep.
//!
//! Features:
//!
//! - Passive and active data transfers, with resume (`REST`) in both
//!   directions and stream-based upload/download APIs
//! - Directory listings parsed across dialects (Unix `ls -l`, DOS, EPLF,
//!   NetWare), with pluggable parsers and per-connection memoization of
//!   the dialect that worked
//! - Abortable transfers: another thread can call
//!   [`FtpClient::abort_current_transfer`] and the blocked transfer call
//!   returns [`FtpError::Aborted`] with the control channel still usable
//! - Automatic textual/binary selection from the file extension, with
//!   NVT-ASCII line-ending and charset conversion for textual transfers
//! - UTF-8 path name negotiation after login (`FEAT` + `OPTS UTF8 ON`)
//! - A keep-alive ticker sending `NOOP` during long transfers
//! - Pluggable transports through the [`Connector`] trait: plain TCP out
//!   of the box, TLS on the command channel with the `native-tls` feature
//!
//! ## Get started
//!
//! ```toml
//! ftpigeon = "^0.1.0"
//! ```
//!
//! ```no_run
//! use ftpigeon::FtpClient;
//!
//! let client = FtpClient::new();
//! client.connect("test.rebex.net", 21).expect("connection refused");
//! client.login("demo", Some("password")).expect("login failed");
//! let mut dest = Vec::new();
//! client.download("readme.txt", &mut dest, 0, None).expect("download failed");
//! client.disconnect(true).expect("disconnection failed");
//! ```
//!
//! ## Aborting a transfer
//!
//! The client is `Send + Sync`: share it (e.g. behind an [`std::sync::Arc`])
//! with a second thread and call
//! [`abort_current_transfer`](FtpClient::abort_current_transfer) while a
//! transfer is pumping; the transfer call returns [`FtpError::Aborted`]
//! and the session survives.

#![cfg_attr(docsrs, feature(doc_cfg))]

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
mod channel;
mod client;
pub(crate) mod command;
mod endpoint;
mod nvt;
mod regex;
mod reply;
mod status;
mod transfer;

// -- public
pub mod config;
pub mod connector;
pub mod list;
pub mod listener;
pub mod textual;
pub mod types;

pub use client::FtpClient;
pub use config::Settings;
pub use connector::{CloseHandle, Connection, Connector, DirectConnector};
#[cfg(feature = "native-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
pub use connector::SslConnector;
pub use listener::{CommunicationListener, TransferListener};
pub use reply::Reply;
pub use types::{Charset, FtpError, FtpResult, TransferType};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
