//! # Status
//!
//! Reply codes the command flows branch on exactly. Codes not listed here
//! are only ever classified through [`Reply::is_success`](crate::Reply) and
//! [`Reply::is_completed`](crate::Reply), so that exotic server codes reach
//! the caller verbatim inside [`FtpError::Server`](crate::FtpError).

/// Data connection already open, transfer starting
pub(crate) const ALREADY_OPEN: u16 = 125;
/// File status okay, about to open the data connection
pub(crate) const ABOUT_TO_OPEN: u16 = 150;
/// System status reply, used by `FEAT`
pub(crate) const SYSTEM_STATUS: u16 = 211;
/// User logged in
pub(crate) const LOGGED_IN: u16 = 230;
/// User name okay, need password
pub(crate) const NEED_PASSWORD: u16 = 331;
/// Need account for login
pub(crate) const NEED_ACCOUNT: u16 = 332;
/// Requested file action pending further information (`REST`, `RNFR`)
pub(crate) const PENDING_FURTHER_INFO: u16 = 350;
/// Command not implemented
pub(crate) const NOT_IMPLEMENTED: u16 = 502;
