//! # Regex
//!
//! Regular expressions used to parse server replies.

use lazy_regex::{Lazy, Regex};

/// Extracts the address/port sextuple from a PASV reply. The numbers may or
/// may not be wrapped in parentheses, so the expression matches any run of
/// six comma-separated integers; the first match wins.
pub static PASV_SEXTUPLE_RE: Lazy<Regex> =
    lazy_regex!(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})");

/// Extracts the quoted absolute path from a PWD reply.
pub static PWD_PATH_RE: Lazy<Regex> = lazy_regex!(r#""(/[^"]*)""#);

/// Extracts the `YYYYMMDDHHMMSS` timestamp from a MDTM reply.
pub static MDTM_RE: Lazy<Regex> = lazy_regex!(r"(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})");
