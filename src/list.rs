//! # List
//!
//! Directory-listing machinery: the [`FileEntry`] produced for every
//! remote file, the [`ListParser`] contract and the four built-in dialect
//! parsers (Unix long format, DOS, EPLF, NetWare).
//!
//! There is no specification for the `LIST` output, so parsing is
//! all-or-nothing per dialect: a parser either understands every line of
//! the listing or rejects it, and the client tries the registered parsers
//! in order, caching the first that succeeds for the rest of the
//! connection.

use chrono::prelude::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono::Datelike;
use lazy_regex::{Lazy, Regex};
use thiserror::Error;

// -- Regex

/// Unix `ls -l` long format
static UNIX_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^([\-dl])([\-rwxsStT]{9})\s+(\d+)\s+([^ ]+)\s+([^ ]+)\s+(\d+)\s+([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{1,2}|\d{4}))\s+(.+)$"#
);
/// DOS/Windows `dir` format
static DOS_LS_RE: Lazy<Regex> =
    lazy_regex!(r#"^(\d{2}\-\d{2}\-\d{2}\s+\d{2}:\d{2}\s*[AP]M)\s+(<DIR>)?([\d,]*)\s+(.+)$"#);
/// NetWare long format
static NETWARE_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^([\-d])\s+\[([\w\-]+)\]\s+(\S+)\s+(\d+)\s+([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{4}|\d{1,2}:\d{2}))\s+(.+)$"#
);

// -- File entry

/// What a listing line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Dir,
    Link,
}

/// A file entry on the remote system, as produced by a list parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    name: String,
    size: u64,
    modified: Option<DateTime<Utc>>,
    kind: EntryKind,
    link_target: Option<String>,
}

impl FileEntry {
    /// File name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// File size in bytes; zero for directories in dialects that do not
    /// report one
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time, when the dialect reports one
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Link
    }

    /// The path a symbolic link points to, when reported
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }
}

// -- Error

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ListParseError {
    #[error("syntax error: unrecognized line")]
    SyntaxError,
    #[error("invalid date")]
    InvalidDate,
    #[error("bad file size")]
    BadSize,
}

// -- Parser contract

/// Parses a whole directory listing. Implementations must reject the
/// listing if any line is not understood.
pub trait ListParser: Send {
    fn parse(&self, lines: &[String]) -> Result<Vec<FileEntry>, ListParseError>;
}

/// The parsers every client starts with, in probing order.
pub(crate) fn built_in_parsers() -> Vec<Box<dyn ListParser>> {
    vec![
        Box::new(UnixListParser),
        Box::new(DosListParser),
        Box::new(EplfListParser),
        Box::new(NetWareListParser),
    ]
}

// -- Unix

/// Parses `ls -l` long output. A leading `total N` line is tolerated.
pub struct UnixListParser;

impl ListParser for UnixListParser {
    fn parse(&self, lines: &[String]) -> Result<Vec<FileEntry>, ListParseError> {
        let mut entries = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if i == 0 && line.to_lowercase().starts_with("total") {
                continue;
            }
            let caps = UNIX_LS_RE.captures(line).ok_or(ListParseError::SyntaxError)?;
            let kind = match &caps[1] {
                "-" => EntryKind::File,
                "d" => EntryKind::Dir,
                "l" => EntryKind::Link,
                _ => return Err(ListParseError::SyntaxError),
            };
            let size: u64 = caps[6].parse().map_err(|_| ListParseError::BadSize)?;
            let modified = parse_ls_time(caps[7].trim(), "%b %d %Y", "%b %d %H:%M")?;
            let (name, link_target) = match kind {
                EntryKind::Link => split_link_target(&caps[8]),
                _ => (caps[8].to_string(), None),
            };
            trace!("parsed unix entry {name} ({kind:?}, {size} bytes)");
            entries.push(FileEntry {
                name,
                size,
                modified: Some(modified),
                kind,
                link_target,
            });
        }
        Ok(entries)
    }
}

/// Split the `name -> target` tail of a symlink line.
fn split_link_target(token: &str) -> (String, Option<String>) {
    match token.split_once(" -> ") {
        Some((name, target)) => (name.to_string(), Some(target.to_string())),
        None => (token.to_string(), None),
    }
}

// -- DOS

/// Parses DOS-style output:
///
/// ```text
/// {DATE} {TIME} {<DIR> | SIZE} {FILENAME}
/// 10-19-20  03:19PM <DIR> pub
/// 04-08-14  03:09PM 403   readme.txt
/// ```
pub struct DosListParser;

impl ListParser for DosListParser {
    fn parse(&self, lines: &[String]) -> Result<Vec<FileEntry>, ListParseError> {
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let caps = DOS_LS_RE.captures(line).ok_or(ListParseError::SyntaxError)?;
            let modified = parse_dos_time(&caps[1])?;
            let kind = match caps.get(2).is_some() {
                true => EntryKind::Dir,
                false => EntryKind::File,
            };
            let size: u64 = match kind {
                EntryKind::Dir => 0,
                _ => match caps.get(3).map(|m| m.as_str().replace(',', "")) {
                    Some(digits) if !digits.is_empty() => {
                        digits.parse().map_err(|_| ListParseError::BadSize)?
                    }
                    _ => return Err(ListParseError::BadSize),
                },
            };
            entries.push(FileEntry {
                name: caps[4].to_string(),
                size,
                modified: Some(modified),
                kind,
                link_target: None,
            });
        }
        Ok(entries)
    }
}

// -- EPLF

/// Parses the Easily Parsed LIST Format: a `+` sign, comma-separated
/// facts, a tab, the file name.
///
/// ```text
/// +i8388621.48594,m825718503,r,s280,\tdjb.html
/// ```
pub struct EplfListParser;

impl ListParser for EplfListParser {
    fn parse(&self, lines: &[String]) -> Result<Vec<FileEntry>, ListParseError> {
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let facts_and_name = line.strip_prefix('+').ok_or(ListParseError::SyntaxError)?;
            let (facts, name) = facts_and_name
                .split_once('\t')
                .ok_or(ListParseError::SyntaxError)?;
            if name.is_empty() {
                return Err(ListParseError::SyntaxError);
            }
            let mut kind = None;
            let mut size: u64 = 0;
            let mut modified = None;
            for fact in facts.split(',') {
                if fact == "/" {
                    kind = Some(EntryKind::Dir);
                } else if fact == "r" {
                    kind = Some(EntryKind::File);
                } else if let Some(digits) = fact.strip_prefix('s') {
                    size = digits.parse().map_err(|_| ListParseError::BadSize)?;
                } else if let Some(digits) = fact.strip_prefix('m') {
                    let secs: i64 = digits.parse().map_err(|_| ListParseError::InvalidDate)?;
                    modified =
                        Some(DateTime::from_timestamp(secs, 0).ok_or(ListParseError::InvalidDate)?);
                }
            }
            entries.push(FileEntry {
                name: name.to_string(),
                size,
                modified,
                kind: kind.ok_or(ListParseError::SyntaxError)?,
                link_target: None,
            });
        }
        Ok(entries)
    }
}

// -- NetWare

/// Parses NetWare long output:
///
/// ```text
/// d [RWCEAFMS] admin 512 Feb 10 2020 www
/// - [RWCEAFMS] admin 4096 Feb 10 15:27 index.html
/// ```
pub struct NetWareListParser;

impl ListParser for NetWareListParser {
    fn parse(&self, lines: &[String]) -> Result<Vec<FileEntry>, ListParseError> {
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let caps = NETWARE_LS_RE
                .captures(line)
                .ok_or(ListParseError::SyntaxError)?;
            let kind = match &caps[1] {
                "d" => EntryKind::Dir,
                _ => EntryKind::File,
            };
            let size: u64 = caps[4].parse().map_err(|_| ListParseError::BadSize)?;
            let modified = parse_ls_time(caps[5].trim(), "%b %d %Y", "%b %d %H:%M")?;
            entries.push(FileEntry {
                name: caps[6].to_string(),
                size,
                modified: Some(modified),
                kind,
                link_target: None,
            });
        }
        Ok(entries)
    }
}

// -- time helpers

/// Parse an `ls`-style timestamp, which comes in two shapes:
/// 1. `%b %d %H:%M` (e.g. `Nov 5 13:46`) when the entry is from the
///    current year;
/// 2. `%b %d %Y` (e.g. `Nov 5 2019`) otherwise.
fn parse_ls_time(
    tm: &str,
    fmt_year: &str,
    fmt_hours: &str,
) -> Result<DateTime<Utc>, ListParseError> {
    let datetime: NaiveDateTime = match NaiveDate::parse_from_str(tm, fmt_year) {
        Ok(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default(),
        Err(_) => {
            // no year in the line; assume the current one
            let this_year: i32 = Utc::now().year();
            NaiveDateTime::parse_from_str(
                format!("{tm} {this_year}").as_str(),
                format!("{fmt_hours} %Y").as_str(),
            )
            .map_err(|_| ListParseError::InvalidDate)?
        }
    };
    Ok(datetime.and_utc())
}

/// Parse a DOS timestamp (`%m-%d-%y %I:%M%p`).
fn parse_dos_time(tm: &str) -> Result<DateTime<Utc>, ListParseError> {
    NaiveDateTime::parse_from_str(tm, "%m-%d-%y %I:%M%p")
        .map(|dt| dt.and_utc())
        .map_err(|_| ListParseError::InvalidDate)
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn should_parse_unix_listing() {
        let listing = lines(&[
            "total 14",
            "-rw-rw-r-- 1 omar  www-data  8192 Nov 5 2018 omar.txt",
            "drwxrwxr-x 1 root  dialout   4096 Nov 5 2018 docs",
            "lrwxrwxrwx 1 root  root        11 Nov 5 2018 latest -> omar.txt",
        ]);
        let entries = UnixListParser.parse(&listing).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name(), "omar.txt");
        assert_eq!(entries[0].size(), 8192);
        assert!(entries[0].is_file());
        assert_eq!(
            entries[0].modified().unwrap().timestamp(),
            1541376000
        );
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].name(), "docs");
        assert!(entries[2].is_symlink());
        assert_eq!(entries[2].name(), "latest");
        assert_eq!(entries[2].link_target(), Some("omar.txt"));
    }

    #[test]
    fn should_parse_unix_listing_with_current_year_times() {
        let listing = lines(&["-rw-r--r--    1 23   23   1234567 Jan 1 10:05 01 1234 foo.mp3"]);
        let entries = UnixListParser.parse(&listing).unwrap();
        assert_eq!(entries[0].name(), "01 1234 foo.mp3");
        assert_eq!(entries[0].size(), 1234567);
        assert!(entries[0].modified().is_some());
    }

    #[test]
    fn unix_parser_rejects_foreign_dialects() {
        assert_eq!(
            UnixListParser
                .parse(&lines(&["04-08-14  03:09PM  8192 omar.txt"]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
        // one bad line poisons the whole listing
        assert_eq!(
            UnixListParser
                .parse(&lines(&[
                    "-rw-rw-r-- 1 0 1 8192 Nov 5 2018 good.txt",
                    "what is this line"
                ]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
    }

    #[test]
    fn unix_parser_rejects_invalid_date() {
        assert_eq!(
            UnixListParser
                .parse(&lines(&["-rw-rw-r-- 1 0 1 8192 Nov 31 2018 omar.txt"]))
                .unwrap_err(),
            ListParseError::InvalidDate
        );
    }

    #[test]
    fn should_parse_dos_listing() {
        let listing = lines(&[
            "04-08-14  03:09PM  8192 omar.txt",
            "10-19-20  03:19PM  <DIR> pub",
        ]);
        let entries = DosListParser.parse(&listing).unwrap();
        assert_eq!(entries[0].name(), "omar.txt");
        assert_eq!(entries[0].size(), 8192);
        assert!(entries[0].is_file());
        assert_eq!(entries[0].modified().unwrap().timestamp(), 1396969740);
        assert_eq!(entries[1].name(), "pub");
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].size(), 0);
    }

    #[test]
    fn dos_parser_errors() {
        assert_eq!(
            DosListParser
                .parse(&lines(&["-08-14  03:09PM  <DIR> docs"]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
        assert_eq!(
            DosListParser
                .parse(&lines(&["34-08-14  03:09PM  <DIR> docs"]))
                .unwrap_err(),
            ListParseError::InvalidDate
        );
    }

    #[test]
    fn should_parse_eplf_listing() {
        let listing = lines(&[
            "+i8388621.48594,m825718503,r,s280,\tdjb.html",
            "+i8388621.50690,m824255907,/,\t514",
        ]);
        let entries = EplfListParser.parse(&listing).unwrap();
        assert_eq!(entries[0].name(), "djb.html");
        assert_eq!(entries[0].size(), 280);
        assert!(entries[0].is_file());
        assert_eq!(entries[0].modified().unwrap().timestamp(), 825718503);
        assert_eq!(entries[1].name(), "514");
        assert!(entries[1].is_directory());
    }

    #[test]
    fn eplf_parser_rejects_unmarked_lines() {
        assert_eq!(
            EplfListParser
                .parse(&lines(&["i8388621.48594,m825718503,r,s280,\tdjb.html"]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
        assert_eq!(
            EplfListParser
                .parse(&lines(&["+i8388621.48594,m825718503,r,s280, djb.html"]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
    }

    #[test]
    fn should_parse_netware_listing() {
        let listing = lines(&[
            "d [RWCEAFMS] admin 512 Feb 10 2020 www",
            "- [R----F--] admin 4096 Feb 10 15:27 index.html",
        ]);
        let entries = NetWareListParser.parse(&listing).unwrap();
        assert_eq!(entries[0].name(), "www");
        assert!(entries[0].is_directory());
        assert_eq!(entries[0].size(), 512);
        assert_eq!(entries[1].name(), "index.html");
        assert!(entries[1].is_file());
        assert_eq!(entries[1].size(), 4096);
    }

    #[test]
    fn netware_parser_rejects_unix_lines() {
        assert_eq!(
            NetWareListParser
                .parse(&lines(&["-rw-rw-r-- 1 0 1 8192 Nov 5 2018 omar.txt"]))
                .unwrap_err(),
            ListParseError::SyntaxError
        );
    }

    #[test]
    fn built_in_parsers_probing_order() {
        let parsers = built_in_parsers();
        assert_eq!(parsers.len(), 4);
        let dos = lines(&["04-08-14  03:09PM  8192 omar.txt"]);
        // unix refuses, dos accepts
        assert!(parsers[0].parse(&dos).is_err());
        assert!(parsers[1].parse(&dos).is_ok());
    }

    #[test]
    fn should_parse_ls_time_variants() {
        let with_year = parse_ls_time("Nov 5 2018", "%b %d %Y", "%b %d %H:%M").unwrap();
        assert_eq!(with_year.timestamp(), 1541376000);
        let with_hours = parse_ls_time("Dec 2 21:32", "%b %d %Y", "%b %d %H:%M").unwrap();
        assert_eq!(with_hours.month(), 12);
        assert_eq!(with_hours.day(), 2);
        assert!(parse_ls_time("Oma 31 2018", "%b %d %Y", "%b %d %H:%M").is_err());
        assert!(parse_ls_time("Feb 15 25:32", "%b %d %Y", "%b %d %H:%M").is_err());
    }
}
