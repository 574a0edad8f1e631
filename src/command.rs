//! # Command
//!
//! The set of FTP commands the client can issue. `Display` renders the
//! bare command line; the control channel appends CRLF and encodes it.

use std::fmt;

use crate::types::Charset;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Abort an active file transfer
    Abor,
    /// Switch the user account
    Acct(String),
    /// Change directory to parent directory
    Cdup,
    /// Change working directory
    Cwd(String),
    /// Remove file at specified path
    Dele(String),
    /// Query the supported optional features
    Feat,
    /// Ask for the server help text
    Help,
    /// List entries at specified path, or at the working directory
    List(Option<String>),
    /// Get modification time for file at specified path
    Mdtm(String),
    /// Make directory
    Mkd(String),
    /// Get the list of file names at the working directory
    Nlst,
    /// Ping server
    Noop,
    /// Set an option, with an optional value
    Opts(String, Option<String>),
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Address and port the server should connect to (active mode)
    Port(String),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Reinitialize the session, logging the user out
    Rein,
    /// Select file to rename
    RenameFrom(String),
    /// Rename selected file to
    RenameTo(String),
    /// Declare the restart offset for the next transfer
    Rest(u64),
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Execute a SITE specific command
    Site(String),
    /// Get file size of specified path
    Size(String),
    /// Ask for the server status
    Stat,
    /// Put file at specified path
    Stor(String),
    /// Set representation type: `A` for NVT-ASCII, `I` for image
    Type(bool),
    /// Provide user to login as
    User(String),
    /// A custom command line
    Custom(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abor => write!(f, "ABOR"),
            Self::Acct(a) => write!(f, "ACCT {a}"),
            Self::Cdup => write!(f, "CDUP"),
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::Feat => write!(f, "FEAT"),
            Self::Help => write!(f, "HELP"),
            Self::List(Some(spec)) => write!(f, "LIST {spec}"),
            Self::List(None) => write!(f, "LIST"),
            Self::Mdtm(p) => write!(f, "MDTM {p}"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Nlst => write!(f, "NLST"),
            Self::Noop => write!(f, "NOOP"),
            Self::Opts(opt, Some(value)) => write!(f, "OPTS {opt} {value}"),
            Self::Opts(opt, None) => write!(f, "OPTS {opt}"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Port(p) => write!(f, "PORT {p}"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::Rein => write!(f, "REIN"),
            Self::RenameFrom(p) => write!(f, "RNFR {p}"),
            Self::RenameTo(p) => write!(f, "RNTO {p}"),
            Self::Rest(offset) => write!(f, "REST {offset}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Site(c) => write!(f, "SITE {c}"),
            Self::Size(p) => write!(f, "SIZE {p}"),
            Self::Stat => write!(f, "STAT"),
            Self::Stor(p) => write!(f, "STOR {p}"),
            Self::Type(textual) => write!(f, "TYPE {}", if *textual { "A" } else { "I" }),
            Self::User(u) => write!(f, "USER {u}"),
            Self::Custom(line) => write!(f, "{line}"),
        }
    }
}

impl Command {
    /// Render the command as wire bytes: arguments encoded in `charset`,
    /// CRLF appended. The command word itself is plain ASCII.
    pub(crate) fn to_wire(&self, charset: Charset) -> Vec<u8> {
        let mut bytes = charset.encode(&self.to_string());
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_stringify_command() {
        assert_eq!(Command::Abor.to_string().as_str(), "ABOR");
        assert_eq!(
            Command::Acct(String::from("omar")).to_string().as_str(),
            "ACCT omar"
        );
        assert_eq!(Command::Cdup.to_string().as_str(), "CDUP");
        assert_eq!(
            Command::Cwd(String::from("/tmp")).to_string().as_str(),
            "CWD /tmp"
        );
        assert_eq!(
            Command::Dele(String::from("a.txt")).to_string().as_str(),
            "DELE a.txt"
        );
        assert_eq!(Command::Feat.to_string().as_str(), "FEAT");
        assert_eq!(Command::Help.to_string().as_str(), "HELP");
        assert_eq!(
            Command::List(Some(String::from("*.txt"))).to_string().as_str(),
            "LIST *.txt"
        );
        assert_eq!(Command::List(None).to_string().as_str(), "LIST");
        assert_eq!(
            Command::Mdtm(String::from("a.txt")).to_string().as_str(),
            "MDTM a.txt"
        );
        assert_eq!(
            Command::Mkd(String::from("/tmp")).to_string().as_str(),
            "MKD /tmp"
        );
        assert_eq!(Command::Nlst.to_string().as_str(), "NLST");
        assert_eq!(Command::Noop.to_string().as_str(), "NOOP");
        assert_eq!(
            Command::Opts(String::from("UTF8"), Some(String::from("ON")))
                .to_string()
                .as_str(),
            "OPTS UTF8 ON"
        );
        assert_eq!(
            Command::Pass(String::from("qwerty123")).to_string().as_str(),
            "PASS qwerty123"
        );
        assert_eq!(Command::Pasv.to_string().as_str(), "PASV");
        assert_eq!(
            Command::Port(String::from("192,168,0,1,4,2"))
                .to_string()
                .as_str(),
            "PORT 192,168,0,1,4,2"
        );
        assert_eq!(Command::Pwd.to_string().as_str(), "PWD");
        assert_eq!(Command::Quit.to_string().as_str(), "QUIT");
        assert_eq!(Command::Rein.to_string().as_str(), "REIN");
        assert_eq!(
            Command::RenameFrom(String::from("a.txt")).to_string().as_str(),
            "RNFR a.txt"
        );
        assert_eq!(
            Command::RenameTo(String::from("b.txt")).to_string().as_str(),
            "RNTO b.txt"
        );
        assert_eq!(Command::Rest(123).to_string().as_str(), "REST 123");
        assert_eq!(
            Command::Retr(String::from("a.txt")).to_string().as_str(),
            "RETR a.txt"
        );
        assert_eq!(
            Command::Rmd(String::from("/tmp")).to_string().as_str(),
            "RMD /tmp"
        );
        assert_eq!(
            Command::Site(String::from("CHMOD 755 a")).to_string().as_str(),
            "SITE CHMOD 755 a"
        );
        assert_eq!(
            Command::Size(String::from("a.txt")).to_string().as_str(),
            "SIZE a.txt"
        );
        assert_eq!(Command::Stat.to_string().as_str(), "STAT");
        assert_eq!(
            Command::Stor(String::from("a.txt")).to_string().as_str(),
            "STOR a.txt"
        );
        assert_eq!(Command::Type(true).to_string().as_str(), "TYPE A");
        assert_eq!(Command::Type(false).to_string().as_str(), "TYPE I");
        assert_eq!(
            Command::User(String::from("omar")).to_string().as_str(),
            "USER omar"
        );
        assert_eq!(
            Command::Custom(String::from("XCRC a.txt")).to_string().as_str(),
            "XCRC a.txt"
        );
    }

    #[test]
    fn should_encode_wire_line() {
        assert_eq!(
            Command::Noop.to_wire(Charset::Utf8),
            b"NOOP\r\n".to_vec()
        );
        assert_eq!(
            Command::Cwd(String::from("café")).to_wire(Charset::Latin1),
            b"CWD caf\xe9\r\n".to_vec()
        );
    }
}
