//! # Client
//!
//! The session controller: connection lifecycle, authentication, command
//! dispatch and the transfer engine.
//!
//! A client handles one connection at a time and exactly one command may
//! be in flight: every public method acquires the session lock and holds
//! it for the whole round trip, data pumping included. The only
//! operations allowed from another thread while a transfer runs are
//! [`FtpClient::abort_current_transfer`] and
//! [`FtpClient::abruptly_close_communication`], which go through the abort
//! lock and the channel lock instead.

use std::fmt;
use std::io::{self, BufReader, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::channel::{self, ControlChannel, SharedChannel};
use crate::command::Command;
use crate::config::Settings;
use crate::connector::{CloseHandle, Connection, Connector, DirectConnector};
use crate::endpoint::{self, DataEndpoint};
use crate::list::{self, FileEntry, ListParser};
use crate::listener::{CommunicationListener, TransferListener};
use crate::nvt;
use crate::regex::{MDTM_RE, PWD_PATH_RE};
use crate::reply::Reply;
use crate::status;
use crate::textual::{detect_type, DefaultTextualExtensionRecognizer, TextualExtensionRecognizer};
use crate::transfer::{self, KeepAliveTicker, TransferState};
use crate::types::{Charset, FtpError, FtpResult, TransferType};

/// The session state, guarded by the session lock.
struct Session {
    connected: bool,
    authenticated: bool,
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    passive: bool,
    transfer_type: TransferType,
    charset: Option<Charset>,
    utf8_supported: bool,
    cached_parser: Option<usize>,
    connector: Box<dyn Connector>,
    recognizer: Box<dyn TextualExtensionRecognizer>,
    parsers: Vec<Box<dyn ListParser>>,
    listeners: Vec<Arc<dyn CommunicationListener>>,
    channel: Option<SharedChannel>,
    settings: Settings,
}

impl Session {
    /// The charset for textual exchanges: the explicit one when set,
    /// otherwise UTF-8 once the server advertised support, otherwise
    /// Latin1.
    fn pick_charset(&self) -> Charset {
        match self.charset {
            Some(charset) => charset,
            None if self.utf8_supported => Charset::Utf8,
            None => Charset::Latin1,
        }
    }

    /// Resolve the type of one transfer from the session configuration
    /// and the file name.
    fn effective_type(&self, file_name: &str) -> TransferType {
        match self.transfer_type {
            TransferType::Auto => detect_type(file_name, self.recognizer.as_ref()),
            explicit => explicit,
        }
    }
}

fn require_connected(session: &Session) -> FtpResult<()> {
    match session.connected {
        true => Ok(()),
        false => Err(FtpError::IllegalState("client not connected")),
    }
}

fn require_authenticated(session: &Session) -> FtpResult<()> {
    require_connected(session)?;
    match session.authenticated {
        true => Ok(()),
        false => Err(FtpError::IllegalState("client not authenticated")),
    }
}

fn session_channel(session: &Session) -> FtpResult<SharedChannel> {
    session
        .channel
        .clone()
        .ok_or(FtpError::IllegalState("client not connected"))
}

/// An FTP client session.
///
/// ```no_run
/// use ftpigeon::FtpClient;
///
/// let client = FtpClient::new();
/// client.connect("ftp.example.com", 21).unwrap();
/// client.login("omar", Some("secret")).unwrap();
/// for entry in client.list(None).unwrap() {
///     println!("{} ({} bytes)", entry.name(), entry.size());
/// }
/// client.disconnect(true).unwrap();
/// ```
pub struct FtpClient {
    session: Mutex<Session>,
    transfer: Mutex<TransferState>,
    /// Close handle of the live command connection, reachable without the
    /// session lock for the emergency shutdown path.
    comm_closer: Mutex<Option<CloseHandle>>,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpClient {
    /// Builds a client configured from the process environment.
    pub fn new() -> Self {
        Self::with_settings(Settings::from_env())
    }

    /// Builds a client with explicit [`Settings`], bypassing the ambient
    /// environment.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            session: Mutex::new(Session {
                connected: false,
                authenticated: false,
                host: None,
                port: 0,
                username: None,
                password: None,
                passive: true,
                transfer_type: TransferType::Auto,
                charset: None,
                utf8_supported: false,
                cached_parser: None,
                connector: Box::new(DirectConnector::new()),
                recognizer: Box::new(DefaultTextualExtensionRecognizer::new()),
                parsers: list::built_in_parsers(),
                listeners: Vec::new(),
                channel: None,
                settings,
            }),
            transfer: Mutex::new(TransferState::default()),
            comm_closer: Mutex::new(None),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_transfer(&self) -> MutexGuard<'_, TransferState> {
        self.transfer.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- configuration

    /// Replace the transport connector. Default is [`DirectConnector`].
    pub fn set_connector<C: Connector + 'static>(&self, connector: C) {
        self.lock_session().connector = Box::new(connector);
    }

    /// Enable or disable passive mode for data transfers. Default is
    /// enabled.
    pub fn set_passive(&self, passive: bool) {
        self.lock_session().passive = passive;
    }

    /// Set how transfer contents are treated. Default is
    /// [`TransferType::Auto`].
    pub fn set_transfer_type(&self, transfer_type: TransferType) {
        self.lock_session().transfer_type = transfer_type;
    }

    /// Force the charset for textual communications, or pass `None` to
    /// let the client pick one (UTF-8 when the server supports it).
    pub fn set_charset(&self, charset: Option<Charset>) {
        let mut session = self.lock_session();
        session.charset = charset;
        if let Some(chan) = &session.channel {
            channel::lock(chan).set_charset(session.pick_charset());
        }
    }

    /// Replace the recognizer deciding which extensions are textual when
    /// the transfer type is `Auto`.
    pub fn set_textual_extension_recognizer<R: TextualExtensionRecognizer + 'static>(
        &self,
        recognizer: R,
    ) {
        self.lock_session().recognizer = Box::new(recognizer);
    }

    /// Register an additional listing parser, tried after the built-in
    /// dialects.
    pub fn add_list_parser<P: ListParser + 'static>(&self, parser: P) {
        self.lock_session().parsers.push(Box::new(parser));
    }

    /// Register an observer of the raw control-channel traffic. Takes
    /// effect immediately, also on a live connection.
    pub fn add_communication_listener(&self, listener: Arc<dyn CommunicationListener>) {
        let mut session = self.lock_session();
        session.listeners.push(listener.clone());
        if let Some(chan) = &session.channel {
            channel::lock(chan).add_listener(listener);
        }
    }

    // -- accessors

    pub fn is_connected(&self) -> bool {
        self.lock_session().connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_session().authenticated
    }

    pub fn is_passive(&self) -> bool {
        self.lock_session().passive
    }

    pub fn transfer_type(&self) -> TransferType {
        self.lock_session().transfer_type
    }

    pub fn charset(&self) -> Option<Charset> {
        self.lock_session().charset
    }

    /// Whether the connected server advertised UTF-8 path name support.
    pub fn is_utf8_supported(&self) -> bool {
        self.lock_session().utf8_supported
    }

    /// The remote host, when connected.
    pub fn host(&self) -> Option<String> {
        self.lock_session().host.clone()
    }

    /// The remote port, when connected.
    pub fn port(&self) -> u16 {
        self.lock_session().port
    }

    /// The authentication user name, cached for diagnostics.
    pub fn username(&self) -> Option<String> {
        self.lock_session().username.clone()
    }

    /// The authentication password, cached for diagnostics.
    pub fn password(&self) -> Option<String> {
        self.lock_session().password.clone()
    }

    // -- lifecycle

    /// Connect to the remote host and read the welcome message, returned
    /// one line per element.
    pub fn connect(&self, host: &str, port: u16) -> FtpResult<Vec<String>> {
        let mut session = self.lock_session();
        if session.connected {
            return Err(FtpError::IllegalState("client already connected"));
        }
        debug!("connecting to {host}:{port}");
        session.utf8_supported = false;
        let connection = session
            .connector
            .connect_for_command(host, port)
            .map_err(FtpError::ConnectionError)?;
        let chan = ControlChannel::new(
            connection,
            session.pick_charset(),
            session.listeners.clone(),
        )
        .into_shared();
        let welcome = channel::lock(&chan).read_reply();
        let reply = match welcome {
            Ok(reply) if reply.is_completed() => reply,
            Ok(reply) => {
                channel::lock(&chan).close_handle().close();
                return Err(FtpError::Server(reply));
            }
            Err(err) => {
                channel::lock(&chan).close_handle().close();
                return Err(err);
            }
        };
        debug!("server ready: {reply}");
        *self.comm_closer.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(channel::lock(&chan).close_handle());
        session.connected = true;
        session.authenticated = false;
        session.cached_parser = None;
        session.host = Some(host.to_string());
        session.port = port;
        session.username = None;
        session.password = None;
        session.channel = Some(chan);
        Ok(reply.into_lines())
    }

    /// Disconnect from the server. With `send_quit` the `QUIT` procedure
    /// is performed first; the control connection is closed regardless of
    /// its outcome.
    pub fn disconnect(&self, send_quit: bool) -> FtpResult<()> {
        let mut session = self.lock_session();
        require_connected(&session)?;
        let chan = session_channel(&session)?;
        let result = if send_quit {
            channel::lock(&chan)
                .exchange(&Command::Quit)
                .and_then(|reply| match reply.is_completed() {
                    true => Ok(()),
                    false => Err(FtpError::Server(reply)),
                })
        } else {
            Ok(())
        };
        channel::lock(&chan).close_handle().close();
        *self.comm_closer.lock().unwrap_or_else(|e| e.into_inner()) = None;
        session.channel = None;
        session.connected = false;
        session.authenticated = false;
        session.host = None;
        session.port = 0;
        session.username = None;
        session.password = None;
        session.cached_parser = None;
        session.utf8_supported = false;
        result
    }

    /// Emergency brake: abruptly close the command connection without
    /// taking the session lock. An in-flight command observes a
    /// connection error; afterwards the client can `connect` again.
    pub fn abruptly_close_communication(&self) {
        let closer = self
            .comm_closer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(closer) = closer {
            warn!("abruptly closing the control connection");
            closer.close();
        }
        // best effort: reset the flags if no command is holding the lock
        if let Ok(mut session) = self.session.try_lock() {
            session.connected = false;
            session.authenticated = false;
            session.channel = None;
            session.host = None;
            session.port = 0;
        }
    }

    // -- authentication

    /// Authenticate with a user name and an optional password.
    pub fn login(&self, username: &str, password: Option<&str>) -> FtpResult<()> {
        self.login_with_account(username, password, None)
    }

    /// Authenticate with a user name, an optional password and an
    /// optional account, for servers that require the `ACCT` step.
    pub fn login_with_account(
        &self,
        username: &str,
        password: Option<&str>,
        account: Option<&str>,
    ) -> FtpResult<()> {
        let mut session = self.lock_session();
        require_connected(&session)?;
        let chan = session_channel(&session)?;
        session.authenticated = false;
        {
            let mut chan = channel::lock(&chan);
            let mut account_demand: Option<Reply> = None;
            debug!("signing in as '{username}'");
            let user_reply = chan.exchange(&Command::User(username.to_string()))?;
            let password_required = match user_reply.code() {
                status::LOGGED_IN => false,
                status::NEED_PASSWORD => true,
                status::NEED_ACCOUNT => {
                    account_demand = Some(user_reply.clone());
                    false
                }
                _ => return Err(FtpError::Server(user_reply)),
            };
            if password_required {
                let password = match password {
                    Some(password) => password,
                    None => return Err(FtpError::Server(user_reply)),
                };
                let pass_reply = chan.exchange(&Command::Pass(password.to_string()))?;
                match pass_reply.code() {
                    status::LOGGED_IN => {}
                    status::NEED_ACCOUNT => account_demand = Some(pass_reply),
                    _ => return Err(FtpError::Server(pass_reply)),
                }
            }
            if let Some(demand) = account_demand {
                let account = match account {
                    Some(account) => account,
                    None => return Err(FtpError::Server(demand)),
                };
                let acct_reply = chan.exchange(&Command::Acct(account.to_string()))?;
                if acct_reply.code() != status::LOGGED_IN {
                    return Err(FtpError::Server(acct_reply));
                }
            }
        }
        debug!("login OK");
        session.authenticated = true;
        session.username = Some(username.to_string());
        session.password = password.map(|p| p.to_string());
        self.post_login(&mut session, &chan)
    }

    /// Probe the server features after login: when `FEAT` advertises
    /// UTF-8, switch the control channel charset and turn the option on.
    fn post_login(&self, session: &mut Session, chan: &SharedChannel) -> FtpResult<()> {
        session.utf8_supported = false;
        let mut chan = channel::lock(chan);
        let reply = match chan.exchange(&Command::Feat) {
            Ok(reply) => reply,
            Err(FtpError::IllegalReply) => {
                // a malformed feature list does not invalidate the session
                debug!("ignoring malformed FEAT reply");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if reply.code() == status::SYSTEM_STATUS && reply.lines().len() > 2 {
            for line in &reply.lines()[1..reply.lines().len() - 1] {
                if line.trim().eq_ignore_ascii_case("UTF8") {
                    debug!("server supports UTF-8 path names");
                    session.utf8_supported = true;
                }
            }
        }
        if session.utf8_supported {
            chan.set_charset(session.pick_charset());
            match chan.exchange(&Command::Opts("UTF8".to_string(), Some("ON".to_string()))) {
                Ok(_) | Err(FtpError::IllegalReply) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Log the current user out with `REIN`, keeping the connection open
    /// for a new session.
    pub fn logout(&self) -> FtpResult<()> {
        let mut session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.exchange(&session, Command::Rein)?;
        if !reply.is_success() {
            return Err(FtpError::Server(reply));
        }
        session.authenticated = false;
        session.username = None;
        session.password = None;
        Ok(())
    }

    // -- simple commands

    /// Ping the server.
    pub fn noop(&self) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.completed_exchange(&session, Command::Noop).map(|_| ())
    }

    /// Ask the server help text, one line per element.
    pub fn help(&self) -> FtpResult<Vec<String>> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.completed_exchange(&session, Command::Help)
            .map(Reply::into_lines)
    }

    /// Ask the server status (`STAT`), one line per element.
    pub fn server_status(&self) -> FtpResult<Vec<String>> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.completed_exchange(&session, Command::Stat)
            .map(Reply::into_lines)
    }

    /// Send a custom command line and return the server reply. Don't use
    /// this for commands the client already implements.
    pub fn send_custom_command(&self, command: &str) -> FtpResult<Reply> {
        let session = self.lock_session();
        require_connected(&session)?;
        self.completed_exchange(&session, Command::Custom(command.to_string()))
    }

    /// Send a `SITE` specific command and return the server reply.
    pub fn send_site_command(&self, command: &str) -> FtpResult<Reply> {
        let session = self.lock_session();
        require_connected(&session)?;
        self.completed_exchange(&session, Command::Site(command.to_string()))
    }

    /// Switch the user account.
    pub fn change_account(&self, account: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.exchange(&session, Command::Acct(account.to_string()))?;
        match reply.is_success() {
            true => Ok(()),
            false => Err(FtpError::Server(reply)),
        }
    }

    // -- navigation and metadata

    /// The absolute path of the current working directory.
    pub fn current_directory(&self) -> FtpResult<String> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.success_exchange(&session, Command::Pwd)?;
        let line = single_line(&reply)?;
        match PWD_PATH_RE.captures(line) {
            Some(caps) => Ok(caps[1].to_string()),
            None => Err(FtpError::IllegalReply),
        }
    }

    /// Change the current working directory.
    pub fn change_directory(&self, path: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.success_exchange(&session, Command::Cwd(path.to_string()))
            .map(|_| ())
    }

    /// Move to the parent directory.
    pub fn change_directory_up(&self) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.success_exchange(&session, Command::Cdup).map(|_| ())
    }

    /// The last modification date of a remote file, as reported by the
    /// server (`MDTM`, UTC).
    pub fn modified_date(&self, path: &str) -> FtpResult<DateTime<Utc>> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.success_exchange(&session, Command::Mdtm(path.to_string()))?;
        let line = single_line(&reply)?;
        parse_mdtm(line)
    }

    /// The size in bytes of a remote file (`SIZE`).
    pub fn file_size(&self, path: &str) -> FtpResult<u64> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.success_exchange(&session, Command::Size(path.to_string()))?;
        let line = single_line(&reply)?;
        line.trim().parse::<u64>().map_err(|_| FtpError::IllegalReply)
    }

    /// Rename (or move) a remote file or directory.
    pub fn rename(&self, old_path: &str, new_path: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let reply = self.exchange(&session, Command::RenameFrom(old_path.to_string()))?;
        if reply.code() != status::PENDING_FURTHER_INFO {
            return Err(FtpError::Server(reply));
        }
        self.success_exchange(&session, Command::RenameTo(new_path.to_string()))
            .map(|_| ())
    }

    /// Delete a remote file.
    pub fn delete_file(&self, path: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.success_exchange(&session, Command::Dele(path.to_string()))
            .map(|_| ())
    }

    /// Delete a remote directory.
    pub fn delete_directory(&self, path: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.success_exchange(&session, Command::Rmd(path.to_string()))
            .map(|_| ())
    }

    /// Create a remote directory.
    pub fn create_directory(&self, name: &str) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.success_exchange(&session, Command::Mkd(name.to_string()))
            .map(|_| ())
    }

    // -- listings

    /// List the current working directory (or `file_spec`, which may
    /// carry server-side wildcards), parsing the reply through the
    /// registered dialect parsers. The first parser that understands the
    /// listing is cached for the rest of the connection.
    pub fn list(&self, file_spec: Option<&str>) -> FtpResult<Vec<FileEntry>> {
        let mut session = self.lock_session();
        require_authenticated(&session)?;
        let lines = self.retrieve_lines(&session, Command::List(file_spec.map(str::to_string)))?;
        match session.cached_parser {
            Some(cached) => session.parsers[cached]
                .parse(&lines)
                .map_err(|_| FtpError::ListParse),
            None => {
                for (idx, parser) in session.parsers.iter().enumerate() {
                    if let Ok(entries) = parser.parse(&lines) {
                        trace!("listing understood by parser #{idx}");
                        session.cached_parser = Some(idx);
                        return Ok(entries);
                    }
                }
                Err(FtpError::ListParse)
            }
        }
    }

    /// List the file names of the current working directory (`NLST`).
    pub fn list_names(&self) -> FtpResult<Vec<String>> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        self.retrieve_lines(&session, Command::Nlst)
    }

    // -- transfers

    /// Download a remote file into `dest`, which is always written from
    /// its current position. `restart_at` is the offset declared to the
    /// server with `REST`.
    pub fn download(
        &self,
        file_name: &str,
        dest: &mut dyn Write,
        restart_at: u64,
        mut listener: Option<&mut dyn TransferListener>,
    ) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let chan = session_channel(&session)?;
        let textual = session.effective_type(file_name) == TransferType::Textual;
        let charset = session.pick_charset();
        let mut endpoint = self.negotiate_endpoint(&session, &chan)?;
        if let Err(err) = self
            .set_type(&chan, textual)
            .and_then(|_| self.request_restart(&chan, restart_at))
        {
            endpoint.dispose();
            return Err(err);
        }
        let mut conn = self.open_data_connection(
            &session,
            &chan,
            &mut endpoint,
            Command::Retr(file_name.to_string()),
        )?;
        debug!("downloading '{file_name}' ({})", if textual { "textual" } else { "binary" });
        let ticker = self.begin_transfer(&chan, &conn, session.settings.keep_alive_delay);
        if let Some(observer) = listener.as_deref_mut() {
            observer.started();
        }
        let outcome = {
            let mut progress = |n: usize| {
                if let Some(observer) = listener.as_deref_mut() {
                    observer.transferred(n);
                }
            };
            if textual {
                transfer::pump_textual_download(&mut conn, dest, charset, &mut progress)
            } else {
                transfer::pump_binary_download(&mut conn, dest, &mut progress)
            }
        };
        let result = self.settle_transfer(outcome, &mut listener);
        self.finish_transfer(&chan, ticker, conn);
        if result.is_ok() {
            if let Some(observer) = listener.as_deref_mut() {
                observer.completed();
            }
        }
        result
    }

    /// Upload `stream_length` bytes of `source` to the remote file, after
    /// skipping `stream_offset` bytes of the local stream. `restart_at`
    /// is independent of the offset: it is the restart point declared to
    /// the server with `REST`.
    pub fn upload(
        &self,
        file_name: &str,
        source: &mut dyn Read,
        restart_at: u64,
        stream_offset: u64,
        stream_length: u64,
        mut listener: Option<&mut dyn TransferListener>,
    ) -> FtpResult<()> {
        let session = self.lock_session();
        require_authenticated(&session)?;
        let chan = session_channel(&session)?;
        let textual = session.effective_type(file_name) == TransferType::Textual;
        let charset = session.pick_charset();
        let mut endpoint = self.negotiate_endpoint(&session, &chan)?;
        if let Err(err) = self
            .set_type(&chan, textual)
            .and_then(|_| self.request_restart(&chan, restart_at))
        {
            endpoint.dispose();
            return Err(err);
        }
        let mut conn = self.open_data_connection(
            &session,
            &chan,
            &mut endpoint,
            Command::Stor(file_name.to_string()),
        )?;
        debug!("uploading '{file_name}' ({})", if textual { "textual" } else { "binary" });
        let ticker = self.begin_transfer(&chan, &conn, session.settings.keep_alive_delay);
        if let Some(observer) = listener.as_deref_mut() {
            observer.started();
        }
        let outcome = {
            let mut progress = |n: usize| {
                if let Some(observer) = listener.as_deref_mut() {
                    observer.transferred(n);
                }
            };
            transfer::skip_bytes(source, stream_offset).and_then(|_| {
                if textual {
                    transfer::pump_textual_upload(
                        source,
                        &mut conn,
                        stream_length,
                        charset,
                        &mut progress,
                    )
                } else {
                    transfer::pump_binary_upload(source, &mut conn, stream_length, &mut progress)
                }
            })
        };
        let result = self.settle_transfer(outcome, &mut listener);
        self.finish_transfer(&chan, ticker, conn);
        if result.is_ok() {
            if let Some(observer) = listener.as_deref_mut() {
                observer.completed();
            }
        }
        result
    }

    /// Abort the ongoing data transfer, if any. With `send_abor` the
    /// abort is negotiated with the server through `ABOR`; either way the
    /// data streams are closed so the blocked transfer call returns
    /// [`FtpError::Aborted`].
    pub fn abort_current_transfer(&self, send_abor: bool) -> FtpResult<()> {
        let mut transfer = self.lock_transfer();
        if transfer.ongoing && !transfer.aborted {
            debug!("aborting the current transfer");
            if send_abor {
                if let Some(chan) = transfer.channel.clone() {
                    let mut chan = channel::lock(&chan);
                    chan.send_command(&Command::Abor)?;
                    chan.read_reply()?;
                }
            }
            if let Some(closer) = &transfer.data_closer {
                closer.close();
            }
            transfer.aborted = true;
        }
        Ok(())
    }

    // -- transfer engine plumbing

    /// One command/reply round trip on the session channel.
    fn exchange(&self, session: &Session, command: Command) -> FtpResult<Reply> {
        let chan = session_channel(session)?;
        let reply = channel::lock(&chan).exchange(&command)?;
        Ok(reply)
    }

    /// Round trip requiring a positive (1xx-3xx) reply.
    fn success_exchange(&self, session: &Session, command: Command) -> FtpResult<Reply> {
        let reply = self.exchange(session, command)?;
        match reply.is_success() {
            true => Ok(reply),
            false => Err(FtpError::Server(reply)),
        }
    }

    /// Round trip requiring a completed (2xx) reply.
    fn completed_exchange(&self, session: &Session, command: Command) -> FtpResult<Reply> {
        let reply = self.exchange(session, command)?;
        match reply.is_completed() {
            true => Ok(reply),
            false => Err(FtpError::Server(reply)),
        }
    }

    /// Negotiate the data endpoint per the session mode.
    fn negotiate_endpoint(
        &self,
        session: &Session,
        chan: &SharedChannel,
    ) -> FtpResult<DataEndpoint> {
        let mut chan = channel::lock(chan);
        if session.passive {
            endpoint::open_passive(&mut chan)
        } else {
            let host = session.host.clone().unwrap_or_default();
            endpoint::open_active(&mut chan, &host, session.port, &session.settings)
        }
    }

    /// Set the representation type for the upcoming transfer.
    fn set_type(&self, chan: &SharedChannel, textual: bool) -> FtpResult<()> {
        let reply = channel::lock(chan).exchange(&Command::Type(textual))?;
        match reply.is_completed() {
            true => Ok(()),
            false => Err(FtpError::Server(reply)),
        }
    }

    /// Declare the restart offset. A server without `REST` support is
    /// only an error when a real resume was requested.
    fn request_restart(&self, chan: &SharedChannel, restart_at: u64) -> FtpResult<()> {
        let reply = channel::lock(chan).exchange(&Command::Rest(restart_at))?;
        match reply.code() {
            status::PENDING_FURTHER_INFO => Ok(()),
            status::NOT_IMPLEMENTED if restart_at > 0 => Err(FtpError::Server(Reply::new(
                status::NOT_IMPLEMENTED,
                vec!["Resume is not supported by this server".to_string()],
            ))),
            _ => Err(FtpError::Server(reply)),
        }
    }

    /// Send the transfer command, open the data connection through the
    /// producer and validate the preliminary reply (150/125). The
    /// endpoint is disposed in every outcome; the preliminary reply is
    /// consumed even when opening the data connection failed, to keep the
    /// channel aligned.
    fn open_data_connection(
        &self,
        session: &Session,
        chan: &SharedChannel,
        data_endpoint: &mut DataEndpoint,
        command: Command,
    ) -> FtpResult<Connection> {
        let mut chan = channel::lock(chan);
        if let Err(err) = chan.send_command(&command) {
            data_endpoint.dispose();
            return Err(err);
        }
        let opened = data_endpoint.open(session.connector.as_ref());
        let preliminary = chan.read_reply();
        data_endpoint.dispose();
        let conn = opened?;
        let reply = preliminary?;
        if reply.code() != status::ABOUT_TO_OPEN && reply.code() != status::ALREADY_OPEN {
            return Err(FtpError::Server(reply));
        }
        Ok(conn)
    }

    /// Flag the transfer as ongoing and arm the keep-alive ticker.
    fn begin_transfer(
        &self,
        chan: &SharedChannel,
        conn: &Connection,
        keep_alive_delay: Duration,
    ) -> Option<KeepAliveTicker> {
        self.lock_transfer().begin(chan.clone(), conn.closer());
        KeepAliveTicker::start(chan.clone(), keep_alive_delay)
    }

    /// Wind a transfer down whatever its outcome: stop the ticker, close
    /// the data connection, consume the trailing reply (its value is
    /// irrelevant, its consumption keeps the channel aligned) and clear
    /// the transfer state.
    fn finish_transfer(
        &self,
        chan: &SharedChannel,
        ticker: Option<KeepAliveTicker>,
        conn: Connection,
    ) {
        if let Some(ticker) = ticker {
            ticker.stop();
        }
        let closer = conn.closer();
        drop(conn);
        closer.close();
        if let Err(err) = channel::lock(chan).read_reply() {
            debug!("could not consume the trailing transfer reply: {err}");
        }
        self.lock_transfer().end();
    }

    /// Settle the outcome of a pump under the abort lock. A concurrent
    /// abort wins over whatever the pump observed: closing the data
    /// socket from the abort path surfaces on this side either as an I/O
    /// error or as a clean-looking EOF, and both must come out as
    /// [`FtpError::Aborted`].
    fn settle_transfer<T>(
        &self,
        outcome: io::Result<T>,
        listener: &mut Option<&mut dyn TransferListener>,
    ) -> FtpResult<T> {
        if self.lock_transfer().aborted {
            if let Some(observer) = listener.as_deref_mut() {
                observer.aborted();
            }
            return Err(FtpError::Aborted);
        }
        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Some(observer) = listener.as_deref_mut() {
                    observer.failed();
                }
                Err(FtpError::DataTransferError(err))
            }
        }
    }

    /// Run a `TYPE A` retrieval (listing) and collect the lines through
    /// the NVT-ASCII reader; empty lines are discarded.
    fn retrieve_lines(&self, session: &Session, command: Command) -> FtpResult<Vec<String>> {
        let chan = session_channel(session)?;
        let charset = session.pick_charset();
        let mut endpoint = self.negotiate_endpoint(session, &chan)?;
        if let Err(err) = self.set_type(&chan, true) {
            endpoint.dispose();
            return Err(err);
        }
        let conn = self.open_data_connection(session, &chan, &mut endpoint, command)?;
        let ticker = self.begin_transfer(&chan, &conn, session.settings.keep_alive_delay);
        let mut reader = BufReader::new(conn);
        let outcome = nvt::read_lines(&mut reader, charset);
        let result = self.settle_transfer(outcome, &mut None);
        self.finish_transfer(&chan, ticker, reader.into_inner());
        result
    }
}

impl fmt::Debug for FtpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.lock_session();
        f.debug_struct("FtpClient")
            .field("connected", &session.connected)
            .field("host", &session.host)
            .field("port", &session.port)
            .field("authenticated", &session.authenticated)
            .field("username", &session.username)
            .field("password", &session.password.as_ref().map(|_| "***"))
            .field("passive", &session.passive)
            .field("transfer_type", &session.transfer_type)
            .field("charset", &session.charset)
            .field("utf8_supported", &session.utf8_supported)
            .finish()
    }
}

/// Expect a reply with exactly one line and return it.
fn single_line(reply: &Reply) -> FtpResult<&str> {
    match reply.lines() {
        [line] => Ok(line.as_str()),
        _ => Err(FtpError::IllegalReply),
    }
}

/// Parse a `YYYYMMDDHHMMSS` MDTM payload as a UTC timestamp.
fn parse_mdtm(line: &str) -> FtpResult<DateTime<Utc>> {
    let caps = MDTM_RE.captures(line).ok_or(FtpError::IllegalReply)?;
    // the regex guarantees digits
    let ymd = (
        caps[1].parse::<i32>().unwrap_or_default(),
        caps[2].parse::<u32>().unwrap_or_default(),
        caps[3].parse::<u32>().unwrap_or_default(),
    );
    let hms = (
        caps[4].parse::<u32>().unwrap_or_default(),
        caps[5].parse::<u32>().unwrap_or_default(),
        caps[6].parse::<u32>().unwrap_or_default(),
    );
    let date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).ok_or(FtpError::IllegalReply)?;
    let time = NaiveTime::from_hms_opt(hms.0, hms.1, hms.2).ok_or(FtpError::IllegalReply)?;
    Ok(date.and_time(time).and_utc())
}
