//! # Channel
//!
//! The control channel: framed, charset-switchable command/reply exchange
//! over the command connection, with listener fan-out on every line.
//!
//! The channel is shared behind its own mutex so that the keep-alive
//! ticker and the abort path can use it while the session lock is held by
//! a transferring thread. Whoever holds the channel lock owns a full
//! command/reply pair; this is what keeps NOOPs contiguous on the wire.

use std::io::{BufReader, Write};
use std::sync::{Arc, Mutex};

use crate::command::Command;
use crate::connector::{CloseHandle, Connection};
use crate::listener::CommunicationListener;
use crate::reply::Reply;
use crate::types::{Charset, FtpError, FtpResult};

/// The control channel as shared between the session, the keep-alive
/// ticker and the abort path.
pub(crate) type SharedChannel = Arc<Mutex<ControlChannel>>;

/// Lock a shared channel, recovering from a poisoned mutex: the channel
/// state stays consistent between exchanges even when a panic interrupted
/// another holder.
pub(crate) fn lock(channel: &SharedChannel) -> std::sync::MutexGuard<'_, ControlChannel> {
    channel.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct ControlChannel {
    reader: BufReader<Connection>,
    charset: Charset,
    listeners: Vec<Arc<dyn CommunicationListener>>,
}

impl ControlChannel {
    pub fn new(
        connection: Connection,
        charset: Charset,
        listeners: Vec<Arc<dyn CommunicationListener>>,
    ) -> Self {
        Self {
            reader: BufReader::new(connection),
            charset,
            listeners,
        }
    }

    pub fn into_shared(self) -> SharedChannel {
        Arc::new(Mutex::new(self))
    }

    /// Send a command line: command word in ASCII, arguments in the
    /// current charset, CRLF terminated.
    pub fn send_command(&mut self, command: &Command) -> FtpResult<()> {
        let line = command.to_string();
        trace!("CC OUT: {line}");
        let wire = command.to_wire(self.charset);
        let stream = self.reader.get_mut();
        stream
            .write_all(&wire)
            .and_then(|_| stream.flush())
            .map_err(FtpError::ConnectionError)?;
        for listener in &self.listeners {
            listener.sent(&line);
        }
        Ok(())
    }

    /// Block until the next complete reply arrives.
    pub fn read_reply(&mut self) -> FtpResult<Reply> {
        let Self {
            reader,
            charset,
            listeners,
        } = self;
        Reply::read(reader, *charset, |line| {
            trace!("CC IN: {line}");
            for listener in listeners.iter() {
                listener.received(line);
            }
        })
    }

    /// One command/reply round trip.
    pub fn exchange(&mut self, command: &Command) -> FtpResult<Reply> {
        self.send_command(command)?;
        self.read_reply()
    }

    /// Swap the charset used for both directions. Takes effect on the next
    /// line; never mid-line, since the caller holds the channel lock for
    /// whole exchanges.
    pub fn set_charset(&mut self, charset: Charset) {
        debug!("control channel charset switched to {charset}");
        self.charset = charset;
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn add_listener(&mut self, listener: Arc<dyn CommunicationListener>) {
        self.listeners.push(listener);
    }

    /// Handle that abruptly shuts the command connection down.
    pub fn close_handle(&self) -> CloseHandle {
        self.reader.get_ref().closer()
    }
}
