//! # Listener
//!
//! Observer traits: one for raw control-channel traffic, one for transfer
//! progress.

/// Observes the raw traffic on the control channel. `sent` fires for every
/// command line written, `received` for every reply line read.
///
/// Callbacks are invoked while the channel is locked; implementations must
/// return quickly and must not call back into the client.
pub trait CommunicationListener: Send + Sync {
    /// A command line was sent to the server (CRLF excluded).
    fn sent(&self, line: &str) {
        let _ = line;
    }

    /// A reply line was received from the server (CRLF excluded).
    fn received(&self, line: &str) {
        let _ = line;
    }
}

/// Observes the progress of a single transfer. Callbacks are invoked from
/// the transferring thread; implementations must not perform blocking I/O.
pub trait TransferListener {
    /// The data connection is open and the transfer is about to start.
    fn started(&mut self) {}

    /// A chunk of `bytes` bytes was moved.
    fn transferred(&mut self, bytes: usize) {
        let _ = bytes;
    }

    /// The transfer ran to completion.
    fn completed(&mut self) {}

    /// The transfer was ended by an abort request.
    fn aborted(&mut self) {}

    /// The transfer failed on the data connection.
    fn failed(&mut self) {}
}
