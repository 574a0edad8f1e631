//! # Connector
//!
//! The transport abstraction. A [`Connector`] produces byte-stream
//! [`Connection`]s for the command and data channels; everything above it
//! is transport-agnostic. Ships with a plain TCP connector and, behind the
//! `native-tls` feature, an SSL connector that secures the command channel
//! only.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// A duplex byte stream usable as a command or data channel.
pub trait ConnectionStream: Read + Write + Send {}

impl<T: Read + Write + Send> ConnectionStream for T {}

/// A cloneable, thread-safe handle that shuts a connection down. Closing
/// is idempotent; a blocked read or write on the connection observes an
/// I/O error once the handle fires.
#[derive(Clone)]
pub struct CloseHandle(Arc<dyn Fn() + Send + Sync>);

impl CloseHandle {
    pub fn new<F: Fn() + Send + Sync + 'static>(f: F) -> Self {
        Self(Arc::new(f))
    }

    /// A handle that does nothing, for in-memory streams.
    pub fn noop() -> Self {
        Self::new(|| ())
    }

    pub fn close(&self) {
        (self.0)()
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloseHandle")
    }
}

/// A live connection with a remote host: one duplex stream plus the handle
/// that can shut it down from another thread.
pub struct Connection {
    stream: Box<dyn ConnectionStream>,
    closer: CloseHandle,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connection")
    }
}

impl Connection {
    pub fn new<S: ConnectionStream + 'static>(stream: S, closer: CloseHandle) -> Self {
        Self {
            stream: Box::new(stream),
            closer,
        }
    }

    /// Wraps a [`TcpStream`], deriving the close handle from a clone of
    /// the socket.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let handle = stream.try_clone()?;
        Ok(Self::new(
            stream,
            CloseHandle::new(move || {
                let _ = handle.shutdown(Shutdown::Both);
            }),
        ))
    }

    pub fn closer(&self) -> CloseHandle {
        self.closer.clone()
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Produces connections for the two FTP channels. Implementations must be
/// safe for repeated use; the client calls `connect_for_data` once per
/// transfer.
pub trait Connector: Send + Sync {
    /// Open the persistent command connection.
    fn connect_for_command(&self, host: &str, port: u16) -> io::Result<Connection>;

    /// Open a one-shot data connection.
    fn connect_for_data(&self, host: &str, port: u16) -> io::Result<Connection>;
}

/// Connects with straight TCP sockets, no proxy, both channels.
#[derive(Debug, Clone, Default)]
pub struct DirectConnector {
    timeout: Option<Duration>,
}

impl DirectConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `timeout` to connection establishment and to socket reads and
    /// writes. The read timeout is what bounds the trailing-reply
    /// consumption when a server dies mid-transfer.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    fn open(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = match self.timeout {
            Some(timeout) => {
                let mut last_err = None;
                let mut stream = None;
                for addr in (host, port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            stream = Some(s);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match stream {
                    Some(s) => s,
                    None => {
                        return Err(last_err.unwrap_or_else(|| {
                            io::Error::new(io::ErrorKind::NotFound, "host resolved to no address")
                        }))
                    }
                }
            }
            None => TcpStream::connect((host, port))?,
        };
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        Ok(stream)
    }
}

impl Connector for DirectConnector {
    fn connect_for_command(&self, host: &str, port: u16) -> io::Result<Connection> {
        Connection::from_tcp(self.open(host, port)?)
    }

    fn connect_for_data(&self, host: &str, port: u16) -> io::Result<Connection> {
        Connection::from_tcp(self.open(host, port)?)
    }
}

/// Secures the command channel with TLS and leaves the data channel on
/// plain TCP.
#[cfg(feature = "native-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
pub struct SslConnector {
    tls: native_tls::TlsConnector,
}

#[cfg(feature = "native-tls")]
impl SslConnector {
    pub fn new(tls: native_tls::TlsConnector) -> Self {
        Self { tls }
    }
}

#[cfg(feature = "native-tls")]
impl Connector for SslConnector {
    fn connect_for_command(&self, host: &str, port: u16) -> io::Result<Connection> {
        let tcp = TcpStream::connect((host, port))?;
        let handle = tcp.try_clone()?;
        let stream = self
            .tls
            .connect(host, tcp)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(Connection::new(
            stream,
            CloseHandle::new(move || {
                let _ = handle.shutdown(Shutdown::Both);
            }),
        ))
    }

    fn connect_for_data(&self, host: &str, port: u16) -> io::Result<Connection> {
        Connection::from_tcp(TcpStream::connect((host, port))?)
    }
}

#[cfg(test)]
mod test {

    use std::net::TcpListener;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn close_handle_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let _ = listener.accept().unwrap();
        });
        let conn = Connection::from_tcp(TcpStream::connect(addr).unwrap()).unwrap();
        let closer = conn.closer();
        closer.close();
        closer.close();
        server.join().unwrap();
    }

    #[test]
    fn close_handle_unblocks_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (_socket, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(400));
        });
        let mut conn = Connection::from_tcp(TcpStream::connect(addr).unwrap()).unwrap();
        let closer = conn.closer();
        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            closer.close();
        });
        let mut buf = [0u8; 16];
        // the blocked read returns 0 or an error once the socket is shut down
        let outcome = conn.read(&mut buf);
        assert!(matches!(outcome, Ok(0) | Err(_)));
        aborter.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn direct_connector_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).unwrap();
            socket.write_all(&buf).unwrap();
        });
        let connector = DirectConnector::with_timeout(Duration::from_secs(5));
        let mut conn = connector
            .connect_for_data(&addr.ip().to_string(), addr.port())
            .unwrap();
        conn.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        server.join().unwrap();
    }
}
