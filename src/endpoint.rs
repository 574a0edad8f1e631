//! # Endpoint
//!
//! The data endpoint factory: negotiates a one-shot producer for the data
//! connection, either passive (`PASV`, dial the remote coordinates) or
//! active (`PORT`, accept one inbound connection on an ephemeral
//! listener).

use std::net::{IpAddr, Ipv4Addr, TcpListener, UdpSocket};
use std::time::{Duration, Instant};

use crate::channel::ControlChannel;
use crate::command::Command;
use crate::config::Settings;
use crate::connector::{Connection, Connector};
use crate::regex::PASV_SEXTUPLE_RE;
use crate::reply::Reply;
use crate::types::{FtpError, FtpResult};

/// A one-shot producer of a data connection. `open` may be called at most
/// once; `dispose` is idempotent and releases an unused listener.
pub(crate) enum DataEndpoint {
    Passive {
        host: Ipv4Addr,
        port: u16,
    },
    Active {
        listener: Option<TcpListener>,
        timeout: Duration,
    },
}

impl DataEndpoint {
    /// Produce the data connection: dial the remote for passive mode,
    /// accept the one inbound connection for active mode.
    pub fn open(&mut self, connector: &dyn Connector) -> FtpResult<Connection> {
        match self {
            DataEndpoint::Passive { host, port } => connector
                .connect_for_data(&host.to_string(), *port)
                .map_err(FtpError::DataTransferError),
            DataEndpoint::Active { listener, timeout } => {
                let listener = listener
                    .take()
                    .ok_or(FtpError::IllegalState("data connection already opened"))?;
                let deadline = Instant::now() + *timeout;
                loop {
                    match listener.accept() {
                        Ok((stream, remote)) => {
                            trace!("accepted data connection from {remote}");
                            stream
                                .set_nonblocking(false)
                                .map_err(FtpError::DataTransferError)?;
                            break Connection::from_tcp(stream).map_err(FtpError::DataTransferError);
                        }
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            if Instant::now() > deadline {
                                break Err(FtpError::DataTransferError(
                                    std::io::ErrorKind::TimedOut.into(),
                                ));
                            }
                            std::thread::sleep(Duration::from_millis(50));
                        }
                        Err(e) => break Err(FtpError::DataTransferError(e)),
                    }
                }
            }
        }
    }

    /// Release the listener if the endpoint was never opened. Always safe.
    pub fn dispose(&mut self) {
        if let DataEndpoint::Active { listener, .. } = self {
            if listener.take().is_some() {
                trace!("disposed unused active-mode listener");
            }
        }
    }
}

/// Negotiate a passive-mode endpoint: send `PASV` and extract the remote
/// coordinates from the reply.
pub(crate) fn open_passive(channel: &mut ControlChannel) -> FtpResult<DataEndpoint> {
    debug!("PASV command");
    let reply = channel.exchange(&Command::Pasv)?;
    if !reply.is_success() {
        return Err(FtpError::Server(reply));
    }
    let (host, port) = passive_target(&reply)?;
    trace!("passive data endpoint is {host}:{port}");
    Ok(DataEndpoint::Passive { host, port })
}

/// Extract `h1.h2.h3.h4:p1*256+p2` from the first run of six
/// comma-separated integers found in the reply text.
pub(crate) fn passive_target(reply: &Reply) -> FtpResult<(Ipv4Addr, u16)> {
    for line in reply.lines() {
        if let Some(caps) = PASV_SEXTUPLE_RE.captures(line) {
            let mut parts = [0u8; 6];
            for (i, part) in parts.iter_mut().enumerate() {
                *part = caps[i + 1].parse::<u8>().map_err(|_| FtpError::IllegalReply)?;
            }
            let host = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
            let port = u16::from(parts[4]) * 256 + u16::from(parts[5]);
            return Ok((host, port));
        }
    }
    // positive reply without coordinates: give up, no retry
    Err(FtpError::IllegalReply)
}

/// Negotiate an active-mode endpoint: bind an ephemeral listener,
/// advertise it with `PORT` and hand back the pending listener.
pub(crate) fn open_active(
    channel: &mut ControlChannel,
    peer_host: &str,
    peer_port: u16,
    settings: &Settings,
) -> FtpResult<DataEndpoint> {
    let listener = TcpListener::bind("0.0.0.0:0").map_err(FtpError::ConnectionError)?;
    listener
        .set_nonblocking(true)
        .map_err(FtpError::ConnectionError)?;
    let port = listener
        .local_addr()
        .map_err(FtpError::ConnectionError)?
        .port();
    let host = settings
        .active_host_override
        .unwrap_or_else(|| local_address_toward(peer_host, peer_port));
    debug!("active mode, listening on {host}:{port}");
    let reply = channel.exchange(&Command::Port(port_argument(host, port)))?;
    if !reply.is_success() {
        drop(listener);
        return Err(FtpError::Server(reply));
    }
    Ok(DataEndpoint::Active {
        listener: Some(listener),
        timeout: settings.accept_timeout,
    })
}

/// Render the `PORT` argument sextuple for an address/port pair.
pub(crate) fn port_argument(host: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = host.octets();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port / 256, port % 256)
}

/// Find the local IPv4 address the host would use to reach the server,
/// through a connected UDP probe (no packet is sent). Falls back to the
/// loopback address when detection fails.
fn local_address_toward(peer_host: &str, peer_port: u16) -> Ipv4Addr {
    let detected = UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect((peer_host, peer_port))?;
            socket.local_addr()
        })
        .ok()
        .and_then(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        });
    match detected {
        Some(addr) => addr,
        None => {
            warn!("could not detect the local address toward {peer_host}; advertising loopback");
            Ipv4Addr::LOCALHOST
        }
    }
}
