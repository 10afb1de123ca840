//! TCP transport.
//!
//! The server side listens and serves a single peer at a time; a new
//! connection replaces the previous one and a peer hang-up returns the
//! server to accepting. The client side connects without blocking and
//! reconnects on the next send after any failure.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::config::TcpConf;
use crate::sockopt;

/// Upper bound on a blocking write to the peer.
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

const LISTEN_BACKLOG: i32 = 1;

enum ClientState {
    Disconnected,
    Connecting(Socket),
    Connected(TcpStream),
}

pub(crate) struct TcpTransport {
    listener: TcpListener,
    peer: Option<TcpStream>,
    /// Bumped every time `peer` changes.
    generation: u64,
    client: ClientState,
    remote: SocketAddr,
    conf: TcpConf,
}

impl TcpTransport {
    /// IPv4 + TCP headers with room for options.
    pub(crate) const HEADER_SIZE: usize = 40;

    pub(crate) fn open(conf: &TcpConf) -> io::Result<Self> {
        let sock = Socket::new(Domain::for_address(conf.server), Type::STREAM, Some(Protocol::TCP))?;
        sock.set_reuse_address(true)?;
        sockopt::set_buffers(&sock, conf.sndbuf, conf.rcvbuf)?;
        sock.bind(&conf.server.into())?;
        sock.listen(LISTEN_BACKLOG)?;
        sock.set_nonblocking(true)?;
        let listener: TcpListener = sock.into();
        debug!(server = ?listener.local_addr().ok(), "tcp listener ready");

        let mut transport = Self {
            listener,
            peer: None,
            generation: 0,
            client: ClientState::Disconnected,
            remote: conf.client,
            conf: conf.clone(),
        };
        // A peer that is not up yet is retried on the next send.
        if let Err(e) = transport.poll_connect() {
            debug!(client = %conf.client, error = %e, "initial connect failed");
        }
        Ok(transport)
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.poll_connect()? {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection to peer in progress",
            ));
        }
        let ClientState::Connected(stream) = &mut self.client else {
            return Err(io::ErrorKind::NotConnected.into());
        };
        match stream.write_all(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                warn!(client = %self.remote, error = %e, "tcp send failed, reconnecting");
                self.client = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    pub(crate) fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(peer) = self.peer.as_mut() else {
            return Ok(0);
        };
        match peer.read(buf) {
            Ok(0) => {
                info!("tcp peer closed connection");
                self.set_peer(None);
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(e),
            Err(e) => {
                self.set_peer(None);
                Err(e)
            }
        }
    }

    /// Drop the connected peer; returns false if there was none.
    pub(crate) fn disconnect_peer(&mut self) -> bool {
        self.set_peer(None).is_some()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn set_peer(&mut self, peer: Option<TcpStream>) -> Option<TcpStream> {
        let previous = std::mem::replace(&mut self.peer, peer);
        if previous.is_some() || self.peer.is_some() {
            self.generation += 1;
        }
        previous
    }

    /// Accept a pending connection; returns false if none was waiting.
    pub(crate) fn accept(&mut self) -> io::Result<bool> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(true)?;
                if self.set_peer(Some(stream)).is_some() {
                    info!(%addr, "tcp peer replaced by new connection");
                } else {
                    info!(%addr, "tcp peer connected");
                }
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Descriptor of the connected peer, if any.
    pub(crate) fn fd(&self) -> Option<RawFd> {
        self.peer.as_ref().map(AsRawFd::as_raw_fd)
    }

    pub(crate) fn accept_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub(crate) fn is_peer_connected(&self) -> bool {
        self.peer.is_some()
    }

    pub(crate) fn is_client_connected(&self) -> bool {
        matches!(self.client, ClientState::Connected(_))
    }

    /// Drive the client connection forward; true once it is usable.
    fn poll_connect(&mut self) -> io::Result<bool> {
        match std::mem::replace(&mut self.client, ClientState::Disconnected) {
            ClientState::Connected(stream) => {
                self.client = ClientState::Connected(stream);
                Ok(true)
            }
            ClientState::Disconnected => {
                let sock = Socket::new(
                    Domain::for_address(self.remote),
                    Type::STREAM,
                    Some(Protocol::TCP),
                )?;
                sockopt::set_buffers(&sock, self.conf.sndbuf, self.conf.rcvbuf)?;
                sock.set_nonblocking(true)?;
                match sock.connect(&self.remote.into()) {
                    Ok(()) => self.establish(sock),
                    Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {
                        debug!(client = %self.remote, "tcp connect in progress");
                        self.client = ClientState::Connecting(sock);
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
            ClientState::Connecting(sock) => {
                if let Some(e) = sock.take_error()? {
                    return Err(e);
                }
                match sock.peer_addr() {
                    Ok(_) => self.establish(sock),
                    Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                        self.client = ClientState::Connecting(sock);
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn establish(&mut self, sock: Socket) -> io::Result<bool> {
        sock.set_nonblocking(false)?;
        sock.set_write_timeout(Some(SEND_TIMEOUT))?;
        sock.set_nodelay(true)?;
        info!(client = %self.remote, "tcp connected to peer");
        self.client = ClientState::Connected(sock.into());
        Ok(true)
    }
}
