//! Unicast UDP transport.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::config::UdpConf;
use crate::sockopt;

pub(crate) struct UdpTransport {
    server: UdpSocket,
    client: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// IPv4 + UDP headers.
    pub(crate) const HEADER_SIZE: usize = 28;

    pub(crate) fn open(conf: &UdpConf) -> io::Result<Self> {
        let server = socket(conf, conf.server)?;
        server.set_reuse_address(true)?;
        server.bind(&conf.server.into())?;
        server.set_nonblocking(true)?;

        let client = socket(conf, conf.client)?;

        let server: UdpSocket = server.into();
        debug!(
            server = ?server.local_addr().ok(),
            client = %conf.client,
            "udp sockets ready"
        );
        Ok(Self {
            server,
            client: client.into(),
            peer: conf.client,
        })
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.client.send_to(data, self.peer)
    }

    pub(crate) fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.server.recv(buf)
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.server.as_raw_fd()
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr().ok()
    }
}

fn socket(conf: &UdpConf, addr: SocketAddr) -> io::Result<Socket> {
    let sock = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if !conf.checksum {
        sockopt::set_no_check(&sock)?;
    }
    sockopt::set_buffers(&sock, conf.sndbuf, conf.rcvbuf)?;
    Ok(sock)
}
