//! Multicast transport: one socket joined to the group for receiving, one
//! for sending to it.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::config::McastConf;
use crate::sockopt;

pub(crate) struct McastTransport {
    server: UdpSocket,
    client: UdpSocket,
    dest: SocketAddr,
}

impl McastTransport {
    /// IPv4 + UDP headers.
    pub(crate) const HEADER_SIZE: usize = 28;

    pub(crate) fn open(conf: &McastConf, ifindex: u32) -> io::Result<Self> {
        let (server, client, dest) = match conf.group {
            IpAddr::V4(group) => {
                let iface = conf.interface_addr.unwrap_or(Ipv4Addr::UNSPECIFIED);
                (
                    server_v4(conf, group, iface)?,
                    client_v4(conf, iface)?,
                    SocketAddr::V4(SocketAddrV4::new(group, conf.port)),
                )
            }
            IpAddr::V6(group) => (
                server_v6(conf, group, ifindex)?,
                client_v6(conf, ifindex)?,
                SocketAddr::V6(SocketAddrV6::new(group, conf.port, 0, ifindex)),
            ),
        };
        debug!(group = %conf.group, port = conf.port, ifindex, "multicast sockets ready");
        Ok(Self {
            server: server.into(),
            client: client.into(),
            dest,
        })
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.client.send_to(data, self.dest)
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

fn base_socket(conf: &McastConf, domain: Domain) -> io::Result<Socket> {
    let sock = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if !conf.checksum {
        sockopt::set_no_check(&sock)?;
    }
    sockopt::set_buffers(&sock, conf.sndbuf, conf.rcvbuf)?;
    Ok(sock)
}

fn server_v4(conf: &McastConf, group: Ipv4Addr, iface: Ipv4Addr) -> io::Result<Socket> {
    let sock = base_socket(conf, Domain::IPV4)?;
    sock.set_reuse_address(true)?;
    sock.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, conf.port)).into())?;
    sock.join_multicast_v4(&group, &iface)?;
    sock.set_nonblocking(true)?;
    Ok(sock)
}

fn client_v4(conf: &McastConf, iface: Ipv4Addr) -> io::Result<Socket> {
    let sock = base_socket(conf, Domain::IPV4)?;
    sock.set_multicast_loop_v4(false)?;
    sock.set_multicast_if_v4(&iface)?;
    Ok(sock)
}

fn server_v6(conf: &McastConf, group: Ipv6Addr, ifindex: u32) -> io::Result<Socket> {
    let sock = base_socket(conf, Domain::IPV6)?;
    sock.set_reuse_address(true)?;
    sock.set_only_v6(true)?;
    sock.bind(&SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, conf.port, 0, 0)).into())?;
    sock.join_multicast_v6(&group, ifindex)?;
    sock.set_nonblocking(true)?;
    Ok(sock)
}

fn client_v6(conf: &McastConf, ifindex: u32) -> io::Result<Socket> {
    let sock = base_socket(conf, Domain::IPV6)?;
    sock.set_multicast_loop_v6(false)?;
    sock.set_multicast_if_v6(ifindex)?;
    Ok(sock)
}
