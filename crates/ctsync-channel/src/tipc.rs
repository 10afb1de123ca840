//! TIPC transport over reliable datagram sockets.
//!
//! The server binds a name sequence covering the configured instance at
//! cluster scope; the client sends to that name.

use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, SockAddr, Socket, Type};
use tracing::debug;

use crate::config::TipcConf;
use crate::sockopt;

const TIPC_ADDR_NAMESEQ: u8 = 1;
const TIPC_ADDR_NAME: u8 = 2;
const TIPC_CLUSTER_SCOPE: i8 = 2;

/// `struct sockaddr_tipc` from `<linux/tipc.h>`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct SockaddrTipc {
    family: libc::sa_family_t,
    addrtype: u8,
    scope: i8,
    /// `tipc_name_seq {type, lower, upper}` or `{tipc_name {type, instance}, domain}`.
    addr: [u32; 3],
}

impl SockaddrTipc {
    fn name_seq(service: u32, lower: u32, upper: u32) -> Self {
        Self {
            family: libc::AF_TIPC as libc::sa_family_t,
            addrtype: TIPC_ADDR_NAMESEQ,
            scope: TIPC_CLUSTER_SCOPE,
            addr: [service, lower, upper],
        }
    }

    fn name(service: u32, instance: u32) -> Self {
        Self {
            family: libc::AF_TIPC as libc::sa_family_t,
            addrtype: TIPC_ADDR_NAME,
            scope: 0,
            addr: [service, instance, 0],
        }
    }

    fn to_sock_addr(self) -> SockAddr {
        // SAFETY: sockaddr_storage is plain old data; all-zero is valid.
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        // SAFETY: SockaddrTipc is repr(C) and smaller than sockaddr_storage,
        // and both pointers are valid and properly aligned for the write.
        unsafe {
            std::ptr::write(
                (&mut storage as *mut libc::sockaddr_storage).cast::<SockaddrTipc>(),
                self,
            );
        }
        let len = std::mem::size_of::<SockaddrTipc>() as libc::socklen_t;
        // SAFETY: `storage` holds an initialised AF_TIPC address of `len` bytes.
        unsafe { SockAddr::new(storage, len) }
    }
}

pub(crate) struct TipcTransport {
    server: Socket,
    client: Socket,
    dest: SockAddr,
}

impl TipcTransport {
    /// TIPC header.
    pub(crate) const HEADER_SIZE: usize = 60;

    pub(crate) fn open(conf: &TipcConf) -> io::Result<Self> {
        let server = Self::socket(conf)?;
        let seq = SockaddrTipc::name_seq(conf.service, conf.instance, conf.instance);
        server.bind(&seq.to_sock_addr())?;
        server.set_nonblocking(true)?;

        let client = Self::socket(conf)?;
        debug!(service = conf.service, instance = conf.instance, "tipc sockets ready");
        Ok(Self {
            server,
            client,
            dest: SockaddrTipc::name(conf.service, conf.instance).to_sock_addr(),
        })
    }

    fn socket(conf: &TipcConf) -> io::Result<Socket> {
        let sock = Socket::new(Domain::from(libc::AF_TIPC), Type::from(libc::SOCK_RDM), None)?;
        sockopt::set_buffers(&sock, conf.sndbuf, conf.rcvbuf)?;
        Ok(sock)
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.client.send_to(data, &self.dest)
    }

    pub(crate) fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.server).read(buf)
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.server.as_raw_fd()
    }
}
