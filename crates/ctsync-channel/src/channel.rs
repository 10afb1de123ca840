use std::io::{self, Write};
use std::net::SocketAddr;
use std::os::fd::RawFd;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::buffer::{ErrorQueue, SendBuffer, ERRORQ_MAX_LEN};
use crate::config::{ChannelConf, ChannelFlags, TransportConf};
use crate::error::{ChannelError, Result};
use crate::iface::{self, InterfaceTable};
use crate::mcast::McastTransport;
use crate::readiness::ReadSet;
use crate::stats::{self, TrafficStats};
use crate::tcp::TcpTransport;
use crate::tipc::TipcTransport;
use crate::udp::UdpTransport;

/// Largest IP packet; buffered datagrams never exceed it whatever the MTU.
const MAX_IP_PACKET: usize = u16::MAX as usize;

enum Transport {
    Mcast(McastTransport),
    Udp(UdpTransport),
    Tcp(TcpTransport),
    Tipc(TipcTransport),
}

impl Transport {
    fn open(conf: &TransportConf, ifindex: u32) -> io::Result<Self> {
        Ok(match conf {
            TransportConf::Mcast(c) => Self::Mcast(McastTransport::open(c, ifindex)?),
            TransportConf::Udp(c) => Self::Udp(UdpTransport::open(c)?),
            TransportConf::Tcp(c) => Self::Tcp(TcpTransport::open(c)?),
            TransportConf::Tipc(c) => Self::Tipc(TipcTransport::open(c)?),
        })
    }

    fn header_size(&self) -> usize {
        match self {
            Self::Mcast(_) => McastTransport::HEADER_SIZE,
            Self::Udp(_) => UdpTransport::HEADER_SIZE,
            Self::Tcp(_) => TcpTransport::HEADER_SIZE,
            Self::Tipc(_) => TipcTransport::HEADER_SIZE,
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Self::Mcast(t) => t.send(data),
            Self::Udp(t) => t.send(data),
            Self::Tcp(t) => t.send(data),
            Self::Tipc(t) => t.send(data),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Mcast(t) => t.recv(buf),
            Self::Udp(t) => t.recv(buf),
            Self::Tcp(t) => t.recv(buf),
            Self::Tipc(t) => t.recv(buf),
        }
    }

    fn fd(&self) -> Option<RawFd> {
        match self {
            Self::Mcast(t) => Some(t.fd()),
            Self::Udp(t) => Some(t.fd()),
            Self::Tcp(t) => t.fd(),
            Self::Tipc(t) => Some(t.fd()),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Mcast(t) => t.local_addr(),
            Self::Udp(t) => t.local_addr(),
            Self::Tcp(t) => t.local_addr(),
            Self::Tipc(_) => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Mcast(_) => "multicast traffic",
            Self::Udp(_) => "UDP traffic",
            Self::Tcp(_) => "TCP traffic",
            Self::Tipc(_) => "TIPC traffic",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Mcast(_) => "multicast",
            Self::Udp(_) => "udp",
            Self::Tcp(_) => "tcp",
            Self::Tipc(_) => "tipc",
        }
    }
}

/// One open replication channel.
///
/// Outgoing messages go through the client side of the transport, incoming
/// ones arrive on the server side. Buffered channels pack messages into
/// datagrams of at most `mtu - headersiz` bytes; channels with the error
/// flag keep messages whose send failed and resend them, in order, before
/// anything newer.
///
/// All sockets are closed when the channel is dropped.
pub struct Channel {
    transport: Transport,
    ifname: String,
    ifindex: u32,
    mtu: usize,
    flags: ChannelFlags,
    buffer: Option<SendBuffer>,
    errorq: Option<ErrorQueue>,
    stats: TrafficStats,
}

impl Channel {
    /// Open the sockets described by `conf`.
    ///
    /// Either every socket is set up or the call fails and nothing stays open.
    pub fn open(conf: &ChannelConf) -> Result<Self> {
        conf.validate()?;
        let ifindex = iface::if_index(&conf.ifname)?;
        let mtu = iface::if_mtu(&conf.ifname)?;
        let flags = conf.effective_flags();

        let transport =
            Transport::open(&conf.transport, ifindex).map_err(|source| ChannelError::Open {
                transport: conf.transport.name(),
                source,
            })?;

        let buffer = if flags.contains(ChannelFlags::BUFFERED) {
            let capacity = mtu
                .min(MAX_IP_PACKET)
                .checked_sub(transport.header_size())
                .filter(|c| *c > 0)
                .ok_or_else(|| {
                    ChannelError::InvalidConfig(format!(
                        "mtu {mtu} of {} leaves no room for payload",
                        conf.ifname
                    ))
                })?;
            Some(SendBuffer::new(capacity))
        } else {
            None
        };
        let errorq = flags
            .contains(ChannelFlags::ERRORS)
            .then(|| ErrorQueue::new(ERRORQ_MAX_LEN));

        info!(
            transport = transport.name(),
            ifname = %conf.ifname,
            ifindex,
            mtu,
            %flags,
            "channel opened"
        );

        Ok(Self {
            transport,
            ifname: conf.ifname.clone(),
            ifindex,
            mtu,
            flags,
            buffer,
            errorq,
            stats: TrafficStats::default(),
        })
    }

    /// Close the channel, releasing its sockets.
    pub fn close(self) {
        drop(self);
    }

    /// Send one message.
    ///
    /// Returns the number of bytes handed to the transport by this call:
    /// zero when the message was only buffered or queued for retry.
    pub fn send(&mut self, msg: &[u8]) -> Result<usize> {
        let Some(buffer) = self.buffer.as_ref() else {
            return self.deliver(msg);
        };
        if msg.len() > buffer.capacity() {
            return Err(ChannelError::MessageTooLarge {
                size: msg.len(),
                max: buffer.capacity(),
            });
        }
        let sent = if buffer.fits(msg.len()) {
            0
        } else {
            self.flush_buffer()?
        };
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.push(msg);
        }
        Ok(sent)
    }

    /// Push out buffered messages and retry queued ones.
    pub fn send_flush(&mut self) -> Result<usize> {
        if self.buffer.as_ref().is_some_and(|b| !b.is_empty()) {
            return self.flush_buffer();
        }
        self.retry_errorq();
        Ok(0)
    }

    /// Receive whatever the server side has ready.
    ///
    /// Datagram transports return one datagram, which may hold several
    /// packed messages. Stream transports return the bytes available, which
    /// may end mid-message. Zero means nothing was available or the stream
    /// peer went away.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.transport.recv(buf) {
            Ok(0) => Ok(0),
            Ok(n) => {
                self.stats.recv.record(n);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                self.stats.recv.record_error();
                warn!(ifname = %self.ifname, error = %e, "channel receive failed");
                Err(e.into())
            }
        }
    }

    /// Accept a pending stream connection.
    ///
    /// Returns false when nothing was pending and for transports without
    /// connections.
    pub fn accept(&mut self) -> Result<bool> {
        match &mut self.transport {
            Transport::Tcp(t) => Ok(t.accept()?),
            _ => Ok(false),
        }
    }

    /// Drop the connected stream peer, discarding anything it had in flight.
    ///
    /// Returns false when no peer was connected and for datagram transports.
    pub fn disconnect_peer(&mut self) -> bool {
        match &mut self.transport {
            Transport::Tcp(t) => t.disconnect_peer(),
            _ => false,
        }
    }

    /// Changes whenever the stream peer connects, is replaced or goes away.
    ///
    /// Bytes read under different values come from different connections
    /// and must not be reassembled together. Datagram channels stay at 0.
    pub fn peer_generation(&self) -> u64 {
        match &self.transport {
            Transport::Tcp(t) => t.generation(),
            _ => 0,
        }
    }

    /// Descriptor that becomes readable when [`Channel::recv`] has data.
    pub fn get_fd(&self) -> Option<RawFd> {
        self.transport.fd()
    }

    /// Descriptor that becomes readable when [`Channel::accept`] would succeed.
    pub fn accept_fd(&self) -> Option<RawFd> {
        match &self.transport {
            Transport::Tcp(t) => Some(t.accept_fd()),
            _ => None,
        }
    }

    /// Add this channel's descriptors to `set`.
    pub fn register(&self, set: &mut ReadSet) {
        if let Some(fd) = self.get_fd() {
            set.register(fd);
        }
        if let Some(fd) = self.accept_fd() {
            set.register(fd);
        }
    }

    pub fn isset(&self, set: &ReadSet) -> bool {
        self.get_fd().is_some_and(|fd| set.is_ready(fd))
    }

    pub fn accept_isset(&self, set: &ReadSet) -> bool {
        self.accept_fd().is_some_and(|fd| set.is_ready(fd))
    }

    /// Bytes of framing the transport adds to every datagram.
    pub fn headersiz(&self) -> usize {
        self.transport.header_size()
    }

    pub fn ifname(&self) -> &str {
        &self.ifname
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    pub fn is_stream(&self) -> bool {
        self.flags.contains(ChannelFlags::STREAM)
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Address the server side is bound to, for IP transports.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Packing capacity of a buffered channel.
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.buffer.as_ref().map(SendBuffer::capacity)
    }

    /// Bytes waiting in the packing buffer.
    pub fn pending(&self) -> usize {
        self.buffer.as_ref().map_or(0, SendBuffer::len)
    }

    /// Payloads waiting for a retry.
    pub fn queued(&self) -> usize {
        self.errorq.as_ref().map_or(0, ErrorQueue::len)
    }

    pub fn traffic(&self) -> TrafficStats {
        self.stats
    }

    /// Write the traffic counters as text.
    pub fn stats(&self, out: &mut dyn Write) -> io::Result<()> {
        let extra = match &self.transport {
            Transport::Tcp(t) => format!(
                " server={} client={}",
                connection_state(t.is_peer_connected()),
                connection_state(t.is_client_connected())
            ),
            _ => String::new(),
        };
        writeln!(
            out,
            "{} (active device={}){extra}:",
            self.transport.label(),
            self.ifname
        )?;
        self.stats.write_counters(out)
    }

    /// Write the traffic counters with link state and role.
    pub fn stats_extended(
        &self,
        active: bool,
        table: &dyn InterfaceTable,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let ifname = table
            .name(self.ifindex)
            .unwrap_or_else(|| self.ifname.clone());
        writeln!(
            out,
            "{} device={} status={} role={}:",
            self.transport.label(),
            ifname,
            stats::link_status(table.is_running(self.ifindex)),
            stats::role(active)
        )?;
        self.stats.write_counters(out)
    }

    fn flush_buffer(&mut self) -> Result<usize> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(0);
        };
        if buffer.is_empty() {
            return Ok(0);
        }
        let packed = buffer.take();
        self.deliver(&packed)
    }

    fn deliver(&mut self, data: &[u8]) -> Result<usize> {
        if !self.retry_errorq() {
            // Older payloads still pending; queue behind them to keep order.
            self.enqueue(data);
            return Ok(0);
        }
        match self.transport.send(data) {
            Ok(n) => {
                self.stats.sent.record(n);
                Ok(n)
            }
            Err(e) => {
                self.stats.sent.record_error();
                if self.errorq.is_some() {
                    debug!(ifname = %self.ifname, error = %e, "send failed, queued for retry");
                    self.enqueue(data);
                    return Ok(0);
                }
                warn!(ifname = %self.ifname, error = %e, "channel send failed");
                Err(e.into())
            }
        }
    }

    /// Resend queued payloads in order; true once the queue is empty.
    fn retry_errorq(&mut self) -> bool {
        let Some(queue) = self.errorq.as_mut() else {
            return true;
        };
        while let Some(payload) = queue.front().cloned() {
            match self.transport.send(&payload) {
                Ok(n) => {
                    self.stats.sent.record(n);
                    queue.pop_front();
                }
                Err(e) => {
                    self.stats.sent.record_error();
                    debug!(queued = queue.len(), error = %e, "retry failed");
                    return false;
                }
            }
        }
        true
    }

    fn enqueue(&mut self, data: &[u8]) {
        if let Some(queue) = self.errorq.as_mut() {
            if queue.push(Bytes::copy_from_slice(data)) {
                warn!(
                    ifname = %self.ifname,
                    dropped = queue.dropped(),
                    "error queue full, oldest message dropped"
                );
            }
        }
    }
}

fn connection_state(connected: bool) -> &'static str {
    if connected {
        "connected"
    } else {
        "disconnected"
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        debug!(
            transport = self.transport.name(),
            ifname = %self.ifname,
            pending = self.pending(),
            "closing channel"
        );
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("transport", &self.transport.name())
            .field("ifname", &self.ifname)
            .field("ifindex", &self.ifindex)
            .field("mtu", &self.mtu)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TcpConf, UdpConf};
    use std::io::Read;
    use std::net::{TcpListener, TcpStream, UdpSocket};
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn udp_conf(client: SocketAddr, flags: ChannelFlags) -> ChannelConf {
        ChannelConf::new(
            "lo",
            flags,
            TransportConf::Udp(UdpConf {
                server: "127.0.0.1:0".parse().unwrap(),
                client,
                checksum: true,
                sndbuf: None,
                rcvbuf: None,
            }),
        )
    }

    fn tcp_conf(client: SocketAddr) -> ChannelConf {
        ChannelConf::new(
            "lo",
            ChannelFlags::NONE,
            TransportConf::Tcp(TcpConf {
                server: "127.0.0.1:0".parse().unwrap(),
                client,
                sndbuf: None,
                rcvbuf: None,
            }),
        )
    }

    fn peer() -> UdpSocket {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(WAIT)).unwrap();
        sock
    }

    fn wait_readable(ch: &Channel) {
        let mut set = ReadSet::new();
        ch.register(&mut set);
        set.wait(Some(WAIT)).unwrap();
        assert!(ch.isset(&set));
    }

    #[test]
    fn udp_send_and_recv() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::NONE)).unwrap();
        assert_eq!(ch.headersiz(), 28);
        assert_eq!(ch.transport_name(), "udp");

        assert_eq!(ch.send(b"hello").unwrap(), 5);
        let mut buf = [0u8; 64];
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        peer.send_to(b"world!", ch.local_addr().unwrap()).unwrap();
        wait_readable(&ch);
        let n = ch.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world!");

        let traffic = ch.traffic();
        assert_eq!(traffic.sent.messages, 1);
        assert_eq!(traffic.sent.bytes, 5);
        assert_eq!(traffic.recv.bytes, 6);
    }

    #[test]
    fn recv_with_nothing_pending_returns_zero() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::NONE)).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(ch.recv(&mut buf).unwrap(), 0);
        assert_eq!(ch.traffic().recv.errors, 0);
    }

    #[test]
    fn buffered_channel_packs_until_flush() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::BUFFERED)).unwrap();
        let capacity = ch.buffer_capacity().unwrap();
        assert!(capacity <= ch.mtu() - ch.headersiz());

        assert_eq!(ch.send(&[1u8; 100]).unwrap(), 0);
        assert_eq!(ch.send(&[2u8; 60]).unwrap(), 0);
        assert_eq!(ch.pending(), 160);

        peer.set_nonblocking(true).unwrap();
        let mut buf = vec![0u8; 70_000];
        assert!(peer.recv(&mut buf).is_err());
        peer.set_nonblocking(false).unwrap();

        assert_eq!(ch.send_flush().unwrap(), 160);
        let n = peer.recv(&mut buf).unwrap();
        assert_eq!(n, 160);
        assert_eq!(buf[99], 1);
        assert_eq!(buf[100], 2);
        assert_eq!(ch.pending(), 0);
    }

    #[test]
    fn buffered_channel_flushes_when_next_message_does_not_fit() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::BUFFERED)).unwrap();
        let capacity = ch.buffer_capacity().unwrap();

        assert_eq!(ch.send(&vec![7u8; capacity - 10]).unwrap(), 0);
        assert_eq!(ch.send(&[8u8; 20]).unwrap(), capacity - 10);
        assert_eq!(ch.pending(), 20);

        let mut buf = vec![0u8; 70_000];
        assert_eq!(peer.recv(&mut buf).unwrap(), capacity - 10);
    }

    #[test]
    fn buffered_channel_rejects_oversized_message() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::BUFFERED)).unwrap();
        let capacity = ch.buffer_capacity().unwrap();

        let err = ch.send(&vec![0u8; capacity + 1]).unwrap_err();
        assert!(matches!(err, ChannelError::MessageTooLarge { max, .. } if max == capacity));
        assert_eq!(ch.pending(), 0);
    }

    #[test]
    fn datagram_channels_have_nothing_to_accept() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::NONE)).unwrap();
        assert_eq!(ch.accept_fd(), None);
        assert!(!ch.accept().unwrap());
    }

    #[test]
    fn unknown_interface_fails_to_open() {
        let mut conf = udp_conf("127.0.0.1:9".parse().unwrap(), ChannelFlags::NONE);
        conf.ifname = "ctsync-none0".to_string();
        assert!(matches!(
            Channel::open(&conf),
            Err(ChannelError::Interface { .. })
        ));
    }

    #[test]
    fn unbindable_address_is_an_open_error() {
        let mut conf = udp_conf("127.0.0.1:9".parse().unwrap(), ChannelFlags::NONE);
        if let TransportConf::Udp(udp) = &mut conf.transport {
            udp.server = "192.0.2.1:0".parse().unwrap();
        }
        assert!(matches!(
            Channel::open(&conf),
            Err(ChannelError::Open { transport: "udp", .. })
        ));
    }

    #[test]
    fn tcp_client_and_server() {
        let remote = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut ch = Channel::open(&tcp_conf(remote.local_addr().unwrap())).unwrap();
        assert!(ch.is_stream());
        assert!(ch.flags().contains(ChannelFlags::ERRORS));
        assert_eq!(ch.headersiz(), 40);

        // Outgoing: the channel connects to the remote listener.
        let (mut inbound, _) = remote.accept().unwrap();
        inbound.set_read_timeout(Some(WAIT)).unwrap();
        assert_eq!(ch.send(b"replicated").unwrap(), 10);
        let mut got = [0u8; 10];
        inbound.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"replicated");

        // Incoming: a peer connects to the channel's listener.
        let mut outbound = TcpStream::connect(ch.local_addr().unwrap()).unwrap();
        let mut set = ReadSet::new();
        ch.register(&mut set);
        set.wait(Some(WAIT)).unwrap();
        assert!(ch.accept_isset(&set));
        assert!(ch.accept().unwrap());
        assert!(ch.get_fd().is_some());

        outbound.write_all(b"from peer").unwrap();
        wait_readable(&ch);
        let mut buf = [0u8; 64];
        let n = ch.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"from peer");

        drop(outbound);
        wait_readable(&ch);
        assert_eq!(ch.recv(&mut buf).unwrap(), 0);
        assert_eq!(ch.get_fd(), None);
    }

    fn unused_tcp_addr() -> SocketAddr {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
    }

    fn accept_peer(ch: &mut Channel) {
        let mut set = ReadSet::new();
        ch.register(&mut set);
        set.wait(Some(WAIT)).unwrap();
        assert!(ch.accept().unwrap());
    }

    #[test]
    fn peer_generation_tracks_stream_connections() {
        let remote = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut ch = Channel::open(&tcp_conf(remote.local_addr().unwrap())).unwrap();
        assert_eq!(ch.peer_generation(), 0);

        let first = TcpStream::connect(ch.local_addr().unwrap()).unwrap();
        accept_peer(&mut ch);
        let connected = ch.peer_generation();
        assert_ne!(connected, 0);

        // A second connection replaces the first.
        let mut second = TcpStream::connect(ch.local_addr().unwrap()).unwrap();
        accept_peer(&mut ch);
        let replaced = ch.peer_generation();
        assert_ne!(replaced, connected);
        drop(first);

        second.write_all(b"data").unwrap();
        wait_readable(&ch);
        let mut buf = [0u8; 16];
        assert_eq!(ch.recv(&mut buf).unwrap(), 4);
        assert_eq!(ch.peer_generation(), replaced);

        assert!(ch.disconnect_peer());
        assert_ne!(ch.peer_generation(), replaced);
        assert_eq!(ch.get_fd(), None);
        assert!(!ch.disconnect_peer());
    }

    #[test]
    fn reset_by_peer_drops_the_connection() {
        let remote = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut ch = Channel::open(&tcp_conf(remote.local_addr().unwrap())).unwrap();
        let peer = TcpStream::connect(ch.local_addr().unwrap()).unwrap();
        accept_peer(&mut ch);
        let before = ch.peer_generation();

        let peer = socket2::Socket::from(peer);
        peer.set_linger(Some(Duration::ZERO)).unwrap();
        drop(peer);

        wait_readable(&ch);
        let mut buf = [0u8; 16];
        // A reset reads as an error, a clean close as zero; both drop the peer.
        if ch.recv(&mut buf).is_err() {
            assert_eq!(ch.traffic().recv.errors, 1);
        }
        assert_eq!(ch.get_fd(), None);
        assert_ne!(ch.peer_generation(), before);
    }

    #[test]
    fn datagram_channels_have_no_peer() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::NONE)).unwrap();
        assert!(!ch.disconnect_peer());
        assert_eq!(ch.peer_generation(), 0);
    }

    /// Call `send_flush` until the retry queue drains.
    fn drain_queue(ch: &mut Channel) {
        let deadline = Instant::now() + WAIT;
        while ch.queued() > 0 {
            assert!(Instant::now() < deadline, "queued messages were never resent");
            thread::sleep(Duration::from_millis(10));
            ch.send_flush().unwrap();
        }
    }

    #[test]
    fn tcp_connects_once_the_peer_appears() {
        let addr = unused_tcp_addr();
        let mut ch = Channel::open(&tcp_conf(addr)).unwrap();

        // Nobody listens yet: the message waits in the retry queue.
        assert_eq!(ch.send(b"first").unwrap(), 0);
        assert_eq!(ch.queued(), 1);

        let remote = TcpListener::bind(addr).unwrap();
        ch.send(b"second").unwrap();
        drain_queue(&mut ch);

        let (mut inbound, _) = remote.accept().unwrap();
        inbound.set_read_timeout(Some(WAIT)).unwrap();
        let mut got = [0u8; 11];
        inbound.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"firstsecond");
    }

    #[test]
    fn tcp_reconnects_after_the_peer_goes_away() {
        let remote = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = remote.local_addr().unwrap();
        let mut ch = Channel::open(&tcp_conf(addr)).unwrap();
        let (inbound, _) = remote.accept().unwrap();
        assert_eq!(ch.send(b"ping").unwrap(), 4);
        drop(inbound);
        drop(remote);

        let remote = TcpListener::bind(addr).unwrap();
        remote.set_nonblocking(true).unwrap();
        let deadline = Instant::now() + WAIT;
        let mut inbound = loop {
            // Failed writes are queued, never returned as errors.
            ch.send(b"ping").unwrap();
            if let Ok((stream, _)) = remote.accept() {
                break stream;
            }
            assert!(Instant::now() < deadline, "channel never reconnected");
            thread::sleep(Duration::from_millis(20));
        };
        drain_queue(&mut ch);

        inbound.set_nonblocking(false).unwrap();
        inbound.set_read_timeout(Some(WAIT)).unwrap();
        let mut got = [0u8; 4];
        inbound.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"ping");
        assert!(ch.traffic().sent.errors >= 1);
    }

    struct FakeTable;

    impl InterfaceTable for FakeTable {
        fn name(&self, _ifindex: u32) -> Option<String> {
            Some("fake0".to_string())
        }

        fn is_running(&self, _ifindex: u32) -> Option<bool> {
            Some(false)
        }
    }

    #[test]
    fn stats_text() {
        let peer = peer();
        let mut ch =
            Channel::open(&udp_conf(peer.local_addr().unwrap(), ChannelFlags::NONE)).unwrap();
        ch.send(b"abc").unwrap();

        let mut out = Vec::new();
        ch.stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("UDP traffic (active device=lo):\n"));
        assert!(text.contains(&format!("{:>20} Bytes sent", 3)));

        let mut out = Vec::new();
        ch.stats_extended(false, &FakeTable, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("UDP traffic device=fake0 status=DOWN role=BACKUP:\n"));
    }
}
