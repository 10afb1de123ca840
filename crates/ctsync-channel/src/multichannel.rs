use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::Channel;
use crate::config::{ChannelConf, ChannelFlags};
use crate::error::{ChannelError, Result};
use crate::iface::InterfaceTable;
use crate::readiness::ReadSet;

/// Most channels a multichannel can hold.
pub const MULTICHANNEL_MAX: usize = 5;

/// A set of channels with one current channel for outgoing traffic.
///
/// Sends only ever use the current channel. Receives are taken from any
/// member. Switching the current channel is left to the caller, which
/// watches link state through [`Multichannel::get_ifindex`].
#[derive(Debug)]
pub struct Multichannel {
    channels: Vec<Channel>,
    current: usize,
}

impl Multichannel {
    /// Open every configured channel.
    ///
    /// If any channel fails to open, the ones already opened are closed
    /// and the error is returned. The first channel flagged `default`
    /// becomes current, otherwise the first channel.
    pub fn open(confs: &[ChannelConf]) -> Result<Self> {
        if confs.is_empty() {
            return Err(ChannelError::NoChannels);
        }
        if confs.len() > MULTICHANNEL_MAX {
            return Err(ChannelError::TooManyChannels {
                count: confs.len(),
                max: MULTICHANNEL_MAX,
            });
        }

        let channels = confs
            .iter()
            .map(Channel::open)
            .collect::<Result<Vec<_>>>()?;

        let current = channels
            .iter()
            .position(|c| c.flags().contains(ChannelFlags::DEFAULT))
            .unwrap_or(0);

        info!(
            channels = channels.len(),
            current,
            ifname = channels[current].ifname(),
            "multichannel opened"
        );
        Ok(Self { channels, current })
    }

    /// Close every member channel.
    pub fn close(self) {
        drop(self);
    }

    /// Send through the current channel.
    pub fn send(&mut self, msg: &[u8]) -> Result<usize> {
        self.channels[self.current].send(msg)
    }

    /// Flush the current channel.
    pub fn send_flush(&mut self) -> Result<usize> {
        self.channels[self.current].send_flush()
    }

    /// Receive from the first member with data ready, without blocking.
    ///
    /// Members are checked in configuration order. Returns the number of
    /// bytes and the index of the channel they came from.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, usize)>> {
        let mut set = ReadSet::new();
        self.register(&mut set);
        set.wait(Some(Duration::ZERO))?;
        Ok(self.recv_ready(&set, buf))
    }

    /// Receive from the first member `set` reports ready.
    ///
    /// A member whose receive fails is skipped: a stream member loses its
    /// peer, and the scan moves on to the next member.
    pub fn recv_ready(&mut self, set: &ReadSet, buf: &mut [u8]) -> Option<(usize, usize)> {
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if !channel.isset(set) {
                continue;
            }
            match channel.recv(buf) {
                Ok(0) => {}
                Ok(n) => return Some((n, index)),
                Err(e) => {
                    debug!(index, ifname = channel.ifname(), error = %e, "skipping failed member");
                }
            }
        }
        None
    }

    /// Accept pending connections on members whose listener is ready.
    ///
    /// Returns how many connections were accepted.
    pub fn accept_ready(&mut self, set: &ReadSet) -> Result<usize> {
        let mut accepted = 0;
        for channel in &mut self.channels {
            if channel.accept_isset(set) && channel.accept()? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Drop the stream peer of member `index`.
    pub fn disconnect_peer(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.channels[index].disconnect_peer())
    }

    /// Add every member's descriptors to `set`.
    pub fn register(&self, set: &mut ReadSet) {
        for channel in &self.channels {
            channel.register(set);
        }
    }

    /// Index of the first member with data ready in `set`.
    pub fn isset(&self, set: &ReadSet) -> Option<usize> {
        self.channels.iter().position(|c| c.isset(set))
    }

    /// Make channel `index` current unconditionally.
    pub fn set_current(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.current = index;
        Ok(())
    }

    /// Fail over to channel `index`.
    ///
    /// Nothing buffered on the previous channel is moved; flush it first if
    /// that matters.
    pub fn change_current(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index == self.current {
            return Ok(());
        }
        info!(
            from = self.channels[self.current].ifname(),
            to = self.channels[index].ifname(),
            "changing current channel"
        );
        self.current = index;
        Ok(())
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_channel(&self) -> &Channel {
        &self.channels[self.current]
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Interface index backing member `index`.
    pub fn get_ifindex(&self, index: usize) -> Result<u32> {
        self.check_index(index)?;
        Ok(self.channels[index].ifindex())
    }

    pub fn get_current_ifindex(&self) -> u32 {
        self.channels[self.current].ifindex()
    }

    pub fn stats(&self, out: &mut dyn Write) -> io::Result<()> {
        for channel in &self.channels {
            channel.stats(out)?;
        }
        Ok(())
    }

    pub fn stats_extended(
        &self,
        table: &dyn InterfaceTable,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        for (index, channel) in self.channels.iter().enumerate() {
            channel.stats_extended(index == self.current, table, out)?;
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.channels.len() {
            return Err(ChannelError::InvalidIndex {
                index,
                count: self.channels.len(),
            });
        }
        Ok(())
    }
}
