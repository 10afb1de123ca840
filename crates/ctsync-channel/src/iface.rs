//! Network interface lookups used by channels and their statistics.

use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::AsRawFd;

use socket2::{Domain, Socket, Type};

use crate::error::{ChannelError, Result};

/// Resolve an interface name to its index.
pub fn if_index(name: &str) -> Result<u32> {
    let cname = interface_cstr(name)?;
    // SAFETY: `cname` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        return Err(ChannelError::Interface {
            name: name.to_string(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(index)
}

/// Read the MTU of an interface.
pub fn if_mtu(name: &str) -> Result<usize> {
    let mut ifr = ifreq_for(name)?;
    ioctl_ifreq(libc::SIOCGIFMTU as libc::c_ulong, &mut ifr).map_err(|source| {
        ChannelError::Interface {
            name: name.to_string(),
            source,
        }
    })?;
    // SAFETY: SIOCGIFMTU filled the `ifru_mtu` member of the union.
    let mtu = unsafe { ifr.ifr_ifru.ifru_mtu };
    usize::try_from(mtu).map_err(|_| ChannelError::Interface {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidData, format!("invalid mtu {mtu}")),
    })
}

/// Whether the interface reports `IFF_RUNNING`.
pub fn if_running(name: &str) -> io::Result<bool> {
    let mut ifr = ifreq_for(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    ioctl_ifreq(libc::SIOCGIFFLAGS as libc::c_ulong, &mut ifr)?;
    // SAFETY: SIOCGIFFLAGS filled the `ifru_flags` member of the union.
    let flags = unsafe { ifr.ifr_ifru.ifru_flags };
    Ok(i32::from(flags) & libc::IFF_RUNNING != 0)
}

/// Resolve an interface index back to its name.
pub fn if_name(index: u32) -> Option<String> {
    let mut buf = [0 as libc::c_char; libc::IFNAMSIZ];
    // SAFETY: `buf` holds IFNAMSIZ bytes as `if_indextoname` requires.
    let ret = unsafe { libc::if_indextoname(index, buf.as_mut_ptr()) };
    if ret.is_null() {
        return None;
    }
    // SAFETY: on success `buf` holds a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

/// Link information consulted by extended statistics.
pub trait InterfaceTable {
    /// Current name of the interface with `ifindex`.
    fn name(&self, ifindex: u32) -> Option<String>;
    /// Whether the link is up and running, if known.
    fn is_running(&self, ifindex: u32) -> Option<bool>;
}

/// [`InterfaceTable`] answered by the running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceTable for SystemInterfaces {
    fn name(&self, ifindex: u32) -> Option<String> {
        if_name(ifindex)
    }

    fn is_running(&self, ifindex: u32) -> Option<bool> {
        let name = if_name(ifindex)?;
        if_running(&name).ok()
    }
}

fn interface_cstr(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| {
        ChannelError::InvalidConfig(format!("interface name '{name}' contains a NUL byte"))
    })
}

fn ifreq_for(name: &str) -> Result<libc::ifreq> {
    let cname = interface_cstr(name)?;
    let bytes = cname.as_bytes_with_nul();
    if bytes.len() > libc::IFNAMSIZ {
        return Err(ChannelError::InvalidConfig(format!(
            "interface name '{name}' is too long"
        )));
    }
    // SAFETY: `ifreq` is plain old data; all-zero is a valid value.
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(ifr)
}

fn ioctl_ifreq(request: libc::c_ulong, ifr: &mut libc::ifreq) -> io::Result<()> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    // SAFETY: `ifr` is a valid, initialised ifreq and `sock` is an open socket
    // for the duration of the call.
    let rc = unsafe { libc::ioctl(sock.as_raw_fd(), request as _, ifr as *mut libc::ifreq) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
