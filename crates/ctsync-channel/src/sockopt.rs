use std::io;
use std::os::fd::AsRawFd;

use socket2::Socket;
use tracing::debug;

/// Apply optional send/receive buffer sizes.
pub(crate) fn set_buffers(
    sock: &Socket,
    sndbuf: Option<usize>,
    rcvbuf: Option<usize>,
) -> io::Result<()> {
    if let Some(size) = sndbuf {
        sock.set_send_buffer_size(size)?;
        debug!(requested = size, actual = sock.send_buffer_size()?, "send buffer set");
    }
    if let Some(size) = rcvbuf {
        sock.set_recv_buffer_size(size)?;
        debug!(requested = size, actual = sock.recv_buffer_size()?, "receive buffer set");
    }
    Ok(())
}

/// Disable UDP checksums on outgoing datagrams (`SO_NO_CHECK`).
pub(crate) fn set_no_check(sock: &Socket) -> io::Result<()> {
    let on: libc::c_int = 1;
    // SAFETY: `on` is a valid c_int for the duration of the call and the
    // length matches its size; `sock` is an open socket.
    let rc = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_NO_CHECK,
            (&on as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
