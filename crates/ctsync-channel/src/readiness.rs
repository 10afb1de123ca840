use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Set of descriptors waited on together for readability.
///
/// Callers register every channel descriptor, call [`ReadSet::wait`], then
/// ask each channel whether it is ready. Registering the same descriptor
/// twice is a no-op.
#[derive(Debug, Default, Clone)]
pub struct ReadSet {
    fds: Vec<libc::pollfd>,
}

impl ReadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, fd: RawFd) {
        if self.fds.iter().any(|p| p.fd == fd) {
            return;
        }
        self.fds.push(libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        });
    }

    pub fn clear(&mut self) {
        self.fds.clear();
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Block until a registered descriptor is readable or `timeout` elapses.
    ///
    /// `None` waits forever. Returns the number of ready descriptors; an
    /// interrupted wait reports zero.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        for p in &mut self.fds {
            p.revents = 0;
        }
        let timeout_ms = match timeout {
            Some(t) => libc::c_int::try_from(t.as_millis()).unwrap_or(libc::c_int::MAX),
            None => -1,
        };
        // SAFETY: `fds` points at `len` initialised pollfd entries owned by self.
        let rc = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(rc as usize)
    }

    /// Whether `fd` was reported readable (or hung up) by the last wait.
    pub fn is_ready(&self, fd: RawFd) -> bool {
        self.fds
            .iter()
            .find(|p| p.fd == fd)
            .is_some_and(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
    }
}
