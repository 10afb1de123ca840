use std::fmt;
use std::io;

use ctsync_channel::ChannelError;
use ctsync_wire::DecodeError;

// Exit codes follow sysexits(3) where one fits.
pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Interface { .. }
        | ChannelError::InvalidConfig(_)
        | ChannelError::TooManyChannels { .. }
        | ChannelError::NoChannels => CliError::new(CONFIG, format!("{context}: {err}")),
        ChannelError::Open { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        ChannelError::Open { .. } | ChannelError::NotConnected => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        ChannelError::InvalidIndex { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        ChannelError::MessageTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Io(source) => io_error(context, source),
    }
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    match err {
        DecodeError::AllocationFailure { .. } => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_errors_map_to_exit_codes() {
        let err = channel_error("open failed", ChannelError::NoChannels);
        assert_eq!(err.code, CONFIG);
        assert!(err.message.starts_with("open failed: "));

        let err = channel_error(
            "open failed",
            ChannelError::Open {
                transport: "udp",
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);

        let err = channel_error("send failed", ChannelError::MessageTooLarge { size: 9, max: 8 });
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn decode_errors_are_invalid_data() {
        let err = decode_error(
            "decode failed",
            DecodeError::UnknownAttribute { id: 40, max: 32 },
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
