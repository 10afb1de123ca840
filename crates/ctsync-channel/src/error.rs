/// Errors that can occur opening or driving a replication channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The configured interface could not be resolved or queried.
    #[error("interface {name}: {source}")]
    Interface {
        name: String,
        source: std::io::Error,
    },

    /// Socket setup for a transport failed.
    #[error("failed to open {transport} channel: {source}")]
    Open {
        transport: &'static str,
        source: std::io::Error,
    },

    /// The channel configuration is inconsistent.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// More channels were configured than a multichannel can hold.
    #[error("too many channels ({count}, max {max})")]
    TooManyChannels { count: usize, max: usize },

    /// A multichannel needs at least one member.
    #[error("no channels configured")]
    NoChannels,

    /// A channel index does not name an open member.
    #[error("channel index {index} out of range ({count} channels)")]
    InvalidIndex { index: usize, count: usize },

    /// A message does not fit the channel's send buffer.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A stream transport has no connected peer.
    #[error("channel is not connected")]
    NotConnected,

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
