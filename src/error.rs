use thiserror::Error;

/// Failure taxonomy for the queue client.
///
/// Protocol decode errors are fatal for the current design: the loop does not
/// attempt partial recovery of a malformed message.
#[derive(Debug, Error)]
pub enum NfqError {
    #[error("malformed message header: {0}")]
    MalformedHeader(&'static str),

    #[error("truncated attribute: declared {declared} bytes, {remaining} remaining")]
    TruncatedAttribute { declared: usize, remaining: usize },

    #[error("mandatory attribute missing: {0}")]
    MissingAttribute(&'static str),

    #[error("attribute {tag} has unexpected value length {len}")]
    InvalidAttributeLength { tag: u16, len: usize },

    #[error("kernel reported errno {0}")]
    Kernel(i32),

    #[error("channel closed")]
    ChannelClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NfqError>;
