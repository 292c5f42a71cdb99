/*!
    Error types for the H.264 decode filter.
*/

use thiserror::Error;

/**
    Error type for the H.264 decode filter.

    Negotiation failures in a hardware tier are recoverable: the negotiator
    falls through to the next tier. Everything else is surfaced to the caller.
*/
#[derive(Debug, Error)]
pub enum Error {
    /// Unsupported media type, the connection is refused
    #[error("type rejected: {message}")]
    TypeRejected { message: String },
    /// Hardware declined the stream
    #[error("capability vetoed: {message}")]
    CapabilityVetoed { message: String },
    /// Surface, device or decoder acquisition failed
    #[error("resource allocation failed: {message}")]
    ResourceAllocation { message: String },
    /// Internal invariant violated (e.g. decoding with no active backend)
    #[error("unexpected state: {message}")]
    UnexpectedState { message: String },
    /// Operation requires a connected pin
    #[error("pin not connected")]
    NotConnected,
    /// Decode failure reported by the codec or the hardware
    #[error("codec error: {message}")]
    Codec { message: String },
    /// Downstream allocator granted less than requested
    #[error(
        "buffer negotiation failed: requested {requested_count}x{requested_size} bytes, \
         got {actual_count}x{actual_size} bytes"
    )]
    BufferNegotiation {
        requested_count: u32,
        requested_size: u32,
        actual_count: u32,
        actual_size: u32,
    },
    /// Query not supported by this object
    #[error("unsupported: {message}")]
    Unsupported { message: String },
    /// Invalid configuration document
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /**
        Create a type rejected error with the given message.
    */
    pub fn type_rejected(message: impl Into<String>) -> Self {
        Self::TypeRejected {
            message: message.into(),
        }
    }

    /**
        Create a capability vetoed error with the given message.
    */
    pub fn vetoed(message: impl Into<String>) -> Self {
        Self::CapabilityVetoed {
            message: message.into(),
        }
    }

    /**
        Create a resource allocation error with the given message.
    */
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::ResourceAllocation {
            message: message.into(),
        }
    }

    /**
        Create an unexpected state error with the given message.
    */
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedState {
            message: message.into(),
        }
    }

    /**
        Create a codec error with the given message.
    */
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /**
        Create an unsupported error with the given message.
    */
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /**
        Create a configuration error with the given message.
    */
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /**
        Returns true if a hardware tier failing with this error should fall
        through to the next tier instead of failing the connection.
    */
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapabilityVetoed { .. }
                | Self::ResourceAllocation { .. }
                | Self::Unsupported { .. }
                | Self::Codec { .. }
                | Self::NotConnected
        )
    }
}

/**
    Result type alias for the H.264 decode filter.
*/
pub type Result<T> = std::result::Result<T, Error>;
