//! Error types.

use embedded_io_async::ErrorKind;

use crate::OpCode;

/// A frame that can never be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The declared payload length does not fit in memory or exceeds the configured limit.
    #[error("Payload too large: {len} bytes")]
    PayloadTooLarge {
        /// The declared payload length.
        len: u64,
    },
}

/// Failures of the HTTP upgrade exchange.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The peer closed the transport before the handshake completed.
    #[error("Connection closed during handshake")]
    ConnectionClosed,
    /// The HTTP head does not fit into the read buffer.
    #[error("HTTP head does not fit into the read buffer")]
    MessageTooLarge,
    /// The HTTP head could not be parsed.
    #[error("Invalid HTTP: {0}")]
    Http(
        #[source]
        #[from]
        httparse::Error,
    ),
    /// The request method is not `GET`.
    #[error("Wrong HTTP method")]
    WrongHttpMethod,
    /// The request does not ask for a websocket upgrade.
    #[error("Not a websocket upgrade request")]
    NotWebSocket,
    /// The request has no usable `sec-websocket-key`.
    #[error("Missing sec-websocket-key")]
    MissingSecKey,
    /// The response is not `101 Switching Protocols`.
    #[error("Invalid status code")]
    InvalidStatusCode,
    /// The response `upgrade` header is not `websocket`.
    #[error("Missing or invalid upgrade header")]
    MissingOrInvalidUpgrade,
    /// The response `connection` header does not contain `upgrade`.
    #[error("Missing or invalid connection header")]
    MissingOrInvalidConnection,
    /// The response `sec-websocket-accept` does not match the sent key.
    #[error("Missing or invalid sec-websocket-accept header")]
    MissingOrInvalidAccept,
}

/// Errors returned by a [`Connection`](crate::Connection).
///
/// `I` is the transport error type.
#[derive(Debug, thiserror::Error)]
pub enum Error<I> {
    /// The transport failed.
    #[error("IO error: {0:?}")]
    Io(I),
    /// The connection is closed, either locally or by the peer.
    #[error("Connection closed")]
    Closed,
    /// A frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(
        #[source]
        #[from]
        DecodeError,
    ),
    /// The handshake failed.
    #[error("Handshake error: {0}")]
    Handshake(
        #[source]
        #[from]
        HandshakeError,
    ),
    /// The frame does not carry a text or binary payload.
    #[error("Unsupported frame: {opcode:?}")]
    Unsupported {
        /// The opcode of the skipped frame.
        opcode: OpCode,
    },
    /// A text payload is not valid UTF-8.
    #[error("Invalid UTF-8")]
    InvalidUtf8,
}

impl<I> Error<I>
where
    I: embedded_io_async::Error,
{
    /// Wraps a transport error, treating a vanished peer as end of stream.
    pub(crate) fn from_io(error: I) -> Self {
        match error.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected => Error::Closed,
            _ => Error::Io(error),
        }
    }
}

impl<I> Error<I> {
    /// Returns `true` if this error means the connection is gone.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }
}

impl<I> embedded_io_async::Error for Error<I>
where
    I: embedded_io_async::Error,
{
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(error) => error.kind(),
            Error::Closed => ErrorKind::NotConnected,
            Error::Decode(_) | Error::Unsupported { .. } | Error::InvalidUtf8 => {
                ErrorKind::InvalidData
            }
            Error::Handshake(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn vanished_peer_is_closed() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::NotConnected,
        ] {
            let error = Error::from_io(io::Error::from(kind));

            assert!(error.is_closed(), "{kind:?}");
        }
    }

    #[test]
    fn other_io_errors_propagate() {
        let error = Error::from_io(io::Error::from(io::ErrorKind::TimedOut));

        assert!(matches!(error, Error::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
    }
}
