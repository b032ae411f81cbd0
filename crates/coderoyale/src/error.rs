//! Unified error type for the CodeRoyale framework.

use coderoyale_protocol::ProtocolError;
use coderoyale_room::RoomError;
use coderoyale_session::SessionError;
use coderoyale_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `coderoyale` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CodeRoyaleError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, reconnect, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A filesystem error from the snapshot store or from binding a
    /// listener.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let coderoyale_err: CodeRoyaleError = err.into();
        assert!(matches!(coderoyale_err, CodeRoyaleError::Transport(_)));
        assert!(coderoyale_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let coderoyale_err: CodeRoyaleError = err.into();
        assert!(matches!(coderoyale_err, CodeRoyaleError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let coderoyale_err: CodeRoyaleError = err.into();
        assert!(matches!(coderoyale_err, CodeRoyaleError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(coderoyale_protocol::RoomId(1));
        let coderoyale_err: CodeRoyaleError = err.into();
        assert!(matches!(coderoyale_err, CodeRoyaleError::Room(_)));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let coderoyale_err: CodeRoyaleError = err.into();
        assert!(matches!(coderoyale_err, CodeRoyaleError::Io(_)));
    }
}
