// src/error.rs
//! Error types for the router core, the frame codec and the simulator.

use crate::types::Port;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// A handler that needs a live link was called for a port without one.
    #[error("link on port {0} is not up")]
    LinkNotUp(Port),
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("frame truncated")]
    Truncated,

    #[error("unknown packet type: {0}")]
    UnknownType(u8),

    #[error("host id is not valid utf-8")]
    InvalidHostId,

    #[error("host id longer than 255 bytes: {0}")]
    HostIdTooLong(usize),

    #[error("payload longer than 65535 bytes: {0}")]
    PayloadTooLong(usize),

    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("host {0} is already linked")]
    HostAlreadyLinked(String),

    #[error("host {0} is not linked")]
    HostNotLinked(String),

    #[error("cannot link two hosts: {0} and {1}")]
    HostToHost(String, String),

    #[error("no link between {0} and {1}")]
    NotLinked(String, String),

    #[error("router error: {0}")]
    Router(#[from] RouterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_error_display() {
        let err = RouterError::LinkNotUp(7);
        assert_eq!(err.to_string(), "link on port 7 is not up");
    }

    #[test]
    fn packet_error_display() {
        assert_eq!(
            PacketError::UnknownType(9).to_string(),
            "unknown packet type: 9"
        );
        assert_eq!(
            PacketError::TrailingBytes(3).to_string(),
            "3 trailing bytes after packet"
        );
    }

    #[test]
    fn sim_error_from_router_error() {
        let err: SimError = RouterError::LinkNotUp(2).into();
        assert!(matches!(err, SimError::Router(_)));
        assert_eq!(err.to_string(), "router error: link on port 2 is not up");
    }

    #[test]
    fn packet_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: PacketError = io.into();
        assert!(matches!(err, PacketError::Io(_)));
    }
}
