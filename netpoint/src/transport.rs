use thiserror::Error;

use crate::types::PeerId;

/// How a message travels. Reliable delivery arrives at most once, in order,
/// or the connection is reported dropped; unreliable delivery is
/// at-most-once with no ordering guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Reliable,
    Unreliable,
}

/// Where a datagram goes. `Host` is valid from any peer; `Peer` and
/// `Broadcast` only make sense on the serving side of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Host,
    Peer(PeerId),
    Broadcast,
}

/// The outbound half of the transport this layer requires from its
/// environment. Retransmission, acks, congestion and connection lifecycle all
/// live behind this seam; the relay layer only hands over framed bytes.
pub trait PacketSender {
    fn send(
        &mut self,
        dest: Destination,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}

/// Errors surfaced by a [`PacketSender`] implementation. The relay layer
/// treats every send as fire-and-forget: these are logged and the session
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The destination peer is not connected (or never was)
    #[error("no connection to peer {peer}")]
    UnknownPeer { peer: PeerId },

    /// The transport refused the payload outright
    #[error("transport rejected a {size} byte payload: {reason}")]
    SendRejected { size: usize, reason: String },
}
