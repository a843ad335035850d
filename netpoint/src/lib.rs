//! # Netpoint
//! Peer-relay RPC and state replication for host-relayed multiplayer games.
//!
//! One process hosts a session and also plays in it; every other process is
//! a client of the host. Game objects register named RPCs and replicated
//! values in a [`CallRegistry`]; the [`RelayRouter`] frames calls into
//! bit-packed [`WireMessage`]s, hands them to the transport behind the
//! [`PacketSender`] seam, relays client-originated bounces through the host,
//! and short-circuits the sending peer's own delivery through a synchronous
//! local loopback.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod message;
mod registry;
mod router;
mod topology;
mod transport;
mod types;
mod value;

pub use netpoint_serde::{
    BitRead, BitReader, BitWrite, BitWriter, Serde, SerdeErr, UnsignedInteger,
    UnsignedVariableInteger,
};

pub use message::{RelayKind, WireMessage};
pub use registry::{CallKey, CallRegistry, RegistryError, RpcHandler};
pub use router::{
    DispatchError, ObjectDirectory, RelayRouter, RouterConfig, SendError, SendPattern,
};
pub use topology::{PeerTopology, TopologyError};
pub use transport::{DeliveryMode, Destination, PacketSender, TransportError};
pub use types::{HostType, ObjectPath, PeerId, UpdateIndex};
pub use value::{
    Authority, ReplicatedValue, UpdatePolicy, ValueSettings, MIN_RESEND_INTERVAL_MS,
};
