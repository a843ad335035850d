use log::{error, warn};

use crate::{
    message::{RelayKind, WireMessage},
    registry::{CallEntry, CallRegistry},
    topology::PeerTopology,
    transport::{DeliveryMode, Destination, PacketSender},
    types::{ObjectPath, PeerId},
    value::ReceiveContext,
};

pub mod error;
pub use error::{DispatchError, SendError};

/// The four-plus-one delivery topologies a caller chooses between per call
/// site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendPattern {
    /// Client to host, direct
    ToServer,
    /// Host to every connected client, via transport broadcast
    ToClients,
    /// Host to every other client, plus an immediate synchronous local
    /// dispatch on the host itself
    ToClientsFast,
    /// Client to host, which re-wraps and forwards to every client
    BounceToClients,
    /// Client to host, which forwards to every client except the sender; the
    /// sender sees the effect immediately through local dispatch
    BounceToClientsFast,
}

impl SendPattern {
    fn relay_kind(self) -> RelayKind {
        match self {
            SendPattern::ToServer | SendPattern::ToClients | SendPattern::ToClientsFast => {
                RelayKind::Direct
            }
            SendPattern::BounceToClients => RelayKind::Broadcast,
            SendPattern::BounceToClientsFast => RelayKind::ExcludeSender,
        }
    }

    fn is_fast(self) -> bool {
        matches!(
            self,
            SendPattern::ToClientsFast | SendPattern::BounceToClientsFast
        )
    }
}

/// Maps a target path to the live object registered there. The engine side
/// owns the objects; this layer only asks for them at dispatch time, and a
/// `None` answer is an expected outcome for recently destroyed objects.
pub trait ObjectDirectory {
    fn resolve(&mut self, path: &ObjectPath) -> Option<&mut CallRegistry>;
}

/// Tuning knobs for a router instance.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Bound on synchronous local-dispatch re-entrancy. A handler that keeps
    /// retriggering the same fast-path call hits this instead of unbounded
    /// recursion.
    pub max_dispatch_depth: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 8,
        }
    }
}

/// The routing and dispatch core. Builds outbound envelopes for every send
/// pattern, hands the bytes to the transport, performs the local-loopback
/// fast path, and on receipt either dispatches to the target object's
/// registry or re-broadcasts bounce-tagged messages.
pub struct RelayRouter<S: PacketSender> {
    topology: PeerTopology,
    sender: S,
    config: RouterConfig,
    now_ms: u64,
    depth: u8,
}

impl<S: PacketSender> RelayRouter<S> {
    pub fn new(topology: PeerTopology, sender: S) -> Self {
        Self::with_config(topology, sender, RouterConfig::default())
    }

    pub fn with_config(topology: PeerTopology, sender: S, config: RouterConfig) -> Self {
        Self {
            topology,
            sender,
            config,
            now_ms: 0,
            depth: 0,
        }
    }

    pub fn topology(&self) -> &PeerTopology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut PeerTopology {
        &mut self.topology
    }

    /// Advances the router's clock. Called once per simulation tick; the
    /// replicated-value resend throttle measures against this.
    pub fn advance_time(&mut self, now_ms: u64) {
        if now_ms < self.now_ms {
            warn!("router clock moved backwards ({} -> {})", self.now_ms, now_ms);
            return;
        }
        self.now_ms = now_ms;
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Emits an RPC from `source` using the given pattern. The builder
    /// appends the call's payload after the envelope. For the fast patterns
    /// the sending peer's own object is dispatched synchronously before this
    /// returns.
    pub fn send(
        &mut self,
        objects: &mut dyn ObjectDirectory,
        pattern: SendPattern,
        mode: DeliveryMode,
        source: &ObjectPath,
        call: &str,
        build: impl FnOnce(&mut WireMessage),
    ) -> Result<(), SendError> {
        if objects.resolve(source).is_none() {
            error!("trying to send {call} from invalid source instance {source}");
            return Err(SendError::InvalidSourceInstance {
                call: call.to_string(),
                path: source.to_string(),
            });
        }

        let message = Self::build_envelope(pattern, mode, source, call, build);
        self.route(pattern, mode, &message)?;

        if pattern.is_fast() {
            match message.loopback_clone() {
                Ok(local) => {
                    if let Err(dispatch_error) = self.dispatch(objects, local) {
                        warn!("loopback dispatch of {call} failed: {dispatch_error}");
                    }
                }
                Err(_) => warn!("loopback clone of {call} failed"),
            }
        }

        Ok(())
    }

    /// Envelope-and-route without source validation or loopback. Replicated
    /// values send through here: their registration already proves the
    /// source, and value updates never use the fast patterns.
    pub(crate) fn post(
        &mut self,
        pattern: SendPattern,
        mode: DeliveryMode,
        path: &ObjectPath,
        name: &str,
        build: impl FnOnce(&mut WireMessage),
    ) -> Result<(), SendError> {
        let message = Self::build_envelope(pattern, mode, path, name, build);
        self.route(pattern, mode, &message)
    }

    fn build_envelope(
        pattern: SendPattern,
        mode: DeliveryMode,
        path: &ObjectPath,
        name: &str,
        build: impl FnOnce(&mut WireMessage),
    ) -> WireMessage {
        let mut message = WireMessage::create(mode, pattern.relay_kind());
        message.add_string(name);
        message.add_string(path.as_str());
        build(&mut message);
        message
    }

    fn route(
        &mut self,
        pattern: SendPattern,
        mode: DeliveryMode,
        message: &WireMessage,
    ) -> Result<(), SendError> {
        match pattern {
            SendPattern::ToServer
            | SendPattern::BounceToClients
            | SendPattern::BounceToClientsFast => {
                transport_send(&mut self.sender, Destination::Host, mode, message.as_bytes());
            }
            SendPattern::ToClients => {
                self.require_host(pattern)?;
                transport_send(
                    &mut self.sender,
                    Destination::Broadcast,
                    mode,
                    message.as_bytes(),
                );
            }
            SendPattern::ToClientsFast => {
                self.require_host(pattern)?;
                let local = self.topology.local_id();
                for peer in self.topology.clients() {
                    if *peer == local {
                        continue;
                    }
                    transport_send(
                        &mut self.sender,
                        Destination::Peer(*peer),
                        mode,
                        message.as_bytes(),
                    );
                }
            }
        }
        Ok(())
    }

    fn require_host(&self, pattern: SendPattern) -> Result<(), SendError> {
        if self.topology.is_host() {
            return Ok(());
        }
        warn!("{pattern:?} attempted by a non-host peer");
        Err(SendError::NotHost { pattern })
    }

    /// Inbound entry point: the transport calls this once per received
    /// datagram. Bounce-tagged messages are re-framed and forwarded (host
    /// only); everything else is dispatched to the target object.
    pub fn handle_incoming(
        &mut self,
        objects: &mut dyn ObjectDirectory,
        from: PeerId,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        let mut message = WireMessage::from_bytes(mode, payload);
        let relay = message.read_relay_kind().map_err(|_| {
            warn!("dropping message from peer {from} with unreadable relay tag");
            DispatchError::TruncatedMessage {
                context: "relay tag",
            }
        })?;

        match relay {
            RelayKind::Direct => self.dispatch(objects, message),
            RelayKind::Broadcast | RelayKind::ExcludeSender => {
                if !self.topology.is_host() {
                    // intent under malformed traffic is unspecified; a
                    // defensive no-op keeps one bad peer from doing damage
                    warn!("non-host peer received a relay-tagged message from {from}");
                    return Ok(());
                }
                self.relay_onward(relay, from, mode, message)
            }
        }
    }

    /// Strips the relay tag and forwards the already-encoded envelope bits
    /// untouched. The host never treats a bounce as a local dispatch target.
    fn relay_onward(
        &mut self,
        relay: RelayKind,
        from: PeerId,
        mode: DeliveryMode,
        mut message: WireMessage,
    ) -> Result<(), DispatchError> {
        let mut forward = WireMessage::create(mode, RelayKind::Direct);
        message
            .clone_unread_into(&mut forward)
            .map_err(|_| DispatchError::TruncatedMessage {
                context: "bounce re-wrap",
            })?;

        if relay == RelayKind::Broadcast {
            transport_send(
                &mut self.sender,
                Destination::Broadcast,
                mode,
                forward.as_bytes(),
            );
        } else {
            for peer in self.topology.clients() {
                if *peer == from {
                    continue;
                }
                transport_send(
                    &mut self.sender,
                    Destination::Peer(*peer),
                    mode,
                    forward.as_bytes(),
                );
            }
        }

        Ok(())
    }

    fn dispatch(
        &mut self,
        objects: &mut dyn ObjectDirectory,
        mut message: WireMessage,
    ) -> Result<(), DispatchError> {
        if self.depth >= self.config.max_dispatch_depth {
            let limit = self.config.max_dispatch_depth;
            error!("local dispatch re-entered more than {limit} deep; dropping message");
            return Err(DispatchError::DepthExceeded { limit });
        }

        self.depth += 1;
        let result = self.dispatch_inner(objects, &mut message);
        self.depth -= 1;
        result
    }

    fn dispatch_inner(
        &mut self,
        objects: &mut dyn ObjectDirectory,
        message: &mut WireMessage,
    ) -> Result<(), DispatchError> {
        let mode = message.mode();

        let name = message.get_string().map_err(|_| DispatchError::TruncatedMessage {
            context: "call name",
        })?;
        let path = ObjectPath::new(message.get_string().map_err(|_| {
            DispatchError::TruncatedMessage {
                context: "target path",
            }
        })?);

        let Some(registry) = objects.resolve(&path) else {
            return Self::unresolved(
                mode,
                DispatchError::UnknownTarget {
                    name,
                    path: path.to_string(),
                },
            );
        };

        let Some(key) = registry.key_of(&name) else {
            return Self::unresolved(
                mode,
                DispatchError::UnregisteredCall {
                    name,
                    path: path.to_string(),
                },
            );
        };

        match registry.entry_mut(key) {
            Some(CallEntry::Rpc(handler)) => {
                handler(message).map_err(|_| {
                    warn!("rpc {name} on {path} ran out of payload bits");
                    DispatchError::TruncatedMessage {
                        context: "rpc payload",
                    }
                })?;
            }
            Some(CallEntry::Value(entry)) => {
                let entry = entry.clone();
                let ctx = ReceiveContext {
                    local_is_owner: self.topology.is_local_owner(&path),
                    local_is_host: self.topology.is_host(),
                };

                let propagate =
                    entry
                        .borrow_mut()
                        .receive_update(ctx, message)
                        .map_err(|_| {
                            warn!("value update {name} on {path} ran out of payload bits");
                            DispatchError::TruncatedMessage {
                                context: "value update",
                            }
                        })?;

                if propagate {
                    if self.topology.is_host() {
                        let mut forward = WireMessage::create(mode, RelayKind::Direct);
                        forward.add_string(&name);
                        forward.add_string(path.as_str());
                        entry.borrow_mut().write_update(&mut forward);

                        transport_send(
                            &mut self.sender,
                            Destination::Broadcast,
                            mode,
                            forward.as_bytes(),
                        );
                    } else {
                        warn!("update for {path} asked a non-host peer to propagate");
                    }
                }
            }
            None => {
                // key_of only hands out keys it interned, so the entry table
                // cannot miss; log rather than trust that forever
                error!("registry for {path} returned a dangling key for {name}");
            }
        }

        Ok(())
    }

    /// Unresolvable targets are an expected race with object destruction:
    /// silently dropped for unreliable traffic, surfaced as a recoverable
    /// warning for reliable traffic.
    fn unresolved(mode: DeliveryMode, dispatch_error: DispatchError) -> Result<(), DispatchError> {
        match mode {
            DeliveryMode::Unreliable => Ok(()),
            DeliveryMode::Reliable => {
                warn!("ignoring reliable message: {dispatch_error}");
                Err(dispatch_error)
            }
        }
    }
}

fn transport_send<S: PacketSender>(
    sender: &mut S,
    dest: Destination,
    mode: DeliveryMode,
    payload: &[u8],
) {
    // sends are fire-and-forget: a refusing transport costs one message,
    // never the session
    if let Err(transport_error) = sender.send(dest, mode, payload) {
        warn!("transport refused {dest:?} send: {transport_error}");
    }
}
