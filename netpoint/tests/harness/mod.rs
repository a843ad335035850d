#![allow(dead_code)]

//! In-memory packet exchange for driving whole sessions through the relay
//! layer deterministically: one host peer, any number of client peers, every
//! datagram queued and pumped by the test.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use netpoint::{
    CallRegistry, DeliveryMode, Destination, ObjectDirectory, ObjectPath, PacketSender, PeerId,
    PeerTopology, RelayRouter, TransportError,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Datagram {
    pub from: PeerId,
    pub mode: DeliveryMode,
    pub bytes: Vec<u8>,
}

/// The shared "wire": per-peer inbound queues plus the session roster.
pub struct Exchange {
    host_id: PeerId,
    peers: Vec<PeerId>,
    inboxes: HashMap<PeerId, VecDeque<Datagram>>,
}

impl Exchange {
    fn deliver(&mut self, to: PeerId, datagram: Datagram) {
        self.inboxes.entry(to).or_default().push_back(datagram);
    }

    pub fn pending(&self, peer: PeerId) -> usize {
        self.inboxes.get(&peer).map_or(0, VecDeque::len)
    }

    fn take(&mut self, peer: PeerId) -> Option<Datagram> {
        self.inboxes.get_mut(&peer).and_then(VecDeque::pop_front)
    }
}

/// One peer's outbound half of the transport seam.
pub struct MemorySocket {
    local_id: PeerId,
    network: Rc<RefCell<Exchange>>,
}

impl PacketSender for MemorySocket {
    fn send(
        &mut self,
        dest: Destination,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut network = self.network.borrow_mut();

        let datagram = |from: PeerId| Datagram {
            from,
            mode,
            bytes: payload.to_vec(),
        };

        match dest {
            Destination::Host => {
                let host = network.host_id;
                network.deliver(host, datagram(self.local_id));
            }
            Destination::Peer(peer) => {
                if !network.peers.contains(&peer) {
                    return Err(TransportError::UnknownPeer { peer });
                }
                network.deliver(peer, datagram(self.local_id));
            }
            Destination::Broadcast => {
                let peers = network.peers.clone();
                for peer in peers {
                    network.deliver(peer, datagram(self.local_id));
                }
            }
        }

        Ok(())
    }
}

/// The engine-side object table a real game would own.
pub struct World {
    objects: HashMap<ObjectPath, CallRegistry>,
}

impl World {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }

    pub fn add(&mut self, registry: CallRegistry) {
        self.objects.insert(registry.path().clone(), registry);
    }

    pub fn remove(&mut self, path: &ObjectPath) {
        self.objects.remove(path);
    }
}

impl ObjectDirectory for World {
    fn resolve(&mut self, path: &ObjectPath) -> Option<&mut CallRegistry> {
        self.objects.get_mut(path)
    }
}

pub struct Peer {
    pub id: PeerId,
    pub router: RelayRouter<MemorySocket>,
    pub world: World,
}

/// Builds a session: the host peer (which also participates as client
/// `host_id`) plus one peer per entry in `client_ids`, all wired to one
/// shared exchange.
pub fn start_session(
    host_id: PeerId,
    client_ids: &[PeerId],
) -> (Rc<RefCell<Exchange>>, Peer, Vec<Peer>) {
    let mut peers = vec![host_id];
    peers.extend_from_slice(client_ids);

    let network = Rc::new(RefCell::new(Exchange {
        host_id,
        peers: peers.clone(),
        inboxes: HashMap::new(),
    }));

    let mut host_topology = PeerTopology::host(host_id);
    for client in client_ids {
        host_topology.client_connected(*client);
    }

    let host = Peer {
        id: host_id,
        router: RelayRouter::new(
            host_topology,
            MemorySocket {
                local_id: host_id,
                network: network.clone(),
            },
        ),
        world: World::new(),
    };

    let clients = client_ids
        .iter()
        .map(|id| Peer {
            id: *id,
            router: RelayRouter::new(
                PeerTopology::client(*id),
                MemorySocket {
                    local_id: *id,
                    network: network.clone(),
                },
            ),
            world: World::new(),
        })
        .collect();

    (network, host, clients)
}

/// Records an object's owner on every peer, the way spawn replication would.
pub fn assign_owner_everywhere(peers: &mut [&mut Peer], path: &ObjectPath, owner: PeerId) {
    for peer in peers.iter_mut() {
        peer.router
            .topology_mut()
            .assign_owner(path.clone(), owner)
            .unwrap();
    }
}

/// Drains every inbox until the session settles. Relayed messages enqueue
/// further datagrams, so the pump loops until a full pass moves nothing.
pub fn pump(network: &Rc<RefCell<Exchange>>, peers: &mut [&mut Peer]) {
    loop {
        let mut moved = false;

        for peer in peers.iter_mut() {
            loop {
                let datagram = network.borrow_mut().take(peer.id);
                let Some(datagram) = datagram else {
                    break;
                };
                moved = true;

                let _ = peer.router.handle_incoming(
                    &mut peer.world,
                    datagram.from,
                    datagram.mode,
                    &datagram.bytes,
                );
            }
        }

        if !moved {
            return;
        }
    }
}
