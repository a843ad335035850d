use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use crate::types::{HostType, ObjectPath, PeerId};

/// Errors that can occur while mutating the session topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Ownership of a networked object never changes after spawn
    #[error("object {path} is already owned by peer {current}")]
    OwnerAlreadyAssigned { path: String, current: PeerId },
}

/// Tracks the fixed roles of one session: which process is the host, which
/// peer this process is, which client peers are connected, and which peer
/// owns each networked object.
///
/// The host process participates in the session as a client peer of its own
/// server, so on the host `clients()` contains `local_id()`. That local
/// connection is exactly what the fast send patterns skip.
pub struct PeerTopology {
    role: HostType,
    local_id: PeerId,
    clients: Vec<PeerId>,
    owners: HashMap<ObjectPath, PeerId>,
    spawn_counters: HashMap<String, u32>,
}

impl PeerTopology {
    /// Creates the topology for the hosting process. The host's own
    /// local-client id starts out connected.
    pub fn host(local_id: PeerId) -> Self {
        Self {
            role: HostType::Server,
            local_id,
            clients: vec![local_id],
            owners: HashMap::new(),
            spawn_counters: HashMap::new(),
        }
    }

    /// Creates the topology for a joining process.
    pub fn client(local_id: PeerId) -> Self {
        Self {
            role: HostType::Client,
            local_id,
            clients: Vec::new(),
            owners: HashMap::new(),
            spawn_counters: HashMap::new(),
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == HostType::Server
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    /// Connected client peer ids, as known on this process. Clients other
    /// than the host generally only know about themselves.
    pub fn clients(&self) -> &[PeerId] {
        &self.clients
    }

    /// Records a newly connected client. The transport's connection events
    /// drive this.
    pub fn client_connected(&mut self, peer: PeerId) {
        if self.clients.contains(&peer) {
            warn!("peer {peer} reported connected twice");
            return;
        }
        self.clients.push(peer);
    }

    pub fn client_disconnected(&mut self, peer: PeerId) {
        self.clients.retain(|client| *client != peer);
    }

    /// Assigns the owning peer of a networked object at spawn time.
    /// Ownership is immutable for the object's lifetime.
    pub fn assign_owner(&mut self, path: ObjectPath, owner: PeerId) -> Result<(), TopologyError> {
        if let Some(current) = self.owners.get(&path) {
            if *current != owner {
                return Err(TopologyError::OwnerAlreadyAssigned {
                    path: path.to_string(),
                    current: *current,
                });
            }
            return Ok(());
        }
        self.owners.insert(path, owner);
        Ok(())
    }

    pub fn owner_of(&self, path: &ObjectPath) -> Option<PeerId> {
        self.owners.get(path).copied()
    }

    /// Whether this process may originate writes for the given object.
    pub fn is_local_owner(&self, path: &ObjectPath) -> bool {
        self.owner_of(path) == Some(self.local_id)
    }

    /// Allocates a collision-free path for a freshly spawned object and
    /// records its owner in one step. Every peer spawning the same base
    /// names in the same order derives the same paths.
    pub fn register_spawn(&mut self, base_name: &str, owner: PeerId) -> ObjectPath {
        let counter = self.spawn_counters.entry(base_name.to_string()).or_insert(0);
        let path = ObjectPath::new(format!("{} {}", base_name, counter));
        *counter += 1;

        // a fresh counter value cannot collide, so assignment cannot fail
        let _ = self.assign_owner(path.clone(), owner);

        path
    }
}
