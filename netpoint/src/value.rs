use std::rc::Rc;

use log::{error, warn};

use netpoint_serde::{BitRead, BitWrite, Serde, SerdeErr};

use crate::{
    router::{RelayRouter, SendError, SendPattern},
    transport::{DeliveryMode, PacketSender},
    types::{ObjectPath, UpdateIndex},
};

/// Updates are never sent more often than this, regardless of what a value's
/// settings ask for.
pub const MIN_RESEND_INTERVAL_MS: u64 = 50;

/// Which side of the session may originate writes to a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authority {
    Server,
    Client,
}

/// When a value pushes updates: on every observed change, or only when
/// gameplay calls [`ReplicatedValue::sync`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    OnChange,
    Manual,
}

/// Per-value replication settings.
#[derive(Clone, Debug)]
pub struct ValueSettings {
    pub authority: Authority,
    pub policy: UpdatePolicy,
    pub min_resend_interval_ms: u64,
    pub mode: DeliveryMode,
}

impl Default for ValueSettings {
    fn default() -> Self {
        Self {
            authority: Authority::Client,
            policy: UpdatePolicy::Manual,
            min_resend_interval_ms: MIN_RESEND_INTERVAL_MS,
            mode: DeliveryMode::Unreliable,
        }
    }
}

pub(crate) struct Binding {
    pub path: ObjectPath,
    pub name: String,
}

/// What the router needs from a registered value at dispatch time, without
/// knowing its payload type.
pub(crate) trait ValueEntry {
    /// Applies one inbound update. Returns whether the sender asked the host
    /// to fan the update out to the other clients.
    fn receive_update(
        &mut self,
        ctx: ReceiveContext,
        reader: &mut dyn BitRead,
    ) -> Result<bool, SerdeErr>;

    /// Writes a fresh update (next index, propagate flag cleared) carrying
    /// the current value. The host's fan-out path uses this.
    fn write_update(&mut self, writer: &mut dyn BitWrite);
}

#[derive(Clone, Copy)]
pub(crate) struct ReceiveContext {
    pub local_is_owner: bool,
    pub local_is_host: bool,
}

/// A typed piece of state kept consistent across peers via throttled,
/// indexed, authority-gated updates.
///
/// Gameplay code holds the value in an `Rc<RefCell<_>>` and registers a
/// clone of the handle with the owning object's
/// [`CallRegistry`](crate::CallRegistry); inbound network updates reach it
/// through that registration. Sharing is sound here: each peer runs this
/// layer on a single logical thread.
pub struct ReplicatedValue<T: Serde> {
    value: T,
    synced: bool,
    settings: ValueSettings,
    binding: Option<Rc<Binding>>,
    last_sent_tick: Option<u64>,
    last_sent_index: UpdateIndex,
    last_received_index: UpdateIndex,
}

impl<T: Serde> ReplicatedValue<T> {
    pub fn new(initial: T) -> Self {
        Self::with_settings(initial, ValueSettings::default())
    }

    pub fn with_settings(initial: T, mut settings: ValueSettings) -> Self {
        if settings.min_resend_interval_ms < MIN_RESEND_INTERVAL_MS {
            settings.min_resend_interval_ms = MIN_RESEND_INTERVAL_MS;
        }

        Self {
            value: initial,
            synced: false,
            settings,
            binding: None,
            last_sent_tick: None,
            last_sent_index: -1,
            last_received_index: -1,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// True once the value has ever been set, locally or from the network.
    pub fn synced(&self) -> bool {
        self.synced
    }

    pub(crate) fn bind(&mut self, path: ObjectPath, name: &str) {
        if self.binding.is_some() {
            warn!("replicated value {name} re-registered; rebinding to {path}");
        }
        self.binding = Some(Rc::new(Binding {
            path,
            name: name.to_string(),
        }));
    }

    /// Sets the value locally. Under [`UpdatePolicy::OnChange`] a differing
    /// value triggers an outbound update before the new value is applied.
    pub fn set(
        &mut self,
        net: &mut RelayRouter<impl PacketSender>,
        value: T,
    ) -> Result<(), SendError> {
        self.synced = true;

        if self.settings.policy == UpdatePolicy::OnChange && self.value != value {
            self.send_update(net)?;
        }

        self.value = value;
        Ok(())
    }

    /// Forces an outbound update attempt regardless of policy. Gameplay
    /// calls this once per tick for heartbeat-style resync; the resend floor
    /// keeps the actual send rate bounded.
    pub fn sync(&mut self, net: &mut RelayRouter<impl PacketSender>) -> Result<(), SendError> {
        self.send_update(net)
    }

    fn send_update(&mut self, net: &mut RelayRouter<impl PacketSender>) -> Result<(), SendError> {
        let Some(binding) = self.binding.clone() else {
            error!("cannot send updates for a replicated value that was never registered");
            return Err(SendError::UnboundValue);
        };

        if !net.topology().is_local_owner(&binding.path) {
            return Ok(());
        }

        let now = net.now();
        if let Some(last) = self.last_sent_tick {
            if now.saturating_sub(last) < self.settings.min_resend_interval_ms {
                return Ok(());
            }
        }
        self.last_sent_tick = Some(now);
        self.last_sent_index += 1;

        // only client-authored updates travel through the host and need the
        // host to fan them out
        let propagate = self.settings.authority == Authority::Client;
        let pattern = match self.settings.authority {
            Authority::Server => SendPattern::ToClients,
            Authority::Client => SendPattern::ToServer,
        };

        let index = self.last_sent_index;
        let value = &self.value;

        net.post(pattern, self.settings.mode, &binding.path, &binding.name, |message| {
            message.add_bool(propagate);
            message.add_int(index);
            value.ser(message);
        })
    }
}

impl<T: Serde> ValueEntry for ReplicatedValue<T> {
    fn receive_update(
        &mut self,
        ctx: ReceiveContext,
        reader: &mut dyn BitRead,
    ) -> Result<bool, SerdeErr> {
        let propagate = bool::de(reader)?;
        let index = i32::de(reader)?;

        // stale or duplicate update: no observable effect at all
        if index <= self.last_received_index {
            return Ok(false);
        }

        self.last_received_index = index;
        // a later local echo must never collide with an index already seen
        self.last_sent_index = self.last_sent_index.max(index);
        self.synced = true;

        let self_authored = match self.settings.authority {
            Authority::Client => ctx.local_is_owner,
            Authority::Server => ctx.local_is_host,
        };

        if !self_authored {
            self.value = T::de(reader)?;
        }

        Ok(propagate)
    }

    fn write_update(&mut self, writer: &mut dyn BitWrite) {
        self.last_sent_index += 1;

        false.ser(writer);
        self.last_sent_index.ser(writer);
        self.value.ser(writer);
    }
}
