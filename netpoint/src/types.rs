use std::fmt;

use netpoint_serde::{BitRead, BitWrite, Serde, SerdeErr};

/// Identifies one peer within a session. The transport hands these out when
/// connections are established.
pub type PeerId = u16;

/// Sequence counter carried by every replicated-value update. Starts below
/// zero so the first real update (index 0) always passes the staleness check.
pub type UpdateIndex = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

/// Addresses one networked object within the session's object tree. The path
/// travels on the wire with every call, so two peers agree on a target by
/// spawning objects under the same paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl Serde for ObjectPath {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        Ok(Self(String::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        self.0.bit_length()
    }
}
