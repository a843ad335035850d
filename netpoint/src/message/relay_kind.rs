// The 2-bit tag leading every application datagram. It tells the host
// whether a message is for local dispatch or must be bounced onward.

use netpoint_serde::{BitRead, BitWrite, Serde, SerdeErr, UnsignedInteger};

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum RelayKind {
    // Dispatch at the receiving peer
    Direct,
    // Host re-wraps and forwards to every connected client
    Broadcast,
    // Host re-wraps and forwards to every connected client except the sender
    ExcludeSender,
}

impl Serde for RelayKind {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u8 = match self {
            RelayKind::Direct => 0,
            RelayKind::Broadcast => 1,
            RelayKind::ExcludeSender => 2,
        };

        UnsignedInteger::<2>::new(index).ser(writer);
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<2>::de(reader)?.get() {
            0 => Ok(RelayKind::Direct),
            1 => Ok(RelayKind::Broadcast),
            2 => Ok(RelayKind::ExcludeSender),
            // a malformed packet could carry the unused tag value
            _ => Err(SerdeErr),
        }
    }

    fn bit_length(&self) -> u32 {
        2
    }
}
