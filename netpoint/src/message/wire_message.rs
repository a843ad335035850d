use netpoint_serde::{BitRead, BitWrite, Serde, SerdeErr};

use crate::{message::RelayKind, transport::DeliveryMode};

/// Width of the relay tag leading every datagram.
pub(crate) const RELAY_TAG_BITS: u32 = 2;

/// The unit of network I/O: a growable bit-addressable buffer with an append
/// cursor and an independent read cursor.
///
/// Peeks never move the read cursor; reads advance it by exactly the number
/// of bits consumed. The delivery mode and relay kind are fixed when the
/// message is created (outbound) or parsed (inbound) and never change
/// afterwards.
pub struct WireMessage {
    mode: DeliveryMode,
    relay: RelayKind,
    buffer: Vec<u8>,
    written_bits: u32,
    read_bits: u32,
}

impl WireMessage {
    /// Starts an outbound message. The 2-bit relay tag goes on the wire
    /// immediately, ahead of the envelope.
    pub fn create(mode: DeliveryMode, relay: RelayKind) -> Self {
        let mut message = Self::raw(mode, relay);
        relay.ser(&mut message);
        message
    }

    /// Starts an untagged buffer. Loopback clones use this: their content
    /// begins directly at the envelope, the way a dispatched inbound message
    /// looks after its tag has been consumed.
    pub(crate) fn raw(mode: DeliveryMode, relay: RelayKind) -> Self {
        Self {
            mode,
            relay,
            buffer: Vec::with_capacity(64),
            written_bits: 0,
            read_bits: 0,
        }
    }

    /// Wraps an inbound datagram. The relay kind is unknown until the
    /// router consumes the leading tag.
    pub fn from_bytes(mode: DeliveryMode, bytes: &[u8]) -> Self {
        Self {
            mode,
            relay: RelayKind::Direct,
            buffer: bytes.to_vec(),
            written_bits: (bytes.len() as u32) * 8,
            read_bits: 0,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn relay_kind(&self) -> RelayKind {
        self.relay
    }

    pub fn written_bits(&self) -> u32 {
        self.written_bits
    }

    pub fn unread_bits(&self) -> u32 {
        self.written_bits - self.read_bits
    }

    /// The complete message bytes, ready for the transport. The final
    /// partial byte, if any, is zero-padded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the leading relay tag of an inbound message and records it.
    pub(crate) fn read_relay_kind(&mut self) -> Result<RelayKind, SerdeErr> {
        let relay = RelayKind::de(self)?;
        self.relay = relay;
        Ok(relay)
    }

    fn peek_bit(&self, offset: u32) -> Result<bool, SerdeErr> {
        if offset >= self.written_bits {
            return Err(SerdeErr);
        }

        let byte = self.buffer[(offset / 8) as usize];
        Ok((byte >> (offset % 8)) & 1 != 0)
    }

    /// Reads up to 8 bits at an absolute offset without touching the read
    /// cursor.
    pub fn peek_bits(&self, width: u32, offset: u32) -> Result<u8, SerdeErr> {
        assert!(width <= 8, "peek_bits is limited to 8 bits per call");

        let mut output: u8 = 0;
        for i in 0..width {
            if self.peek_bit(offset + i)? {
                output |= 1 << i;
            }
        }
        Ok(output)
    }

    /// Appends up to 8 bits.
    pub fn add_bits(&mut self, value: u8, width: u32) {
        assert!(width <= 8, "add_bits is limited to 8 bits per call");

        for i in 0..width {
            self.write_bit((value >> i) & 1 != 0);
        }
    }

    /// Destructively reads up to 8 bits, advancing the read cursor by
    /// exactly `width`.
    pub fn get_bits(&mut self, width: u32) -> Result<u8, SerdeErr> {
        let output = self.peek_bits(width, self.read_bits)?;
        self.read_bits += width;
        Ok(output)
    }

    pub fn add<T: Serde>(&mut self, value: &T) {
        value.ser(self);
    }

    pub fn get<T: Serde>(&mut self) -> Result<T, SerdeErr> {
        T::de(self)
    }

    pub fn add_bool(&mut self, value: bool) {
        self.add(&value);
    }

    pub fn add_int(&mut self, value: i32) {
        self.add(&value);
    }

    pub fn add_float(&mut self, value: f32) {
        self.add(&value);
    }

    pub fn add_string(&mut self, value: &str) {
        value.to_string().ser(self);
    }

    pub fn get_bool(&mut self) -> Result<bool, SerdeErr> {
        self.get()
    }

    pub fn get_int(&mut self) -> Result<i32, SerdeErr> {
        self.get()
    }

    pub fn get_float(&mut self) -> Result<f32, SerdeErr> {
        self.get()
    }

    pub fn get_string(&mut self) -> Result<String, SerdeErr> {
        self.get()
    }

    /// Copies everything after the relay tag into a fresh untagged message,
    /// 8 bits at a time, without decoding any of it. Feeding the clone
    /// straight into local dispatch is what lets the sending peer see its own
    /// effect without a network round trip.
    pub(crate) fn loopback_clone(&self) -> Result<WireMessage, SerdeErr> {
        let mut local = WireMessage::raw(self.mode, RelayKind::Direct);

        let mut position = RELAY_TAG_BITS;
        while position < self.written_bits {
            let width = u32::min(8, self.written_bits - position);
            let bits = self.peek_bits(width, position)?;
            local.add_bits(bits, width);
            position += width;
        }

        Ok(local)
    }

    /// Drains every unread bit into `target`, 8 bits at a time. The host's
    /// bounce path uses this to re-wrap an already-encoded envelope without
    /// re-decoding it field by field.
    pub(crate) fn clone_unread_into(&mut self, target: &mut WireMessage) -> Result<(), SerdeErr> {
        while self.unread_bits() > 0 {
            let width = u32::min(8, self.unread_bits());
            let bits = self.get_bits(width)?;
            target.add_bits(bits, width);
        }
        Ok(())
    }
}

impl BitWrite for WireMessage {
    fn write_bit(&mut self, bit: bool) {
        if self.written_bits % 8 == 0 {
            self.buffer.push(0);
        }

        if bit {
            let byte_index = (self.written_bits / 8) as usize;
            self.buffer[byte_index] |= 1 << (self.written_bits % 8);
        }

        self.written_bits += 1;
    }

    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 != 0);
        }
    }
}

impl BitRead for WireMessage {
    fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        let bit = self.peek_bit(self.read_bits)?;
        self.read_bits += 1;
        Ok(bit)
    }
}
