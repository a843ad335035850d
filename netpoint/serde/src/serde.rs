use crate::{
    bit_reader::BitRead,
    bit_writer::BitWrite,
    error::SerdeErr,
    integer::UnsignedVariableInteger,
};

/// A type that can be serialized into, and deserialized out of, a bit stream.
/// Encodes are infallible; decodes surface [`SerdeErr`] when the stream runs
/// dry or carries an invalid encoding.
pub trait Serde: Sized + Clone + PartialEq {
    fn ser(&self, writer: &mut dyn BitWrite);
    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr>;
    fn bit_length(&self) -> u32;
}

// Unit

impl Serde for () {
    fn ser(&self, _writer: &mut dyn BitWrite) {}

    fn de(_reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn bit_length(&self) -> u32 {
        0
    }
}

// Boolean

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

// Fixed-width integers, little-endian byte order on the wire

macro_rules! impl_serde_for_integer {
    ($ty:ty) => {
        impl Serde for $ty {
            fn ser(&self, writer: &mut dyn BitWrite) {
                for byte in self.to_le_bytes() {
                    writer.write_byte(byte);
                }
            }

            fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                for byte in bytes.iter_mut() {
                    *byte = reader.read_byte()?;
                }
                Ok(<$ty>::from_le_bytes(bytes))
            }

            fn bit_length(&self) -> u32 {
                (std::mem::size_of::<$ty>() as u32) * 8
            }
        }
    };
}

impl_serde_for_integer!(u8);
impl_serde_for_integer!(u16);
impl_serde_for_integer!(u32);
impl_serde_for_integer!(u64);
impl_serde_for_integer!(i8);
impl_serde_for_integer!(i16);
impl_serde_for_integer!(i32);
impl_serde_for_integer!(i64);

// Floats travel as their IEEE-754 bit patterns, so a round trip is exact

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        Ok(f32::from_bits(u32::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        Ok(f64::from_bits(u64::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

// Strings: variable-width length prefix, then UTF-8 bytes

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<7>::new(self.len() as u64).ser(writer);
        for byte in self.as_bytes() {
            writer.write_byte(*byte);
        }
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::<7>::de(reader)?.get() as usize;

        // bytes are pulled one at a time so a forged length fails at the
        // stream's end instead of reserving unbounded memory
        let mut bytes = Vec::new();
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }

        String::from_utf8(bytes).map_err(|_| SerdeErr)
    }

    fn bit_length(&self) -> u32 {
        UnsignedVariableInteger::<7>::new(self.len() as u64).bit_length()
            + (self.len() as u32) * 8
    }
}

// Option

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.bit_length(),
            None => 1,
        }
    }
}

// Fixed-size arrays

impl<T: Serde, const N: usize> Serde for [T; N] {
    fn ser(&self, writer: &mut dyn BitWrite) {
        for element in self {
            element.ser(writer);
        }
    }

    fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
        let mut elements = Vec::with_capacity(N);
        for _ in 0..N {
            elements.push(T::de(reader)?);
        }
        elements.try_into().map_err(|_| SerdeErr)
    }

    fn bit_length(&self) -> u32 {
        self.iter().map(Serde::bit_length).sum()
    }
}

// Tuples

macro_rules! impl_serde_for_tuple {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Serde),+> Serde for ($($name,)+) {
            fn ser(&self, writer: &mut dyn BitWrite) {
                $(self.$index.ser(writer);)+
            }

            fn de(reader: &mut dyn BitRead) -> Result<Self, SerdeErr> {
                Ok(($($name::de(reader)?,)+))
            }

            fn bit_length(&self) -> u32 {
                0 $(+ self.$index.bit_length())+
            }
        }
    };
}

impl_serde_for_tuple!(A: 0);
impl_serde_for_tuple!(A: 0, B: 1);
impl_serde_for_tuple!(A: 0, B: 1, C: 2);
impl_serde_for_tuple!(A: 0, B: 1, C: 2, D: 3);
