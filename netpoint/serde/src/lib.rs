//! # Netpoint Serde
//! Bit-level serialization shared between every netpoint peer.

mod bit_reader;
mod bit_writer;
mod error;
mod integer;
mod serde;

pub use bit_reader::{BitRead, BitReader};
pub use bit_writer::{BitWrite, BitWriter};
pub use error::SerdeErr;
pub use integer::{UnsignedInteger, UnsignedVariableInteger};
pub use serde::Serde;
