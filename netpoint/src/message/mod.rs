mod relay_kind;
mod wire_message;

pub use relay_kind::RelayKind;
pub use wire_message::WireMessage;
