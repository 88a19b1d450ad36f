//! Networking: wire messages, their encoding and the transport seam

pub mod codec;
pub mod protocol;
pub mod transport;

pub use codec::{CodecError, JsonCodec};
pub use protocol::{ClientMsg, ServerMsg};
pub use transport::{loopback_pair, LoopbackTransport, LossyTransport, Transport, TransportEvent};
