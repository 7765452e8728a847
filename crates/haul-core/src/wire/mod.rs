//! Wire formats.
//!
//! Two independent encodings:
//! - `frame`: the (metadata, data) pair carried on the reliable byte stream
//! - `packet`: the datagram format for the planned unreliable-transport lane
//! - `datagram`: a fire-and-forget UDP sender over `packet`

pub mod datagram;
pub mod frame;
pub mod packet;

pub use datagram::{DatagramSender, DatagramSenderConfig, chunk_priority};
pub use frame::{Frame, read_frame, write_frame};
pub use packet::{Packet, PacketType};
