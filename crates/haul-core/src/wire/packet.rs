//! Datagram packet format for the unreliable-transport lane.
//!
//! Layout:
//!
//! ```text
//! [4]byte  magic = "TSFT"
//! u8       version = 1
//! u8       packet type
//! [16]byte session id
//! u64 BE   chunk id
//! u32 BE   seq
//! u8       priority
//! [3]byte  padding = 0
//! N bytes  payload (N <= 64 KiB)
//! u32 BE   CRC32-IEEE over header || payload
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::MAX_PACKET_PAYLOAD;
use crate::error::{Error, Result};

/// Wire magic prefix.
pub const PACKET_MAGIC: [u8; 4] = *b"TSFT";

/// Current packet format version.
pub const PACKET_VERSION: u8 = 1;

/// Fixed header size: magic + version + type + session + chunk + seq +
/// priority + padding.
pub const PACKET_HEADER_LEN: usize = 4 + 1 + 1 + 16 + 8 + 4 + 1 + 3;

const CHECKSUM_LEN: usize = 4;

/// Datagram packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Data = 0x01,
    Ack = 0x02,
    Nack = 0x03,
    Control = 0x04,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(PacketType::Data),
            0x02 => Ok(PacketType::Ack),
            0x03 => Ok(PacketType::Nack),
            0x04 => Ok(PacketType::Control),
            other => Err(Error::Protocol {
                message: format!("unknown packet type: {:#04x}", other),
            }),
        }
    }
}

/// One datagram packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub packet_type: PacketType,
    pub session_id: [u8; 16],
    pub chunk_id: u64,
    pub seq: u32,
    pub priority: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a DATA packet.
    pub fn data(session_id: [u8; 16], chunk_id: u64, seq: u32, priority: u8, payload: Vec<u8>) -> Self {
        Self {
            version: PACKET_VERSION,
            packet_type: PacketType::Data,
            session_id,
            chunk_id,
            seq,
            priority,
            payload,
        }
    }

    /// Serialize the packet, appending the checksum over everything before it.
    pub fn encode(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_PACKET_PAYLOAD {
            return Err(Error::Protocol {
                message: format!(
                    "payload too large: {} bytes (max {})",
                    self.payload.len(),
                    MAX_PACKET_PAYLOAD
                ),
            });
        }

        let mut buf =
            BytesMut::with_capacity(PACKET_HEADER_LEN + self.payload.len() + CHECKSUM_LEN);
        buf.put_slice(&PACKET_MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.packet_type as u8);
        buf.put_slice(&self.session_id);
        buf.put_u64(self.chunk_id);
        buf.put_u32(self.seq);
        buf.put_u8(self.priority);
        buf.put_slice(&[0u8; 3]);
        buf.put_slice(&self.payload);

        let checksum = crc32fast::hash(&buf);
        buf.put_u32(checksum);
        Ok(buf.freeze())
    }

    /// Parse and verify a packet.
    ///
    /// Rejects input shorter than header+checksum, unknown magic or type,
    /// oversized payloads, and any checksum mismatch.
    pub fn decode(data: &[u8]) -> Result<Packet> {
        if data.len() < PACKET_HEADER_LEN + CHECKSUM_LEN {
            return Err(Error::Protocol {
                message: format!("packet too small: {} bytes", data.len()),
            });
        }

        if data[0..4] != PACKET_MAGIC {
            return Err(Error::Protocol {
                message: "invalid magic".into(),
            });
        }

        let body_len = data.len() - CHECKSUM_LEN;
        let declared = u32::from_be_bytes(data[body_len..].try_into().unwrap());
        let computed = crc32fast::hash(&data[..body_len]);
        if declared != computed {
            return Err(Error::Protocol {
                message: format!("checksum mismatch: declared {declared:#010x}, computed {computed:#010x}"),
            });
        }

        let version = data[4];
        let packet_type = PacketType::try_from(data[5])?;
        let mut session_id = [0u8; 16];
        session_id.copy_from_slice(&data[6..22]);
        let chunk_id = u64::from_be_bytes(data[22..30].try_into().unwrap());
        let seq = u32::from_be_bytes(data[30..34].try_into().unwrap());
        let priority = data[34];
        // bytes 35..38 are padding

        let payload = data[PACKET_HEADER_LEN..body_len].to_vec();
        if payload.len() > MAX_PACKET_PAYLOAD {
            return Err(Error::Protocol {
                message: format!("payload too large: {} bytes", payload.len()),
            });
        }

        Ok(Packet {
            version,
            packet_type,
            session_id,
            chunk_id,
            seq,
            priority,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet(packet_type: PacketType, payload: Vec<u8>) -> Packet {
        Packet {
            version: PACKET_VERSION,
            packet_type,
            session_id: *b"0123456789abcdef",
            chunk_id: 42,
            seq: 7,
            priority: 2,
            payload,
        }
    }

    #[test]
    fn roundtrip_all_types() {
        for t in [
            PacketType::Data,
            PacketType::Ack,
            PacketType::Nack,
            PacketType::Control,
        ] {
            let p = sample_packet(t, b"hello payload".to_vec());
            let encoded = p.encode().unwrap();
            let decoded = Packet::decode(&encoded).unwrap();
            assert_eq!(decoded, p);
        }
    }

    #[test]
    fn roundtrip_empty_payload() {
        let p = sample_packet(PacketType::Ack, Vec::new());
        let encoded = p.encode().unwrap();
        assert_eq!(encoded.len(), PACKET_HEADER_LEN + CHECKSUM_LEN);
        assert_eq!(Packet::decode(&encoded).unwrap(), p);
    }

    #[test]
    fn any_single_byte_corruption_fails() {
        let p = sample_packet(PacketType::Data, b"corruption target".to_vec());
        let encoded = p.encode().unwrap();

        for i in 0..encoded.len() {
            let mut corrupted = encoded.to_vec();
            corrupted[i] ^= 0xFF;
            assert!(
                Packet::decode(&corrupted).is_err(),
                "corruption at byte {i} was not detected"
            );
        }
    }

    #[test]
    fn rejects_short_input() {
        assert!(Packet::decode(&[]).is_err());
        assert!(Packet::decode(&[0u8; PACKET_HEADER_LEN + CHECKSUM_LEN - 1]).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let p = sample_packet(PacketType::Data, b"x".to_vec());
        let mut encoded = p.encode().unwrap().to_vec();
        encoded[0] = b'X';
        assert!(Packet::decode(&encoded).is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(PacketType::try_from(0x09).is_err());
    }

    #[test]
    fn rejects_oversized_payload() {
        let p = sample_packet(PacketType::Data, vec![0u8; MAX_PACKET_PAYLOAD + 1]);
        assert!(p.encode().is_err());
    }

    #[test]
    fn max_payload_roundtrips() {
        let p = sample_packet(PacketType::Data, vec![0xA5; MAX_PACKET_PAYLOAD]);
        let encoded = p.encode().unwrap();
        assert_eq!(Packet::decode(&encoded).unwrap(), p);
    }
}
