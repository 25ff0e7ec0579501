// RTMP packet model

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{RTMP_CHUNK_TYPE_0, RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2, RTMP_CHUNK_TYPE_3};

/// Header of an RTMP packet
#[derive(Clone)]
pub struct RtmpPacketHeader {
    /// Raw timestamp field (absolute for fmt 0, a delta for fmt 1 and 2)
    pub timestamp: i64,

    /// Packet format
    pub format: u32,

    /// Channel ID (chunk stream id)
    pub channel_id: u32,

    /// Packet type
    pub packet_type: u32,

    /// Message stream ID
    pub stream_id: u32,

    // Payload length
    pub length: usize,
}

/// RTMP packet
///
/// Models both a protocol message and the per-channel
/// reassembly slot the inbound chunk decoder keeps
#[derive(Clone)]
pub struct RtmpPacket {
    /// Packet header
    pub header: RtmpPacketHeader,

    /// Resolved absolute timestamp of the message
    /// (extended timestamps and deltas applied)
    pub clock: i64,

    /// Packet payload
    pub payload: Vec<u8>,

    /// Wall clock (unix seconds) of the last received chunk for this slot
    pub last_received_time: i64,
}

impl RtmpPacket {
    /// Creates new blank RTMP packet
    pub fn new_blank() -> RtmpPacket {
        RtmpPacket {
            header: RtmpPacketHeader {
                timestamp: 0,
                format: 0,
                channel_id: 0,
                packet_type: 0,
                stream_id: 0,
                length: 0,
            },
            clock: 0,
            payload: Vec::new(),
            last_received_time: 0,
        }
    }

    /// Drops the accumulated payload, keeping header defaults
    /// for future chunks that inherit them
    pub fn reset_payload(&mut self) {
        self.payload.truncate(0);
    }

    /// Serializes a basic header for a RTMP packet
    /// format - Chunk format
    /// channel_id - Packet channel ID
    /// Returns the serialized bytes
    pub fn serialize_basic_header(format: u32, channel_id: u32) -> Vec<u8> {
        if channel_id >= 64 + 256 {
            vec![
                ((format << 6) as u8) | 1,
                ((channel_id - 64) & 0xff) as u8,
                ((channel_id - 64) >> 8) as u8,
            ]
        } else if channel_id >= 64 {
            vec![(format << 6) as u8, (channel_id - 64) as u8]
        } else {
            vec![((format << 6) as u8) | (channel_id as u8)]
        }
    }

    /// Serializes the message header of a RTMP packet
    /// Returns the serialized bytes
    pub fn serialize_chunk_message_header(&self, stream_id: u32) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();

        if self.header.format <= RTMP_CHUNK_TYPE_2 {
            let mut b: Vec<u8> = vec![0; 4];

            if self.header.timestamp >= 0xffffff {
                BigEndian::write_u32(&mut b, 0xffffff);
            } else {
                BigEndian::write_u32(&mut b, self.header.timestamp as u32);
            }

            out.extend(&b[1..]);
        }

        if self.header.format <= RTMP_CHUNK_TYPE_1 {
            let mut b: Vec<u8> = vec![0; 4];

            BigEndian::write_u32(&mut b, self.header.length as u32);

            out.extend(&b[1..]);
            out.push(self.header.packet_type as u8);
        }

        if self.header.format == RTMP_CHUNK_TYPE_0 {
            // The message stream id is the only little-endian field
            let mut b: Vec<u8> = vec![0; 4];

            LittleEndian::write_u32(&mut b, stream_id);

            out.extend(b);
        }

        out
    }

    /// Creates the chunks for an RTMP packet
    /// out_chunk_size - Size of the output chunks
    pub fn create_chunks(&self, out_chunk_size: usize) -> Vec<u8> {
        self.create_chunks_for_stream(self.header.stream_id, out_chunk_size)
    }

    /// Creates the chunks for an RTMP packet
    /// stream_id - Message stream ID to write in the header
    /// out_chunk_size - Size of the output chunks
    pub fn create_chunks_for_stream(&self, stream_id: u32, out_chunk_size: usize) -> Vec<u8> {
        let basic_header = Self::serialize_basic_header(self.header.format, self.header.channel_id);
        let separator_header =
            Self::serialize_basic_header(RTMP_CHUNK_TYPE_3, self.header.channel_id);
        let message_header = self.serialize_chunk_message_header(stream_id);

        let use_extended_timestamp = self.header.timestamp >= 0xffffff;

        let payload_size = self.header.length.min(self.payload.len());

        let mut chunks: Vec<u8> =
            Vec::with_capacity(basic_header.len() + message_header.len() + payload_size + 8);

        chunks.extend(&basic_header);
        chunks.extend(&message_header);

        if use_extended_timestamp {
            let mut b: Vec<u8> = vec![0; 4];
            BigEndian::write_u32(&mut b, self.header.timestamp as u32);
            chunks.extend(&b);
        }

        let mut payload_offset: usize = 0;

        while payload_offset < payload_size {
            if payload_offset > 0 {
                // Continuation chunk
                chunks.extend(&separator_header);

                if use_extended_timestamp {
                    let mut b: Vec<u8> = vec![0; 4];
                    BigEndian::write_u32(&mut b, self.header.timestamp as u32);
                    chunks.extend(&b);
                }
            }

            let count = out_chunk_size.min(payload_size - payload_offset);

            chunks.extend(&self.payload[payload_offset..payload_offset + count]);

            payload_offset += count;
        }

        chunks
    }
}

// Tests
