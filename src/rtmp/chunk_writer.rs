// Outbound chunk writer with header compression

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{
    RtmpPacket, RTMP_CHANNEL_PROTOCOL, RTMP_CHUNK_TYPE_0, RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2,
    RTMP_CHUNK_TYPE_3, RTMP_TYPE_AUDIO,
};

/// Last header written for a message stream
struct LastWrittenHeader {
    /// Channel allocated for the stream
    channel_id: u32,

    /// Timestamp of the last message
    timestamp: i64,

    /// Length of the last message
    length: usize,

    /// Type of the last message
    packet_type: u32,
}

/// Serializes outbound packets, compressing chunk headers
/// against the last header written per message stream
pub struct RtmpChunkWriter {
    /// Cache of last written headers, by message stream id
    last_headers: HashMap<u32, LastWrittenHeader>,

    /// Next channel to allocate for a new message stream
    next_channel_id: u32,
}

impl RtmpChunkWriter {
    /// Creates new RtmpChunkWriter
    pub fn new() -> RtmpChunkWriter {
        RtmpChunkWriter {
            last_headers: HashMap::new(),
            next_channel_id: RTMP_CHANNEL_PROTOCOL + 1,
        }
    }

    /// Forgets all cached headers
    /// The next packet of every stream is written with a full header
    pub fn reset(&mut self) {
        self.last_headers.clear();
        self.next_channel_id = RTMP_CHANNEL_PROTOCOL + 1;
    }

    /// Serializes a packet into chunks
    ///
    /// # Arguments
    ///
    /// * `packet` - The packet to serialize. The header timestamp must be absolute.
    /// * `stream_id` - Message stream ID to write the packet on
    /// * `out_chunk_size` - Size of the output chunks
    ///
    /// # Return value
    ///
    /// The serialized bytes
    pub fn encode_packet(
        &mut self,
        packet: &RtmpPacket,
        stream_id: u32,
        out_chunk_size: usize,
    ) -> Vec<u8> {
        // Protocol control messages always travel
        // on the protocol channel with full headers
        if packet.header.packet_type < RTMP_TYPE_AUDIO {
            return Self::serialize(
                packet,
                RTMP_CHUNK_TYPE_0,
                RTMP_CHANNEL_PROTOCOL,
                stream_id,
                packet.header.timestamp,
                out_chunk_size,
            );
        }

        let (format, channel_id, time_value) = match self.last_headers.get_mut(&stream_id) {
            None => {
                let channel_id = self.next_channel_id;
                self.next_channel_id += 1;

                self.last_headers.insert(
                    stream_id,
                    LastWrittenHeader {
                        channel_id,
                        timestamp: packet.header.timestamp,
                        length: packet.header.length,
                        packet_type: packet.header.packet_type,
                    },
                );

                (RTMP_CHUNK_TYPE_0, channel_id, packet.header.timestamp)
            }
            Some(last) => {
                let channel_id = last.channel_id;

                let res = if packet.header.timestamp <= last.timestamp {
                    // Time went backwards (or repeated), full header required
                    (RTMP_CHUNK_TYPE_0, channel_id, packet.header.timestamp)
                } else if packet.header.length != last.length
                    || packet.header.packet_type != last.packet_type
                {
                    (
                        RTMP_CHUNK_TYPE_1,
                        channel_id,
                        packet.header.timestamp - last.timestamp,
                    )
                } else {
                    (
                        RTMP_CHUNK_TYPE_2,
                        channel_id,
                        packet.header.timestamp - last.timestamp,
                    )
                };

                last.timestamp = packet.header.timestamp;
                last.length = packet.header.length;
                last.packet_type = packet.header.packet_type;

                res
            }
        };

        Self::serialize(
            packet,
            format,
            channel_id,
            stream_id,
            time_value,
            out_chunk_size,
        )
    }

    /// Serializes a packet with a chosen format and channel
    /// time_value - Absolute timestamp for fmt 0, a delta for fmt 1 and 2
    fn serialize(
        packet: &RtmpPacket,
        format: u32,
        channel_id: u32,
        stream_id: u32,
        time_value: i64,
        out_chunk_size: usize,
    ) -> Vec<u8> {
        let basic_header = RtmpPacket::serialize_basic_header(format, channel_id);
        let separator_header = RtmpPacket::serialize_basic_header(RTMP_CHUNK_TYPE_3, channel_id);

        let use_extended_timestamp = time_value >= 0xffffff;

        let payload_size = packet.header.length.min(packet.payload.len());

        let mut chunks: Vec<u8> = Vec::with_capacity(basic_header.len() + 15 + payload_size);

        chunks.extend(&basic_header);

        if format <= RTMP_CHUNK_TYPE_2 {
            let mut b: Vec<u8> = vec![0; 4];

            if use_extended_timestamp {
                BigEndian::write_u32(&mut b, 0xffffff);
            } else {
                BigEndian::write_u32(&mut b, time_value as u32);
            }

            chunks.extend(&b[1..]);
        }

        if format <= RTMP_CHUNK_TYPE_1 {
            let mut b: Vec<u8> = vec![0; 4];

            BigEndian::write_u32(&mut b, packet.header.length as u32);

            chunks.extend(&b[1..]);
            chunks.push(packet.header.packet_type as u8);
        }

        if format == RTMP_CHUNK_TYPE_0 {
            let mut b: Vec<u8> = vec![0; 4];

            LittleEndian::write_u32(&mut b, stream_id);

            chunks.extend(b);
        }

        if use_extended_timestamp {
            let mut b: Vec<u8> = vec![0; 4];
            BigEndian::write_u32(&mut b, time_value as u32);
            chunks.extend(&b);
        }

        let mut payload_offset: usize = 0;

        while payload_offset < payload_size {
            if payload_offset > 0 {
                chunks.extend(&separator_header);

                if use_extended_timestamp {
                    let mut b: Vec<u8> = vec![0; 4];
                    BigEndian::write_u32(&mut b, time_value as u32);
                    chunks.extend(&b);
                }
            }

            let count = out_chunk_size.min(payload_size - payload_offset);

            chunks.extend(&packet.payload[payload_offset..payload_offset + count]);

            payload_offset += count;
        }

        chunks
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtmp::{RTMP_CHANNEL_AUDIO, RTMP_TYPE_VIDEO};

    fn media_packet(packet_type: u32, timestamp: i64, payload_len: usize) -> RtmpPacket {
        let mut packet = RtmpPacket::new_blank();

        packet.header.format = RTMP_CHUNK_TYPE_0;
        packet.header.channel_id = RTMP_CHANNEL_AUDIO;
        packet.header.packet_type = packet_type;
        packet.header.timestamp = timestamp;
        packet.payload = vec![0x11; payload_len];
        packet.header.length = payload_len;

        packet
    }

    #[test]
    fn test_header_compression_selection() {
        let mut writer = RtmpChunkWriter::new();

        // First message on the stream: full header on the first allocated channel
        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 100, 10), 1, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_0 as u8);
        assert_eq!(chunks[0] & 0x3f, 3);
        assert_eq!(chunks.len(), 1 + 11 + 10);

        // Same length and type, advancing time: timestamp-only header
        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 120, 10), 1, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_2 as u8);
        assert_eq!(chunks.len(), 1 + 3 + 10);

        // Delta is written, not the absolute time
        assert_eq!(&chunks[1..4], &[0x00, 0x00, 0x14]);

        // Type changed: message header without stream id
        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_VIDEO, 140, 10), 1, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_1 as u8);
        assert_eq!(chunks.len(), 1 + 7 + 10);

        // Time not advancing: back to a full header
        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_VIDEO, 140, 10), 1, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_0 as u8);

        // A different stream gets its own channel
        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 100, 10), 2, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_0 as u8);
        assert_eq!(chunks[0] & 0x3f, 4);
    }

    #[test]
    fn test_control_messages_pinned_to_protocol_channel() {
        let mut writer = RtmpChunkWriter::new();

        let mut packet = media_packet(RTMP_TYPE_AUDIO, 0, 4);
        packet.header.packet_type = 1; // SET_CHUNK_SIZE

        let chunks = writer.encode_packet(&packet, 0, 4096);

        assert_eq!(chunks[0], 0x02);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_0 as u8);
    }

    #[test]
    fn test_continuation_chunks() {
        let mut writer = RtmpChunkWriter::new();

        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 50, 300), 1, 128);

        // Full header, then 2 separators
        assert_eq!(chunks.len(), 1 + 11 + 300 + 2);
        assert_eq!(chunks[12 + 128] >> 6, RTMP_CHUNK_TYPE_3 as u8);
    }

    #[test]
    fn test_reset_forces_full_header() {
        let mut writer = RtmpChunkWriter::new();

        let _ = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 100, 10), 1, 4096);
        writer.reset();

        let chunks = writer.encode_packet(&media_packet(RTMP_TYPE_AUDIO, 200, 10), 1, 4096);
        assert_eq!(chunks[0] >> 6, RTMP_CHUNK_TYPE_0 as u8);
    }
}
