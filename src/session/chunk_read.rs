// Chunk read logic

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::Utc;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    log::Logger,
    rtmp::{
        get_rtmp_header_size, rtmp_make_ack, RtmpPacket, RTMP_ACK_WRAP_LIMIT, RTMP_CHUNK_TYPE_0,
        RTMP_CHUNK_TYPE_1, RTMP_CHUNK_TYPE_2, RTMP_STALE_PAYLOAD_SECONDS, RTMP_TYPE_METADATA,
    },
    server::RtmpServerContext,
};

use super::{handle_rtmp_packet, session_write_bytes, SessionReadThreadContext};

/// Reads one RTMP chunk and, if it completes a message, handles it
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `read_stream` - IO stream to read bytes
/// * `write_stream` - IO stream to write bytes
///
/// # Return value
///
/// Returns true to continue receiving chunks. Returns false to end the session main loop.
pub async fn read_rtmp_chunk<
    TR: AsyncRead + AsyncReadExt + Send + Sync + Unpin,
    TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin,
>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    read_stream: &mut TR,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    let mut bytes_read_count: u64 = 0;

    // Basic header

    let start_byte = match read_stream.read_u8().await {
        Ok(b) => b,
        Err(e) => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Connection ended: {}", e));
            }
            return false;
        }
    };

    bytes_read_count += 1;

    let format = (start_byte >> 6) as u32;
    let mut channel_id = (start_byte & 0x3f) as u32;

    // Chunk stream IDs 64-319 use the 2-byte form of the basic header,
    // chunk stream IDs 64-65599 use the 3-byte form
    if channel_id == 0 {
        match read_stream.read_u8().await {
            Ok(b) => {
                channel_id = 64 + (b as u32);
            }
            Err(e) => {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!(
                        "Chunk read error. Could not read basic header: {}",
                        e
                    ));
                }
                return false;
            }
        }

        bytes_read_count += 1;
    } else if channel_id == 1 {
        let mut b: Vec<u8> = vec![0; 2];

        if let Err(e) = read_stream.read_exact(&mut b).await {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Chunk read error. Could not read basic header: {}",
                    e
                ));
            }
            return false;
        }

        channel_id = 64 + (b[0] as u32) + 256 * (b[1] as u32);

        bytes_read_count += 2;
    }

    let now = Utc::now().timestamp();

    // Drop stale payload buffers to bound memory

    for slot in session_context.read_status.in_packets.values_mut() {
        if !slot.payload.is_empty()
            && now.saturating_sub(slot.last_received_time) >= RTMP_STALE_PAYLOAD_SECONDS
        {
            slot.reset_payload();
        }
    }

    let mut emitted_packet: Option<RtmpPacket> = None;
    let mut zero_length = false;

    {
        let slot = session_context
            .read_status
            .in_packets
            .entry(channel_id)
            .or_insert_with(RtmpPacket::new_blank);

        slot.header.format = format;
        slot.header.channel_id = channel_id;
        slot.last_received_time = now;

        // Message header

        let header_size = get_rtmp_header_size(format as u8);

        if header_size > 0 {
            let mut header: Vec<u8> = vec![0; header_size];

            if let Err(e) = read_stream.read_exact(&mut header).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!(
                        "Chunk read error. Could not read message header: {}",
                        e
                    ));
                }
                return false;
            }

            bytes_read_count += header_size as u64;

            if format <= RTMP_CHUNK_TYPE_2 {
                slot.header.timestamp = BigEndian::read_u24(&header[0..3]) as i64;
            }

            if format <= RTMP_CHUNK_TYPE_1 {
                slot.header.length = BigEndian::read_u24(&header[3..6]) as usize;
                slot.header.packet_type = header[6] as u32;
                slot.reset_payload();
            }

            if format == RTMP_CHUNK_TYPE_0 {
                slot.header.stream_id = LittleEndian::read_u32(&header[7..11]);
            }
        }

        // Validate packet type

        if slot.header.packet_type > RTMP_TYPE_METADATA {
            if config.log_requests {
                logger.log_error(&format!(
                    "Protocol error: Invalid packet type: {}",
                    slot.header.packet_type
                ));
            }
            return false;
        }

        // Extended timestamp
        // Also read for inherited headers that had it,
        // since real peers are not consistent about this

        let time_value: i64 = if slot.header.timestamp == 0xffffff {
            let mut b: Vec<u8> = vec![0; 4];

            if let Err(e) = read_stream.read_exact(&mut b).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!(
                        "Chunk read error. Could not read extended timestamp: {}",
                        e
                    ));
                }
                return false;
            }

            bytes_read_count += 4;

            BigEndian::read_u32(&b) as i64
        } else {
            slot.header.timestamp
        };

        // A chunk with an empty buffer starts a new message:
        // resolve its absolute timestamp
        if slot.payload.is_empty() {
            if format == RTMP_CHUNK_TYPE_0 {
                slot.clock = time_value;
            } else {
                slot.clock = slot.clock.wrapping_add(time_value);
            }
        }

        if slot.header.length == 0 {
            // Not worth closing the connection for, but the
            // slot buffer is discarded
            if config.log_requests {
                logger.log_error(&format!(
                    "Packet error: Message length is zero. Format: {}. Channel: {}",
                    format, channel_id
                ));
            }

            slot.reset_payload();
            zero_length = true;
        } else {
            // Payload chunk

            let remaining = slot.header.length - slot.payload.len();
            let to_read = session_context.read_status.in_chunk_size.min(remaining);

            let mut payload_chunk: Vec<u8> = vec![0; to_read];

            if let Err(e) = read_stream.read_exact(&mut payload_chunk).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Chunk read error. Could not read payload: {}", e));
                }
                return false;
            }

            bytes_read_count += to_read as u64;

            slot.payload.extend_from_slice(&payload_chunk);

            // Completion

            if slot.payload.len() >= slot.header.length {
                let mut packet = RtmpPacket::new_blank();

                packet.header = slot.header.clone();
                packet.clock = slot.clock;
                packet.payload = std::mem::take(&mut slot.payload);

                emitted_packet = Some(packet);
            }
        }
    }

    // Acknowledgement bookkeeping
    // Every byte read (header and payload) counts

    session_context.read_status.in_ack_size += bytes_read_count;

    if session_context.read_status.in_ack_size >= RTMP_ACK_WRAP_LIMIT {
        session_context.read_status.in_ack_size = 0;
        session_context.read_status.in_last_ack = 0;
    }

    let window_ack_size = session_context.read_status.window_ack_size as u64;

    if window_ack_size > 0
        && session_context.read_status.in_ack_size - session_context.read_status.in_last_ack
            >= window_ack_size
    {
        session_context.read_status.in_last_ack = session_context.read_status.in_ack_size;

        let ack_bytes = rtmp_make_ack(session_context.read_status.in_ack_size as u32);

        if let Err(e) = session_write_bytes(write_stream, &ack_bytes).await {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Send error: Could not send ACK: {}", e));
            }
            return false;
        }
    }

    if zero_length {
        return true;
    }

    match emitted_packet {
        Some(packet) => {
            handle_rtmp_packet(
                logger,
                server_context,
                session_context,
                &packet,
                write_stream,
            )
            .await
        }
        None => true,
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        net::{IpAddr, Ipv4Addr},
        sync::Arc,
    };

    use tokio::{
        io::{duplex, split, AsyncReadExt},
        sync::mpsc::Receiver,
    };

    use crate::{
        log::LogConfig,
        rtmp::{RTMP_CHANNEL_AUDIO, RTMP_TYPE_AUDIO, RTMP_TYPE_SET_CHUNK_SIZE},
        server::{RtmpServerConfiguration, RtmpServerStatus},
        session::{
            RtmpSessionMessage, RtmpSessionPublishStreamStatus, RtmpSessionReadStatus,
            RtmpSessionStatus,
        },
        utils::IpRangeConfig,
    };

    fn test_logger() -> Logger {
        Logger::new(LogConfig {
            prefix: "".to_string(),
            error_enabled: false,
            warning_enabled: false,
            info_enabled: false,
            debug_enabled: false,
            trace_enabled: false,
        })
    }

    fn test_config() -> Arc<RtmpServerConfiguration> {
        Arc::new(RtmpServerConfiguration {
            port: 1935,
            bind_address: "127.0.0.1".to_string(),
            id_max_length: 128,
            chunk_size: 4096,
            gop_cache_size: 1024 * 1024,
            msg_buffer_size: 8,
            max_concurrent_connections_per_ip: 4,
            max_concurrent_connections_whitelist: IpRangeConfig::new_from_string("").unwrap(),
            log_requests: false,
        })
    }

    /// Builds a publishing session attached to a channel with one
    /// player, so assembled media messages can be observed
    async fn publishing_session(
        session_id: u64,
    ) -> (
        RtmpServerContext,
        SessionReadThreadContext,
        Receiver<RtmpSessionMessage>,
        Receiver<RtmpSessionMessage>,
    ) {
        let server_context = RtmpServerContext {
            config: test_config(),
            status: Arc::new(tokio::sync::Mutex::new(RtmpServerStatus::new())),
        };

        let publish_status = Arc::new(tokio::sync::Mutex::new(
            RtmpSessionPublishStreamStatus::new(),
        ));

        assert!(
            RtmpServerStatus::set_publisher(
                &server_context.status,
                "live",
                "key",
                session_id,
                1,
                publish_status.clone(),
            )
            .await
        );

        let (player_sender, player_receiver) =
            tokio::sync::mpsc::channel::<RtmpSessionMessage>(64);

        assert!(
            RtmpServerStatus::add_player(&server_context.status, "live", 99, player_sender).await
        );

        let mut session_status = RtmpSessionStatus::new();
        session_status.channel = Some("live".to_string());
        session_status.is_publisher = true;
        session_status.publish_stream_id = 1;

        let (session_msg_sender, session_msg_receiver) =
            tokio::sync::mpsc::channel::<RtmpSessionMessage>(8);

        let session_context = SessionReadThreadContext {
            id: session_id,
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            status: Arc::new(tokio::sync::Mutex::new(session_status)),
            publish_status,
            session_msg_sender,
            read_status: RtmpSessionReadStatus::new(),
        };

        (server_context, session_context, player_receiver, session_msg_receiver)
    }

    fn make_audio_message(timestamp: i64, payload_len: usize) -> RtmpPacket {
        let mut packet = RtmpPacket::new_blank();

        packet.header.format = RTMP_CHUNK_TYPE_0;
        packet.header.channel_id = RTMP_CHANNEL_AUDIO;
        packet.header.packet_type = RTMP_TYPE_AUDIO;
        packet.header.stream_id = 1;
        packet.header.timestamp = timestamp;

        let mut payload = vec![0x00; payload_len];
        payload[0] = 0xaf; // AAC
        payload[1] = 0x01; // Not a sequence header

        packet.payload = payload;
        packet.header.length = payload_len;

        packet
    }

    async fn drain_play_start(receiver: &mut Receiver<RtmpSessionMessage>) {
        match receiver.try_recv() {
            Ok(RtmpSessionMessage::PlayStart { .. }) => {}
            _ => panic!("Expected PlayStart"),
        }
    }

    #[tokio::test]
    async fn test_chunk_size_change_mid_stream() {
        let logger = test_logger();
        let (server_context, mut session_context, mut player_receiver, _session_msg_receiver) =
            publishing_session(1).await;

        drain_play_start(&mut player_receiver).await;

        // SET_CHUNK_SIZE(8192), then a 20000 byte audio message
        // split into chunks of 8192

        let mut script: Vec<u8> = Vec::new();

        let mut chunk_size_packet = RtmpPacket::new_blank();
        chunk_size_packet.header.format = RTMP_CHUNK_TYPE_0;
        chunk_size_packet.header.channel_id = 2;
        chunk_size_packet.header.packet_type = RTMP_TYPE_SET_CHUNK_SIZE;
        chunk_size_packet.payload = vec![0x00, 0x00, 0x20, 0x00];
        chunk_size_packet.header.length = 4;

        script.extend(chunk_size_packet.create_chunks(4096));
        script.extend(make_audio_message(100, 20000).create_chunks(8192));

        let (_client, server) = duplex(64 * 1024);
        let (_server_read, server_write) = split(server);
        let write_stream = tokio::sync::Mutex::new(server_write);

        let mut read_stream: &[u8] = &script;

        // 1 chunk for the control message, 3 for the audio message
        for _ in 0..4 {
            assert!(
                read_rtmp_chunk(
                    &logger,
                    &server_context,
                    &mut session_context,
                    &mut read_stream,
                    &write_stream,
                )
                .await
            );
        }

        assert_eq!(session_context.read_status.in_chunk_size, 8192);

        match player_receiver.try_recv().expect("no relayed packet") {
            RtmpSessionMessage::PlayPacket { packet } => {
                assert_eq!(packet.header.packet_type, RTMP_TYPE_AUDIO);
                assert_eq!(packet.payload.len(), 20000);
                assert_eq!(packet.header.timestamp, 100);
            }
            _ => panic!("Expected PlayPacket"),
        }

        // One message only
        assert!(player_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_extended_timestamp() {
        let logger = test_logger();
        let (server_context, mut session_context, mut player_receiver, _session_msg_receiver) =
            publishing_session(2).await;

        drain_play_start(&mut player_receiver).await;

        // Timestamp above the 3 byte range forces the extended field
        let script = make_audio_message(0x01020304, 32).create_chunks(128);

        let (_client, server) = duplex(64 * 1024);
        let (_server_read, server_write) = split(server);
        let write_stream = tokio::sync::Mutex::new(server_write);

        let mut read_stream: &[u8] = &script;

        assert!(
            read_rtmp_chunk(
                &logger,
                &server_context,
                &mut session_context,
                &mut read_stream,
                &write_stream,
            )
            .await
        );

        match player_receiver.try_recv().expect("no relayed packet") {
            RtmpSessionMessage::PlayPacket { packet } => {
                assert_eq!(packet.header.timestamp, 0x01020304);
            }
            _ => panic!("Expected PlayPacket"),
        }
    }

    #[tokio::test]
    async fn test_interleaved_chunk_streams() {
        let logger = test_logger();
        let (server_context, mut session_context, mut player_receiver, _session_msg_receiver) =
            publishing_session(3).await;

        drain_play_start(&mut player_receiver).await;

        // Message A on a small channel id, message B on a channel
        // that needs the 3 byte basic header form
        let message_a = make_audio_message(10, 256);

        let mut message_b = make_audio_message(20, 130);
        message_b.header.channel_id = 320;
        message_b.payload[2] = 0xbb;
        let message_b = message_b;

        let a_chunks = message_a.create_chunks(128);
        let b_chunks = message_b.create_chunks(128);

        // A: 12 byte header + 128, then separator + 128
        // B: 14 byte header (3 byte basic form) + 128, then separator (3 bytes) + 2
        let mut script: Vec<u8> = Vec::new();
        script.extend(&a_chunks[0..12 + 128]);
        script.extend(&b_chunks[0..14 + 128]);
        script.extend(&a_chunks[12 + 128..]);
        script.extend(&b_chunks[14 + 128..]);

        let (_client, server) = duplex(64 * 1024);
        let (_server_read, server_write) = split(server);
        let write_stream = tokio::sync::Mutex::new(server_write);

        let mut read_stream: &[u8] = &script;

        for _ in 0..4 {
            assert!(
                read_rtmp_chunk(
                    &logger,
                    &server_context,
                    &mut session_context,
                    &mut read_stream,
                    &write_stream,
                )
                .await
            );
        }

        // A completes first, then B
        match player_receiver.try_recv().expect("no relayed packet") {
            RtmpSessionMessage::PlayPacket { packet } => {
                assert_eq!(packet.payload.len(), 256);
                assert_eq!(packet.header.timestamp, 10);
            }
            _ => panic!("Expected PlayPacket"),
        }

        match player_receiver.try_recv().expect("no relayed packet") {
            RtmpSessionMessage::PlayPacket { packet } => {
                assert_eq!(packet.payload.len(), 130);
                assert_eq!(packet.payload[2], 0xbb);
                assert_eq!(packet.header.timestamp, 20);
            }
            _ => panic!("Expected PlayPacket"),
        }
    }

    #[tokio::test]
    async fn test_acknowledgements() {
        let logger = test_logger();
        let (server_context, mut session_context, mut player_receiver, _session_msg_receiver) =
            publishing_session(4).await;

        drain_play_start(&mut player_receiver).await;

        // Small window, so every chunk crosses it
        session_context.read_status.window_ack_size = 100;

        let script = make_audio_message(0, 500).create_chunks(128);

        let (client, server) = duplex(64 * 1024);
        let (mut client_read, _client_write) = split(client);
        let (_server_read, server_write) = split(server);
        let write_stream = tokio::sync::Mutex::new(server_write);

        let mut read_stream: &[u8] = &script;

        for _ in 0..4 {
            assert!(
                read_rtmp_chunk(
                    &logger,
                    &server_context,
                    &mut session_context,
                    &mut read_stream,
                    &write_stream,
                )
                .await
            );
        }

        // Chunk byte counts: 140, 129, 129, 117. Every chunk crosses
        // the 100 byte window, so each one produces an ACK carrying
        // the cumulative count
        for expected in [140_u32, 269, 398, 515] {
            let mut ack = vec![0_u8; 16];
            client_read.read_exact(&mut ack).await.unwrap();
            assert_eq!(ack, rtmp_make_ack(expected));
        }
    }
}
