// Session writer task logic

use std::sync::Arc;

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{mpsc::Receiver, Mutex},
};

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_audio_codec_header_message, rtmp_make_metadata_message,
        rtmp_make_sample_access_message, rtmp_make_stream_status_message,
        rtmp_make_video_codec_header_message, RtmpChunkWriter, STREAM_BEGIN, STREAM_EOF,
    },
    server::RtmpServerConfiguration,
};

use super::{
    send_status_message, session_write_bytes, RtmpSessionMessage, RtmpSessionStatus,
};

/// Handles a session message
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `msg` - Session message to handle
/// * `write_stream` - IO stream to write bytes
/// * `chunk_writer` - Chunk writer of the play stream
/// * `config` - Server configuration
/// * `session_status` - Session status
///
/// # Return value
///
/// Returns true to continue handling messages. Returns false to end the task.
pub async fn handle_session_message<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    msg: RtmpSessionMessage,
    write_stream: &Mutex<TW>,
    chunk_writer: &mut RtmpChunkWriter,
    config: &RtmpServerConfiguration,
    session_status: &Mutex<RtmpSessionStatus>,
) -> bool {
    match msg {
        RtmpSessionMessage::PlayStart {
            metadata,
            audio_codec,
            aac_sequence_header,
            video_codec,
            avc_sequence_header,
            gop_cache,
        } => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("RtmpSessionMessage::PlayStart");
            }

            let (is_player, play_stream_id) =
                RtmpSessionStatus::get_play_stream_id(session_status).await;

            if !is_player {
                return true;
            }

            // The play stream starts over, the header cache must not
            // carry anything from a previous playback
            chunk_writer.reset();

            // Send stream status

            let stream_status_bytes = rtmp_make_stream_status_message(STREAM_BEGIN, play_stream_id);

            if let Err(e) = session_write_bytes(write_stream, &stream_status_bytes).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send stream status: {}", e));
                }
                return true;
            }

            // Send status messages indicating play

            if let Err(e) = send_status_message(
                write_stream,
                play_stream_id,
                "status",
                "NetStream.Play.Reset",
                Some("Playing and resetting stream."),
                config.chunk_size,
            )
            .await
            {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send status message: {}", e));
                }
            }

            if let Err(e) = send_status_message(
                write_stream,
                play_stream_id,
                "status",
                "NetStream.Play.Start",
                Some("Started playing stream."),
                config.chunk_size,
            )
            .await
            {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send status message: {}", e));
                }
            }

            // Send sample access message

            let sample_access_bytes = rtmp_make_sample_access_message(0, config.chunk_size);

            if let Err(e) = session_write_bytes(write_stream, &sample_access_bytes).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send sample access: {}", e));
                }
                return true;
            }

            // Send metadata

            if !metadata.is_empty() {
                let metadata_bytes =
                    rtmp_make_metadata_message(play_stream_id, &metadata, 0, config.chunk_size);

                if let Err(e) = session_write_bytes(write_stream, &metadata_bytes).await {
                    if config.log_requests && logger.config.debug_enabled {
                        logger.log_debug(&format!("Send error: Could not send metadata: {}", e));
                    }
                    return true;
                }
            }

            // Send audio sequence header

            if !aac_sequence_header.is_empty() {
                let audio_codec_header = rtmp_make_audio_codec_header_message(
                    play_stream_id,
                    &aac_sequence_header,
                    0,
                    config.chunk_size,
                );

                if let Err(e) = session_write_bytes(write_stream, &audio_codec_header).await {
                    if config.log_requests && logger.config.debug_enabled {
                        logger.log_debug(&format!(
                            "Send error: Could not send audio codec header: {}",
                            e
                        ));
                    }
                    return true;
                }

                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!(
                        "Sent audio codec header (codec: {})",
                        audio_codec
                    ));
                }
            }

            // Send video sequence header

            if !avc_sequence_header.is_empty() {
                let video_codec_header = rtmp_make_video_codec_header_message(
                    play_stream_id,
                    &avc_sequence_header,
                    0,
                    config.chunk_size,
                );

                if let Err(e) = session_write_bytes(write_stream, &video_codec_header).await {
                    if config.log_requests && logger.config.debug_enabled {
                        logger.log_debug(&format!(
                            "Send error: Could not send video codec header: {}",
                            e
                        ));
                    }
                    return true;
                }

                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!(
                        "Sent video codec header (codec: {})",
                        video_codec
                    ));
                }
            }

            // Send the GOP cache, so playback can start before
            // the next keyframe

            for packet in gop_cache {
                let packet_bytes =
                    chunk_writer.encode_packet(&packet, play_stream_id, config.chunk_size);

                if let Err(e) = session_write_bytes(write_stream, &packet_bytes).await {
                    if config.log_requests && logger.config.debug_enabled {
                        logger.log_debug(&format!(
                            "Send error: Could not send GOP cached packet: {}",
                            e
                        ));
                    }
                    return true;
                }
            }

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Changed play status: PLAYING");
            }
        }
        RtmpSessionMessage::PlayMetadata { metadata } => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("RtmpSessionMessage::PlayMetadata");
            }

            let (is_player, play_stream_id) =
                RtmpSessionStatus::get_play_stream_id(session_status).await;

            if !is_player || metadata.is_empty() {
                return true;
            }

            let metadata_bytes =
                rtmp_make_metadata_message(play_stream_id, &metadata, 0, config.chunk_size);

            if let Err(e) = session_write_bytes(write_stream, &metadata_bytes).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send metadata: {}", e));
                }
                return true;
            }
        }
        RtmpSessionMessage::PlayPacket { packet } => {
            if config.log_requests && logger.config.trace_enabled {
                logger.log_trace("RtmpSessionMessage::PlayPacket");
            }

            let (is_player, play_stream_id) =
                RtmpSessionStatus::get_play_stream_id(session_status).await;

            if !is_player {
                return true;
            }

            let packet_bytes =
                chunk_writer.encode_packet(&packet, play_stream_id, config.chunk_size);

            if let Err(e) = session_write_bytes(write_stream, &packet_bytes).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send packet: {}", e));
                }
                return true;
            }
        }
        RtmpSessionMessage::PlayStop => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("RtmpSessionMessage::PlayStop");
            }

            let (is_player, play_stream_id) =
                RtmpSessionStatus::get_play_stream_id(session_status).await;

            if !is_player {
                return true;
            }

            // The player is detached from the channel,
            // no more packets will arrive
            RtmpSessionStatus::stop_playing(session_status).await;
            chunk_writer.reset();

            if let Err(e) = send_status_message(
                write_stream,
                play_stream_id,
                "status",
                "NetStream.Play.UnpublishNotify",
                Some("stream is now unpublished."),
                config.chunk_size,
            )
            .await
            {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send status message: {}", e));
                }
            }

            let stream_status_bytes = rtmp_make_stream_status_message(STREAM_EOF, play_stream_id);

            if let Err(e) = session_write_bytes(write_stream, &stream_status_bytes).await {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send stream status: {}", e));
                }
                return true;
            }

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Changed play status: IDLE");
            }
        }
        RtmpSessionMessage::End => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("RtmpSessionMessage::End");
            }

            return false;
        }
    }

    true
}

/// Creates a task to read and handle session messages
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `write_stream` - IO stream to write bytes
/// * `config` - Server configuration
/// * `session_status` - Session status
/// * `session_msg_receiver` - Receiver for the session messages
pub fn spawn_task_to_read_session_messages<
    TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin + 'static,
>(
    logger: Arc<Logger>,
    write_stream: Arc<Mutex<TW>>,
    config: Arc<RtmpServerConfiguration>,
    session_status: Arc<Mutex<RtmpSessionStatus>>,
    mut session_msg_receiver: Receiver<RtmpSessionMessage>,
) {
    tokio::spawn(async move {
        let mut chunk_writer = RtmpChunkWriter::new();

        loop {
            let msg = match session_msg_receiver.recv().await {
                Some(m) => m,
                None => {
                    break;
                }
            };

            let continue_loop = handle_session_message(
                &logger,
                msg,
                &write_stream,
                &mut chunk_writer,
                &config,
                &session_status,
            )
            .await;

            if !continue_loop {
                break;
            }
        }

        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Completed session messages handling task");
        }
    });
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    use byteorder::{BigEndian, ByteOrder};
    use tokio::io::{duplex, split, AsyncReadExt, ReadHalf};

    use crate::{
        log::LogConfig,
        rtmp::{
            RtmpPacket, RTMP_CHANNEL_AUDIO, RTMP_CHUNK_TYPE_0, RTMP_TYPE_AUDIO, RTMP_TYPE_DATA,
            RTMP_TYPE_EVENT, RTMP_TYPE_INVOKE, RTMP_TYPE_VIDEO,
        },
        utils::IpRangeConfig,
    };

    use std::sync::Arc;

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

    fn test_config() -> RtmpServerConfiguration {
        RtmpServerConfiguration {
            port: 1935,
            bind_address: "127.0.0.1".to_string(),
            id_max_length: 128,
            chunk_size: 4096,
            gop_cache_size: 1024 * 1024,
            msg_buffer_size: 8,
            max_concurrent_connections_per_ip: 4,
            max_concurrent_connections_whitelist: IpRangeConfig::new_from_string("").unwrap(),
            log_requests: false,
        }
    }

    /// Reads one fmt-0, single chunk message
    /// Returns the packet type and the payload
    async fn read_single_chunk_message(
        read: &mut ReadHalf<tokio::io::DuplexStream>,
    ) -> (u32, Vec<u8>) {
        let mut header = vec![0_u8; 12];
        read.read_exact(&mut header).await.unwrap();

        assert_eq!(header[0] >> 6, 0, "expected a fmt 0 chunk");

        let length = BigEndian::read_u24(&header[4..7]) as usize;
        let packet_type = header[7] as u32;

        let mut payload = vec![0_u8; length];
        read.read_exact(&mut payload).await.unwrap();

        (packet_type, payload)
    }

    #[tokio::test]
    async fn test_play_start_delivery_order() {
        let logger = test_logger();
        let config = test_config();

        let (client, server) = duplex(256 * 1024);
        let (mut client_read, _client_write) = split(client);
        let (_server_read, server_write) = split(server);

        let write_stream = Mutex::new(server_write);

        let mut session_status_v = RtmpSessionStatus::new();
        session_status_v.channel = Some("live".to_string());
        session_status_v.is_player = true;
        session_status_v.play_stream_id = 1;

        let session_status = Mutex::new(session_status_v);

        let mut chunk_writer = RtmpChunkWriter::new();

        let metadata: Vec<u8> = vec![0x02, 0x00, 0x01, b'm'];
        let aac_header: Vec<u8> = vec![0xaf, 0x00, 0x12, 0x10];
        let avc_header: Vec<u8> = vec![0x17, 0x00, 0x00, 0x00, 0x00, 0x01];

        let mut gop_packet = RtmpPacket::new_blank();
        gop_packet.header.format = RTMP_CHUNK_TYPE_0;
        gop_packet.header.channel_id = RTMP_CHANNEL_AUDIO;
        gop_packet.header.packet_type = RTMP_TYPE_AUDIO;
        gop_packet.header.timestamp = 40;
        gop_packet.payload = vec![0xaf, 0x01, 0xee];
        gop_packet.header.length = gop_packet.payload.len();

        let msg = RtmpSessionMessage::PlayStart {
            metadata: Arc::new(metadata.clone()),
            audio_codec: 10,
            aac_sequence_header: Arc::new(aac_header.clone()),
            video_codec: 7,
            avc_sequence_header: Arc::new(avc_header.clone()),
            gop_cache: vec![Arc::new(gop_packet)],
        };

        assert!(
            handle_session_message(
                &logger,
                msg,
                &write_stream,
                &mut chunk_writer,
                &config,
                &session_status,
            )
            .await
        );

        // Stream status (STREAM_BEGIN on stream 1)

        let (packet_type, payload) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_EVENT);
        assert_eq!(payload, vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

        // Play.Reset and Play.Start statuses

        let (packet_type, _) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_INVOKE);

        let (packet_type, _) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_INVOKE);

        // Sample access

        let (packet_type, _) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_DATA);

        // Metadata, then the audio header, then the video header,
        // then the cached media

        let (packet_type, payload) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_DATA);
        assert_eq!(payload, metadata);

        let (packet_type, payload) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_AUDIO);
        assert_eq!(payload, aac_header);

        let (packet_type, payload) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_VIDEO);
        assert_eq!(payload, avc_header);

        let (packet_type, payload) = read_single_chunk_message(&mut client_read).await;
        assert_eq!(packet_type, RTMP_TYPE_AUDIO);
        assert_eq!(payload, vec![0xaf, 0x01, 0xee]);
    }

    #[tokio::test]
    async fn test_play_packet_ignored_when_not_playing() {
        let logger = test_logger();
        let config = test_config();

        let (client, server) = duplex(64 * 1024);
        let (mut client_read, _client_write) = split(client);
        let (_server_read, server_write) = split(server);

        let write_stream = Mutex::new(server_write);
        let session_status = Mutex::new(RtmpSessionStatus::new());

        let mut chunk_writer = RtmpChunkWriter::new();

        let mut packet = RtmpPacket::new_blank();
        packet.header.packet_type = RTMP_TYPE_AUDIO;
        packet.payload = vec![0xaf, 0x01];
        packet.header.length = 2;

        assert!(
            handle_session_message(
                &logger,
                RtmpSessionMessage::PlayPacket {
                    packet: Arc::new(packet),
                },
                &write_stream,
                &mut chunk_writer,
                &config,
                &session_status,
            )
            .await
        );

        // End stops the task loop

        assert!(
            !handle_session_message(
                &logger,
                RtmpSessionMessage::End,
                &write_stream,
                &mut chunk_writer,
                &config,
                &session_status,
            )
            .await
        );

        // Nothing was written
        drop(write_stream);
        drop(_server_read);
        let mut rest = Vec::new();
        client_read.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
