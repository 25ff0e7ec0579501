// Packet dispatch logic

use byteorder::{BigEndian, ByteOrder};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    log::Logger,
    rtmp::{
        RtmpPacket, RTMP_MAX_CHUNK_SIZE, RTMP_TYPE_ABORT, RTMP_TYPE_ACKNOWLEDGEMENT,
        RTMP_TYPE_AUDIO, RTMP_TYPE_DATA, RTMP_TYPE_EVENT, RTMP_TYPE_FLEX_MESSAGE,
        RTMP_TYPE_INVOKE, RTMP_TYPE_SET_CHUNK_SIZE, RTMP_TYPE_SET_PEER_BANDWIDTH,
        RTMP_TYPE_VIDEO, RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE,
    },
    server::RtmpServerContext,
};

use super::{
    handle_rtmp_packet_audio, handle_rtmp_packet_data, handle_rtmp_packet_invoke,
    handle_rtmp_packet_video, SessionReadThreadContext,
};

/// Handles an assembled RTMP packet, routing it by type
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `packet` - The packet to handle
/// * `write_stream` - IO stream to write bytes
///
/// # Return value
///
/// Returns true to continue receiving chunks. Returns false to end the session main loop.
pub async fn handle_rtmp_packet<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    match packet.header.packet_type {
        RTMP_TYPE_SET_CHUNK_SIZE => {
            if packet.payload.len() < 4 {
                if config.log_requests {
                    logger.log_error("Protocol error: SET_CHUNK_SIZE packet too short");
                }
                return false;
            }

            let new_chunk_size = BigEndian::read_u32(&packet.payload[0..4]) as usize;

            if new_chunk_size == 0 || new_chunk_size > RTMP_MAX_CHUNK_SIZE {
                if config.log_requests {
                    logger.log_error(&format!(
                        "Protocol error: Invalid chunk size received: {}",
                        new_chunk_size
                    ));
                }
                return false;
            }

            session_context.read_status.in_chunk_size = new_chunk_size;

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Updated input chunk size: {}", new_chunk_size));
            }

            true
        }
        RTMP_TYPE_ABORT => {
            if packet.payload.len() < 4 {
                if config.log_requests {
                    logger.log_error("Protocol error: ABORT packet too short");
                }
                return false;
            }

            let channel_id = BigEndian::read_u32(&packet.payload[0..4]);

            if let Some(slot) = session_context.read_status.in_packets.get_mut(&channel_id) {
                slot.reset_payload();
            }

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Aborted chunk stream: {}", channel_id));
            }

            true
        }
        RTMP_TYPE_ACKNOWLEDGEMENT => {
            // Accepted, no internal effect
            true
        }
        RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE => {
            if packet.payload.len() < 4 {
                if config.log_requests {
                    logger.log_error("Protocol error: WINDOW_ACKNOWLEDGEMENT_SIZE packet too short");
                }
                return false;
            }

            let new_window_ack_size = BigEndian::read_u32(&packet.payload[0..4]);

            session_context.read_status.window_ack_size = new_window_ack_size;

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Updated window acknowledgement size: {}",
                    new_window_ack_size
                ));
            }

            true
        }
        RTMP_TYPE_SET_PEER_BANDWIDTH => {
            if packet.payload.len() < 5 {
                if config.log_requests {
                    logger.log_error("Protocol error: SET_PEER_BANDWIDTH packet too short");
                }
                return false;
            }

            let bandwidth = BigEndian::read_u32(&packet.payload[0..4]);
            let limit_type = packet.payload[4];

            session_context.read_status.peer_bandwidth = bandwidth;

            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Updated peer bandwidth: {}. Limit type: {}",
                    bandwidth, limit_type
                ));
            }

            true
        }
        RTMP_TYPE_EVENT => {
            // User control events are accepted and ignored
            true
        }
        RTMP_TYPE_AUDIO => {
            handle_rtmp_packet_audio(logger, server_context, session_context, packet).await
        }
        RTMP_TYPE_VIDEO => {
            handle_rtmp_packet_video(logger, server_context, session_context, packet).await
        }
        RTMP_TYPE_FLEX_MESSAGE | RTMP_TYPE_INVOKE => {
            handle_rtmp_packet_invoke(logger, server_context, session_context, packet, write_stream)
                .await
        }
        RTMP_TYPE_DATA => {
            handle_rtmp_packet_data(logger, server_context, session_context, packet).await
        }
        _ => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!(
                    "Unsupported packet type: {}",
                    packet.header.packet_type
                ));
            }

            true
        }
    }
}
