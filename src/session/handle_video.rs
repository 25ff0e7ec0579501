// Logic to handle video packets

use std::sync::Arc;

use crate::{
    log::Logger,
    rtmp::{
        RtmpPacket, FOURCC_AV1, FOURCC_HEVC, FOURCC_VP9, PACKET_TYPE_CODED_FRAMES,
        PACKET_TYPE_CODED_FRAMES_X, PACKET_TYPE_SEQUENCE_START, RTMP_CHANNEL_VIDEO,
        RTMP_CHUNK_TYPE_0, RTMP_TYPE_VIDEO, VIDEO_CODEC_AV1, VIDEO_CODEC_HEVC,
    },
    server::{RtmpServerContext, RtmpServerStatus},
};

use super::SessionReadThreadContext;

/// Handles VIDEO RTMP packet
///
/// Enhanced (FourCC) payloads are rewritten in place to the
/// legacy-compatible shape before being latched or relayed.
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `packet` - The packet to handle
///
/// # Return value
///
/// Returns true to continue receiving chunks. Returns false to end the session main loop.
pub async fn handle_rtmp_packet_video(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
) -> bool {
    let config = &server_context.config;

    if !session_context.is_publisher().await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Video packet ignored since the session is not publishing");
        }

        return true;
    }

    let channel = match session_context.channel().await {
        Some(c) => c,
        None => {
            return true;
        }
    };

    if packet.header.length <= 1 || packet.payload.len() <= 1 {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Packet error: Video packet too short");
        }

        return false;
    }

    let mut payload = packet.payload.clone();

    let is_ex_header = (payload[0] & 0x80) != 0;
    let frame_type = ((payload[0] >> 4) & 0x07) as u32;
    let mut codec_id = (payload[0] & 0x0f) as u32;

    if is_ex_header {
        // Enhanced RTMP: the low nibble is the packet type and
        // the next 4 bytes name the codec
        let packet_type = payload[0] & 0x0f;

        if payload.len() < 5 {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Packet error: Enhanced video packet too short");
            }

            return false;
        }

        let fourcc = [payload[1], payload[2], payload[3], payload[4]];

        if fourcc == FOURCC_HEVC {
            codec_id = VIDEO_CODEC_HEVC;

            if packet_type == PACKET_TYPE_SEQUENCE_START {
                payload[0] = 0x1c;
                payload[1..5].fill(0x00);
            } else if packet_type == PACKET_TYPE_CODED_FRAMES
                || packet_type == PACKET_TYPE_CODED_FRAMES_X
            {
                if packet_type == PACKET_TYPE_CODED_FRAMES {
                    payload.drain(0..3);
                } else {
                    payload[2..5].fill(0x00);
                }

                payload[0] = ((frame_type << 4) as u8) | 0x0c;
                payload[1] = 1;
            }
        } else if fourcc == FOURCC_AV1 {
            codec_id = VIDEO_CODEC_AV1;

            if packet_type == PACKET_TYPE_SEQUENCE_START {
                payload[0] = 0x1d;
                payload[1..5].fill(0x00);
            } else if packet_type == PACKET_TYPE_CODED_FRAMES {
                payload[0] = ((frame_type << 4) as u8) | 0x0d;
                payload[1] = 1;
                payload[2..5].fill(0x00);
            }
        } else {
            if config.log_requests && logger.config.debug_enabled {
                if fourcc == FOURCC_VP9 {
                    logger.log_debug("Unsupported extension header: VP9 has no legacy codec id");
                } else {
                    logger.log_debug("Unsupported extension header");
                }
            }

            return true;
        }
    }

    let is_keyframe = frame_type == 1;
    let is_header =
        is_keyframe && matches!(codec_id, 7 | 12 | 13) && payload.len() > 1 && payload[1] == 0;

    // Prepare the packet copy to relay

    let mut copied_packet = RtmpPacket::new_blank();

    copied_packet.header.format = RTMP_CHUNK_TYPE_0;
    copied_packet.header.channel_id = RTMP_CHANNEL_VIDEO;
    copied_packet.header.packet_type = RTMP_TYPE_VIDEO;
    copied_packet.header.timestamp = packet.clock;
    copied_packet.header.length = payload.len();
    copied_packet.payload = payload;

    let copied_packet = Arc::new(copied_packet);

    // Codec bookkeeping

    let mut publish_status_v = session_context.publish_status.lock().await;

    publish_status_v.clock = packet.clock;

    if publish_status_v.video_codec == 0 {
        publish_status_v.video_codec = codec_id;
    }

    if is_header {
        publish_status_v.avc_sequence_header = Arc::new(copied_packet.payload.clone());

        // AVC configuration records carry the profile and level
        // right after the version byte
        if codec_id == 7 && copied_packet.payload.len() >= 9 {
            publish_status_v.video_profile = copied_packet.payload[6] as u32;
            publish_status_v.video_level = copied_packet.payload[8] as u32;
        }

        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Latched video sequence header: codec={}, profile={}, level={}, {} bytes",
                codec_id,
                publish_status_v.video_profile,
                publish_status_v.video_level,
                copied_packet.payload.len()
            ));
        }
    } else {
        if is_keyframe {
            // A new group of pictures starts here
            publish_status_v.clear_gop();
        }

        publish_status_v.push_gop_packet(copied_packet.clone(), config.gop_cache_size);
    }

    drop(publish_status_v);

    // Log

    if config.log_requests && logger.config.trace_enabled {
        logger.log_trace(&format!(
            "VIDEO PACKET: {} bytes, frame_type={}, codec={}",
            copied_packet.payload.len(),
            frame_type,
            codec_id
        ));
    }

    // Relay to the players

    RtmpServerStatus::send_packet_to_players(&server_context.status, &channel, copied_packet).await;

    // Done

    true
}
