// Logic to handle audio packets

use std::sync::Arc;

use crate::{
    log::Logger,
    rtmp::{RtmpPacket, RTMP_CHANNEL_AUDIO, RTMP_CHUNK_TYPE_0, RTMP_TYPE_AUDIO},
    server::{RtmpServerContext, RtmpServerStatus},
};

use super::SessionReadThreadContext;

// Sample rates indexed by the 2 rate bits of the audio tag
const AUDIO_SOUND_RATES: [u32; 4] = [5512, 11025, 22050, 44100];

/// Handles AUDIO RTMP packet
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
pub async fn handle_rtmp_packet_audio(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
) -> bool {
    let config = &server_context.config;

    if !session_context.is_publisher().await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Audio packet ignored since the session is not publishing");
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
            logger.log_debug("Packet error: Audio packet too short");
        }

        return false;
    }

    let sound_format = (packet.payload[0] >> 4) as u32;

    let is_header = (sound_format == 10 || sound_format == 13) && packet.payload[1] == 0;

    // Prepare the packet copy to relay

    let mut copied_packet = RtmpPacket::new_blank();

    copied_packet.header.format = RTMP_CHUNK_TYPE_0;
    copied_packet.header.channel_id = RTMP_CHANNEL_AUDIO;
    copied_packet.header.packet_type = RTMP_TYPE_AUDIO;
    copied_packet.header.timestamp = packet.clock;
    copied_packet.payload = packet.payload.clone();
    copied_packet.header.length = copied_packet.payload.len();

    let copied_packet = Arc::new(copied_packet);

    // Codec bookkeeping

    let mut publish_status_v = session_context.publish_status.lock().await;

    publish_status_v.clock = packet.clock;

    if publish_status_v.audio_codec == 0 {
        publish_status_v.audio_codec = sound_format;

        let sound_rate_index = ((packet.payload[0] >> 2) & 0x03) as usize;

        publish_status_v.audio_sample_rate = match sound_format {
            4 | 11 => 16000,
            5 | 7 | 8 | 14 => 8000,
            _ => AUDIO_SOUND_RATES[sound_rate_index],
        };

        publish_status_v.audio_channels = ((packet.payload[0] & 0x01) as u32) + 1;

        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Audio stream: codec={}, sample_rate={}, channels={}",
                sound_format, publish_status_v.audio_sample_rate, publish_status_v.audio_channels
            ));
        }
    }

    if is_header {
        publish_status_v.aac_sequence_header = Arc::new(packet.payload.clone());

        if sound_format == 13 {
            publish_status_v.audio_sample_rate = 48000;
        }

        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Latched audio sequence header: {} bytes",
                packet.payload.len()
            ));
        }
    } else {
        publish_status_v.push_gop_packet(copied_packet.clone(), config.gop_cache_size);
    }

    drop(publish_status_v);

    // Log

    if config.log_requests && logger.config.trace_enabled {
        logger.log_trace(&format!("AUDIO PACKET: {} bytes", packet.payload.len()));
    }

    // Relay to the players

    RtmpServerStatus::send_packet_to_players(&server_context.status, &channel, copied_packet).await;

    // Done

    true
}
