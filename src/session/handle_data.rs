// Logic to handle data packets (AMF0 data messages)

use std::sync::Arc;

use crate::{
    log::Logger,
    rtmp::{rtmp_build_metadata, RtmpData, RtmpPacket, RTMP_CHANNEL_DATA, RTMP_CHUNK_TYPE_0,
        RTMP_TYPE_DATA},
    server::{RtmpServerContext, RtmpServerStatus},
};

use super::SessionReadThreadContext;

/// Handles DATA RTMP packet
///
/// A @setDataFrame / onMetaData message is latched and re-broadcast
/// to the players as onMetaData. Any other data message is relayed
/// verbatim.
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
pub async fn handle_rtmp_packet_data(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
) -> bool {
    let config = &server_context.config;

    if !session_context.is_publisher().await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Data packet ignored since the session is not publishing");
        }

        return true;
    }

    let channel = match session_context.channel().await {
        Some(c) => c,
        None => {
            return true;
        }
    };

    if packet.header.length == 0 || packet.header.length > packet.payload.len() {
        if config.log_requests {
            logger.log_error("Packet error: Payload does not match with packet length");
        }

        return false;
    }

    let data = match RtmpData::decode(&packet.payload[..packet.header.length]) {
        Ok(d) => d,
        Err(_) => {
            if config.log_requests {
                logger.log_error("Packet error: Could not decode RTMP data message");
            }

            return false;
        }
    };

    if config.log_requests && logger.config.trace_enabled {
        logger.log_trace(&format!("DATA: {}", data.to_debug_string()));
    }

    let is_metadata = data.tag == "@setDataFrame"
        && data
            .get_argument("method")
            .map(|m| m.get_string() == "onMetaData")
            .unwrap_or(false);

    if !is_metadata {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Unsupported data message: {}", data.tag));
        }

        // Relayed verbatim

        let mut copied_packet = RtmpPacket::new_blank();

        copied_packet.header.format = RTMP_CHUNK_TYPE_0;
        copied_packet.header.channel_id = RTMP_CHANNEL_DATA;
        copied_packet.header.packet_type = RTMP_TYPE_DATA;
        copied_packet.header.timestamp = packet.clock;
        copied_packet.payload = packet.payload[..packet.header.length].to_vec();
        copied_packet.header.length = copied_packet.payload.len();

        RtmpServerStatus::send_packet_to_players(
            &server_context.status,
            &channel,
            Arc::new(copied_packet),
        )
        .await;

        return true;
    }

    // Latch the metadata, without the @setDataFrame wrapper

    let metadata = Arc::new(rtmp_build_metadata(&data));

    let mut publish_status_v = session_context.publish_status.lock().await;

    publish_status_v.metadata = metadata.clone();

    // Stream properties are read defensively, encoders
    // do not agree on which ones are present

    if let Some(data_obj) = data.get_argument("dataObj") {
        if let Some(v) = data_obj.get_object_property("audiosamplerate") {
            publish_status_v.audio_sample_rate = v.get_integer() as u32;
        }

        if let Some(v) = data_obj.get_object_property("stereo") {
            publish_status_v.audio_channels = if v.get_bool() { 2 } else { 1 };
        }

        if let Some(v) = data_obj.get_object_property("width") {
            publish_status_v.video_width = v.get_integer() as u32;
        }

        if let Some(v) = data_obj.get_object_property("height") {
            publish_status_v.video_height = v.get_integer() as u32;
        }

        if let Some(v) = data_obj.get_object_property("framerate") {
            publish_status_v.video_fps = v.get_integer() as u32;
        }

        if let Some(v) = data_obj.get_object_property("videodatarate") {
            publish_status_v.bitrate = v.get_integer() as u32;
        }

        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Stream metadata: {}x{} @{}fps, {}kbps, audio {}Hz x{}",
                publish_status_v.video_width,
                publish_status_v.video_height,
                publish_status_v.video_fps,
                publish_status_v.bitrate,
                publish_status_v.audio_sample_rate,
                publish_status_v.audio_channels
            ));
        }
    }

    drop(publish_status_v);

    // Broadcast the updated metadata

    RtmpServerStatus::send_metadata_to_players(&server_context.status, &channel, metadata).await;

    // Done

    true
}
