// Invoke packet handling logic

use chrono::Utc;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    log::Logger,
    rtmp::{
        rtmp_make_chunk_size_set_message, rtmp_make_connect_response,
        rtmp_make_create_stream_response, rtmp_make_peer_bandwidth_set_message,
        rtmp_make_window_ack, RtmpCommand, RtmpPacket, RTMP_PEER_BANDWIDTH,
        RTMP_TYPE_FLEX_MESSAGE, RTMP_WINDOW_ACK,
    },
    server::{RtmpServerContext, RtmpServerStatus},
    utils::{strip_query_string, validate_id_string},
};

use super::{
    send_status_message, session_write_bytes, RtmpSessionStatus, SessionReadThreadContext,
};

/// Handles RTMP packet (INVOKE)
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
pub async fn handle_rtmp_packet_invoke<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    // FLEX messages carry one prefix byte before the AMF0 payload

    let offset: usize = if packet.header.packet_type == RTMP_TYPE_FLEX_MESSAGE {
        1
    } else {
        0
    };

    if packet.header.length <= offset {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Packet error: Packet length too short");
        }

        return false;
    }

    if packet.header.length > packet.payload.len() {
        if config.log_requests {
            logger.log_error("Packet error: Payload does not match with packet length");
        }

        return false;
    }

    let cmd = match RtmpCommand::decode(&packet.payload[offset..packet.header.length]) {
        Ok(c) => c,
        Err(_) => {
            if config.log_requests {
                logger.log_error("Packet error: Could not decode RTMP command");
            }

            return false;
        }
    };

    if config.log_requests && logger.config.trace_enabled {
        logger.log_trace(&format!("COMMAND: {}", cmd.to_debug_string()));
    }

    match cmd.cmd.as_str() {
        "connect" => {
            handle_rtmp_command_connect(logger, server_context, session_context, &cmd, write_stream)
                .await
        }
        "createStream" => {
            handle_rtmp_command_create_stream(
                logger,
                server_context,
                session_context,
                &cmd,
                write_stream,
            )
            .await
        }
        "publish" => {
            handle_rtmp_command_publish(
                logger,
                server_context,
                session_context,
                packet,
                &cmd,
                write_stream,
            )
            .await
        }
        "play" => {
            handle_rtmp_command_play(logger, server_context, session_context, packet, &cmd).await
        }
        "releaseStream" | "FCPublish" | "FCUnpublish" | "getStreamLength" => {
            // Accepted silently
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Accepted command: {}", cmd.cmd));
            }

            true
        }
        _ => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Unrecognized command: {}", cmd.cmd));
            }

            true
        }
    }
}

/// Handles RTMP command (connect)
///
/// Records the connection parameters and replies with the
/// window acknowledgement size, the output chunk size, the
/// peer bandwidth and the connect result.
async fn handle_rtmp_command_connect<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    cmd: &RtmpCommand,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    // Load and validate parameters

    let cmd_obj = match cmd.get_argument("cmdObj") {
        Some(o) => o,
        None => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Command error: cmdObj argument not provided");
            }

            return false;
        }
    };

    let channel = match cmd_obj.get_object_property("app") {
        Some(app) => {
            let app_str = app.get_string();

            if !validate_id_string(app_str, config.id_max_length) {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Command error: Invalid app value: {}", app_str));
                }

                return false;
            }

            app_str.to_string()
        }
        None => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Command error: app property not provided");
            }

            return false;
        }
    };

    let object_encoding: Option<u32> = match cmd_obj.get_object_property("objectEncoding") {
        Some(oe) => {
            if !oe.is_undefined() {
                Some(oe.get_integer() as u32)
            } else {
                None
            }
        }
        None => None,
    };

    let trans_id = match cmd.get_argument("transId") {
        Some(t) => t.get_integer(),
        None => 0,
    };

    let now = Utc::now().timestamp_millis();

    // Update the session status

    let mut session_status_v = session_context.status.lock().await;

    if session_status_v.channel.is_some() {
        // Already connected. This command is invalid
        drop(session_status_v);
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Protocol error: Connect received, but already connected");
        }

        return false;
    }

    session_status_v.channel = Some(channel.clone());
    session_status_v.connect_time = now;
    session_status_v.object_encoding = object_encoding;

    if let Some(tc_url) = cmd_obj.get_object_property("tcUrl") {
        session_status_v.tc_url = tc_url.get_string().to_string();
    }

    if let Some(swf_url) = cmd_obj.get_object_property("swfUrl") {
        session_status_v.swf_url = swf_url.get_string().to_string();
    }

    if let Some(flash_ver) = cmd_obj.get_object_property("flashVer") {
        session_status_v.flash_ver = flash_ver.get_string().to_string();
    }

    if config.log_requests && logger.config.debug_enabled {
        logger.log_debug(&format!(
            "CONNECT: app={}, tcUrl={}, swfUrl={}, flashVer={}",
            channel, session_status_v.tc_url, session_status_v.swf_url, session_status_v.flash_ver
        ));
    }

    drop(session_status_v);

    // Send window ACK

    let window_ack_bytes = rtmp_make_window_ack(RTMP_WINDOW_ACK);
    if let Err(e) = session_write_bytes(write_stream, &window_ack_bytes).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Send error: Could not send window ACK: {}", e));
        }
        return false;
    }

    // Set chunk size

    let chunk_size_bytes = rtmp_make_chunk_size_set_message(config.chunk_size as u32);
    if let Err(e) = session_write_bytes(write_stream, &chunk_size_bytes).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Send error: Could not set chunk size: {}", e));
        }
        return false;
    }

    // Set peer bandwidth

    let peer_bandwidth_bytes = rtmp_make_peer_bandwidth_set_message(RTMP_PEER_BANDWIDTH, 2);
    if let Err(e) = session_write_bytes(write_stream, &peer_bandwidth_bytes).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Send error: Could not set peer bandwidth: {}", e));
        }
        return false;
    }

    // Respond

    let connect_response_bytes =
        rtmp_make_connect_response(trans_id, object_encoding, config.chunk_size);
    if let Err(e) = session_write_bytes(write_stream, &connect_response_bytes).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Send error: Could not send connect response: {}", e));
        }
        return false;
    }

    // Done

    true
}

/// Handles RTMP command (createStream)
async fn handle_rtmp_command_create_stream<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    cmd: &RtmpCommand,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    let trans_id = match cmd.get_argument("transId") {
        Some(t) => t.get_integer(),
        None => 0,
    };

    // Create stream

    let mut session_status_v = session_context.status.lock().await;
    session_status_v.streams = session_status_v.streams.wrapping_add(1);
    let stream_index = session_status_v.streams as u32;
    drop(session_status_v);

    // Respond

    let response_bytes =
        rtmp_make_create_stream_response(trans_id, stream_index, config.chunk_size);
    if let Err(e) = session_write_bytes(write_stream, &response_bytes).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Send error: Could not send createStream response: {}",
                e
            ));
        }
        return false;
    }

    // Done

    true
}

/// Handles RTMP command (publish)
async fn handle_rtmp_command_publish<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
    cmd: &RtmpCommand,
    write_stream: &Mutex<TW>,
) -> bool {
    let config = &server_context.config;

    let publish_stream_id = packet.header.stream_id;

    let channel = match session_context.channel().await {
        Some(c) => c,
        None => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Protocol error: Received publish before connect");
            }

            if let Err(e) = send_status_message(
                write_stream,
                publish_stream_id,
                "error",
                "NetStream.Publish.BadConnection",
                Some("No application is selected"),
                config.chunk_size,
            )
            .await
            {
                if config.log_requests && logger.config.debug_enabled {
                    logger.log_debug(&format!("Send error: Could not send status message: {}", e));
                }
            }

            return false;
        }
    };

    // Only the "live" publish mode is honored, the mode
    // argument is not inspected

    let key = match cmd.get_argument("streamName") {
        Some(k) => strip_query_string(k.get_string()),
        None => "",
    };

    if key.is_empty() {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Command error: Empty stream key provided");
        }

        if let Err(e) = send_status_message(
            write_stream,
            publish_stream_id,
            "error",
            "NetStream.publish.Unauthorized",
            Some("Authorization required."),
            config.chunk_size,
        )
        .await
        {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Send error: Could not send status message: {}", e));
            }
        }

        return false;
    }

    if !validate_id_string(key, config.id_max_length) {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Command error: Invalid streamName value: {}", key));
        }

        if let Err(e) = send_status_message(
            write_stream,
            publish_stream_id,
            "error",
            "NetStream.Publish.BadName",
            Some("Invalid stream key provided"),
            config.chunk_size,
        )
        .await
        {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Send error: Could not send status message: {}", e));
            }
        }

        return false;
    }

    // Ensure the session is not already publishing

    if session_context.is_publisher().await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Protocol error: Received publish command, but already publishing");
        }

        if let Err(e) = send_status_message(
            write_stream,
            publish_stream_id,
            "error",
            "NetStream.Publish.BadConnection",
            Some("Connection already publishing"),
            config.chunk_size,
        )
        .await
        {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Send error: Could not send status message: {}", e));
            }
        }

        return false;
    }

    // Try to register as the publisher of the channel

    if !RtmpServerStatus::set_publisher(
        &server_context.status,
        &channel,
        key,
        session_context.id,
        publish_stream_id,
        session_context.publish_status.clone(),
    )
    .await
    {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Cannot publish: Another session is already publishing");
        }

        if let Err(e) = send_status_message(
            write_stream,
            publish_stream_id,
            "error",
            "NetStream.Publish.BadName",
            Some("Stream already publishing"),
            config.chunk_size,
        )
        .await
        {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Send error: Could not send status message: {}", e));
            }
        }

        return false;
    }

    // Update the session status

    session_context.set_publisher(key, publish_stream_id).await;

    // Log

    if config.log_requests {
        logger.log_info(&format!("PUBLISH ({}): /{}/{}", publish_stream_id, channel, key));
    }

    // Respond with status message

    if let Err(e) = send_status_message(
        write_stream,
        publish_stream_id,
        "status",
        "NetStream.Publish.Start",
        Some(&format!("{} is now published.", key)),
        config.chunk_size,
    )
    .await
    {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Send error: Could not send status message: {}", e));
        }
    }

    // Done

    true
}

/// Handles RTMP command (play)
async fn handle_rtmp_command_play(
    logger: &Logger,
    server_context: &RtmpServerContext,
    session_context: &mut SessionReadThreadContext,
    packet: &RtmpPacket,
    cmd: &RtmpCommand,
) -> bool {
    let config = &server_context.config;

    let play_stream_id = packet.header.stream_id;

    let channel = match session_context.channel().await {
        Some(c) => c,
        None => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug("Protocol error: Received play before connect");
            }

            return false;
        }
    };

    let stream_name = match cmd.get_argument("streamName") {
        Some(n) => strip_query_string(n.get_string()).to_string(),
        None => "".to_string(),
    };

    // A play request without an active publisher ends the session

    if !RtmpServerStatus::check_channel_publishing_status(&server_context.status, &channel).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!(
                "Cannot play: No active publisher for application: {}",
                channel
            ));
        }

        return false;
    }

    // Mark the session as a player before attaching, so the
    // writer task accepts the PlayStart message

    session_context.set_player(play_stream_id).await;

    if !RtmpServerStatus::add_player(
        &server_context.status,
        &channel,
        session_context.id,
        session_context.session_msg_sender.clone(),
    )
    .await
    {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug("Cannot play: The publisher went away");
        }

        RtmpSessionStatus::stop_playing(&session_context.status).await;

        return false;
    }

    // Log

    if config.log_requests {
        logger.log_info(&format!(
            "PLAY ({}): /{}/{}",
            play_stream_id, channel, stream_name
        ));
    }

    // Done

    true
}
