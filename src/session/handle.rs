// Logic to handle RTMP sessions

use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
    time::timeout,
};

use crate::{
    log::Logger,
    rtmp::{generate_s0_s1_s2, RTMP_HANDSHAKE_TIMEOUT_SECONDS, RTMP_SIG_SIZE, RTMP_VERSION},
    server::RtmpServerContext,
};

use super::{
    do_session_cleanup, read_rtmp_chunk, session_write_bytes,
    spawn_task_to_read_session_messages, RtmpSessionMessage, RtmpSessionReadStatus,
    SessionContext, SessionReadThreadContext,
};

/// Handles RTMP session
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `server_context` - The server context
/// * `session_context` - The session context
/// * `read_stream` - IO stream to read bytes
/// * `write_stream` - IO stream to write bytes
pub async fn handle_rtmp_session<
    TR: AsyncRead + AsyncReadExt + Send + Sync + Unpin,
    TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin + 'static,
>(
    logger: Arc<Logger>,
    server_context: RtmpServerContext,
    session_context: SessionContext,
    mut read_stream: TR,
    write_stream: Arc<Mutex<TW>>,
) {
    let config = &server_context.config;

    // Handshake, bounded by a global deadline

    let handshake_result = timeout(
        Duration::from_secs(RTMP_HANDSHAKE_TIMEOUT_SECONDS),
        session_handshake(&logger, &server_context, &mut read_stream, &write_stream),
    )
    .await;

    match handshake_result {
        Ok(Ok(())) => {}
        Ok(Err(())) => {
            return;
        }
        Err(_) => {
            if config.log_requests {
                logger.log_error("Handshake error: Timed out");
            }
            return;
        }
    }

    if config.log_requests && logger.config.debug_enabled {
        logger.log_debug("Handshake done");
    }

    // Spawn the writer task

    let (session_msg_sender, session_msg_receiver) =
        tokio::sync::mpsc::channel::<RtmpSessionMessage>(config.msg_buffer_size.max(1));

    spawn_task_to_read_session_messages(
        logger.clone(),
        write_stream.clone(),
        server_context.config.clone(),
        session_context.status.clone(),
        session_msg_receiver,
    );

    // Read chunks until the session ends

    let mut read_context = SessionReadThreadContext {
        id: session_context.id,
        ip: session_context.ip,
        status: session_context.status.clone(),
        publish_status: session_context.publish_status.clone(),
        session_msg_sender: session_msg_sender.clone(),
        read_status: RtmpSessionReadStatus::new(),
    };

    while read_rtmp_chunk(
        &logger,
        &server_context,
        &mut read_context,
        &mut read_stream,
        &write_stream,
    )
    .await
    {}

    // Teardown

    do_session_cleanup(&server_context, &session_context).await;

    _ = session_msg_sender.send(RtmpSessionMessage::End).await;

    if config.log_requests {
        logger.log_info("Connection closed");
    }
}

/// Performs the server side of the RTMP handshake
async fn session_handshake<
    TR: AsyncRead + AsyncReadExt + Send + Sync + Unpin,
    TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin,
>(
    logger: &Logger,
    server_context: &RtmpServerContext,
    read_stream: &mut TR,
    write_stream: &Mutex<TW>,
) -> Result<(), ()> {
    let config = &server_context.config;

    // C0

    let version = match read_stream.read_u8().await {
        Ok(v) => v,
        Err(e) => {
            if config.log_requests && logger.config.debug_enabled {
                logger.log_debug(&format!("Handshake error: Could not read C0: {}", e));
            }
            return Err(());
        }
    };

    // 0x06 is the encrypted handshake marker, it is
    // treated like the plain one for framing purposes
    if version != RTMP_VERSION && version != 0x06 {
        if config.log_requests {
            logger.log_error(&format!(
                "Handshake error: Invalid protocol version: {}",
                version
            ));
        }
        return Err(());
    }

    // C1

    let mut c1: Vec<u8> = vec![0; RTMP_SIG_SIZE];

    if let Err(e) = read_stream.read_exact(&mut c1).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Handshake error: Could not read C1: {}", e));
        }
        return Err(());
    }

    // S0 + S1 + S2

    let response = generate_s0_s1_s2(&c1, logger)?;

    if let Err(e) = session_write_bytes(write_stream, &response).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Handshake error: Could not write response: {}", e));
        }
        return Err(());
    }

    // C2 (not validated)

    let mut c2: Vec<u8> = vec![0; RTMP_SIG_SIZE];

    if let Err(e) = read_stream.read_exact(&mut c2).await {
        if config.log_requests && logger.config.debug_enabled {
            logger.log_debug(&format!("Handshake error: Could not read C2: {}", e));
        }
        return Err(());
    }

    Ok(())
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use byteorder::{BigEndian, ByteOrder};
    use tokio::io::{duplex, split, ReadHalf, WriteHalf};

    use crate::{
        amf::AMF0Value,
        log::{LogConfig, Logger},
        rtmp::{
            rtmp_make_chunk_size_set_message, rtmp_make_invoke_message,
            rtmp_make_peer_bandwidth_set_message, rtmp_make_window_ack, RtmpCommand,
            RTMP_PEER_BANDWIDTH, RTMP_TYPE_INVOKE, RTMP_WINDOW_ACK,
        },
        server::{RtmpServerConfiguration, RtmpServerContext, RtmpServerStatus},
        session::{RtmpSessionPublishStreamStatus, RtmpSessionStatus},
        utils::IpRangeConfig,
    };

    fn test_logger() -> Arc<Logger> {
        Arc::new(Logger::new(LogConfig {
            prefix: "".to_string(),
            error_enabled: false,
            warning_enabled: false,
            info_enabled: false,
            debug_enabled: false,
            trace_enabled: false,
        }))
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

    /// Spawns a session over an in-memory duplex pipe
    /// Returns the client side of the pipe and the server context
    fn spawn_test_session(
        session_id: u64,
    ) -> (
        ReadHalf<tokio::io::DuplexStream>,
        WriteHalf<tokio::io::DuplexStream>,
        RtmpServerContext,
    ) {
        let (client, server) = duplex(256 * 1024);

        let (client_read, client_write) = split(client);
        let (server_read, server_write) = split(server);

        let server_context = RtmpServerContext {
            config: test_config(),
            status: Arc::new(Mutex::new(RtmpServerStatus::new())),
        };

        let session_context = SessionContext {
            id: session_id,
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            status: Arc::new(Mutex::new(RtmpSessionStatus::new())),
            publish_status: Arc::new(Mutex::new(RtmpSessionPublishStreamStatus::new())),
        };

        tokio::spawn(handle_rtmp_session(
            test_logger(),
            server_context.clone(),
            session_context,
            server_read,
            Arc::new(Mutex::new(server_write)),
        ));

        (client_read, client_write, server_context)
    }

    /// Performs the simple handshake from the client side
    async fn client_handshake(
        client_read: &mut ReadHalf<tokio::io::DuplexStream>,
        client_write: &mut WriteHalf<tokio::io::DuplexStream>,
    ) {
        client_write.write_all(&[0x03]).await.unwrap();
        client_write.write_all(&[0_u8; RTMP_SIG_SIZE]).await.unwrap();

        let mut response = vec![0_u8; 1 + 2 * RTMP_SIG_SIZE];
        client_read.read_exact(&mut response).await.unwrap();

        assert_eq!(response[0], RTMP_VERSION);
        assert_eq!(&response[1..1 + RTMP_SIG_SIZE], &[0_u8; RTMP_SIG_SIZE]);

        client_write.write_all(&[0_u8; RTMP_SIG_SIZE]).await.unwrap();
    }

    /// Reads one fmt-0, single chunk message from the client side
    /// Returns the channel id, the packet type and the payload
    async fn read_single_chunk_message(
        client_read: &mut ReadHalf<tokio::io::DuplexStream>,
    ) -> (u32, u32, Vec<u8>) {
        let mut header = vec![0_u8; 12];
        client_read.read_exact(&mut header).await.unwrap();

        assert_eq!(header[0] >> 6, 0, "expected a fmt 0 chunk");

        let channel_id = (header[0] & 0x3f) as u32;
        let length = BigEndian::read_u24(&header[4..7]) as usize;
        let packet_type = header[7] as u32;

        let mut payload = vec![0_u8; length];
        client_read.read_exact(&mut payload).await.unwrap();

        (channel_id, packet_type, payload)
    }

    #[tokio::test]
    async fn test_session_connect_and_create_stream() {
        let (mut client_read, mut client_write, _server_context) = spawn_test_session(1);

        client_handshake(&mut client_read, &mut client_write).await;

        // connect

        let mut connect_cmd = RtmpCommand::new("connect".to_string());
        connect_cmd.set_argument("transId", AMF0Value::Number { value: 1.0 });
        connect_cmd.set_argument(
            "cmdObj",
            AMF0Value::Object {
                properties: vec![(
                    "app".to_string(),
                    AMF0Value::String {
                        value: "live".to_string(),
                    },
                )],
            },
        );

        client_write
            .write_all(&rtmp_make_invoke_message(&connect_cmd, 0, 128))
            .await
            .unwrap();

        // The server replies with the window ack size, the output
        // chunk size and the peer bandwidth, as raw control messages

        let mut control = vec![0_u8; 16];
        client_read.read_exact(&mut control).await.unwrap();
        assert_eq!(control, rtmp_make_window_ack(RTMP_WINDOW_ACK));

        client_read.read_exact(&mut control).await.unwrap();
        assert_eq!(control, rtmp_make_chunk_size_set_message(4096));

        let mut peer_bw = vec![0_u8; 17];
        client_read.read_exact(&mut peer_bw).await.unwrap();
        assert_eq!(
            peer_bw,
            rtmp_make_peer_bandwidth_set_message(RTMP_PEER_BANDWIDTH, 2)
        );

        // Then the connect result

        let (_, packet_type, payload) = read_single_chunk_message(&mut client_read).await;

        assert_eq!(packet_type, RTMP_TYPE_INVOKE);

        let result = RtmpCommand::decode(&payload).unwrap();

        assert_eq!(result.cmd, "_result");
        assert_eq!(result.get_argument("transId").unwrap().get_integer(), 1);

        let info = result.get_argument("info").unwrap();

        assert_eq!(
            info.get_object_property("code").unwrap().get_string(),
            "NetConnection.Connect.Success"
        );

        // createStream

        let mut create_stream_cmd = RtmpCommand::new("createStream".to_string());
        create_stream_cmd.set_argument("transId", AMF0Value::Number { value: 4.0 });
        create_stream_cmd.set_argument("cmdObj", AMF0Value::Null);

        client_write
            .write_all(&rtmp_make_invoke_message(&create_stream_cmd, 0, 128))
            .await
            .unwrap();

        let (_, packet_type, payload) = read_single_chunk_message(&mut client_read).await;

        assert_eq!(packet_type, RTMP_TYPE_INVOKE);

        let result = RtmpCommand::decode(&payload).unwrap();

        assert_eq!(result.cmd, "_result");
        assert_eq!(result.get_argument("transId").unwrap().get_integer(), 4);
        assert_eq!(result.get_argument("info").unwrap().get_integer(), 1);
    }

    #[tokio::test]
    async fn test_session_publish() {
        let (mut client_read, mut client_write, server_context) = spawn_test_session(7);

        client_handshake(&mut client_read, &mut client_write).await;

        // connect + createStream

        let mut connect_cmd = RtmpCommand::new("connect".to_string());
        connect_cmd.set_argument("transId", AMF0Value::Number { value: 1.0 });
        connect_cmd.set_argument(
            "cmdObj",
            AMF0Value::Object {
                properties: vec![(
                    "app".to_string(),
                    AMF0Value::String {
                        value: "live".to_string(),
                    },
                )],
            },
        );

        client_write
            .write_all(&rtmp_make_invoke_message(&connect_cmd, 0, 128))
            .await
            .unwrap();

        let mut control = vec![0_u8; 16 + 16 + 17];
        client_read.read_exact(&mut control).await.unwrap();

        let _ = read_single_chunk_message(&mut client_read).await; // connect result

        let mut create_stream_cmd = RtmpCommand::new("createStream".to_string());
        create_stream_cmd.set_argument("transId", AMF0Value::Number { value: 2.0 });
        create_stream_cmd.set_argument("cmdObj", AMF0Value::Null);

        client_write
            .write_all(&rtmp_make_invoke_message(&create_stream_cmd, 0, 128))
            .await
            .unwrap();

        let _ = read_single_chunk_message(&mut client_read).await; // createStream result

        // publish on stream id 1

        let mut publish_cmd = RtmpCommand::new("publish".to_string());
        publish_cmd.set_argument("transId", AMF0Value::Number { value: 3.0 });
        publish_cmd.set_argument("cmdObj", AMF0Value::Null);
        publish_cmd.set_argument(
            "streamName",
            AMF0Value::String {
                value: "mykey".to_string(),
            },
        );
        publish_cmd.set_argument(
            "type",
            AMF0Value::String {
                value: "live".to_string(),
            },
        );

        client_write
            .write_all(&rtmp_make_invoke_message(&publish_cmd, 1, 128))
            .await
            .unwrap();

        let (_, packet_type, payload) = read_single_chunk_message(&mut client_read).await;

        assert_eq!(packet_type, RTMP_TYPE_INVOKE);

        let status = RtmpCommand::decode(&payload).unwrap();

        assert_eq!(status.cmd, "onStatus");

        let info = status.get_argument("info").unwrap();

        assert_eq!(
            info.get_object_property("level").unwrap().get_string(),
            "status"
        );
        assert_eq!(
            info.get_object_property("code").unwrap().get_string(),
            "NetStream.Publish.Start"
        );
        assert_eq!(
            info.get_object_property("description")
                .unwrap()
                .get_string(),
            "mykey is now published."
        );

        // The registry now holds the publisher

        let status_v = server_context.status.lock().await;
        let channel = status_v.channels.get("live").expect("channel not found");

        assert!(channel.publishing);
        assert_eq!(channel.publisher_id, Some(7));
        assert_eq!(channel.stream_path.as_deref(), Some("mykey"));
        assert_eq!(channel.publish_stream_id, 1);
    }
}
