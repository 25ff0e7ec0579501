// TCP server

use std::{net::IpAddr, sync::Arc};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::{mpsc::Sender, Mutex},
};

use crate::log::Logger;

use super::{handle_connection, RtmpServerContextExtended};

/// Runs the TCP server
pub fn tcp_server(
    logger: Arc<Logger>,
    server_context: RtmpServerContextExtended,
    end_notifier: Sender<()>,
) {
    tokio::spawn(async move {
        let listen_addr = server_context.config.get_tcp_listen_addr();

        // Create listener
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(l) => l,
            Err(e) => {
                logger.log_error(&format!("Could not create TCP listener: {}", e));
                end_notifier
                    .send(())
                    .await
                    .expect("failed to notify to main thread");
                return;
            }
        };

        logger.log_info(&format!("Listening on {}", listen_addr));

        loop {
            match listener.accept().await {
                Ok((connection, addr)) => {
                    // Handle connection
                    handle_connection_tcp(
                        connection,
                        addr.ip(),
                        server_context.clone(),
                        logger.clone(),
                    );
                }
                Err(e) => {
                    logger.log_error(&format!("Could not accept connection: {}", e));
                    end_notifier
                        .send(())
                        .await
                        .expect("failed to notify to main thread");
                    return;
                }
            }
        }
    });
}

fn handle_connection_tcp(
    mut connection: TcpStream,
    ip: IpAddr,
    server_context: RtmpServerContextExtended,
    logger: Arc<Logger>,
) {
    tokio::spawn(async move {
        let is_exempted = server_context
            .config
            .max_concurrent_connections_whitelist
            .contains_ip(&ip);
        let mut should_accept = true;

        if !is_exempted {
            let mut ip_counter_v = server_context.ip_counter.lock().await;
            should_accept = ip_counter_v.add(&ip);
            drop(ip_counter_v);
        }

        if should_accept {
            let (read_stream, write_stream) = tokio::io::split(connection);

            let write_stream_mu = Arc::new(Mutex::new(write_stream));

            // Handle connection
            handle_connection(
                logger.clone(),
                server_context.clone(),
                read_stream,
                write_stream_mu.clone(),
                ip,
            )
            .await;

            // Ensure connection is closed
            let mut write_stream_v = write_stream_mu.lock().await;
            let _ = write_stream_v.shutdown().await;
            drop(write_stream_v);

            // After connection is closed, remove from ip counter
            if !is_exempted {
                let mut ip_counter_v = server_context.ip_counter.lock().await;
                ip_counter_v.remove(&ip);
                drop(ip_counter_v);
            }
        } else {
            if server_context.config.log_requests {
                logger.log_info(&format!(
                    "Rejected request from {} due to connection limit",
                    ip
                ));
            }
            let _ = connection.shutdown().await;
        }
    });
}
