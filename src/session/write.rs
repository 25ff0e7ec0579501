// Session write helpers

use std::io::Error;

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::rtmp::rtmp_make_status_message;

/// Writes bytes to the session write stream
pub async fn session_write_bytes<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    write_stream: &Mutex<TW>,
    bytes: &[u8],
) -> Result<(), Error> {
    let mut write_stream_v = write_stream.lock().await;
    write_stream_v.write_all(bytes).await?;
    write_stream_v.flush().await
}

/// Sends an onStatus message to the client
///
/// # Arguments
///
/// * `write_stream` - IO stream to write bytes
/// * `stream_id` - ID of the RTMP stream the status refers to
/// * `level` - Status level ("status" or "error")
/// * `code` - Status code
/// * `description` - Optional human readable description
/// * `out_chunk_size` - Size of the output chunks
pub async fn send_status_message<TW: AsyncWrite + AsyncWriteExt + Send + Sync + Unpin>(
    write_stream: &Mutex<TW>,
    stream_id: u32,
    level: &str,
    code: &str,
    description: Option<&str>,
    out_chunk_size: usize,
) -> Result<(), Error> {
    let status_bytes =
        rtmp_make_status_message(stream_id, level, code, description, out_chunk_size);

    session_write_bytes(write_stream, &status_bytes).await
}
