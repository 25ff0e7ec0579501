// Context types to group parameters

use std::{net::IpAddr, sync::Arc};

use tokio::sync::{mpsc::Sender, Mutex};

use super::{
    RtmpSessionMessage, RtmpSessionPublishStreamStatus, RtmpSessionReadStatus, RtmpSessionStatus,
};

/// Session context
#[derive(Clone)]
pub struct SessionContext {
    /// Session ID
    pub id: u64,

    /// Client IP address
    pub ip: IpAddr,

    /// Session status
    pub status: Arc<Mutex<RtmpSessionStatus>>,

    /// Publishing status
    pub publish_status: Arc<Mutex<RtmpSessionPublishStreamStatus>>,
}

/// Context owned by the session read task
pub struct SessionReadThreadContext {
    /// Session ID
    pub id: u64,

    /// Client IP address
    pub ip: IpAddr,

    /// Session status
    pub status: Arc<Mutex<RtmpSessionStatus>>,

    /// Publishing status
    pub publish_status: Arc<Mutex<RtmpSessionPublishStreamStatus>>,

    /// Sender for session messages
    pub session_msg_sender: Sender<RtmpSessionMessage>,

    /// Read status
    pub read_status: RtmpSessionReadStatus,
}

impl SessionReadThreadContext {
    /// Gets the current channel of the session
    pub async fn channel(&self) -> Option<String> {
        let status = self.status.lock().await;
        status.channel.clone()
    }

    /// Checks if the session is a publisher
    pub async fn is_publisher(&self) -> bool {
        let status = self.status.lock().await;

        status.is_publisher
    }

    /// Updates session status for publishing
    ///
    /// # Arguments
    ///
    /// * `key` - Stream key used to publish
    /// * `publish_stream_id` - ID of the RTMP stream used for publishing
    pub async fn set_publisher(&self, key: &str, publish_stream_id: u32) {
        let mut status = self.status.lock().await;

        status.is_publisher = true;
        status.stream_path = Some(key.to_string());
        status.publish_stream_id = publish_stream_id;
    }

    /// Updates session status for playing
    ///
    /// # Arguments
    ///
    /// * `play_stream_id` - ID of the RTMP stream used for playing
    pub async fn set_player(&self, play_stream_id: u32) {
        let mut status = self.status.lock().await;

        status.is_player = true;
        status.play_stream_id = play_stream_id;
    }
}
