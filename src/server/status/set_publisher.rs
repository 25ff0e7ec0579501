// Registry operation: set a publisher for a channel

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::session::RtmpSessionPublishStreamStatus;

use super::{RtmpChannelStatus, RtmpServerStatus};

impl RtmpServerStatus {
    /// Sets a publisher for a channel
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `key` - Stream key
    /// * `publisher_id` - ID of the publisher session
    /// * `publish_stream_id` - ID of the RTMP stream used to publish
    /// * `publish_status` - Status of the published stream
    ///
    /// # Return value
    ///
    /// Returns true if success, false if the channel already has a publisher
    pub async fn set_publisher(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
        key: &str,
        publisher_id: u64,
        publish_stream_id: u32,
        publish_status: Arc<Mutex<RtmpSessionPublishStreamStatus>>,
    ) -> bool {
        let mut status_v = status.lock().await;

        let c = status_v
            .channels
            .entry(channel.to_string())
            .or_insert_with(RtmpChannelStatus::new);

        if c.publishing {
            return false;
        }

        c.publishing = true;
        c.publisher_id = Some(publisher_id);
        c.stream_path = Some(key.to_string());
        c.publish_stream_id = publish_stream_id;
        c.publish_status = Some(publish_status);

        true
    }
}
