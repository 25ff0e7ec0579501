// Registry operation: remove the publisher of a channel

use tokio::sync::Mutex;

use crate::session::RtmpSessionMessage;

use super::RtmpServerStatus;

impl RtmpServerStatus {
    /// Removes the publisher of a channel
    ///
    /// Every attached player is notified with a PlayStop and detached
    /// before the publisher record is cleared. Players are not
    /// disconnected, they simply receive no further data.
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `publisher_id` - ID of the publisher session
    pub async fn remove_publisher(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
        publisher_id: u64,
    ) {
        let mut status_v = status.lock().await;

        let c = match status_v.channels.get_mut(channel) {
            Some(c) => c,
            None => {
                return;
            }
        };

        if c.publisher_id != Some(publisher_id) {
            return;
        }

        for (_, player) in c.players.drain() {
            _ = player.message_sender.try_send(RtmpSessionMessage::PlayStop);
        }

        c.publishing = false;
        c.publisher_id = None;
        c.stream_path = None;
        c.publish_stream_id = 0;
        c.publish_status = None;
    }
}
