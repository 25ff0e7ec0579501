// Registry operation: attach a player to a channel

use tokio::sync::{mpsc::Sender, Mutex};

use crate::session::RtmpSessionMessage;

use super::{RtmpPlayerStatus, RtmpServerStatus};

impl RtmpServerStatus {
    /// Attaches a player to a channel
    ///
    /// The player immediately receives a PlayStart message with a
    /// consistent snapshot of the stream metadata, the sequence
    /// headers and the GOP cache.
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `player_id` - ID of the player session
    /// * `message_sender` - Message sender of the player session
    ///
    /// # Return value
    ///
    /// Returns true if success, false if the channel has no publisher
    pub async fn add_player(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
        player_id: u64,
        message_sender: Sender<RtmpSessionMessage>,
    ) -> bool {
        let mut status_v = status.lock().await;

        let c = match status_v.channels.get_mut(channel) {
            Some(c) => c,
            None => {
                return false;
            }
        };

        if !c.publishing {
            return false;
        }

        let publish_status = match &c.publish_status {
            Some(s) => s,
            None => {
                return false;
            }
        };

        // The snapshot is taken while holding both the channel entry and
        // the publish status, so a player never observes a half update

        let publish_status_v = publish_status.lock().await;
        let play_start_message = publish_status_v.get_play_start_message();
        drop(publish_status_v);

        _ = message_sender.try_send(play_start_message);

        // Attachment is a single visible step

        c.players.insert(player_id, RtmpPlayerStatus { message_sender });

        true
    }
}
