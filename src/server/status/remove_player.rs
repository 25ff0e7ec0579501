// Registry operation: detach a player from a channel

use tokio::sync::Mutex;

use super::RtmpServerStatus;

impl RtmpServerStatus {
    /// Detaches a player from a channel
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `player_id` - ID of the player session
    pub async fn remove_player(status: &Mutex<RtmpServerStatus>, channel: &str, player_id: u64) {
        let mut status_v = status.lock().await;

        if let Some(c) = status_v.channels.get_mut(channel) {
            c.players.remove(&player_id);
        }
    }
}
