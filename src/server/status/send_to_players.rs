// Registry operation: fan out messages to the players of a channel

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{rtmp::RtmpPacket, session::RtmpSessionMessage};

use super::RtmpServerStatus;

impl RtmpServerStatus {
    /// Sends a media packet to every player of a channel
    ///
    /// The sends never block: a player whose buffer is full
    /// has the packet dropped.
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `packet` - The packet to relay
    pub async fn send_packet_to_players(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
        packet: Arc<RtmpPacket>,
    ) {
        let status_v = status.lock().await;

        if let Some(c) = status_v.channels.get(channel) {
            for player in c.players.values() {
                _ = player.message_sender.try_send(RtmpSessionMessage::PlayPacket {
                    packet: packet.clone(),
                });
            }
        }
    }

    /// Sends updated stream metadata to every player of a channel
    ///
    /// # Arguments
    ///
    /// * `status` - The server status
    /// * `channel` - Channel (application name)
    /// * `metadata` - The onMetaData payload
    pub async fn send_metadata_to_players(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
        metadata: Arc<Vec<u8>>,
    ) {
        let status_v = status.lock().await;

        if let Some(c) = status_v.channels.get(channel) {
            for player in c.players.values() {
                _ = player.message_sender.try_send(RtmpSessionMessage::PlayMetadata {
                    metadata: metadata.clone(),
                });
            }
        }
    }
}
