// Server status model (stream registry)

mod add_player;
mod remove_player;
mod remove_publisher;
mod send_to_players;
mod set_publisher;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc::Sender, Mutex};

use crate::session::{RtmpSessionMessage, RtmpSessionPublishStreamStatus};

/// Status of an RTMP player attached to a channel
pub struct RtmpPlayerStatus {
    /// Message sender to communicate with the player session
    pub message_sender: Sender<RtmpSessionMessage>,
}

/// Channel status
/// A channel is an application name, with at most one
/// publisher and any number of players
pub struct RtmpChannelStatus {
    /// True if publishing
    pub publishing: bool,

    /// ID of the publisher session
    pub publisher_id: Option<u64>,

    /// Stream key the publisher used
    pub stream_path: Option<String>,

    /// ID of the RTMP stream the publisher uses
    pub publish_stream_id: u32,

    /// Status of the published stream
    pub publish_status: Option<Arc<Mutex<RtmpSessionPublishStreamStatus>>>,

    /// Players attached to the channel
    pub players: HashMap<u64, RtmpPlayerStatus>,
}

impl RtmpChannelStatus {
    /// Creates new RtmpChannelStatus
    pub fn new() -> RtmpChannelStatus {
        RtmpChannelStatus {
            publishing: false,
            publisher_id: None,
            stream_path: None,
            publish_stream_id: 0,
            publish_status: None,
            players: HashMap::new(),
        }
    }
}

/// Server status
pub struct RtmpServerStatus {
    /// Channels
    pub channels: HashMap<String, RtmpChannelStatus>,
}

impl RtmpServerStatus {
    /// Creates new RtmpServerStatus
    pub fn new() -> RtmpServerStatus {
        RtmpServerStatus {
            channels: HashMap::new(),
        }
    }

    /// Checks if a channel currently has a publisher
    pub async fn check_channel_publishing_status(
        status: &Mutex<RtmpServerStatus>,
        channel: &str,
    ) -> bool {
        let status_v = status.lock().await;

        match status_v.channels.get(channel) {
            Some(c) => c.publishing,
            None => false,
        }
    }

    /// Removes a channel if it has no publisher and no players
    pub async fn try_clear_channel(status: &Mutex<RtmpServerStatus>, channel: &str) {
        let mut status_v = status.lock().await;

        if let Some(c) = status_v.channels.get(channel) {
            if !c.publishing && c.players.is_empty() {
                status_v.channels.remove(channel);
            }
        }
    }
}

// Tests
