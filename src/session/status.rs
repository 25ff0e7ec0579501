// RTMP session status models

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::rtmp::{RtmpPacket, RTMP_IN_CHUNK_SIZE_DEFAULT, RTMP_WINDOW_ACK};

use super::RtmpSessionMessage;

/// RTMP session status
/// Shared between the read task and the writer task
pub struct RtmpSessionStatus {
    /// Channel (application name), set by the connect command
    pub channel: Option<String>,

    /// Session epoch (unix milliseconds at connect)
    pub connect_time: i64,

    /// tcUrl reported by the client
    pub tc_url: String,

    /// swfUrl reported by the client
    pub swf_url: String,

    /// Flash version reported by the client
    pub flash_ver: String,

    /// Object encoding requested by the client
    pub object_encoding: Option<u32>,

    /// Counter to allocate stream ids for createStream
    pub streams: u64,

    /// True if the session is publishing
    pub is_publisher: bool,

    /// Stream key used to publish
    pub stream_path: Option<String>,

    /// ID of the RTMP stream used to publish
    pub publish_stream_id: u32,

    /// True if the session is playing
    pub is_player: bool,

    /// ID of the RTMP stream used to play
    pub play_stream_id: u32,
}

impl RtmpSessionStatus {
    /// Creates new RtmpSessionStatus
    pub fn new() -> RtmpSessionStatus {
        RtmpSessionStatus {
            channel: None,
            connect_time: 0,
            tc_url: "".to_string(),
            swf_url: "".to_string(),
            flash_ver: "".to_string(),
            object_encoding: None,
            streams: 0,
            is_publisher: false,
            stream_path: None,
            publish_stream_id: 0,
            is_player: false,
            play_stream_id: 0,
        }
    }

    /// Gets the play status of a session
    ///
    /// # Return value
    ///
    /// Returns a tuple with 2 values:
    ///  1. True if the session is a player, false otherwise
    ///  2. If the session is a player, the ID of the RTMP stream used to play
    pub async fn get_play_stream_id(status: &Mutex<RtmpSessionStatus>) -> (bool, u32) {
        let status_v = status.lock().await;
        (status_v.is_player, status_v.play_stream_id)
    }

    /// Sets the playing status to false
    pub async fn stop_playing(status: &Mutex<RtmpSessionStatus>) {
        let mut status_v = status.lock().await;
        status_v.is_player = false;
    }
}

/// Status of the stream being published by a session
pub struct RtmpSessionPublishStreamStatus {
    /// Latest media timestamp received (milliseconds)
    pub clock: i64,

    /// onMetaData payload (empty if not received yet)
    pub metadata: Arc<Vec<u8>>,

    /// Audio codec ID (0 = not known yet)
    pub audio_codec: u32,

    /// Audio sequence header (empty if not received yet)
    pub aac_sequence_header: Arc<Vec<u8>>,

    /// Audio sample rate (Hz)
    pub audio_sample_rate: u32,

    /// Audio channel count
    pub audio_channels: u32,

    /// Video codec ID (0 = not known yet)
    pub video_codec: u32,

    /// Video sequence header (empty if not received yet)
    pub avc_sequence_header: Arc<Vec<u8>>,

    /// Video width (pixels, 0 if unknown)
    pub video_width: u32,

    /// Video height (pixels, 0 if unknown)
    pub video_height: u32,

    /// Video frame rate (0 if unknown)
    pub video_fps: u32,

    /// Video bitrate (0 if unknown)
    pub bitrate: u32,

    /// Video profile indication (0 if unknown)
    pub video_profile: u32,

    /// Video level indication (0 if unknown)
    pub video_level: u32,

    /// Cache of media packets since the last video keyframe
    pub gop_cache: Vec<Arc<RtmpPacket>>,

    /// Total payload bytes kept in the GOP cache
    pub gop_cache_size: usize,
}

impl RtmpSessionPublishStreamStatus {
    /// Creates new RtmpSessionPublishStreamStatus
    pub fn new() -> RtmpSessionPublishStreamStatus {
        RtmpSessionPublishStreamStatus {
            clock: 0,
            metadata: Arc::new(Vec::new()),
            audio_codec: 0,
            aac_sequence_header: Arc::new(Vec::new()),
            audio_sample_rate: 0,
            audio_channels: 1,
            video_codec: 0,
            avc_sequence_header: Arc::new(Vec::new()),
            video_width: 0,
            video_height: 0,
            video_fps: 0,
            bitrate: 0,
            video_profile: 0,
            video_level: 0,
            gop_cache: Vec::new(),
            gop_cache_size: 0,
        }
    }

    /// Builds the message a player receives when it attaches to the stream
    /// Must be called with the status locked, so the snapshot is consistent
    pub fn get_play_start_message(&self) -> RtmpSessionMessage {
        RtmpSessionMessage::PlayStart {
            metadata: self.metadata.clone(),
            audio_codec: self.audio_codec,
            aac_sequence_header: self.aac_sequence_header.clone(),
            video_codec: self.video_codec,
            avc_sequence_header: self.avc_sequence_header.clone(),
            gop_cache: self.gop_cache.clone(),
        }
    }

    /// Appends a media packet to the GOP cache, respecting the byte limit
    pub fn push_gop_packet(&mut self, packet: Arc<RtmpPacket>, limit: usize) {
        let packet_size = packet.payload.len();

        if packet_size > limit {
            return;
        }

        while self.gop_cache_size + packet_size > limit && !self.gop_cache.is_empty() {
            let removed = self.gop_cache.remove(0);
            self.gop_cache_size -= removed.payload.len();
        }

        self.gop_cache_size += packet_size;
        self.gop_cache.push(packet);
    }

    /// Clears the GOP cache
    pub fn clear_gop(&mut self) {
        self.gop_cache.clear();
        self.gop_cache_size = 0;
    }
}

/// Status owned by the session read task
pub struct RtmpSessionReadStatus {
    /// Inbound chunk size
    pub in_chunk_size: usize,

    /// Window acknowledgement size
    pub window_ack_size: u32,

    /// Peer bandwidth reported by the client
    pub peer_bandwidth: u32,

    /// Bytes received since the counters were last reset
    pub in_ack_size: u64,

    /// Value of in_ack_size when the last ACK was sent
    pub in_last_ack: u64,

    /// Reassembly slots, by chunk stream id
    pub in_packets: HashMap<u32, RtmpPacket>,
}

impl RtmpSessionReadStatus {
    /// Creates new RtmpSessionReadStatus
    pub fn new() -> RtmpSessionReadStatus {
        RtmpSessionReadStatus {
            in_chunk_size: RTMP_IN_CHUNK_SIZE_DEFAULT,
            window_ack_size: RTMP_WINDOW_ACK,
            peer_bandwidth: 0,
            in_ack_size: 0,
            in_last_ack: 0,
            in_packets: HashMap::new(),
        }
    }
}
