// Messages sent to the session writer task

use std::sync::Arc;

use crate::rtmp::RtmpPacket;

/// RTMP session message
#[derive(Clone)]
pub enum RtmpSessionMessage {
    /// The session attached to a published stream as a player
    PlayStart {
        metadata: Arc<Vec<u8>>,
        audio_codec: u32,
        aac_sequence_header: Arc<Vec<u8>>,
        video_codec: u32,
        avc_sequence_header: Arc<Vec<u8>>,
        gop_cache: Vec<Arc<RtmpPacket>>,
    },

    /// The publisher updated the stream metadata
    PlayMetadata { metadata: Arc<Vec<u8>> },

    /// A media packet to relay to the player
    PlayPacket { packet: Arc<RtmpPacket> },

    /// The publisher went away
    PlayStop,

    /// The session ended, the writer task must stop
    End,
}
