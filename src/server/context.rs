// Context types to group parameters

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{IpConnectionCounter, RtmpServerConfiguration, RtmpServerStatus, SessionIdGenerator};

/// RTMP server context
#[derive(Clone)]
pub struct RtmpServerContext {
    /// Server configuration
    pub config: Arc<RtmpServerConfiguration>,

    /// Server status
    pub status: Arc<Mutex<RtmpServerStatus>>,
}

/// RTMP server context, extended with the accept loop resources
#[derive(Clone)]
pub struct RtmpServerContextExtended {
    /// Server configuration
    pub config: Arc<RtmpServerConfiguration>,

    /// Server status
    pub status: Arc<Mutex<RtmpServerStatus>>,

    /// IP counter
    pub ip_counter: Arc<Mutex<IpConnectionCounter>>,

    /// Session ID generator
    pub session_id_generator: Arc<Mutex<SessionIdGenerator>>,
}
