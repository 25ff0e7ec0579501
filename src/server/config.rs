/// RTMP server configuration
use crate::{
    log::Logger,
    rtmp::{RTMP_MAX_CHUNK_SIZE, RTMP_MIN_CHUNK_SIZE, RTMP_OUT_CHUNK_SIZE_DEFAULT},
    utils::{get_env_bool, get_env_string, get_env_u32, IpRangeConfig, DEFAULT_MAX_ID_LENGTH},
};

const RTMP_PORT_DEFAULT: u32 = 1935;

const MAX_PORT: u32 = 65535;

const GOP_CACHE_SIZE_MB_DEFAULT: u32 = 256;
const MSG_BUFFER_SIZE_DEFAULT: u32 = 8;

/// RTMP server configuration
#[derive(Clone)]
pub struct RtmpServerConfiguration {
    /// Port
    pub port: u32,

    /// Bind address
    pub bind_address: String,

    /// Max length for application names and stream keys
    pub id_max_length: usize,

    /// RTMP output chunk size
    pub chunk_size: usize,

    /// Size limit of the GOP cache (bytes)
    pub gop_cache_size: usize,

    /// Size of the message buffer for sessions
    pub msg_buffer_size: usize,

    /// Max number of concurrent connections per IP address
    pub max_concurrent_connections_per_ip: u32,

    /// List of IP ranges not affected by the max number of concurrent connections limit.
    pub max_concurrent_connections_whitelist: IpRangeConfig,

    /// True to log requests
    pub log_requests: bool,
}

impl RtmpServerConfiguration {
    /// Loads configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `logger` - The logger
    pub fn load_from_env(logger: &Logger) -> Result<RtmpServerConfiguration, ()> {
        let port = get_env_u32("RTMP_PORT", RTMP_PORT_DEFAULT);

        if port == 0 || port > MAX_PORT {
            logger.log_error(&format!("RTMP_PORT has an invalid value: {}", port));
            return Err(());
        }

        let bind_address = get_env_string("BIND_ADDRESS", "0.0.0.0");

        let id_max_length = get_env_u32("ID_MAX_LENGTH", DEFAULT_MAX_ID_LENGTH as u32);

        let chunk_size = get_env_u32("RTMP_CHUNK_SIZE", RTMP_OUT_CHUNK_SIZE_DEFAULT as u32) as usize;

        if !(RTMP_MIN_CHUNK_SIZE..=RTMP_MAX_CHUNK_SIZE).contains(&chunk_size) {
            logger.log_error(&format!(
                "RTMP_CHUNK_SIZE has an invalid value: {}. Min: {}. Max: {}",
                chunk_size, RTMP_MIN_CHUNK_SIZE, RTMP_MAX_CHUNK_SIZE
            ));
            return Err(());
        }

        let gop_cache_size =
            (get_env_u32("GOP_CACHE_SIZE_MB", GOP_CACHE_SIZE_MB_DEFAULT) as usize) * 1024 * 1024;
        let msg_buffer_size = get_env_u32("MSG_BUFFER_SIZE", MSG_BUFFER_SIZE_DEFAULT) as usize;
        let max_concurrent_connections_per_ip = get_env_u32("MAX_IP_CONCURRENT_CONNECTIONS", 4);

        let max_concurrent_connections_whitelist =
            match IpRangeConfig::new_from_string(&get_env_string("CONCURRENT_LIMIT_WHITELIST", ""))
            {
                Ok(cw) => cw,
                Err(s) => {
                    logger.log_error(&format!(
                        "CONCURRENT_LIMIT_WHITELIST has an invalid value: {}",
                        s
                    ));
                    return Err(());
                }
            };

        let log_requests = get_env_bool("LOG_REQUESTS", true);

        Ok(RtmpServerConfiguration {
            port,
            bind_address,
            id_max_length: id_max_length as usize,
            chunk_size,
            gop_cache_size,
            msg_buffer_size,
            max_concurrent_connections_per_ip,
            max_concurrent_connections_whitelist,
            log_requests,
        })
    }

    /// Gets the address for listening
    pub fn get_tcp_listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
