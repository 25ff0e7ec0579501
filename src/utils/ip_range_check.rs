// Utility to check IP ranges

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use ipnet::{Ipv4Net, Ipv6Net};

// IP range configuration
// Represents a list of IP addresses and CIDR ranges
#[derive(Clone)]
pub struct IpRangeConfig {
    all: bool,

    ips_v4: Vec<Ipv4Addr>,
    ranges_v4: Vec<Ipv4Net>,

    ips_v6: Vec<Ipv6Addr>,
    ranges_v6: Vec<Ipv6Net>,
}

impl IpRangeConfig {
    /// Creates IP range config from string
    ///
    /// # Arguments
    ///
    /// * `config_str` - String configuration from environment
    ///
    /// # Return value
    ///
    /// A result for the config. In case of error, the invalid
    /// range sub-string is provided to indicate the user
    pub fn new_from_string(config_str: &str) -> Result<IpRangeConfig, String> {
        let mut config = IpRangeConfig {
            all: config_str == "*",
            ips_v4: Vec::new(),
            ranges_v4: Vec::new(),
            ips_v6: Vec::new(),
            ranges_v6: Vec::new(),
        };

        if config_str.is_empty() || config.all {
            return Ok(config);
        }

        for range_str in config_str.split(',').map(|s| s.trim()) {
            if let Ok(range_v4) = Ipv4Net::from_str(range_str) {
                config.ranges_v4.push(range_v4);
            } else if let Ok(ip_v4) = Ipv4Addr::from_str(range_str) {
                config.ips_v4.push(ip_v4);
            } else if let Ok(range_v6) = Ipv6Net::from_str(range_str) {
                config.ranges_v6.push(range_v6);
            } else if let Ok(ip_v6) = Ipv6Addr::from_str(range_str) {
                config.ips_v6.push(ip_v6);
            } else {
                return Err(range_str.to_string());
            }
        }

        Ok(config)
    }

    /// Checks if IP (V4) is included in the range
    fn check_ip_v4(&self, ipv4_addr: &Ipv4Addr) -> bool {
        self.ips_v4.iter().any(|ip| ip == ipv4_addr)
            || self.ranges_v4.iter().any(|range| range.contains(ipv4_addr))
    }

    /// Checks if IP (V6) is included in the range
    fn check_ip_v6(&self, ipv6_addr: &Ipv6Addr) -> bool {
        if self.ips_v6.iter().any(|ip| ip == ipv6_addr)
            || self.ranges_v6.iter().any(|range| range.contains(ipv6_addr))
        {
            return true;
        }

        // IPv4-mapped addresses are also checked against the V4 lists
        if let Some(ipv4_addr) = ipv6_addr.to_ipv4() {
            return self.check_ip_v4(&ipv4_addr);
        }

        false
    }

    /// Checks if the configured range contains an IP address
    ///
    /// # Arguments
    ///
    /// * `ip` - The IP address to check
    ///
    /// # Return value
    ///
    /// Returns true if the IP is contained in the range, false otherwise
    pub fn contains_ip(&self, ip: &IpAddr) -> bool {
        if self.all {
            return true;
        }

        match ip {
            IpAddr::V4(ipv4_addr) => self.check_ip_v4(ipv4_addr),
            IpAddr::V6(ipv6_addr) => self.check_ip_v6(ipv6_addr),
        }
    }
}

// Tests
