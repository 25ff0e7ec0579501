// IP address connection counter

use std::{collections::HashMap, net::IpAddr};

use super::RtmpServerConfiguration;

/// IP connection counter
pub struct IpConnectionCounter {
    /// Limit per IP address
    limit: usize,

    /// Counters map
    counters: HashMap<IpAddr, usize>,
}

impl IpConnectionCounter {
    /// Creates new IpConnectionCounter
    pub fn new(config: &RtmpServerConfiguration) -> IpConnectionCounter {
        IpConnectionCounter {
            limit: config.max_concurrent_connections_per_ip as usize,
            counters: HashMap::new(),
        }
    }

    /// Adds IP address, trying to fit it into the limit
    /// Returns true if accepted, false if rejected
    pub fn add(&mut self, ip: &IpAddr) -> bool {
        let counter = self.counters.entry(*ip).or_insert(0);

        if *counter >= self.limit {
            return false;
        }

        *counter += 1;

        true
    }

    /// Removes IP address
    pub fn remove(&mut self, ip: &IpAddr) {
        match self.counters.get_mut(ip) {
            Some(counter) => {
                if *counter > 1 {
                    *counter -= 1;
                } else {
                    self.counters.remove(ip);
                }
            }
            None => {}
        }
    }
}

// Tests
