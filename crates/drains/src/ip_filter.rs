//! Destination IP filter
//!
//! Resolves drain hosts and rejects any whose resolution touches a
//! blacklisted range. A host resolving to multiple addresses is rejected
//! if ANY of them is blacklisted, not just the one that would be dialed;
//! the conservative choice keeps a multi-A-record host from smuggling
//! traffic into a blocked range on a later dial.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::DrainError;

/// Blacklist of destination ranges.
#[derive(Debug, Clone, Default)]
pub struct IpFilter {
    blacklist: Vec<IpNet>,
}

impl IpFilter {
    pub fn new(blacklist: Vec<IpNet>) -> Self {
        Self { blacklist }
    }

    /// Check one literal address against the blacklist.
    pub fn check_addr(&self, addr: IpAddr) -> Result<(), IpNet> {
        match self.blacklist.iter().find(|net| net.contains(&addr)) {
            Some(net) => Err(*net),
            None => Ok(()),
        }
    }

    /// Resolve `host` and verify every address it maps to.
    pub async fn check_host(&self, host: &str) -> Result<Vec<IpAddr>, DrainError> {
        // A literal address needs no resolution.
        if let Ok(addr) = host.parse::<IpAddr>() {
            return match self.check_addr(addr) {
                Ok(()) => Ok(vec![addr]),
                Err(_) => Err(DrainError::Blacklisted {
                    host: host.to_string(),
                    addr,
                }),
            };
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|source| DrainError::Resolve {
                host: host.to_string(),
                source,
            })?
            .map(|sock| sock.ip())
            .collect();

        if addrs.is_empty() {
            return Err(DrainError::Resolve {
                host: host.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ),
            });
        }

        for addr in &addrs {
            if self.check_addr(*addr).is_err() {
                return Err(DrainError::Blacklisted {
                    host: host.to_string(),
                    addr: *addr,
                });
            }
        }

        Ok(addrs)
    }
}
