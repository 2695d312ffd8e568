//! Who stored a file: the serving host's name and address.
//!
//! Both values are best effort. A host without a resolvable name reports
//! [`UNKNOWN`](crate::fileinfo::UNKNOWN) for the address, and a host whose
//! name cannot be read reports it for both.

use crate::fileinfo::UNKNOWN;
use std::net::{IpAddr, ToSocketAddrs};
use sysinfo::System;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub uploaded_by: String,
    pub system_ip: String,
}

impl Provenance {
    /// Both fields set to the placeholder. Used for files found on disk.
    pub fn unknown() -> Self {
        Self {
            uploaded_by: UNKNOWN.to_string(),
            system_ip: UNKNOWN.to_string(),
        }
    }

    /// Look up the local host name and the first address it resolves to.
    ///
    /// Resolution goes through the system resolver and may block briefly.
    pub fn detect() -> Self {
        let Some(host) = System::host_name().filter(|h| !h.is_empty()) else {
            warn!("could not determine host name");
            return Self::unknown();
        };
        let system_ip = resolve(&host).map_or_else(|| UNKNOWN.to_string(), |ip| ip.to_string());
        Self {
            uploaded_by: host,
            system_ip,
        }
    }
}

/// First address for `host`, preferring IPv4.
fn resolve(host: &str) -> Option<IpAddr> {
    let addrs: Vec<IpAddr> = match (host, 0).to_socket_addrs() {
        Ok(iter) => iter.map(|a| a.ip()).collect(),
        Err(e) => {
            warn!(host, error = %e, "could not resolve host address");
            return None;
        }
    };
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
