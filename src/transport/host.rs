//! Reachable host extraction.
//!
//! A server bound to `0.0.0.0` or `[::]` cannot advertise its bind address;
//! the first private interface address is advertised instead.

use std::io;
use std::net::{IpAddr, SocketAddr};

/// Return an advertisable address for a bound socket address.
pub fn extract(addr: SocketAddr) -> io::Result<SocketAddr> {
    if !addr.ip().is_unspecified() {
        return Ok(addr);
    }

    let interfaces = local_ip_address::list_afinet_netifas()
        .map_err(|e| io::Error::other(format!("failed to list network interfaces: {e}")))?;

    interfaces
        .into_iter()
        .map(|(_, ip)| ip)
        .find(is_private)
        .map(|ip| SocketAddr::new(ip, addr.port()))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no private interface address found",
            )
        })
}

/// RFC 1918, carrier-grade NAT (100.64/10) and unique-local IPv6 (fd00::/8).
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private() || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => (v6.segments()[0] & 0xff00) == 0xfd00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ranges() {
        for ip in ["10.1.2.3", "172.16.0.1", "172.31.255.255", "192.168.1.1", "100.64.0.1", "100.127.0.1", "fd00::1"] {
            assert!(is_private(&ip.parse().unwrap()), "{ip} should be private");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "100.128.0.1", "127.0.0.1", "::1", "fe80::1"] {
            assert!(!is_private(&ip.parse().unwrap()), "{ip} should not be private");
        }
    }

    #[test]
    fn test_specified_address_is_kept() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        assert_eq!(extract(addr).unwrap(), addr);
    }
}
