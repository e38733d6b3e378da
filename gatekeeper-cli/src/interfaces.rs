//! Addresses of this machine's network interfaces.

use std::io;
use std::net::IpAddr;
#[cfg(unix)]
use std::net::{Ipv4Addr, Ipv6Addr};

/// Every IPv4 and IPv6 address assigned to a local interface.
#[cfg(unix)]
pub fn local_addresses() -> io::Result<Vec<IpAddr>> {
    let mut addresses = Vec::new();
    let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: getifaddrs populates `ifaddrs` with a list we free below.
    if unsafe { libc::getifaddrs(&mut ifaddrs) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut ifa = ifaddrs;
    while !ifa.is_null() {
        // SAFETY: non-null entries of the list stay valid until freeifaddrs.
        let entry = unsafe { &*ifa };
        if !entry.ifa_addr.is_null() {
            // SAFETY: `ifa_addr` is non-null and points into the same list.
            let family = i32::from(unsafe { (*entry.ifa_addr).sa_family });
            let addr = match family {
                libc::AF_INET => {
                    // SAFETY: AF_INET means the sockaddr is a sockaddr_in.
                    let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
                    Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
                }
                libc::AF_INET6 => {
                    // SAFETY: AF_INET6 means the sockaddr is a sockaddr_in6.
                    let sin6 = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in6) };
                    Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
                }
                _ => None,
            };
            if let Some(addr) = addr.filter(|addr| !addresses.contains(addr)) {
                addresses.push(addr);
            }
        }
        ifa = entry.ifa_next;
    }

    // SAFETY: `ifaddrs` came from getifaddrs and is freed once.
    unsafe { libc::freeifaddrs(ifaddrs) };

    Ok(addresses)
}

#[cfg(not(unix))]
pub fn local_addresses() -> io::Result<Vec<IpAddr>> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_loopback_interface_listed() {
        let addresses = local_addresses().unwrap();
        assert!(addresses.iter().any(IpAddr::is_loopback), "{addresses:?}");
    }

    #[test]
    fn test_no_duplicates() {
        let addresses = local_addresses().unwrap();
        for (i, addr) in addresses.iter().enumerate() {
            assert!(!addresses[i + 1..].contains(addr));
        }
    }
}
