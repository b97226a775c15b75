use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Identity of this process's host, as `hostname[ip]`.
///
/// Reported back to producers in execution replies. Resolution failures
/// fall back to `localhost` and the loopback address.
pub fn local_host_info() -> String {
    let name = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    let ip = resolve_ip(&name);
    format!("{}[{}]", name, ip)
}

fn resolve_ip(name: &str) -> IpAddr {
    let addrs: Vec<IpAddr> = match (name, 0).to_socket_addrs() {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(_) => Vec::new(),
    };
    addrs
        .iter()
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        .or_else(|| addrs.first())
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
