use std::net::{IpAddr, Ipv4Addr, UdpSocket};

// Connecting a UDP socket sends nothing; it only makes the OS pick the
// outbound interface, whose address is what casting clients can reach.
fn probe_outbound_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Address of the interface used for outbound traffic, or loopback when the
/// host has no route.
pub fn local_ip_address() -> IpAddr {
    probe_outbound_address().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
