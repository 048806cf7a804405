//! Wake-on-LAN and MAC-based IP resolution.
//!
//! The TV drops off the network when asleep; a magic packet plus a short
//! wait brings it back. The ARP table maps its MAC to whatever IP the
//! router handed out, so a static config entry is only the last resort.

use regex::Regex;
use std::net::UdpSocket;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

/// Matches `(<ip>) at <mac>` lines in `arp -a` output.
static ARP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\((?P<ip>[^)]+)\)\s+at\s+(?P<mac>\S+)\s").unwrap());

/// Normalize a MAC address to 12 lowercase hex digits.
///
/// Accepts colon/dash/dot separated forms, bare 12-digit hex, and the
/// 11-digit form some routers print with a stripped leading zero.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let parts: Vec<&str> = mac
        .split(|c: char| !c.is_ascii_hexdigit())
        .filter(|p| !p.is_empty())
        .collect();

    match parts.len() {
        1 => {
            let hexstr = parts[0].to_lowercase();
            match hexstr.len() {
                12 => Some(hexstr),
                11 => Some(format!("0{hexstr}")),
                _ => None,
            }
        }
        6 => {
            let hexstr: String = parts
                .iter()
                .map(|p| format!("{:0>2}", p.to_lowercase()))
                .collect();
            (hexstr.len() == 12).then_some(hexstr)
        }
        _ => None,
    }
}

/// Send a WOL magic packet. Returns whether the packet went out; all
/// failures are logged warnings, never errors.
pub fn wake_on_lan(mac: &str, broadcast: &str, port: u16) -> bool {
    let Some(clean) = normalize_mac(mac) else {
        log::warn!("Invalid MAC address for WOL: {mac}");
        return false;
    };
    let mut mac_bytes = [0u8; 6];
    for (idx, byte) in mac_bytes.iter_mut().enumerate() {
        match u8::from_str_radix(&clean[idx * 2..idx * 2 + 2], 16) {
            Ok(value) => *byte = value,
            Err(_) => {
                log::warn!("Invalid MAC address for WOL: {mac}");
                return false;
            }
        }
    }

    let mut packet = vec![0xffu8; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac_bytes);
    }

    let send = || -> std::io::Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        socket.send_to(&packet, (broadcast, port))?;
        Ok(())
    };
    if let Err(e) = send() {
        log::warn!("Failed to send WOL packet: {e}");
        return false;
    }

    log::info!("Sent WOL packet to {mac} via {broadcast}:{port}");
    true
}

/// Wake the TV and give it time to bring its network stack up.
pub async fn wake_and_wait(mac: &str, broadcast: &str, port: u16, wait_s: u64) {
    if wake_on_lan(mac, broadcast, port) && wait_s > 0 {
        log::info!("Waiting {wait_s} seconds for TV to wake...");
        tokio::time::sleep(Duration::from_secs(wait_s)).await;
    }
}

/// Look the MAC up in the local ARP table.
pub fn resolve_ip_from_mac(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac)?;
    let output = Command::new("arp").arg("-a").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    find_ip_in_arp_output(&text, &normalized)
}

fn find_ip_in_arp_output(output: &str, normalized_mac: &str) -> Option<String> {
    for line in output.lines() {
        let Some(caps) = ARP_PATTERN.captures(line) else {
            continue;
        };
        if normalize_mac(&caps["mac"]).as_deref() == Some(normalized_mac) {
            return Some(caps["ip"].to_string());
        }
    }
    None
}

/// Pick the TV IP: explicit flag wins, then ARP resolution, then fallback.
pub fn select_tv_ip(ip: Option<&str>, mac: Option<&str>, fallback_ip: &str) -> String {
    if let Some(ip) = ip {
        return ip.to_string();
    }
    if let Some(mac) = mac {
        if let Some(resolved) = resolve_ip_from_mac(mac) {
            log::info!("Resolved TV IP from MAC {mac}: {resolved}");
            return resolved;
        }
        log::warn!("Could not resolve IP from MAC {mac}, using fallback.");
    }
    fallback_ip.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separated_macs() {
        assert_eq!(
            normalize_mac("AA:BB:CC:DD:EE:FF").as_deref(),
            Some("aabbccddeeff")
        );
        assert_eq!(
            normalize_mac("aa-bb-cc-dd-ee-ff").as_deref(),
            Some("aabbccddeeff")
        );
        // Single-digit octets are zero padded.
        assert_eq!(
            normalize_mac("a:b:c:d:e:f").as_deref(),
            Some("0a0b0c0d0e0f")
        );
    }

    #[test]
    fn normalizes_bare_macs() {
        assert_eq!(normalize_mac("aabbccddeeff").as_deref(), Some("aabbccddeeff"));
        // 11 hex digits means a stripped leading zero.
        assert_eq!(normalize_mac("abbccddeeff").as_deref(), Some("0abbccddeeff"));
        assert_eq!(normalize_mac("zz:bb"), None);
        assert_eq!(normalize_mac(""), None);
        assert_eq!(normalize_mac("aabb"), None);
    }

    #[test]
    fn finds_mac_in_arp_output() {
        let output = "\
router.local (192.168.1.1) at 11:22:33:44:55:66 [ether] on en0\n\
tv.local (192.168.1.50) at aa:bb:cc:dd:ee:ff [ether] on en0\n\
? (192.168.1.99) at (incomplete) on en0\n";
        assert_eq!(
            find_ip_in_arp_output(output, "aabbccddeeff").as_deref(),
            Some("192.168.1.50")
        );
        assert_eq!(find_ip_in_arp_output(output, "000000000000"), None);
    }

    #[test]
    fn explicit_ip_wins() {
        assert_eq!(
            select_tv_ip(Some("10.0.0.5"), Some("aa:bb:cc:dd:ee:ff"), "10.0.0.1"),
            "10.0.0.5"
        );
        assert_eq!(select_tv_ip(None, None, "10.0.0.1"), "10.0.0.1");
    }
}
