//! Probes of the machine and process the panel runs in.
//!
//! Every probe falls back to a placeholder instead of failing; the values
//! only feed display fields.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use tracing::debug;

/// Static facts about the host machine and this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Operating system type and release, e.g. `Linux 6.1.0`.
    pub os: String,
    /// Machine host name.
    pub hostname: String,
    /// Primary outbound IPv4 address.
    pub ip: IpAddr,
    /// Process id.
    pub pid: u32,
    /// Working directory.
    pub cwd: String,
    /// Name of the user running the process.
    pub user: String,
}

impl HostInfo {
    /// Gather host facts from the running system.
    pub fn probe() -> Self {
        let info = Self {
            os: os_description(),
            hostname: hostname(),
            ip: local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            pid: std::process::id(),
            cwd: std::env::current_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
            user: user_name(|name| std::env::var(name).ok()),
        };
        debug!(os = %info.os, hostname = %info.hostname, ip = %info.ip, "host probed");
        info
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn os_description() -> String {
    let kind = read_trimmed("/proc/sys/kernel/ostype").unwrap_or_else(|| capitalize(std::env::consts::OS));
    match read_trimmed("/proc/sys/kernel/osrelease") {
        Some(release) => format!("{kind} {release}"),
        None => kind,
    }
}

fn hostname() -> String {
    read_trimmed("/proc/sys/kernel/hostname")
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| String::from("localhost"))
}

/// Resolve the address the OS would route external traffic from.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn user_name<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ["USER", "USERNAME", "LOGNAME"]
        .into_iter()
        .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
        .unwrap_or_else(|| String::from("unknown"))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_tries_each_variable() {
        let name = user_name(|var| (var == "USERNAME").then(|| String::from("steve")));
        assert_eq!(name, "steve");
        assert_eq!(user_name(|_| None), "unknown");
        assert_eq!(user_name(|_| Some(String::new())), "unknown");
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("linux"), "Linux");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn probe_fills_every_field() {
        let info = HostInfo::probe();
        assert!(!info.os.is_empty());
        assert!(!info.hostname.is_empty());
        assert_eq!(info.pid, std::process::id());
    }
}
