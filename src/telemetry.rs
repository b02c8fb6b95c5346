use log::debug;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;

use crate::config::DisplayConfig;

pub const NO_IP: &str = "No IP";
pub const NO_TEMPERATURE: &str = "N/D";

const PROC_STAT: &str = "/proc/stat";
const HOSTNAME_FILES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];

#[derive(Debug, Clone, PartialEq)]
pub struct HostTelemetry {
    pub ip: String,
    pub cpu_percent: f64,
    pub cpu_temp: String,
}

/// Host readings for one tick. Implementations substitute placeholders
/// instead of failing.
pub trait TelemetryProvider {
    fn sample(&mut self) -> HostTelemetry;
}

// Busy/total jiffies from the aggregate `cpu` line of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// Utilization since the previous sample, like a non-blocking `top`.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Option<CpuTimes>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // Format: "cpu  user nice system idle iowait irq softirq steal guest guest_nice"
    fn parse_stat(contents: &str) -> Option<CpuTimes> {
        let line = contents.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| f.parse::<u64>())
            .collect::<Result<_, _>>()
            .ok()?;
        if fields.len() < 4 {
            return None;
        }

        let total: u64 = fields.iter().sum();
        // idle + iowait
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(CpuTimes {
            busy: total.saturating_sub(idle),
            total,
        })
    }

    /// Returns 0.0 for the first reading and whenever the sample is unusable.
    pub fn update_from_stat(&mut self, contents: &str) -> f64 {
        let Some(now) = Self::parse_stat(contents) else {
            return 0.0;
        };

        let percent = match self.prev {
            Some(prev) if now.total > prev.total => {
                let busy = now.busy.saturating_sub(prev.busy) as f64;
                let total = (now.total - prev.total) as f64;
                (busy / total * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        };

        self.prev = Some(now);
        // One decimal, as shown on the panel
        (percent * 10.0).round() / 10.0
    }
}

pub fn format_temperature(millidegrees: &str) -> Option<String> {
    let value = millidegrees.trim().parse::<i64>().ok()?;
    Some(format!("{:.1}°C", value as f64 / 1000.0))
}

pub struct SystemTelemetry {
    cpu: CpuTracker,
    thermal_zone: PathBuf,
    ip_probe: String,
}

impl SystemTelemetry {
    pub fn new(config: &DisplayConfig) -> Self {
        let mut telemetry = SystemTelemetry {
            cpu: CpuTracker::new(),
            thermal_zone: config.thermal_zone.clone(),
            ip_probe: config.ip_probe.clone(),
        };
        // Prime the tracker so the first tick already shows a real figure
        telemetry.cpu_percent();
        telemetry
    }

    fn ip_address(&self) -> String {
        match probe_local_ip(&self.ip_probe) {
            Ok(ip) => ip,
            Err(e) => {
                debug!("UDP probe to {} failed: {}", self.ip_probe, e);
                hostname_ip().unwrap_or_else(|| NO_IP.to_string())
            }
        }
    }

    fn cpu_percent(&mut self) -> f64 {
        match std::fs::read_to_string(PROC_STAT) {
            Ok(contents) => self.cpu.update_from_stat(&contents),
            Err(e) => {
                debug!("reading {}: {}", PROC_STAT, e);
                0.0
            }
        }
    }

    fn cpu_temp(&self) -> String {
        std::fs::read_to_string(&self.thermal_zone)
            .ok()
            .and_then(|contents| format_temperature(&contents))
            .unwrap_or_else(|| NO_TEMPERATURE.to_string())
    }
}

impl TelemetryProvider for SystemTelemetry {
    fn sample(&mut self) -> HostTelemetry {
        HostTelemetry {
            ip: self.ip_address(),
            cpu_percent: self.cpu_percent(),
            cpu_temp: self.cpu_temp(),
        }
    }
}

/// Connecting a UDP socket only selects a route; no packet leaves the host.
fn probe_local_ip(probe: &str) -> std::io::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(probe)?;
    Ok(socket.local_addr()?.ip().to_string())
}

fn hostname_ip() -> Option<String> {
    let hostname = HOSTNAME_FILES
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())?;

    (hostname.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .find(SocketAddr::is_ipv4)
        .map(|addr| addr.ip().to_string())
}
