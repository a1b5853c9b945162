//! Host resource sampling and the pressure score derived from it.

use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub process_mem_mb: f64,
    pub display_ok: bool,
}

/// Source of host measurements. Sampling must be cheap and must not block for long.
pub trait SystemProbe: Send + Sync {
    /// `None` when the host cannot be measured.
    fn sample(&self) -> Option<ResourceSample>;

    /// `None` when liveness cannot be determined.
    fn process_alive(&self, name: &str) -> Option<bool>;
}

/// Reports nothing. Pressure stays at zero and watched processes are never declared dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl SystemProbe for NullProbe {
    fn sample(&self) -> Option<ResourceSample> {
        None
    }

    fn process_alive(&self, _name: &str) -> Option<bool> {
        None
    }
}

/// Linux probe reading `/proc`. CPU is the busy share between two consecutive samples, so
/// the first sample reports 0.
#[derive(Debug, Default)]
pub struct ProcProbe {
    last_cpu: Mutex<Option<(u64, u64)>>,
}

impl ProcProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn cpu_pct(&self) -> Option<f64> {
        let stat = fs::read_to_string("/proc/stat").ok()?;
        let (idle, total) = parse_cpu_line(stat.lines().next()?)?;
        let mut last = self.last_cpu.lock().unwrap_or_else(|e| e.into_inner());
        let pct = match *last {
            Some((prev_idle, prev_total)) if total > prev_total => {
                let dt = (total - prev_total) as f64;
                let di = idle.saturating_sub(prev_idle) as f64;
                ((dt - di) / dt * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        };
        *last = Some((idle, total));
        Some(pct)
    }
}

impl SystemProbe for ProcProbe {
    fn sample(&self) -> Option<ResourceSample> {
        let cpu_pct = self.cpu_pct()?;
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
        let total = meminfo_kb(&meminfo, "MemTotal")?;
        let available = meminfo_kb(&meminfo, "MemAvailable")?;
        let mem_pct = if total > 0.0 {
            ((total - available) / total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let process_mem_mb = fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| meminfo_kb(&s, "VmRSS"))
            .map(|kb| kb / 1024.0)
            .unwrap_or(0.0);
        let display_ok = ["DISPLAY", "WAYLAND_DISPLAY"]
            .iter()
            .any(|v| std::env::var_os(v).is_some_and(|s| !s.is_empty()));

        Some(ResourceSample {
            cpu_pct,
            mem_pct,
            process_mem_mb,
            display_ok,
        })
    }

    fn process_alive(&self, name: &str) -> Option<bool> {
        let entries = fs::read_dir("/proc").ok()?;
        let needle = name.to_ascii_lowercase();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(pid) = file_name.to_str() else { continue };
            if !pid.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ").to_ascii_lowercase();
            if cmdline.contains(&needle) {
                return Some(true);
            }
        }
        Some(false)
    }
}

fn parse_cpu_line(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some((idle, values.iter().sum()))
}

fn meminfo_kb(text: &str, key: &str) -> Option<f64> {
    text.lines()
        .find_map(|l| l.strip_prefix(key)?.strip_prefix(':'))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PressureReading {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub display_ok: bool,
    /// 0.0 (idle) to 1.0 (saturated).
    pub score: f64,
}

impl PressureReading {
    pub const HIGH: f64 = 0.7;

    pub fn from_sample(s: &ResourceSample) -> Self {
        let display_penalty = if s.display_ok { 0.0 } else { 1.0 };
        let score = (s.cpu_pct / 100.0) * 0.4 + (s.mem_pct / 100.0) * 0.4 + display_penalty * 0.2;
        Self {
            cpu_pct: s.cpu_pct,
            mem_pct: s.mem_pct,
            display_ok: s.display_ok,
            score: score.clamp(0.0, 1.0),
        }
    }

    pub fn measure(probe: &dyn SystemProbe) -> Option<Self> {
        probe.sample().map(|s| Self::from_sample(&s))
    }

    pub fn is_high(&self) -> bool {
        self.score > Self::HIGH
    }

    /// Extra pause before acting on a loaded machine.
    pub fn recommended_delay(&self) -> Duration {
        match self.score {
            s if s < 0.3 => Duration::ZERO,
            s if s < 0.5 => Duration::from_millis(300),
            s if s < 0.7 => Duration::from_millis(800),
            _ => Duration::from_millis(1500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_stat_cpu_line() {
        let (idle, total) = parse_cpu_line("cpu  100 0 50 800 50 0 0 0 0 0").unwrap();
        assert_eq!(idle, 850);
        assert_eq!(total, 1000);
        assert!(parse_cpu_line("cpu0 1 2 3 4").is_none());
    }

    #[test]
    fn reads_meminfo_fields() {
        let text = "MemTotal:       16000000 kB\nMemFree:  1 kB\nMemAvailable:    4000000 kB\n";
        assert_eq!(meminfo_kb(text, "MemTotal"), Some(16_000_000.0));
        assert_eq!(meminfo_kb(text, "MemAvailable"), Some(4_000_000.0));
        assert_eq!(meminfo_kb(text, "SwapTotal"), None);
    }
}
