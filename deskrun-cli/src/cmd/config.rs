//! Engine settings: defaults, then the optional config file, then flags.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use deskrun_core::Method;
use deskrun_exec::{EngineConfig, ExecMode};
use serde::Deserialize;

use crate::EngineArgs;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub mode: Option<ExecMode>,
    pub retry: RetrySection,
    pub watchdog: WatchdogSection,
    pub verify: VerifySection,
    pub recovery: RecoverySection,
    pub rollback_timeout_ms: Option<u64>,
    pub shared_methods: Option<Vec<Method>>,
    pub watch_processes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
    pub fallback_pause_ms: Option<u64>,
    pub demotion_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogSection {
    pub tick_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub heartbeat_timeout_ms: Option<u64>,
    pub process_check_interval_ms: Option<u64>,
    pub resource_check_interval_ms: Option<u64>,
    pub cpu_threshold_pct: Option<f64>,
    pub memory_limit_mb: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifySection {
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub retry_wait_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySection {
    pub settle_ms: Option<u64>,
    pub attempts: Option<u32>,
    pub attempt_pause_ms: Option<u64>,
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
    if content.trim_start().starts_with('{') {
        serde_json::from_str(&content).map_err(|e| format!("invalid JSON config: {e}"))
    } else {
        serde_yaml::from_str(&content).map_err(|e| format!("invalid YAML config: {e}"))
    }
}

fn ms(value: Option<u64>, target: &mut Duration) {
    if let Some(v) = value {
        *target = Duration::from_millis(v);
    }
}

fn set<T>(value: Option<T>, target: &mut T) {
    if let Some(v) = value {
        *target = v;
    }
}

impl FileConfig {
    pub fn apply(self, cfg: &mut EngineConfig) {
        set(self.mode, &mut cfg.mode);

        let r = &mut cfg.retry;
        set(self.retry.max_attempts, &mut r.max_attempts);
        ms(self.retry.base_delay_ms, &mut r.base_delay);
        set(self.retry.factor, &mut r.factor);
        ms(self.retry.max_delay_ms, &mut r.max_delay);
        set(self.retry.jitter, &mut r.jitter);
        ms(self.retry.fallback_pause_ms, &mut r.fallback_pause);
        set(self.retry.demotion_threshold, &mut r.demotion_threshold);

        let w = &mut cfg.watchdog;
        ms(self.watchdog.tick_ms, &mut w.tick);
        ms(self.watchdog.heartbeat_interval_ms, &mut w.heartbeat_interval);
        ms(self.watchdog.heartbeat_timeout_ms, &mut w.heartbeat_timeout);
        ms(self.watchdog.process_check_interval_ms, &mut w.process_check_interval);
        ms(self.watchdog.resource_check_interval_ms, &mut w.resource_check_interval);
        set(self.watchdog.cpu_threshold_pct, &mut w.cpu_threshold_pct);
        set(self.watchdog.memory_limit_mb, &mut w.memory_limit_mb);

        let v = &mut cfg.verify;
        ms(self.verify.timeout_ms, &mut v.timeout);
        ms(self.verify.poll_interval_ms, &mut v.poll_interval);
        ms(self.verify.retry_wait_ms, &mut v.retry_wait);

        let rc = &mut cfg.recovery;
        ms(self.recovery.settle_ms, &mut rc.settle);
        set(self.recovery.attempts, &mut rc.attempts);
        ms(self.recovery.attempt_pause_ms, &mut rc.attempt_pause);

        ms(self.rollback_timeout_ms, &mut cfg.rollback_timeout);
        if let Some(methods) = self.shared_methods {
            cfg.shared_methods = methods.into_iter().collect::<BTreeSet<_>>();
        }
    }
}

/// Resolved engine settings plus the processes the watchdog should follow.
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    pub watch_processes: Vec<String>,
}

pub fn build_engine_config(args: &EngineArgs) -> Result<ResolvedConfig, String> {
    let mut engine = EngineConfig::default();
    let mut watch_processes = Vec::new();

    if let Some(path) = &args.config {
        let file = load_file_config(path)?;
        watch_processes.extend(file.watch_processes.iter().cloned());
        file.apply(&mut engine);
        tracing::debug!(path = %path.display(), "engine config loaded");
    }

    set(args.mode, &mut engine.mode);
    set(args.retry_max_attempts, &mut engine.retry.max_attempts);
    ms(args.heartbeat_timeout_ms, &mut engine.watchdog.heartbeat_timeout);
    watch_processes.extend(args.watch_processes.iter().cloned());
    watch_processes.sort();
    watch_processes.dedup();

    if engine.retry.max_attempts == 0 {
        return Err("retry.max_attempts must be at least 1".to_string());
    }
    if engine.watchdog.tick.is_zero() {
        return Err("watchdog.tick_ms must be greater than 0".to_string());
    }
    Ok(ResolvedConfig {
        engine,
        watch_processes,
    })
}
