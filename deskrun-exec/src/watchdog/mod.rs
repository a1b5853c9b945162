//! Heartbeat supervision on an independent timer task.
//!
//! The watchdog never touches the execution path directly. Heartbeat loss sets an abort
//! flag that the orchestrator checks between nodes. Process and resource checks only raise
//! alerts.

mod config;
mod probe;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub use config::WatchdogConfig;
pub use probe::{NullProbe, PressureReading, ProcProbe, ResourceSample, SystemProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HeartbeatTimeout,
    ProcessDead,
    CpuSpike,
    MemoryHigh,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HeartbeatTimeout => "heartbeat_timeout",
            AlertKind::ProcessDead => "process_dead",
            AlertKind::CpuSpike => "cpu_spike",
            AlertKind::MemoryHigh => "memory_high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchdogAlert {
    pub kind: AlertKind,
    pub message: String,
}

pub type AlertCallback = Arc<dyn Fn(&WatchdogAlert) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct WatchdogStatus {
    pub running: bool,
    pub abort_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_step: Option<String>,
    pub since_heartbeat_ms: u64,
    pub watched: Vec<String>,
    pub alerts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<PressureReading>,
}

struct Beat {
    at: Instant,
    label: Option<String>,
}

struct Shared {
    config: WatchdogConfig,
    probe: Arc<dyn SystemProbe>,
    beat: Mutex<Beat>,
    abort: AtomicBool,
    abort_reason: Mutex<Option<String>>,
    watched: Mutex<BTreeSet<String>>,
    callback: Mutex<Option<AlertCallback>>,
    alerts: AtomicU64,
    pressure: Mutex<Option<PressureReading>>,
    tx: mpsc::UnboundedSender<WatchdogAlert>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn raise(&self, alert: WatchdogAlert) {
        tracing::warn!(kind = alert.kind.as_str(), message = %alert.message, "watchdog alert");
        self.alerts.fetch_add(1, Ordering::Relaxed);
        let callback = lock(&self.callback).clone();
        if let Some(cb) = callback {
            cb(&alert);
        }
        let _ = self.tx.send(alert);
    }

    fn check_heartbeat(&self, now: Instant) {
        let (silence, label) = {
            let beat = lock(&self.beat);
            (now.saturating_duration_since(beat.at), beat.label.clone())
        };
        if silence <= self.config.heartbeat_timeout {
            return;
        }
        let message = format!(
            "heartbeat timeout: no heartbeat for {}ms (last step: {})",
            silence.as_millis(),
            label.as_deref().unwrap_or("none")
        );
        self.abort.store(true, Ordering::SeqCst);
        *lock(&self.abort_reason) = Some(message.clone());
        self.raise(WatchdogAlert {
            kind: AlertKind::HeartbeatTimeout,
            message,
        });
        // One alert per silence window.
        lock(&self.beat).at = now;
    }

    fn check_processes(&self) {
        let watched: Vec<String> = lock(&self.watched).iter().cloned().collect();
        for name in watched {
            if self.probe.process_alive(&name) == Some(false) {
                self.raise(WatchdogAlert {
                    kind: AlertKind::ProcessDead,
                    message: format!("watched process '{name}' is no longer running"),
                });
            }
        }
    }

    fn check_resources(&self) {
        let Some(sample) = self.probe.sample() else {
            return;
        };
        *lock(&self.pressure) = Some(PressureReading::from_sample(&sample));
        if sample.cpu_pct > self.config.cpu_threshold_pct {
            self.raise(WatchdogAlert {
                kind: AlertKind::CpuSpike,
                message: format!("cpu at {:.1}%", sample.cpu_pct),
            });
        }
        if sample.process_mem_mb > self.config.memory_limit_mb {
            self.raise(WatchdogAlert {
                kind: AlertKind::MemoryHigh,
                message: format!("process rss at {:.0}MB", sample.process_mem_mb),
            });
        }
    }
}

pub struct Watchdog {
    shared: Arc<Shared>,
    rx: Mutex<mpsc::UnboundedReceiver<WatchdogAlert>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig, probe: Arc<dyn SystemProbe>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                config,
                probe,
                beat: Mutex::new(Beat {
                    at: Instant::now(),
                    label: None,
                }),
                abort: AtomicBool::new(false),
                abort_reason: Mutex::new(None),
                watched: Mutex::new(BTreeSet::new()),
                callback: Mutex::new(None),
                alerts: AtomicU64::new(0),
                pressure: Mutex::new(None),
                tx,
            }),
            rx: Mutex::new(rx),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.shared.config
    }

    /// Spawns the timer task. Must be called inside a tokio runtime; a second call is a no-op.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        *lock(&self.shutdown) = Some(stop_tx);
        lock(&self.shared.beat).at = Instant::now();

        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(shared.config.tick);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_process = Instant::now();
            let mut last_resource = Instant::now();
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        let now = Instant::now();
                        shared.check_heartbeat(now);
                        if now.duration_since(last_process) >= shared.config.process_check_interval {
                            last_process = now;
                            shared.check_processes();
                        }
                        if now.duration_since(last_resource) >= shared.config.resource_check_interval {
                            last_resource = now;
                            shared.check_resources();
                        }
                    }
                }
            }
            tracing::debug!("watchdog stopped");
        }));
        tracing::debug!(
            timeout_ms = self.shared.config.heartbeat_timeout.as_millis() as u64,
            "watchdog started"
        );
    }

    pub fn stop(&self) {
        if let Some(tx) = lock(&self.shutdown).take() {
            let _ = tx.send(true);
        }
        lock(&self.task).take();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn heartbeat(&self, label: impl Into<String>) {
        let mut beat = lock(&self.shared.beat);
        beat.at = Instant::now();
        beat.label = Some(label.into());
    }

    pub fn since_heartbeat(&self) -> Duration {
        Instant::now().saturating_duration_since(lock(&self.shared.beat).at)
    }

    pub fn abort_requested(&self) -> bool {
        self.shared.abort.load(Ordering::SeqCst)
    }

    pub fn abort_reason(&self) -> Option<String> {
        lock(&self.shared.abort_reason).clone()
    }

    pub fn reset_abort(&self) {
        self.shared.abort.store(false, Ordering::SeqCst);
        lock(&self.shared.abort_reason).take();
        lock(&self.shared.beat).at = Instant::now();
    }

    pub fn watch_process(&self, name: impl Into<String>) {
        lock(&self.shared.watched).insert(name.into());
    }

    pub fn unwatch_process(&self, name: &str) -> bool {
        lock(&self.shared.watched).remove(name)
    }

    pub fn on_alert(&self, callback: AlertCallback) {
        *lock(&self.shared.callback) = Some(callback);
    }

    /// Alerts raised since the last drain, oldest first.
    pub fn drain_alerts(&self) -> Vec<WatchdogAlert> {
        let mut rx = lock(&self.rx);
        let mut out = Vec::new();
        while let Ok(alert) = rx.try_recv() {
            out.push(alert);
        }
        out
    }

    pub fn alerts_count(&self) -> u64 {
        self.shared.alerts.load(Ordering::Relaxed)
    }

    pub fn last_pressure(&self) -> Option<PressureReading> {
        *lock(&self.shared.pressure)
    }

    pub fn status(&self) -> WatchdogStatus {
        let (since, last_step) = {
            let beat = lock(&self.shared.beat);
            (
                Instant::now().saturating_duration_since(beat.at),
                beat.label.clone(),
            )
        };
        WatchdogStatus {
            running: self.is_running(),
            abort_requested: self.abort_requested(),
            abort_reason: self.abort_reason(),
            last_step,
            since_heartbeat_ms: since.as_millis() as u64,
            watched: lock(&self.shared.watched).iter().cloned().collect(),
            alerts: self.alerts_count(),
            pressure: self.last_pressure(),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(tx) = lock(&self.shutdown).take() {
            let _ = tx.send(true);
        }
    }
}
