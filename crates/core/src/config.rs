//! JSON configuration file and its periodic reload.

use crate::error::{Result, StructscopeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_CONFIG_POLL: Duration = Duration::from_secs(5);
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// How a multi-file edit is committed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditBatch {
    /// Every file that synthesizes cleanly is written.
    #[default]
    Independent,
    /// Nothing is written unless every file synthesizes cleanly.
    Atomic,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    addr: Option<String>,
    dir_name: Option<String>,
    debounce_interval: Option<String>,
    config_check_period: Option<String>,
    outbound_queue: Option<usize>,
    #[serde(default)]
    edit_batch: EditBatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub addr: String,
    pub watched_root: PathBuf,
    pub debounce_interval: Duration,
    pub config_poll_interval: Duration,
    pub outbound_queue: usize,
    pub edit_batch: EditBatch,
}

impl Settings {
    /// Defaults for watching `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            watched_root: root.into(),
            debounce_interval: DEFAULT_DEBOUNCE,
            config_poll_interval: DEFAULT_CONFIG_POLL,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            edit_batch: EditBatch::default(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| StructscopeError::Config(format!("error parsing config file: {}", e)))?;

        let dir_name = raw
            .dir_name
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| StructscopeError::Config("dirName is required".to_string()))?;

        let mut settings = Self::for_root(dir_name);
        if let Some(addr) = raw.addr {
            settings.addr = addr;
        }
        if let Some(text) = raw.debounce_interval {
            settings.debounce_interval = parse_duration("debounceInterval", &text)?;
        }
        if let Some(text) = raw.config_check_period {
            settings.config_poll_interval = parse_duration("configCheckPeriod", &text)?;
        }
        if let Some(queue) = raw.outbound_queue {
            if queue == 0 {
                return Err(StructscopeError::Config(
                    "outboundQueue must be positive".to_string(),
                ));
            }
            settings.outbound_queue = queue;
        }
        settings.edit_batch = raw.edit_batch;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StructscopeError::Config(format!("error reading config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

fn parse_duration(key: &str, text: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(text.trim())
        .map_err(|e| StructscopeError::Config(format!("invalid {}: {}", key, e)))?;
    if duration.is_zero() {
        return Err(StructscopeError::Config(format!("{} must be positive", key)));
    }
    Ok(duration)
}

/// Re-reads the configuration file every `config_poll_interval` and
/// publishes changed settings.
pub struct ConfigWatcher {
    path: PathBuf,
    tx: watch::Sender<Settings>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, initial: Settings) -> (Self, watch::Receiver<Settings>) {
        let (tx, rx) = watch::channel(initial);
        (
            Self {
                path: path.into(),
                tx,
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Reloads once. Returns whether the settings changed.
    ///
    /// A file that cannot be read or parsed leaves the last good settings in
    /// effect.
    pub fn reload(&self) -> bool {
        let next = match Settings::load(&self.path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("Keeping previous configuration: {}", err);
                return false;
            }
        };

        let current = self.tx.borrow().clone();
        if next == current {
            return false;
        }
        tracing::info!("Configuration changed, updating");
        if next.addr != current.addr {
            tracing::warn!(
                "addr changed from {} to {}; restart to listen on the new address",
                current.addr,
                next.addr
            );
        }
        self.tx.send_replace(next);
        true
    }

    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let period = self.tx.borrow().config_poll_interval;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        self.reload();
                    }
                }
            }
            tracing::debug!("Config watcher for {} stopped", self.path.display());
        })
    }
}
