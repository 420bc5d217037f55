// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use trunk_kernel::config::ResourceConfig;

use crate::errors::ConfigError;

#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Base URL of the remote event table. `None` runs fully offline.
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub user_id: String,
    /// Upper bound on every network operation.
    pub network_timeout: Duration,
    /// Identical submissions inside this window are rejected.
    pub debounce_window: Duration,
    pub flush_interval: Duration,
    /// Local event log. `None` keeps the log in memory only.
    pub log_path: Option<PathBuf>,
    pub reconnect_delay: Duration,
    pub bind_addr: SocketAddr,
    /// Bearer token required by the reference server.
    pub auth_token: Option<String>,
    pub resources: ResourceConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            user_id: "local".to_string(),
            network_timeout: Duration::from_secs(15),
            debounce_window: Duration::from_millis(500),
            flush_interval: Duration::from_secs(1),
            log_path: Some(PathBuf::from("trunk-events.log")),
            reconnect_delay: Duration::from_secs(5),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            auth_token: None,
            resources: ResourceConfig::default(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

impl NodeConfig {
    /// Defaults overridden by `TRUNK_*` environment variables.
    ///
    /// `TRUNK_RESOURCES` names a JSON constants file replacing the built-in
    /// soil economy. `TRUNK_LOG_PATH=memory` disables the on-disk log.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        cfg.remote_url = var("TRUNK_REMOTE_URL").or(cfg.remote_url);
        cfg.api_key = var("TRUNK_API_KEY").or(cfg.api_key);
        cfg.auth_token = var("TRUNK_AUTH_TOKEN").or(cfg.auth_token);
        if let Some(user) = var("TRUNK_USER_ID") {
            cfg.user_id = user;
        }
        if let Some(ms) = parse::<u64>("TRUNK_TIMEOUT_MS")? {
            cfg.network_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>("TRUNK_DEBOUNCE_MS")? {
            cfg.debounce_window = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>("TRUNK_FLUSH_INTERVAL_MS")? {
            cfg.flush_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>("TRUNK_RECONNECT_DELAY_MS")? {
            cfg.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(addr) = parse::<SocketAddr>("TRUNK_BIND_ADDR")? {
            cfg.bind_addr = addr;
        }
        match var("TRUNK_LOG_PATH").as_deref() {
            Some("memory") => cfg.log_path = None,
            Some(path) => cfg.log_path = Some(PathBuf::from(path)),
            None => {}
        }
        if let Some(path) = var("TRUNK_RESOURCES") {
            let raw = std::fs::read_to_string(&path)?;
            cfg.resources = ResourceConfig::from_json(&raw)?;
        }

        Ok(cfg)
    }
}
