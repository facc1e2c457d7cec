//! Load session settings from file and environment.

use std::path::{Path, PathBuf};

use duplex_core::SessionConfig;

/// File: ~/.config/duplex/config.toml or /etc/duplex/config.toml (first that exists).
/// Env overrides: DUPLEX_QUEUE_CAPACITY, DUPLEX_INPUT_POLL_MS, DUPLEX_RECEIVE_TIMEOUT_MS,
/// DUPLEX_MAX_SEND_FAILURES.
pub fn load() -> SessionConfig {
    let mut c = load_file(&config_paths()).unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env<F>(c: &mut SessionConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = parse_var(&var, "DUPLEX_QUEUE_CAPACITY") {
        c.queue_capacity = p;
    }
    if let Some(p) = parse_var(&var, "DUPLEX_INPUT_POLL_MS") {
        c.input_poll_ms = p;
    }
    if let Some(p) = parse_var(&var, "DUPLEX_RECEIVE_TIMEOUT_MS") {
        c.receive_timeout_ms = p;
    }
    if let Some(p) = parse_var(&var, "DUPLEX_MAX_SEND_FAILURES") {
        c.max_consecutive_send_failures = Some(p);
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let s = var(key)?;
    match s.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %s, "ignoring unparsable environment override");
            None
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/duplex/config.toml"));
    }
    out.push(PathBuf::from("/etc/duplex/config.toml"));
    out
}

/// Only the first existing file is read; a broken file is reported, not merged with the next.
fn load_file(paths: &[PathBuf]) -> Option<SessionConfig> {
    let path = paths.iter().find(|p| p.exists())?;
    read_file(path)
}

fn read_file(path: &Path) -> Option<SessionConfig> {
    let s = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read config file");
            return None;
        }
    };
    match toml::from_str::<SessionConfig>(&s) {
        Ok(c) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(c)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            None
        }
    }
}
