//! Structured JSON-Lines debug log for probe, switch and polling events.
//!
//! Off unless `MONERO_CONN_DEBUG` is truthy. Writes to
//! `~/.monero-connection-manager/debug.log` (or `MONERO_CONN_DEBUG_LOG`), rotating
//! into gzip archives once the file passes the size limit.

use std::collections::HashMap;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEBUG_ENV_VAR: &str = "MONERO_CONN_DEBUG";
pub const DEBUG_LOG_PATH_ENV_VAR: &str = "MONERO_CONN_DEBUG_LOG";

const LOG_ROTATION_SIZE_BYTES: u64 = 8 * 1024 * 1024;
const MAX_ARCHIVES: usize = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub component: String,
    pub event: String,
    pub message: String,
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, Value>,
}

struct RotatingFile {
    path: PathBuf,
    write_count: AtomicU32,
}

impl RotatingFile {
    fn new(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Self {
            path,
            write_count: AtomicU32::new(0),
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if self.write_count.fetch_add(1, Ordering::Relaxed) % ROTATION_CHECK_INTERVAL == 0 {
            // Rotation failures must not stop logging
            let _ = self.rotate_if_needed();
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.over_limit()? {
            return Ok(());
        }

        // Another process holding the lock is already rotating
        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Ok(());
        }

        let result = if self.over_limit()? {
            self.archive()
        } else {
            Ok(())
        };
        let _ = std::fs::remove_file(&lock_path);
        result
    }

    fn over_limit(&self) -> std::io::Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len() >= LOG_ROTATION_SIZE_BYTES),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn archive(&self) -> std::io::Result<()> {
        let (dir, stem) = self.dir_and_stem();
        let archive_path = dir.join(format!(
            "{}.{}.gz",
            stem,
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let rotating_path = self.path.with_extension("rotating");
        std::fs::rename(&self.path, &rotating_path)?;

        let mut encoder = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        std::io::copy(&mut BufReader::new(File::open(&rotating_path)?), &mut encoder)?;
        encoder.finish()?;
        std::fs::remove_file(&rotating_path)?;

        let _ = self.prune_archives(&dir, &stem);
        Ok(())
    }

    fn prune_archives(&self, dir: &Path, stem: &str) -> std::io::Result<()> {
        let prefix = format!("{}.", stem);
        let mut archives = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".gz") {
                archives.push((entry.path(), entry.metadata()?.modified()?));
            }
        }

        archives.sort_by_key(|(_, modified)| *modified);
        let excess = archives.len().saturating_sub(MAX_ARCHIVES);
        for (path, _) in archives.into_iter().take(excess) {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    fn dir_and_stem(&self) -> (PathBuf, String) {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "debug".to_string());
        (dir, stem)
    }
}

pub struct DebugLogger {
    enabled: bool,
    file: Option<Mutex<RotatingFile>>,
    session_id: String,
    redaction_patterns: Vec<(Regex, &'static str)>,
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLogger {
    /// Build a logger from the current environment
    pub fn new() -> Self {
        let enabled = parse_debug_enabled();
        let file = enabled.then(|| Mutex::new(RotatingFile::new(log_path())));

        Self {
            enabled,
            file,
            session_id: Uuid::new_v4().to_string()[..8].to_string(),
            redaction_patterns: compile_redaction_patterns(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        let file = self.file.as_ref()?;
        let guard = file.lock().ok()?;
        Some(guard.path.clone())
    }

    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for (regex, replacement) in &self.redaction_patterns {
            redacted = regex.replace_all(&redacted, *replacement).to_string();
        }
        redacted
    }

    fn log(
        &self,
        level: &str,
        component: &str,
        event: &str,
        message: &str,
        fields: HashMap<String, Value>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            level: level.to_string(),
            component: component.to_string(),
            event: event.to_string(),
            message: self.redact(message),
            correlation_id: Some(self.session_id.clone()),
            fields,
        };

        if let Some(file) = &self.file {
            if let Ok(file) = file.lock() {
                if let Ok(line) = serde_json::to_string(&entry) {
                    let _ = file.append(&line);
                }
            }
        }
    }

    pub fn error(&self, component: &str, event: &str, message: &str) {
        self.log("ERROR", component, event, message, HashMap::new());
    }

    pub fn probe_start(&self, uri: &str, timeout_ms: u32) {
        let mut fields = HashMap::new();
        fields.insert("uri".to_string(), Value::String(self.redact(uri)));
        fields.insert("timeout_ms".to_string(), Value::from(timeout_ms));

        self.log(
            "NETWORK",
            "Transport",
            "probe_start",
            &format!("Probing {} ({}ms timeout)", uri, timeout_ms),
            fields,
        );
    }

    pub fn probe_end(&self, uri: &str, connected: bool, response_time_ms: Option<u64>, error: Option<&str>) {
        let mut fields = HashMap::new();
        fields.insert("uri".to_string(), Value::String(self.redact(uri)));
        fields.insert("connected".to_string(), Value::Bool(connected));
        if let Some(ms) = response_time_ms {
            fields.insert("response_time_ms".to_string(), Value::from(ms));
        }
        if let Some(error) = error {
            fields.insert("error".to_string(), Value::String(self.redact(error)));
        }

        let status = if connected { "connected" } else { "disconnected" };
        self.log(
            "NETWORK",
            "Transport",
            "probe_end",
            &format!("Probe of {} completed: {}", uri, status),
            fields,
        );
    }

    pub fn connection_changed(&self, uri: Option<&str>, listener_count: usize) {
        let mut fields = HashMap::new();
        fields.insert(
            "uri".to_string(),
            uri.map(|u| Value::String(self.redact(u))).unwrap_or(Value::Null),
        );
        fields.insert("listeners".to_string(), Value::from(listener_count));

        self.log(
            "INFO",
            "ConnectionManager",
            "connection_changed",
            &format!("Current connection: {}", uri.unwrap_or("none")),
            fields,
        );
    }

    pub fn auto_switch(&self, from: Option<&str>, to: &str, reason: &str) {
        let mut fields = HashMap::new();
        fields.insert(
            "from".to_string(),
            from.map(|u| Value::String(self.redact(u))).unwrap_or(Value::Null),
        );
        fields.insert("to".to_string(), Value::String(self.redact(to)));
        fields.insert("reason".to_string(), Value::String(reason.to_string()));

        self.log(
            "INFO",
            "Selector",
            "auto_switch",
            &format!("Switching to {} ({})", to, reason),
            fields,
        );
    }

    pub fn poller_started(&self, period_ms: u64, poll_type: &str) {
        let mut fields = HashMap::new();
        fields.insert("period_ms".to_string(), Value::from(period_ms));
        fields.insert("poll_type".to_string(), Value::String(poll_type.to_string()));

        self.log(
            "INFO",
            "Poller",
            "poller_started",
            &format!("Polling every {}ms ({})", period_ms, poll_type),
            fields,
        );
    }

    pub fn poller_stopped(&self, iterations: u64) {
        let mut fields = HashMap::new();
        fields.insert("iterations".to_string(), Value::from(iterations));
        self.log("INFO", "Poller", "poller_stopped", "Polling stopped", fields);
    }

    pub fn poll_iteration(&self, iteration: u64, duration_ms: u64, connected: bool) {
        let mut fields = HashMap::new();
        fields.insert("iteration".to_string(), Value::from(iteration));
        fields.insert("duration_ms".to_string(), Value::from(duration_ms));
        fields.insert("connected".to_string(), Value::Bool(connected));

        self.log(
            "PERF",
            "Poller",
            "poll_iteration",
            &format!("Poll #{} took {}ms", iteration, duration_ms),
            fields,
        );
    }

    pub fn poll_error(&self, iteration: u64, error: &str) {
        let mut fields = HashMap::new();
        fields.insert("iteration".to_string(), Value::from(iteration));
        self.log(
            "ERROR",
            "Poller",
            "poll_error",
            &format!("Poll #{} failed: {}", iteration, error),
            fields,
        );
    }
}

/// Accepts true/1/yes/on (case insensitive)
fn parse_debug_enabled() -> bool {
    env::var(DEBUG_ENV_VAR)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

fn log_path() -> PathBuf {
    if let Ok(path) = env::var(DEBUG_LOG_PATH_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".monero-connection-manager");
    path.push("debug.log");
    path
}

fn compile_redaction_patterns() -> Vec<(Regex, &'static str)> {
    [
        (r"(?i)authorization[:=\s]+[^\s,]+", "[REDACTED]"),
        (r"(?i)password[:=\s]+[^\s,]+", "[REDACTED]"),
        (r"(?i)secret[:=\s]+[^\s,]+", "[REDACTED]"),
        // user:pass@ embedded in URIs
        (r"//[^/\s:@]+:[^/\s@]+@", "//[REDACTED]@"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|r| (r, replacement)))
    .collect()
}

/// Process-wide logger, configured from the environment on first use
pub fn get_debug_logger() -> &'static DebugLogger {
    static LOGGER: OnceLock<DebugLogger> = OnceLock::new();
    LOGGER.get_or_init(DebugLogger::new)
}
