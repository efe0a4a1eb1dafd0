//! Loads and validates the JSON configuration document.
//!
//! A malformed or missing file is the only failure mode in this crate that is
//! fatal to the whole process (see the error-handling design).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::PeerAddr;

/// Default interval between handshake retries (not part of the JSON schema).
pub const DEFAULT_HANDSHAKE_RETRY_INTERVAL: Duration = Duration::from_secs(2);
/// Default post-quota wait for in-flight messages before shutdown.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct MessageRate {
    pub min_per_minute: f64,
    pub max_per_minute: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkSection {
    pub base_port: u16,
    pub timeout_secs: u64,
}

/// The validated, in-memory configuration for one process.
#[derive(Debug, Clone)]
pub struct Configuration {
    num_processes: usize,
    messages_per_process: u64,
    message_rate: MessageRate,
    network: NetworkSection,
    processes: Vec<PeerAddr>,
    handshake_retry_interval: Duration,
    drain_interval: Duration,
}

impl Configuration {
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        num_processes: usize,
        messages_per_process: u64,
        message_rate: MessageRate,
        network: NetworkSection,
        processes: Vec<PeerAddr>,
        handshake_retry_interval: Duration,
        drain_interval: Duration,
    ) -> Self {
        Self {
            num_processes,
            messages_per_process,
            message_rate,
            network,
            processes,
            handshake_retry_interval,
            drain_interval,
        }
    }

    /// Reads and validates the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let raw: RawConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.processes.len() != raw.num_processes {
            return Err(ConfigError::Invalid(format!(
                "processes table has {} entries but num_processes is {}",
                raw.processes.len(),
                raw.num_processes
            )));
        }
        if raw.message_rate.min_per_minute <= 0.0 {
            return Err(ConfigError::Invalid("message_rate.min_per_minute must be > 0".to_string()));
        }
        if raw.message_rate.min_per_minute > raw.message_rate.max_per_minute {
            return Err(ConfigError::Invalid(
                "message_rate.min_per_minute must be <= max_per_minute".to_string(),
            ));
        }

        Ok(Self {
            num_processes: raw.num_processes,
            messages_per_process: raw.messages_per_process,
            message_rate: MessageRate {
                min_per_minute: raw.message_rate.min_per_minute,
                max_per_minute: raw.message_rate.max_per_minute,
            },
            network: NetworkSection {
                base_port: raw.network.base_port,
                timeout_secs: raw.network.timeout,
            },
            processes: raw
                .processes
                .into_iter()
                .map(|p| PeerAddr { host: p.host, port: p.port })
                .collect(),
            handshake_retry_interval: DEFAULT_HANDSHAKE_RETRY_INTERVAL,
            drain_interval: DEFAULT_DRAIN_INTERVAL,
        })
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn messages_per_process(&self) -> u64 {
        self.messages_per_process
    }

    pub fn rate_bounds(&self) -> (f64, f64) {
        (self.message_rate.min_per_minute, self.message_rate.max_per_minute)
    }

    pub fn base_port(&self) -> u16 {
        self.network.base_port
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    pub fn peer(&self, i: usize) -> &PeerAddr {
        &self.processes[i]
    }

    pub fn peers(&self) -> Vec<PeerAddr> {
        self.processes.clone()
    }

    pub fn handshake_retry_interval(&self) -> Duration {
        self.handshake_retry_interval
    }

    pub fn drain_interval(&self) -> Duration {
        self.drain_interval
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    num_processes: usize,
    messages_per_process: u64,
    message_rate: RawMessageRate,
    network: RawNetwork,
    processes: Vec<RawPeer>,
}

#[derive(Debug, Deserialize)]
struct RawMessageRate {
    min_per_minute: f64,
    max_per_minute: f64,
}

#[derive(Debug, Deserialize)]
struct RawNetwork {
    base_port: u16,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct RawPeer {
    host: String,
    port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempPath {
        tempfile_path::TempPath::with_contents(contents)
    }

    /// Minimal scratch-file helper so this module doesn't need a `tempfile`
    /// dependency just for two tests.
    mod tempfile_path {
        use std::io::Write;
        use std::path::{Path, PathBuf};

        pub struct TempPath(PathBuf);

        impl TempPath {
            pub fn with_contents(contents: &str) -> Self {
                let mut path = std::env::temp_dir();
                let unique = format!("sesmesh-config-test-{:p}.json", contents.as_ptr());
                path.push(unique);
                let mut file = std::fs::File::create(&path).expect("create temp config");
                file.write_all(contents.as_bytes()).expect("write temp config");
                TempPath(path)
            }
        }

        impl AsRef<Path> for TempPath {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    fn sample_json(num_processes: usize) -> String {
        let processes: Vec<String> = (0..num_processes)
            .map(|i| format!(r#"{{"host":"localhost","port":{}}}"#, 5000 + i))
            .collect();
        format!(
            r#"{{
                "num_processes": {num_processes},
                "messages_per_process": 10,
                "message_rate": {{"min_per_minute": 10, "max_per_minute": 100}},
                "network": {{"base_port": 5000, "timeout": 30}},
                "processes": [{}]
            }}"#,
            processes.join(",")
        )
    }

    #[test]
    fn loads_a_well_formed_config() {
        let path = write_temp(&sample_json(3));
        let config = Configuration::load(&path).expect("should load");
        assert_eq!(config.num_processes(), 3);
        assert_eq!(config.messages_per_process(), 10);
        assert_eq!(config.rate_bounds(), (10.0, 100.0));
        assert_eq!(config.peer(1).port, 5001);
    }

    #[test]
    fn rejects_mismatched_process_table() {
        let bad = sample_json(3).replace(r#""num_processes": 3"#, r#""num_processes": 5"#);
        let path = write_temp(&bad);
        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_inverted_rate_bounds() {
        let bad = sample_json(2).replace(
            r#""min_per_minute": 10, "max_per_minute": 100"#,
            r#""min_per_minute": 100, "max_per_minute": 10"#,
        );
        let path = write_temp(&bad);
        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Configuration::load("/nonexistent/path/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
