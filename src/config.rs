use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Status dashboard daemon
///
/// Every option can also come from the environment or from a TOML file
/// passed with `--config`. Flags win over the environment, which wins over
/// the file.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "STATUSD_CONFIG")]
    pub config: Option<String>,

    /// HTTP listen port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// HTTP listen address
    #[arg(long, env = "BIND_ADDR")]
    pub bind: Option<String>,

    /// Minutes between two collector runs
    #[arg(long, env = "REFRESH_INTERVAL_MINUTES")]
    pub refresh_interval_minutes: Option<u64>,

    /// Collector command line, e.g. "node collect.js"
    #[arg(long, env = "COLLECTOR_COMMAND")]
    pub collector: Option<String>,

    /// File the collector renders the dashboard into
    #[arg(long, env = "ARTIFACT_PATH")]
    pub artifact: Option<PathBuf>,

    /// Working directory of the collector process
    #[arg(long, env = "COLLECTOR_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Kill the collector after this many seconds (no limit if unset)
    #[arg(long, env = "COLLECTOR_TIMEOUT_SECS")]
    pub collector_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,

    // program and arguments, split on whitespace
    #[serde(default = "default_collector_command")]
    pub collector_command: String,

    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub collector_timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    3000
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_refresh_interval_minutes() -> u64 {
    15
}

fn default_collector_command() -> String {
    "node collect.js".to_string()
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("dashboard.html")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
            collector_command: default_collector_command(),
            artifact_path: default_artifact_path(),
            working_dir: None,
            collector_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    pub fn collector_timeout(&self) -> Option<Duration> {
        self.collector_timeout_secs.map(Duration::from_secs)
    }

    /// `bind_addr` must be an IP literal, IPv4 or IPv6
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {:?}: {}", self.bind_addr, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Collector program followed by its arguments
    pub fn collector_argv(&self) -> Vec<String> {
        self.collector_command
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    fn apply(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(bind) = &args.bind {
            self.bind_addr = bind.clone();
        }
        if let Some(minutes) = args.refresh_interval_minutes {
            self.refresh_interval_minutes = minutes;
        }
        if let Some(collector) = &args.collector {
            self.collector_command = collector.clone();
        }
        if let Some(artifact) = &args.artifact {
            self.artifact_path = artifact.clone();
        }
        if let Some(workdir) = &args.workdir {
            self.working_dir = Some(workdir.clone());
        }
        if let Some(secs) = args.collector_timeout_secs {
            self.collector_timeout_secs = Some(secs);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_minutes == 0 {
            anyhow::bail!("refresh interval must be at least one minute");
        }
        // the timer period is kept in milliseconds
        if self.refresh_interval_minutes.checked_mul(60_000).is_none() {
            anyhow::bail!(
                "refresh interval of {} minutes is too large",
                self.refresh_interval_minutes
            );
        }
        self.listen_addr()?;
        if self.collector_argv().is_empty() {
            anyhow::bail!("collector command is empty");
        }
        if self.collector_timeout_secs == Some(0) {
            anyhow::bail!("collector timeout must be greater than zero");
        }
        Ok(())
    }
}

pub fn load_file(path: &str) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Build the effective configuration from the optional file and the
/// flag/environment overrides
pub fn load(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => load_file(path)?,
        None => Config::default(),
    };
    config.apply(args);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = load(&Args::default()).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.refresh_interval_minutes, 15);
        assert_eq!(config.refresh_interval(), Duration::from_millis(900_000));
        assert_eq!(config.collector_timeout(), None);
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides_win() {
        let args = Args {
            port: Some(8080),
            refresh_interval_minutes: Some(1),
            collector: Some("sh -c ./collect.sh".to_string()),
            collector_timeout_secs: Some(30),
            ..Default::default()
        };
        let config = load(&args).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.collector_argv(), vec!["sh", "-c", "./collect.sh"]);
        assert_eq!(config.collector_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 4000
            artifact_path = "/tmp/out.html"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/out.html"));
        assert_eq!(config.refresh_interval_minutes, 15);
        assert_eq!(config.collector_command, "node collect.js");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let args = Args {
            refresh_interval_minutes: Some(0),
            ..Default::default()
        };
        assert!(load(&args).is_err());
    }

    #[test]
    fn test_rejects_overflowing_interval() {
        let args = Args {
            refresh_interval_minutes: Some(u64::MAX / 1000),
            ..Default::default()
        };
        assert!(load(&args).is_err());

        let largest = u64::MAX / 60_000;
        let args = Args {
            refresh_interval_minutes: Some(largest),
            ..Default::default()
        };
        let config = load(&args).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(largest * 60));
    }

    #[test]
    fn test_ipv6_bind_addr() {
        let args = Args {
            bind: Some("::".to_string()),
            port: Some(8080),
            ..Default::default()
        };
        let addr = load(&args).unwrap().listen_addr().unwrap();

        assert!(addr.is_ipv6());
        assert_eq!(addr.to_string(), "[::]:8080");
    }

    #[test]
    fn test_rejects_invalid_bind_addr() {
        let args = Args {
            bind: Some("not-an-ip".to_string()),
            ..Default::default()
        };
        assert!(load(&args).is_err());
    }

    #[test]
    fn test_rejects_empty_collector() {
        let args = Args {
            collector: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(load(&args).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let args = Args {
            config: Some("/nonexistent/statusd.toml".to_string()),
            ..Default::default()
        };
        assert!(load(&args).is_err());
    }
}
