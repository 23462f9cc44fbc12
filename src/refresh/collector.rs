//! External collector invocation
//!
//! The collector is an out-of-process program. It reports success through
//! its exit status and hands over the rendered dashboard by writing it to a
//! well-known artifact file, which is read only after a successful exit.

use async_trait::async_trait;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Termination event of one collector run
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub success: bool,
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Captured diagnostic output
    pub stderr: String,
}

/// The collector could not be run to completion
#[derive(Debug)]
pub enum CollectorError {
    /// Process could not be started
    Spawn(io::Error),

    /// Waiting for the process or reading its output failed
    Wait(io::Error),

    /// Process was killed after exceeding the configured limit
    TimedOut(Duration),
}

impl std::error::Error for CollectorError {}

impl Display for CollectorError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CollectorError::Spawn(e) => write!(fmt, "failed to start collector: {}", e),
            CollectorError::Wait(e) => write!(fmt, "failed to wait for collector: {}", e),
            CollectorError::TimedOut(limit) => {
                write!(fmt, "collector timed out after {}s", limit.as_secs())
            }
        }
    }
}

/// The collector exited successfully but left no usable artifact
#[derive(Debug)]
pub enum ArtifactError {
    Missing,
    Empty,
    Read(io::Error),
}

impl std::error::Error for ArtifactError {}

impl Display for ArtifactError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArtifactError::Missing => "artifact not found".fmt(fmt),
            ArtifactError::Empty => "artifact is empty".fmt(fmt),
            ArtifactError::Read(e) => write!(fmt, "artifact unreadable: {}", e),
        }
    }
}

/// Read the rendered dashboard left behind by the collector
pub async fn read_artifact(path: &Path) -> Result<String, ArtifactError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.is_empty() => Err(ArtifactError::Empty),
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ArtifactError::Missing),
        Err(e) => Err(ArtifactError::Read(e)),
    }
}

/// Something that runs one data collection and reports how it ended
#[async_trait]
pub trait Collector: Send + Sync {
    /// Run the collection to completion
    ///
    /// # Returns
    /// - `Ok(Completion)` - The process terminated, successfully or not
    /// - `Err(CollectorError)` - The process could not be run or awaited
    async fn collect(&self) -> Result<Completion, CollectorError>;
}

/// Runs the collector as a child process
pub struct CommandCollector {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandCollector {
    /// `argv` is the program followed by its arguments
    pub fn new(argv: Vec<String>) -> Self {
        let mut argv = argv.into_iter();
        Self {
            program: argv.next().unwrap_or_default(),
            args: argv.collect(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Collector for CommandCollector {
    async fn collect(&self) -> Result<Completion, CollectorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // dropping the wait future on timeout kills the child
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!("Spawning collector: {} {:?}", self.program, self.args);
        let child = cmd.spawn().map_err(CollectorError::Spawn)?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CollectorError::TimedOut(limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(CollectorError::Wait)?;

        Ok(Completion {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
impl Completion {
    pub(crate) fn succeeded() -> Self {
        Self {
            success: true,
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub(crate) fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
        }
    }
}
