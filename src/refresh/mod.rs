use serde::Serialize;

pub mod collector;
pub mod coordinator;

pub use collector::{ArtifactError, Collector, CollectorError, CommandCollector, Completion};
pub use coordinator::RefreshCoordinator;

/// Outcome of the most recent refresh attempt
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttemptResult {
    /// No attempt has finished yet
    #[default]
    Unknown,
    Success,
    Failure,
}
