// Error types for generation, scheduling, and configuration.
//
// Search results are deliberately absent: "no path" and "budget exhausted"
// are ordinary outcomes of a search and live in `pathfinding::SearchOutcome`.
// Only conditions a caller must react to as failures are errors here.
//
// See also: `scheduler.rs` which retries `GenerationError`s and surfaces
// `ScheduleError::ChunkPermanentlyFailed` once the retry budget is spent.

use crate::generator::GenerationRegion;
use crate::types::ChunkCoord;
use thiserror::Error;

/// A generator failed to populate a region.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GenerationError {
    #[error("generation of region {region} failed: {reason}")]
    Failed {
        region: GenerationRegion,
        reason: String,
    },
    #[error("generator panicked: {reason}")]
    Panicked { reason: String },
}

impl GenerationError {
    pub fn failed(region: &GenerationRegion, reason: impl Into<String>) -> Self {
        Self::Failed {
            region: *region,
            reason: reason.into(),
        }
    }
}

/// Failures surfaced by the chunk scheduler to the original requester.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ScheduleError {
    /// The request was malformed and was rejected before dispatch. Never
    /// retried.
    #[error("invalid generation region: {reason}")]
    InvalidRegion { reason: String },
    /// Generation kept failing until the retry budget ran out.
    #[error("chunk {coord} failed permanently after {attempts} attempts: {last_error}")]
    ChunkPermanentlyFailed {
        coord: ChunkCoord,
        attempts: u32,
        last_error: GenerationError,
    },
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn chunk worker: {reason}")]
    WorkerSpawn { reason: String },
    /// The scheduler stopped before the chunk was generated.
    #[error("chunk scheduler shut down")]
    ShutDown,
    /// A one-shot generation outside the scheduler failed. The scheduler
    /// itself reports `ChunkPermanentlyFailed` instead.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Failures loading or validating a `StrataConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
