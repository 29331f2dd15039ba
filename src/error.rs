use thiserror::Error;

/// Control-surface errors. Data events never produce errors: malformed or
/// degenerate samples are dropped and the previous state is retained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Tracker already tracking")]
    AlreadyTracking,

    #[error("Tracker not tracking")]
    NotTracking,
}

pub type TrackerResult<T> = Result<T, TrackerError>;
