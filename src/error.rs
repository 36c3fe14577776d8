use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stale tag for job {job_id}, fetch the job again and retry")]
    ConcurrencyConflict { job_id: usize },

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Jobs still running ({running}), reset requires force")]
    Busy { running: usize },

    #[error("No hosts allocated")]
    NoHosts,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    pub fn job_not_found(job_id: usize) -> Self {
        ReplayError::NotFound(format!("job {job_id}"))
    }

    pub fn slice_not_found(slice_id: usize) -> Self {
        ReplayError::NotFound(format!("slice {slice_id}"))
    }
}
