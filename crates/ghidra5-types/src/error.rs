use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to launch worker: {0}")]
    Launch(String),

    #[error("Restart budget exceeded: {0} restarts within {1}s window")]
    RestartBudget(u32, u64),

    #[error("Supervisor error: {0}")]
    Supervisor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SvcResult<T> = Result<T, SvcError>;
