use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Every slot of the execution pool is taken; the submission was not accepted.
    #[error("execution pool saturated ({in_use}/{capacity} slots in use)")]
    Saturated { in_use: usize, capacity: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}
