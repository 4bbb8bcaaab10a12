use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid scheduler entry {0:?} (expected: <instance>|<address>)")]
    InvalidSchedulerEntry(String),

    #[error("scheduler entry for instance {0:?} has an empty address")]
    EmptySchedulerAddress(String),

    #[error("must supply both cert file and key file if using TLS (missing {0})")]
    IncompleteTls(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;
