use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeadAirError {
    #[error("dead-air supervisor already terminated for this call")]
    AlreadyTerminated,
}

pub type Result<T> = std::result::Result<T, DeadAirError>;
