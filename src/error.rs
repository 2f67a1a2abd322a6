use crate::response::Status;
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;

/// Fatal engine errors. No partial results accompany any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DedupError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unable to construct scorer: {0}")]
    ScorerInit(String),
    #[error("detection cancelled after {processed} of {total} batches")]
    Cancelled { processed: usize, total: usize },
}

/// Failure while scoring a single pair; the pair is dropped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("comparison string of {len} chars exceeds the limit of {max}")]
    TooLong { len: usize, max: usize },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceError {
    pub msg: String,
    pub status: Status,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

impl error::Error for ServiceError {}

impl ServiceError {
    pub fn bad_request<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::BadRequest,
        }
    }

    pub fn internal_server_error<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::InternalServerError,
        }
    }

    pub fn gateway_timeout<T: std::fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::GatewayTimeout,
        }
    }
}

impl From<DedupError> for ServiceError {
    fn from(err: DedupError) -> Self {
        match err {
            DedupError::InvalidInput(_) | DedupError::ScorerInit(_) => {
                ServiceError::bad_request(err)
            }
            DedupError::Cancelled { .. } => ServiceError::gateway_timeout(err),
        }
    }
}
