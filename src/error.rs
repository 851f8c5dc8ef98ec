use crate::domain::contract::{ContractId, ContractStatus};
use crate::domain::organization::OrganizationId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PactError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Organization {0} not found")]
    OrganizationNotFound(OrganizationId),
    #[error("Contract {0} not found")]
    ContractNotFound(ContractId),
    #[error("Transactions unavailable: {0}")]
    FeedUnavailable(String),
    #[error("Contract {id} changed concurrently: expected {expected:?}, found {found:?}")]
    Conflict {
        id: ContractId,
        expected: ContractStatus,
        found: ContractStatus,
    },
    #[error("Contract {id} already charged under {existing}; refusing second charge {attempted}")]
    DuplicateCharge {
        id: ContractId,
        existing: String,
        attempted: String,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

impl PactError {
    /// True when the error means the evaluation could not run at all, as
    /// opposed to running and finding something wrong.
    pub fn is_unevaluated(&self) -> bool {
        matches!(self, PactError::FeedUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, PactError>;
