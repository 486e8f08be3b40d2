//! Error types for Larder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shopping list {0} is already completed")]
    AlreadyCompleted(String),

    #[error("Receipt {receipt_id} is already linked to list {list_id}")]
    AlreadyLinked { receipt_id: String, list_id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Remote call {operation} failed: {message}")]
    RemoteCall { operation: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Wrap a failed external call, keeping remote failures as they are
    pub fn remote(operation: &str, err: Error) -> Self {
        match err {
            Error::RemoteCall { .. } => err,
            other => Error::RemoteCall {
                operation: operation.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether the error came from an external collaborator rather than local validation
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::RemoteCall { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_wraps_other_errors() {
        let err = Error::remote("restock_pantry_item", Error::NotFound("p1".to_string()));
        match err {
            Error::RemoteCall { operation, message } => {
                assert_eq!(operation, "restock_pantry_item");
                assert!(message.contains("p1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_remote_keeps_existing_remote_error() {
        let inner = Error::RemoteCall {
            operation: "link_receipt_to_list".to_string(),
            message: "offline".to_string(),
        };
        let err = Error::remote("complete_shopping_list", inner);
        assert!(err.is_remote());
        assert!(err.to_string().contains("link_receipt_to_list"));
    }
}
