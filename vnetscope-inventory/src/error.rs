use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Malformed {resource_type} record: {reason}")]
    MalformedResource {
        resource_type: String,
        reason: String,
    },

    #[error("Invalid snapshot document: {0}")]
    InvalidDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    pub fn malformed(resource_type: impl Into<String>, reason: impl Into<String>) -> Self {
        InventoryError::MalformedResource {
            resource_type: resource_type.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
