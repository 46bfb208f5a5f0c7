use thiserror::Error;
use vnetscope_inventory::InventoryError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
