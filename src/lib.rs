pub mod config;
pub mod crypto;
pub mod errors;
pub mod storage;
pub mod vault;

pub use errors::{Result, StorageError};
pub use storage::Storage;
