use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("card id 0 is reserved for empty slots")]
    InvalidCardId,

    #[error("card name must not be empty")]
    EmptyName,

    #[error("card {0:#010X} is already registered")]
    AlreadyExists(u32),

    #[error("card {0:#010X} not found")]
    NotFound(u32),

    #[error("registry full: all {0} slots hold active cards")]
    RegistryFull(u16),

    #[error("timed out waiting for the registry lock")]
    LockTimeout,

    #[error("storage directory unavailable: {0}")]
    StorageUnavailable(PathBuf),

    #[error("render buffer too small: need {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure modes of loading the persisted registry.
///
/// Every variant except `Io` maps to a well-defined on-disk condition;
/// the startup path reacts to all of them by reseeding defaults.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("registry file not found")]
    FileAbsent,

    #[error("registry file has invalid size: {actual} bytes (expected {expected})")]
    InvalidSize { actual: u64, expected: u64 },

    #[error("stored capacity {stored} does not match compiled capacity {expected}")]
    CapacityMismatch { stored: u16, expected: u16 },

    #[error("stored active count {0} exceeds capacity")]
    InvalidCount(u16),

    #[error("registry file truncated mid-record")]
    Truncated,

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
