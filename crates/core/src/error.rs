use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("checksum mismatch: stored queue envelope is corrupt")]
    ChecksumMismatch,

    #[error("unsupported queue format version: {0}")]
    UnsupportedVersion(u32),
}
