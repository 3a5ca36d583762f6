use thiserror::Error;

pub type Result<T> = std::result::Result<T, RootError>;

#[derive(Debug, Error)]
pub enum RootError {
    #[error("not a ROOT file (bad magic)")]
    BadMagic,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer underflow at offset {offset}: need {need} bytes, have {have}")]
    BufferUnderflow {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("object not found: {0}")]
    KeyNotFound(String),
}
