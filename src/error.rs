use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open {}: {source}", path.display())]
    IndexOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid index format: {0}")]
    IndexFormat(String),

    #[error("bad index: {0}")]
    BadIndex(String),

    #[error("unknown contig: {0}")]
    UnknownContig(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("corrupt block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    #[error("invalid cursor: {0}")]
    InvalidCursor(&'static str),

    #[error("unsorted input: {0}")]
    UnsortedInput(String),

    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptBlock {
            offset,
            reason: reason.into(),
        }
    }

    /// Stable name of the error kind, suitable for machine-readable output
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::IndexOpen { .. } => "IndexOpenError",
            Error::IndexFormat(_) => "IndexFormatError",
            Error::BadIndex(_) => "BadIndex",
            Error::UnknownContig(_) => "UnknownContig",
            Error::InvalidRegion(_) => "InvalidRegion",
            Error::CorruptBlock { .. } => "CorruptBlock",
            Error::InvalidCursor(_) => "InvalidCursor",
            Error::UnsortedInput(_) => "UnsortedInput",
            Error::InvalidRecord { .. } => "InvalidRecord",
            Error::Io(_) => "IoError",
        }
    }

    /// Process exit code used by the command-line front end
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::IndexOpen { .. } | Error::Io(_) => 2,
            Error::IndexFormat(_) | Error::BadIndex(_) => 3,
            Error::UnknownContig(_) | Error::InvalidRegion(_) => 4,
            Error::CorruptBlock { .. } => 5,
            Error::UnsortedInput(_) | Error::InvalidRecord { .. } => 6,
            Error::InvalidCursor(_) => 70,
        }
    }
}
