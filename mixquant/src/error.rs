use std::path::PathBuf;

/// Errors that stop a quantification run.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("alignments are not sorted: {read} at {seqname}:{start} follows {prev_seqname}:{prev_start}")]
    Unsorted {
        read: String,
        seqname: String,
        start: u64,
        prev_seqname: String,
        prev_start: u64,
    },

    #[error("contig {0} is not in the alignment header")]
    UnknownContig(String),

    #[error("no reference sequence for contig {0}")]
    MissingReference(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build the worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("work queue closed before the producer finished")]
    QueueClosed,
}

impl QuantError {
    /// Wrap an `io::Error` with the path it came from.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for QuantError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

impl From<serde_json::Error> for QuantError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuantError>;
