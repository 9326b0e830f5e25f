use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("bad archive format tag {0:#04x}")]
    BadFormatTag(u8),

    #[error("bad game magic {byte:#04x} at offset {offset}")]
    BadGameMagic { offset: u64, byte: u8 },

    #[error("bad game result {result} at offset {offset}")]
    BadResult { offset: u64, result: i8 },

    #[error("move field {field} at offset {offset} is not a board position")]
    BadMove { offset: u64, field: i16 },

    #[error("capture position {position} at offset {offset} is off the board")]
    BadCapture { offset: u64, position: u16 },

    #[error("archive truncated at offset {offset} while reading {field}")]
    Truncated { offset: u64, field: &'static str },

    #[error("game cannot be written: {0}")]
    Unwritable(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// True for errors caused by the contents of the archive, as opposed to the
    /// underlying reader failing.
    pub fn is_format(&self) -> bool {
        !matches!(self, ArchiveError::Io(_) | ArchiveError::Unwritable(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, ArchiveError::Truncated { .. })
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("board size {0} must be between {min} and {max}", min = go::MIN_BOARD_SIZE, max = go::MAX_BOARD_SIZE)]
    InvalidBoardSize(usize),

    #[error("history steps {0} must be between 1 and {max}", max = crate::options::MAX_HISTORY_STEPS)]
    InvalidHistorySteps(usize),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("channel capacity must be at least 1")]
    InvalidChannelCapacity,

    #[error("sample fraction {0} must be in (0, 1]")]
    InvalidSampleFraction(f32),

    #[error("unknown decode error policy {0:?}")]
    InvalidDecodeErrorPolicy(String),

    #[error("no archive sources were provided")]
    NoSources,
}

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("record is {actual} bytes but {expected} were expected")]
    BadLength { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to decode {path:?}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("worker {worker} completed a pass without producing any examples")]
    NoExamples { worker: usize },

    #[error("worker {0} stopped")]
    WorkerStopped(usize),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
