use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::elf::SymbolTable;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`], one per failure stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A bad option value, detected before any file is touched
    Configuration,
    /// The input path could not be opened or read
    FileOpen,
    /// The input is not an ELF file, or lacks the requested table
    Format,
    /// The output destination could not be created or written
    Output,
}

/// Error type for listing libraries and symbols.
///
/// Messages name the failing path; the underlying cause is the error's
/// `source()`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown value for --demangle: {0}")]
    UnknownDemangleMode(String),

    #[error("unknown value for --table: {0}")]
    UnknownSymbolTable(String),

    /// Failed to open or map the input file
    #[error("open {}", path.display())]
    Open {
        path: PathBuf,
        source: io::Error,
    },

    /// The input file was opened but its contents could not be used
    #[error("{}", path.display())]
    Format {
        path: PathBuf,
        source: FormatError,
    },

    /// Failed to create the output file
    #[error("create {}", path.display())]
    CreateOutput {
        path: PathBuf,
        source: io::Error,
    },

    #[error("write output")]
    Write(#[from] io::Error),

    #[error("write output")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownDemangleMode(_) | Error::UnknownSymbolTable(_) => ErrorKind::Configuration,
            Error::Open { .. } => ErrorKind::FileOpen,
            Error::Format { .. } => ErrorKind::Format,
            Error::CreateOutput { .. } | Error::Write(_) | Error::Json(_) => ErrorKind::Output,
        }
    }
}

/// Reasons an opened file can not be listed
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not an ELF file")]
    NotElf,

    #[error("no symbol section")]
    NoSymbols(SymbolTable),

    #[error("invalid string table offset {0:#x}")]
    BadStringOffset(u64),

    #[error(transparent)]
    Object(#[from] object::read::Error),
}
