use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::hex::HexError;

/// Problems with the layout of the image itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("image is empty")]
    Empty,
    #[error("image length {len} is not a multiple of 4 bytes")]
    Misaligned { len: usize },
    #[error("aligned signed length {aligned:#x} does not fit in 16 bits")]
    SignedLenOverflow { aligned: u32 },
    #[error("word at byte offset {offset:#x} is past the end of the {len}-byte image")]
    OutOfBounds { offset: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum PatchError {
    /// Rendered usage message, printed as-is.
    #[error("{0}")]
    Usage(String),
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("{field} {value:?} is not valid hexadecimal")]
    Parse {
        field: &'static str,
        value: String,
        #[source]
        source: HexError,
    },
    #[error("malformed image")]
    Format(#[from] FormatError),
    #[error("cannot {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    /// Process exit status for this error. Usage problems and a missing
    /// input keep the historical status 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            PatchError::Usage(_) | PatchError::NotFound(_) => 2,
            PatchError::Parse { .. } | PatchError::Format(_) | PatchError::Io { .. } => 1,
        }
    }
}
