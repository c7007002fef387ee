use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
    // Malformed control transfers
    CallTargetCount { block: String, count: usize },
    JumpLabelCount { block: String, count: usize },
    BranchLabelCount { block: String, count: usize },
    UnknownBlock(String),
    DuplicateBlock(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(path, e) => write!(f, "cannot access `{}': {}", path.display(), e),
            Error::Json(e) => write!(f, "malformed program: {}", e),
            Error::CallTargetCount { block, count } => write!(
                f,
                "call in block `{}' names {} functions, exactly one is required",
                block, count
            ),
            Error::JumpLabelCount { block, count } => write!(
                f,
                "jump in block `{}' has {} labels, exactly one is required",
                block, count
            ),
            Error::BranchLabelCount { block, count } => write!(
                f,
                "branch in block `{}' has {} labels, exactly two are required",
                block, count
            ),
            Error::UnknownBlock(name) => write!(f, "no such block: `{}'", name),
            Error::DuplicateBlock(name) => write!(f, "block `{}' is defined twice", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(_, e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}
