use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HgtError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid HGT name {0}")]
    Name(PathBuf),

    #[error("invalid HGT file len {0} for {1}")]
    Len(u64, PathBuf),
}
