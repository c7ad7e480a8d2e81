use hgt::HgtError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("no height files in {0}")]
    Path(PathBuf),

    #[error("{0}")]
    Hgt(#[from] HgtError),
}
