use altimetry::AltimetryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrthoError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("no georeference found for {0}")]
    Georeference(PathBuf),

    #[error("malformed {0}")]
    Transform(&'static str),

    #[error("{0} uses a geographic coordinate system, pixel sizes are not in meters")]
    Geographic(PathBuf),

    #[error("{0}")]
    Altimetry(#[from] AltimetryError),
}
