//! Orthomosaic ground resolution.
//!
//! An orthomosaic's pixel size comes from its affine geotransform,
//! found either in GeoTIFF tags embedded in the raster or in a
//! sidecar world file (`.tfw`, `.wld`, ...) next to it.
//!
//! # References
//!
//! 1. [GeoTIFF format specification](https://docs.ogc.org/is/19-008r4/19-008r4.html)
//! 1. [World file](https://en.wikipedia.org/wiki/World_file)

mod error;

pub use crate::error::OrthoError;
use altimetry::OrthomosaicResolution;
use log::debug;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tiff::{decoder::Decoder, tags::Tag};

/// `GTModelTypeGeoKey`
const MODEL_TYPE_GEO_KEY: u32 = 1024;

/// `ModelTypeGeographic`
const MODEL_TYPE_GEOGRAPHIC: u32 = 2;

/// Affine pixel to world transform.
///
/// Coefficients are in GDAL order:
///
/// ```text
/// x = gt[0] + col * gt[1] + row * gt[2]
/// y = gt[3] + col * gt[4] + row * gt[5]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Builds a transform from GeoTIFF `ModelPixelScaleTag` and,
    /// optionally, the first `ModelTiepointTag` entry.
    pub fn from_pixel_scale(scale: &[f64], tiepoint: Option<&[f64]>) -> Result<Self, OrthoError> {
        let [sx, sy, ..] = scale else {
            return Err(OrthoError::Transform("ModelPixelScaleTag"));
        };
        let (ox, oy) = match tiepoint {
            Some([i, j, _k, x, y, ..]) => (x - i * sx, y + j * sy),
            Some(_) => return Err(OrthoError::Transform("ModelTiepointTag")),
            None => (0.0, 0.0),
        };
        Ok(Self([ox, *sx, 0.0, oy, 0.0, -sy]))
    }

    /// Builds a transform from a row-major 4x4 GeoTIFF
    /// `ModelTransformationTag`.
    pub fn from_model_transformation(matrix: &[f64]) -> Result<Self, OrthoError> {
        if matrix.len() < 16 {
            return Err(OrthoError::Transform("ModelTransformationTag"));
        }
        let m = matrix;
        Ok(Self([m[3], m[0], m[1], m[7], m[4], m[5]]))
    }

    /// Parses the six lines of a world file.
    ///
    /// World files list the coefficients as `A D B E C F`, where
    /// `(C, F)` is the center of the upper left pixel.
    pub fn from_world_file(text: &str) -> Result<Self, OrthoError> {
        let mk_err = || OrthoError::Transform("world file");
        let [a, d, b, e, c, f]: [f64; 6] = text
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| mk_err())?
            .try_into()
            .map_err(|_| mk_err())?;
        // Shift from pixel center to pixel corner.
        let ox = c - 0.5 * a - 0.5 * b;
        let oy = f - 0.5 * d - 0.5 * e;
        Ok(Self([ox, a, b, oy, d, e]))
    }

    /// Returns the ground size of one pixel along the raster's x and y
    /// axes, in CRS units.
    pub fn pixel_size(&self) -> (f64, f64) {
        let gt = &self.0;
        (gt[1].hypot(gt[4]), gt[2].hypot(gt[5]))
    }

    /// Returns the mean of both axis pixel sizes.
    pub fn resolution(&self) -> Result<OrthomosaicResolution, OrthoError> {
        let (x, y) = self.pixel_size();
        Ok(OrthomosaicResolution::from_axes(x, y)?)
    }
}

/// Reads the geotransform for the raster at `path`.
///
/// Embedded GeoTIFF tags take precedence over a sidecar world file.
pub fn read_geotransform<P: AsRef<Path>>(path: P) -> Result<GeoTransform, OrthoError> {
    let path = path.as_ref();
    let from_tags = match read_geotiff_tags(path) {
        Ok(Some(gt)) => {
            debug!("{path:?}: geotransform from GeoTIFF tags {gt:?}");
            return Ok(gt);
        }
        Err(e @ (OrthoError::Io(_) | OrthoError::Geographic(_))) => return Err(e),
        Err(e) => {
            debug!("{path:?}: not readable as GeoTIFF: {e}");
            Err(e)
        }
        Ok(None) => Ok(()),
    };

    if let Some(world_file) = find_world_file(path) {
        debug!("{path:?}: geotransform from {world_file:?}");
        let text = std::fs::read_to_string(world_file)?;
        return GeoTransform::from_world_file(&text);
    }

    match from_tags {
        Err(e) => Err(e),
        Ok(()) => Err(OrthoError::Georeference(path.to_owned())),
    }
}

/// Reads the ground resolution of the raster at `path`.
pub fn read_resolution<P: AsRef<Path>>(path: P) -> Result<OrthomosaicResolution, OrthoError> {
    read_geotransform(path)?.resolution()
}

fn read_geotiff_tags(path: &Path) -> Result<Option<GeoTransform>, OrthoError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    if let Some(keys) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        if geo_key(&keys.into_u32_vec()?, MODEL_TYPE_GEO_KEY) == Some(MODEL_TYPE_GEOGRAPHIC) {
            return Err(OrthoError::Geographic(path.to_owned()));
        }
    }

    if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        return GeoTransform::from_model_transformation(&matrix.into_f64_vec()?).map(Some);
    }

    if let Some(scale) = decoder.find_tag(Tag::ModelPixelScaleTag)? {
        let tiepoint = decoder
            .find_tag(Tag::ModelTiepointTag)?
            .map(|tiepoint| tiepoint.into_f64_vec())
            .transpose()?;
        return GeoTransform::from_pixel_scale(&scale.into_f64_vec()?, tiepoint.as_deref())
            .map(Some);
    }

    Ok(None)
}

/// Returns the value of a GeoKey stored directly in the key directory.
fn geo_key(directory: &[u32], key_id: u32) -> Option<u32> {
    // Header is (version, revision, minor revision, number of keys),
    // followed by (key id, tag location, count, value) entries.
    directory
        .get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key_id && entry[1] == 0)
        .map(|entry| entry[3])
}

/// Returns the path of a world file next to `path`, if one exists.
fn find_world_file(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?;
    let mut candidates = Vec::new();
    if let (Some(first), Some(last)) = (ext.chars().next(), ext.chars().last()) {
        candidates.push(format!("{first}{last}w"));
    }
    candidates.push(format!("{ext}w"));
    candidates.push("wld".to_owned());

    candidates
        .iter()
        .flat_map(|candidate| [candidate.to_lowercase(), candidate.to_uppercase()])
        .map(|candidate| path.with_extension(candidate))
        .find(|candidate| candidate.is_file())
}
