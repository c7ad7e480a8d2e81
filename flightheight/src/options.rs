use altimetry::{CalibrationChoice, GsdCalibration, OrthomosaicResolution};
use anyhow::{anyhow, Error as AnyError};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, str::FromStr};
use terrain::geo::geometry::Coord;

/// Estimate drone flight height above terrain.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Named directory of elevation tiles, as "name=dir". Repeat for
    /// multiple terrain sources.
    #[arg(short, long = "tile-source")]
    pub tile_sources: Vec<NamedDir>,

    /// Load tiles into memory instead of memory mapping them.
    #[arg(long, default_value_t = false)]
    pub in_mem: bool,

    /// Attempts per terrain source before it is reported unavailable.
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,

    /// First delay between attempts, in milliseconds. Doubles after
    /// every failed attempt.
    #[arg(long, default_value_t = 100)]
    pub backoff_ms: u64,

    /// Longest delay between attempts, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub backoff_max_ms: u64,

    /// JSON file of drone calibrations to use instead of the built-in
    /// table.
    #[arg(long)]
    pub calibrations: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Reconcile GPS altitude against terrain elevation, recalculating
    /// if the result is below terrain.
    Estimate(Estimate),

    /// Flight height from an orthomosaic's ground sample distance.
    Gsd(Gsd),

    /// List drone calibrations.
    Presets,
}

#[derive(Debug, Clone, Args)]
pub struct Estimate {
    /// Camera position "lat,lon,alt", where 'alt' is GPS altitude in
    /// meters above sea level.
    #[arg(long, allow_hyphen_values = true)]
    pub at: LatLonAlt,

    #[command(flatten)]
    pub resolution: ResolutionArgs,

    #[command(flatten)]
    pub calibration: CalibrationArgs,

    /// Flight height to accept, in meters, should the estimate be
    /// below terrain or unavailable.
    #[arg(long = "override", allow_hyphen_values = true)]
    pub override_m: Option<f64>,
}

#[derive(Debug, Clone, Args)]
pub struct Gsd {
    #[command(flatten)]
    pub resolution: ResolutionArgs,

    #[command(flatten)]
    pub calibration: CalibrationArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ResolutionArgs {
    /// Orthomosaic raster, georeferenced by GeoTIFF tags or a world
    /// file.
    #[arg(long, conflicts_with = "resolution")]
    pub ortho: Option<PathBuf>,

    /// Orthomosaic resolution, in meters per pixel.
    #[arg(long, allow_hyphen_values = true)]
    pub resolution: Option<f64>,
}

impl ResolutionArgs {
    /// Reads or validates the orthomosaic resolution, if one was
    /// given.
    pub fn resolve(&self) -> Result<Option<OrthomosaicResolution>, AnyError> {
        match (&self.ortho, self.resolution) {
            (Some(path), _) => Ok(Some(ortho::read_resolution(path)?)),
            (None, Some(m_per_px)) => Ok(Some(OrthomosaicResolution::new(m_per_px)?)),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct CalibrationArgs {
    /// Drone model from the calibration table.
    #[arg(long, conflicts_with_all = ["ref_alt", "ref_gsd"])]
    pub drone: Option<String>,

    /// Manual calibration reference altitude, in meters.
    #[arg(long, requires = "ref_gsd", allow_hyphen_values = true)]
    pub ref_alt: Option<f64>,

    /// Manual calibration reference GSD, in cm/px.
    #[arg(long, requires = "ref_alt", allow_hyphen_values = true)]
    pub ref_gsd: Option<f64>,
}

impl CalibrationArgs {
    pub fn choice(&self) -> Option<CalibrationChoice> {
        match (&self.drone, self.ref_alt, self.ref_gsd) {
            (Some(model), _, _) => Some(CalibrationChoice::Preset(model.clone())),
            (None, Some(alt), Some(gsd)) => {
                Some(CalibrationChoice::Manual(GsdCalibration::new(alt, gsd)))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Copy)]
pub struct LatLonAlt(pub Coord<f64>, pub f64);

impl FromStr for LatLonAlt {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let mk_err = || anyhow!("not a valid lat,lon,alt");
        let mut parts = s.split(',');
        let (Some(lat_str), Some(lon_str), Some(alt_str), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(mk_err());
        };
        let lat = f64::from_str(lat_str.trim())?;
        let lon = f64::from_str(lon_str.trim())?;
        let alt = f64::from_str(alt_str.trim())?;
        Ok(Self(Coord { y: lat, x: lon }, alt))
    }
}

/// A terrain source name and its tile directory.
#[derive(Clone, Debug)]
pub struct NamedDir {
    pub name: String,
    pub dir: PathBuf,
}

impl FromStr for NamedDir {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (name, dir) = s
            .split_once('=')
            .filter(|(name, dir)| !name.is_empty() && !dir.is_empty())
            .ok_or_else(|| anyhow!("not a valid name=dir"))?;
        Ok(Self {
            name: name.to_owned(),
            dir: PathBuf::from(dir),
        })
    }
}
