//! SRTM/NASADEM elevation (`.hgt`) tiles.
//!
//! A tile covers one degree of latitude and longitude and is named
//! after its southwest corner, e.g. `N44W072.hgt`. Samples are
//! big-endian `i16` meters above sea level, stored in rows from north
//! to south, each row from west to east. Adjacent tiles share their
//! edge rows and columns.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::HgtError;
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

/// Base floating point type used for coordinates.
pub type C = f64;

/// Sample value marking a data void.
pub const VOID: i16 = i16::MIN;

const ARCSEC_PER_DEG: C = 3600.0;

pub struct Tile {
    /// Southwest corner of the tile.
    ///
    /// Specifically, the _center_ of the SW most sample of the tile.
    sw_corner: Coord<i16>,

    /// Arcseconds per sample.
    resolution: u8,

    /// Number of rows, which is also the number of columns.
    side: usize,

    /// Elevation samples.
    samples: SampleStore,
}

enum SampleStore {
    InMem(Box<[i16]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get(&self, index: usize) -> i16 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<i16>();
                i16::from_be_bytes([raw[start], raw[start + 1]])
            }
        }
    }
}

impl Tile {
    /// Returns a Tile read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HgtError> {
        let (resolution, side) = extract_resolution(&path)?;
        let sw_corner = parse_sw_corner(&path)?;

        let mut file = BufReader::new(File::open(path)?);
        let mut samples = Vec::with_capacity(side * side);
        for _ in 0..(side * side) {
            samples.push(file.read_i16::<BE>()?);
        }

        Ok(Self {
            sw_corner,
            resolution,
            side,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a Tile using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, HgtError> {
        let (resolution, side) = extract_resolution(&path)?;
        let sw_corner = parse_sw_corner(&path)?;

        let file = File::open(path)?;
        // Safety: tiles are treated as read-only data; the map is
        // only invalidated if the file is truncated underneath us.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            sw_corner,
            resolution,
            side,
            samples: SampleStore::MemMap(mmap),
        })
    }

    /// Returns this tile's southwest corner in whole degrees.
    pub fn sw_corner(&self) -> Coord<i16> {
        self.sw_corner
    }

    /// Returns this tile's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.side * self.side
    }

    /// Returns the raw sample nearest to `coord`, or `None` if `coord`
    /// lies outside this tile.
    pub fn get(&self, coord: Coord<C>) -> Option<i16> {
        let (col, row) = self.coord_to_xy(coord)?;
        Some(self.samples.get(self.xy_to_linear_index((col, row))))
    }

    /// Returns the elevation nearest to `coord`, in meters, or `None`
    /// if `coord` lies outside this tile or the sample is void.
    pub fn elevation(&self, coord: Coord<C>) -> Option<i16> {
        self.get(coord).filter(|&sample| sample != VOID)
    }
}

/// Private API
impl Tile {
    fn samples_per_deg(&self) -> C {
        ARCSEC_PER_DEG / C::from(self.resolution)
    }

    /// Returns (column from west, row from south) of the sample
    /// nearest to `coord`.
    fn coord_to_xy(&self, coord: Coord<C>) -> Option<(usize, usize)> {
        let spd = self.samples_per_deg();
        let x = ((coord.x - C::from(self.sw_corner.x)) * spd).round();
        let y = ((coord.y - C::from(self.sw_corner.y)) * spd).round();
        #[allow(clippy::cast_precision_loss)]
        let max = (self.side - 1) as C;
        if (0.0..=max).contains(&x) && (0.0..=max).contains(&y) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some((x as usize, y as usize))
        } else {
            None
        }
    }

    fn xy_to_linear_index(&self, (x, y): (usize, usize)) -> usize {
        self.side * (self.side - y - 1) + x
    }
}

fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, usize), HgtError> {
    const RES_1_ARCSECONDS_FILE_LEN: u64 = 3601 * 3601 * size_of::<i16>() as u64;
    const RES_3_ARCSECONDS_FILE_LEN: u64 = 1201 * 1201 * size_of::<i16>() as u64;
    match path.as_ref().metadata().map(|m| m.len())? {
        RES_1_ARCSECONDS_FILE_LEN => Ok((1, 3601)),
        RES_3_ARCSECONDS_FILE_LEN => Ok((3, 1201)),
        invalid_len => Err(HgtError::Len(invalid_len, path.as_ref().to_owned())),
    }
}

fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, HgtError> {
    let mk_err = || HgtError::Name(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(mk_err)?;
    if name.len() != 7 || !name.is_ascii() {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" | "n" => 1,
        "S" | "s" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" | "e" => 1,
        "W" | "w" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}
