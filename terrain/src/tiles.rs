//! On-demand `.hgt` tile cache.

use crate::TerrainError;
use dashmap::DashMap;
use geo::geometry::Coord;
use hgt::{HgtError, Tile};
use log::debug;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Floating point type used for tile lookup.
pub type C = f64;

pub struct Tiles {
    /// Directory containing HGT tile files.
    tile_dir: PathBuf,

    /// How to load tiles (in-memory or mapped).
    tile_mode: TileMode,

    /// Tiles which have been loaded on demand.
    ///
    /// `None` records that a tile is not on disk, so we don't go
    /// looking for it again.
    tiles: DashMap<Coord<i16>, Option<Arc<Tile>>>,
}

impl Tiles {
    pub fn new(tile_dir: PathBuf, tile_mode: TileMode) -> Result<Self, TerrainError> {
        let mut has_height_files = false;

        // Let's try to fail early be checking that tile_dir has at
        // least one `hgt` file.
        for entry in std::fs::read_dir(&tile_dir)? {
            let path = entry?.path();
            let is_hgt = path
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("hgt"));
            if is_hgt {
                has_height_files = true;
                break;
            }
        }

        if has_height_files {
            Ok(Self {
                tile_dir,
                tile_mode,
                tiles: DashMap::new(),
            })
        } else {
            Err(TerrainError::Path(tile_dir))
        }
    }

    pub fn tile_dir(&self) -> &Path {
        &self.tile_dir
    }

    /// Returns the tile containing `coord`, if there is one on disk.
    ///
    /// `Tiles` will attempt to fetch the tile from disk if it doesn't
    /// already have it in memory.
    pub fn get(&self, coord: Coord<C>) -> Result<Option<Arc<Tile>>, TerrainError> {
        let sw_corner = sw_corner(coord);
        self.tiles
            .entry(sw_corner)
            .or_try_insert_with(|| match self.load_tile(sw_corner) {
                Ok(tile) => Ok(Some(Arc::new(tile))),
                Err(TerrainError::Hgt(HgtError::Io(e))) if e.kind() == ErrorKind::NotFound => {
                    debug!("no tile on disk for {sw_corner:?}");
                    Ok(None)
                }
                Err(e) => Err(e),
            })
            .map(|r| r.clone())
    }
}

/// Private API.
impl Tiles {
    fn load_tile(&self, sw_corner: Coord<i16>) -> Result<Tile, TerrainError> {
        let tile_path = {
            let file_name = file_name(sw_corner);
            let mut tile_path = self.tile_dir.join(&file_name);
            if !tile_path.exists() {
                tile_path = self.tile_dir.join(file_name.to_lowercase());
            }
            tile_path
        };
        debug!("loading {tile_path:?}");
        match self.tile_mode {
            TileMode::InMem => Ok(Tile::load(tile_path)?),
            TileMode::MemMap => Ok(Tile::memmap(tile_path)?),
        }
    }
}

/// How to handle tile.
///
/// The trade off between loading tile data into memory versus memory
/// mapping is not obvious, and you should measure both before
/// deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    /// Parse tile and load into memory.
    InMem,

    /// Memory map file contents.
    MemMap,
}

/// Returns the southwest corner as integers for coord.
fn sw_corner(Coord { x, y }: Coord<C>) -> Coord<i16> {
    #[allow(clippy::cast_possible_truncation)]
    Coord {
        x: (x.floor() as i16),
        y: (y.floor() as i16),
    }
}

/// Returns the expected file name for coord
fn file_name(Coord { x, y }: Coord<i16>) -> String {
    let n_s = if y.is_negative() { 'S' } else { 'N' };
    let e_w = if x.is_negative() { 'W' } else { 'E' };
    format!("{n_s}{:02}{e_w}{:03}.hgt", y.abs(), x.abs())
}
