use crate::{Backoff, TerrainError, Tiles};
use geo::geometry::Coord;
use log::warn;
use std::{thread, time::Duration};

/// First delay between retries unless configured otherwise.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Longest delay between retries unless configured otherwise.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(2);

/// A source of terrain elevation, in meters above sea level.
pub trait ElevationProvider: Send + Sync {
    /// Name this source's samples are reported under.
    fn id(&self) -> &str;

    /// Returns the terrain elevation at `coord`.
    ///
    /// `Ok(None)` means the source works but has no data for
    /// `coord`.
    fn elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, TerrainError>;
}

impl<P: ElevationProvider + ?Sized> ElevationProvider for Box<P> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, TerrainError> {
        (**self).elevation(coord)
    }
}

/// Elevation from a directory of `.hgt` tiles.
pub struct TileProvider {
    id: String,
    tiles: Tiles,
}

impl TileProvider {
    pub fn new(id: impl Into<String>, tiles: Tiles) -> Self {
        Self {
            id: id.into(),
            tiles,
        }
    }
}

impl ElevationProvider for TileProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, TerrainError> {
        Ok(self
            .tiles
            .get(coord)?
            .and_then(|tile| tile.elevation(coord))
            .map(f64::from))
    }
}

/// Retries a provider which reports errors, backing off between
/// attempts.
///
/// Only errors are retried; a successful "no data" answer is final.
pub struct Retry<P> {
    inner: P,
    attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl<P: ElevationProvider> Retry<P> {
    /// Wraps `inner`, trying it up to `attempts` times (at least
    /// once).
    pub fn new(inner: P, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }

    /// Sets the first delay between attempts and the cap it doubles
    /// up to.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }
}

impl<P: ElevationProvider> ElevationProvider for Retry<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, TerrainError> {
        let mut backoff = Backoff::new(self.backoff_base, self.backoff_max);
        let mut attempt = 1;
        loop {
            match self.inner.elevation(coord) {
                Err(e) if attempt < self.attempts => {
                    let delay = backoff.fail();
                    warn!(
                        "{} attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                        self.id(),
                        self.attempts
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                res => return res,
            }
        }
    }
}
