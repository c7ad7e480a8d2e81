use crate::ElevationProvider;
use altimetry::ElevationSample;
use geo::geometry::Coord;
use log::{debug, warn};
use rayon::prelude::*;

/// Queries every provider for the elevation at `coord`, in parallel.
///
/// Samples are returned in the same order as `providers`. A provider
/// which errors yields an absent sample rather than failing the
/// survey.
pub fn survey<P>(providers: &[P], coord: Coord<f64>) -> Vec<ElevationSample>
where
    P: ElevationProvider,
{
    providers
        .par_iter()
        .map(|provider| {
            let elevation_m = match provider.elevation(coord) {
                Ok(elevation_m) => elevation_m,
                Err(e) => {
                    warn!("{} failed for {coord:?}: {e}", provider.id());
                    None
                }
            };
            debug!("{}: {elevation_m:?}", provider.id());
            ElevationSample::new(provider.id(), elevation_m)
        })
        .collect()
}
