use crate::AltimetryError;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// One terrain elevation observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationSample {
    /// Name of the source which produced this sample.
    pub source_id: String,

    /// Terrain elevation above sea level, in meters.
    ///
    /// `None` if the source failed or has no data for the location.
    pub elevation_m: Option<f64>,
}

impl ElevationSample {
    pub fn new(source_id: impl Into<String>, elevation_m: Option<f64>) -> Self {
        Self {
            source_id: source_id.into(),
            elevation_m,
        }
    }

    /// Returns a sample for a source which did not respond.
    pub fn absent(source_id: impl Into<String>) -> Self {
        Self::new(source_id, None)
    }
}

/// Where a [`FlightAnalysis`]'s flight height came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// GPS altitude minus mean terrain elevation.
    Reconciled,

    /// Derived from an orthomosaic GSD ratio.
    Recalculated,

    /// Entered by hand.
    ManualOverride,
}

/// Flight height above terrain for a single image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightAnalysis {
    gps_altitude_m: f64,
    terrain_elevation_avg_m: Option<f64>,
    flight_height_m: Option<f64>,
    sources_used: usize,
    per_source_elevations: BTreeMap<String, Option<f64>>,
    provenance: Provenance,
}

impl FlightAnalysis {
    /// GPS altitude above sea level, in meters.
    pub fn gps_altitude_m(&self) -> f64 {
        self.gps_altitude_m
    }

    /// Mean of all responding terrain sources, `None` if none
    /// responded.
    pub fn terrain_elevation_avg_m(&self) -> Option<f64> {
        self.terrain_elevation_avg_m
    }

    /// Flight height above terrain, in meters.
    ///
    /// `None` means the height is not computable: no terrain source
    /// responded and no recalculation has taken place. A negative
    /// value is a legitimate (if suspect) result.
    pub fn flight_height_m(&self) -> Option<f64> {
        self.flight_height_m
    }

    /// Number of terrain sources which returned an elevation.
    pub fn sources_used(&self) -> usize {
        self.sources_used
    }

    /// Every queried source and what it returned.
    pub fn per_source_elevations(&self) -> &BTreeMap<String, Option<f64>> {
        &self.per_source_elevations
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// True if the flight height was derived from a GSD ratio.
    pub fn recalculated(&self) -> bool {
        self.provenance == Provenance::Recalculated
    }

    /// True if the flight height was entered by hand.
    pub fn manual_adjustment(&self) -> bool {
        self.provenance == Provenance::ManualOverride
    }

    /// Returns a copy of `self` with its flight height replaced.
    ///
    /// Terrain bookkeeping is carried over untouched so the original
    /// evidence stays visible next to the replacement value.
    pub(crate) fn with_flight_height(&self, flight_height_m: f64, provenance: Provenance) -> Self {
        Self {
            flight_height_m: Some(flight_height_m),
            provenance,
            ..self.clone()
        }
    }
}

/// Reconciles a GPS altitude against terrain elevation samples.
///
/// Absent samples are recorded but excluded from the mean. If no
/// sample is present the result has `sources_used == 0` and no
/// flight height.
///
/// # Errors
///
/// Fails if `gps_altitude_m` is not finite, or if two samples share
/// a `source_id`.
pub fn reconcile<I>(gps_altitude_m: f64, samples: I) -> Result<FlightAnalysis, AltimetryError>
where
    I: IntoIterator<Item = ElevationSample>,
{
    if !gps_altitude_m.is_finite() {
        return Err(AltimetryError::GpsAltitude(gps_altitude_m));
    }

    let mut per_source_elevations = BTreeMap::new();
    let mut present = Vec::new();

    for ElevationSample {
        source_id,
        elevation_m,
    } in samples
    {
        let elevation_m = match elevation_m {
            Some(elev) if !elev.is_finite() => {
                warn!("discarding non-finite elevation {elev} from {source_id}");
                None
            }
            other => other,
        };
        if per_source_elevations.contains_key(&source_id) {
            return Err(AltimetryError::DuplicateSource(source_id));
        }
        if let Some(elev) = elevation_m {
            present.push(elev);
        }
        per_source_elevations.insert(source_id, elevation_m);
    }

    let sources_used = present.len();
    let terrain_elevation_avg_m = mean(&mut present);
    let flight_height_m = terrain_elevation_avg_m.map(|terrain| gps_altitude_m - terrain);

    debug!(
        "reconciled gps altitude {gps_altitude_m} m against {sources_used}/{} sources: {flight_height_m:?}",
        per_source_elevations.len()
    );

    Ok(FlightAnalysis {
        gps_altitude_m,
        terrain_elevation_avg_m,
        flight_height_m,
        sources_used,
        per_source_elevations,
        provenance: Provenance::Reconciled,
    })
}

/// Arithmetic mean, or `None` for an empty slice.
///
/// Values are accumulated in ascending order so the result does not
/// depend on the order samples arrived in. The running mean never
/// exceeds the largest input, so finite inputs give a finite mean.
fn mean(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mut mean = 0.0;
    for (k, value) in values.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let count = (k + 1) as f64;
        mean += (value - mean) / count;
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::{reconcile, AltimetryError, ElevationSample, Provenance};
    use approx::assert_relative_eq;

    fn samples(raw: &[(&str, Option<f64>)]) -> Vec<ElevationSample> {
        raw.iter()
            .map(|(id, elev)| ElevationSample::new(*id, *elev))
            .collect()
    }

    #[test]
    fn test_two_sources() {
        let analysis = reconcile(250.0, samples(&[("A", Some(200.0)), ("B", Some(210.0))])).unwrap();
        assert_eq!(analysis.terrain_elevation_avg_m(), Some(205.0));
        assert_eq!(analysis.flight_height_m(), Some(45.0));
        assert_eq!(analysis.sources_used(), 2);
        assert_eq!(analysis.provenance(), Provenance::Reconciled);
        assert!(!analysis.recalculated());
        assert!(!analysis.manual_adjustment());
    }

    #[test]
    fn test_below_terrain_is_kept() {
        let analysis = reconcile(150.0, samples(&[("A", Some(200.0))])).unwrap();
        assert_eq!(analysis.flight_height_m(), Some(-50.0));
        assert_eq!(analysis.sources_used(), 1);
    }

    #[test]
    fn test_absent_samples_are_ignored() {
        let analysis = reconcile(
            300.0,
            samples(&[("A", Some(100.0)), ("B", None), ("C", Some(120.0)), ("D", None)]),
        )
        .unwrap();
        assert_eq!(analysis.sources_used(), 2);
        assert_eq!(analysis.terrain_elevation_avg_m(), Some(110.0));
        assert_eq!(analysis.flight_height_m(), Some(190.0));
        assert_eq!(analysis.per_source_elevations().len(), 4);
        assert_eq!(analysis.per_source_elevations()["B"], None);
        assert_eq!(analysis.per_source_elevations()["C"], Some(120.0));
    }

    #[test]
    fn test_no_sources_is_not_computable() {
        let analysis = reconcile(300.0, samples(&[("A", None), ("B", None)])).unwrap();
        assert_eq!(analysis.sources_used(), 0);
        assert_eq!(analysis.terrain_elevation_avg_m(), None);
        assert_eq!(analysis.flight_height_m(), None);

        let analysis = reconcile(300.0, Vec::new()).unwrap();
        assert_eq!(analysis.sources_used(), 0);
        assert_eq!(analysis.flight_height_m(), None);
        assert!(analysis.per_source_elevations().is_empty());
    }

    #[test]
    fn test_non_finite_elevation_is_absent() {
        let analysis = reconcile(
            100.0,
            samples(&[("A", Some(f64::NAN)), ("B", Some(40.0)), ("C", Some(f64::INFINITY))]),
        )
        .unwrap();
        assert_eq!(analysis.sources_used(), 1);
        assert_eq!(analysis.flight_height_m(), Some(60.0));
        assert_eq!(analysis.per_source_elevations()["A"], None);
    }

    #[test]
    fn test_order_independent() {
        let raw = [
            ("A", Some(1234.567)),
            ("B", Some(0.1)),
            ("C", None),
            ("D", Some(987.654_321)),
            ("E", Some(-12.75)),
            ("F", Some(333.333)),
        ];
        let forward = reconcile(1500.0, samples(&raw)).unwrap();
        let mut reversed_raw = raw;
        reversed_raw.reverse();
        let reversed = reconcile(1500.0, samples(&reversed_raw)).unwrap();
        let mut rotated_raw = raw;
        rotated_raw.rotate_left(2);
        let rotated = reconcile(1500.0, samples(&rotated_raw)).unwrap();

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);

        let expected_mean = (1234.567 + 0.1 + 987.654_321 - 12.75 + 333.333) / 5.0;
        let terrain = forward.terrain_elevation_avg_m().unwrap();
        assert_relative_eq!(terrain, expected_mean, epsilon = 1e-9);
        assert_relative_eq!(
            forward.flight_height_m().unwrap(),
            1500.0 - terrain,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_large_elevations_do_not_overflow() {
        let analysis = reconcile(
            0.0,
            samples(&[("A", Some(1e308)), ("B", Some(1e308)), ("C", Some(1.6e308))]),
        )
        .unwrap();
        let terrain = analysis.terrain_elevation_avg_m().unwrap();
        assert!(terrain.is_finite());
        assert_relative_eq!(terrain, 1.2e308, max_relative = 1e-12);
        assert_relative_eq!(analysis.flight_height_m().unwrap(), -1.2e308, max_relative = 1e-12);
    }

    #[test]
    fn test_rejects_non_finite_gps_altitude() {
        let raw = [("A", Some(10.0))];
        assert!(matches!(
            reconcile(f64::NAN, samples(&raw)),
            Err(AltimetryError::GpsAltitude(_))
        ));
        assert!(matches!(
            reconcile(f64::NEG_INFINITY, samples(&raw)),
            Err(AltimetryError::GpsAltitude(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_source() {
        let result = reconcile(100.0, samples(&[("A", Some(10.0)), ("A", None)]));
        assert!(matches!(result, Err(AltimetryError::DuplicateSource(id)) if id == "A"));
    }
}
