//! The `estimate` command, short of printing.

use crate::options::Estimate;
use altimetry::{ElevationSample, FlightAnalysis, GsdRecalculator, Report, Thresholds};
use anyhow::{anyhow, Error as AnyError};
use log::{info, warn};
use serde::Serialize;
use terrain::ElevationProvider;

/// Everything `estimate` reports.
#[derive(Debug, Serialize)]
pub struct Estimation {
    /// GPS altitude reconciled against terrain.
    pub initial: Report,

    /// Recalculated or hand-entered replacement for `initial`.
    pub revised: Option<Report>,

    /// Why revision input could not be used.
    pub revision_error: Option<String>,

    /// `--override` was given but the initial flight height needed no
    /// revision.
    pub override_ignored: bool,
}

impl Estimation {
    /// Returns true if the initial flight height should have been
    /// replaced but wasn't.
    pub fn unrevised(&self) -> bool {
        self.revised.is_none() && self.initial.assessment().accepts_revision()
    }
}

/// Surveys `providers` and reconciles against the GPS altitude in
/// `args`, then revises the result if it is below terrain or
/// unavailable and `args` say how.
///
/// Sources in `unavailable` are reported as absent.
///
/// # Errors
///
/// Fails only if reconciliation does. Bad revision input is recorded
/// in [`Estimation::revision_error`] so the initial report survives.
pub fn run<P: ElevationProvider>(
    providers: &[P],
    unavailable: &[String],
    args: &Estimate,
    recalculator: &GsdRecalculator,
    thresholds: &Thresholds,
) -> Result<Estimation, AnyError> {
    let (coord, gps_altitude_m) = (args.at.0, args.at.1);

    let mut samples = terrain::survey(providers, coord);
    samples.extend(unavailable.iter().cloned().map(ElevationSample::absent));
    info!("surveyed {} of {} terrain sources", providers.len(), samples.len());

    let initial = Report::new(altimetry::reconcile(gps_altitude_m, samples)?, thresholds);
    let assessment = initial.assessment();
    let mut estimation = Estimation {
        initial,
        revised: None,
        revision_error: None,
        override_ignored: false,
    };

    if !assessment.accepts_revision() {
        if args.override_m.is_some() {
            warn!("flight height needs no revision, ignoring --override");
            estimation.override_ignored = true;
        }
        return Ok(estimation);
    }

    match revise(args, recalculator, estimation.initial.analysis()) {
        Ok(revised) => {
            estimation.revised = revised.map(|analysis| Report::new(analysis, thresholds));
        }
        Err(e) => {
            warn!("recalculation failed: {e:#}");
            estimation.revision_error = Some(format!("{e:#}"));
        }
    }
    Ok(estimation)
}

/// Replaces the flight height in `basis` with a hand-entered one or,
/// failing that, a GSD-derived one. Returns `None` if `args` give
/// neither.
fn revise(
    args: &Estimate,
    recalculator: &GsdRecalculator,
    basis: &FlightAnalysis,
) -> Result<Option<FlightAnalysis>, AnyError> {
    let mut session = recalculator.session();

    if let Some(height_m) = args.override_m {
        return Ok(Some(session.manual_override(basis, height_m)?));
    }

    let Some(resolution) = args.resolution.resolve()? else {
        return Ok(None);
    };
    session.set_resolution(resolution)?;
    let choice = args
        .calibration
        .choice()
        .ok_or_else(|| anyhow!("recalculation needs --drone or --ref-alt and --ref-gsd"))?;
    session.choose_calibration(&choice)?;
    info!("recalculating: {:?}", session.stage());
    Ok(Some(session.accept(basis)?))
}

#[cfg(test)]
mod tests {
    use super::{run, Estimation};
    use crate::options::{Cli, Command};
    use altimetry::{Assessment, GsdRecalculator, Thresholds};
    use approx::assert_relative_eq;
    use clap::Parser;
    use terrain::{geo::geometry::Coord, ElevationProvider, TerrainError};

    /// Always answers the same elevation.
    struct Fixed(&'static str, Option<f64>);

    impl ElevationProvider for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        fn elevation(&self, _coord: Coord<f64>) -> Result<Option<f64>, TerrainError> {
            Ok(self.1)
        }
    }

    fn estimate(providers: &[Fixed], unavailable: &[&str], argv: &[&str]) -> Estimation {
        let argv = ["flightheight", "estimate"].iter().chain(argv);
        let Command::Estimate(args) = Cli::try_parse_from(argv).unwrap().cmd else {
            panic!("expected estimate");
        };
        let unavailable: Vec<String> = unavailable.iter().map(|id| (*id).to_owned()).collect();
        run(
            providers,
            &unavailable,
            &args,
            &GsdRecalculator::default(),
            &Thresholds::default(),
        )
        .unwrap()
    }

    const BELOW: [Fixed; 1] = [Fixed("A", Some(200.0))];

    #[test]
    fn test_below_terrain_is_recalculated() {
        let estimation = estimate(
            &BELOW,
            &[],
            &["--at", "44.5,-71.5,150", "--resolution", "0.0438", "--drone", "DJI Mavic Mini"],
        );
        assert_eq!(estimation.initial.analysis().flight_height_m(), Some(-50.0));
        assert_eq!(estimation.initial.assessment(), Assessment::BelowTerrain);

        let revised = estimation.revised.as_ref().unwrap();
        assert!(revised.recalculated());
        assert_eq!(revised.assessment(), Assessment::Nominal);
        assert_relative_eq!(
            revised.analysis().flight_height_m().unwrap(),
            100.0,
            epsilon = 1e-9
        );
        assert_eq!(revised.analysis().terrain_elevation_avg_m(), Some(200.0));
        assert!(!estimation.unrevised());
        assert_eq!(estimation.revision_error, None);
    }

    #[test]
    fn test_override_beats_recalculation() {
        let estimation = estimate(
            &BELOW,
            &[],
            &[
                "--at",
                "44.5,-71.5,150",
                "--resolution",
                "0.0438",
                "--drone",
                "DJI Mavic Mini",
                "--override",
                "75",
            ],
        );
        let revised = estimation.revised.unwrap();
        assert!(revised.manual_adjustment());
        assert!(!revised.recalculated());
        assert_eq!(revised.analysis().flight_height_m(), Some(75.0));
    }

    #[test]
    fn test_override_when_unavailable() {
        let estimation = estimate(&[], &["B"], &["--at", "44.5,-71.5,150", "--override", "75"]);
        assert_eq!(estimation.initial.assessment(), Assessment::Unavailable);
        assert_eq!(estimation.initial.analysis().per_source_elevations()["B"], None);

        let revised = estimation.revised.unwrap();
        assert!(revised.manual_adjustment());
        assert_eq!(revised.analysis().flight_height_m(), Some(75.0));
        assert_eq!(revised.assessment(), Assessment::Nominal);
        assert!(!estimation.override_ignored);
    }

    #[test]
    fn test_override_ignored_when_plausible() {
        let estimation = estimate(&BELOW, &[], &["--at", "44.5,-71.5,250", "--override", "75"]);
        assert_eq!(estimation.initial.analysis().flight_height_m(), Some(50.0));
        assert!(estimation.revised.is_none());
        assert!(estimation.override_ignored);
        assert!(!estimation.unrevised());
    }

    #[test]
    fn test_unreadable_ortho_keeps_initial_report() {
        let dir = tempfile::tempdir().unwrap();
        let ortho = dir.path().join("bad.tif");
        std::fs::write(&ortho, b"not a tiff").unwrap();

        let estimation = estimate(
            &BELOW,
            &[],
            &[
                "--at",
                "44.5,-71.5,150",
                "--ortho",
                ortho.to_str().unwrap(),
                "--drone",
                "DJI Mavic Mini",
            ],
        );
        assert_eq!(estimation.initial.analysis().flight_height_m(), Some(-50.0));
        assert!(estimation.revised.is_none());
        assert!(estimation.revision_error.is_some());
        assert!(estimation.unrevised());

        let json = serde_json::to_value(&estimation).unwrap();
        assert_eq!(json["initial"]["flight_height_m"], -50.0);
        assert!(json["revised"].is_null());
        assert!(json["revision_error"].is_string());
    }

    #[test]
    fn test_resolution_without_calibration() {
        let estimation = estimate(&BELOW, &[], &["--at", "44.5,-71.5,150", "--resolution", "0.02"]);
        assert!(estimation.revised.is_none());
        assert!(estimation.revision_error.unwrap().contains("--drone"));
    }

    #[test]
    fn test_below_terrain_without_input() {
        let estimation = estimate(&BELOW, &[], &["--at", "44.5,-71.5,150"]);
        assert!(estimation.revised.is_none());
        assert_eq!(estimation.revision_error, None);
        assert!(estimation.unrevised());
    }
}
