//! Ground sample distance (GSD) ratio flight height.
//!
//! For a fixed sensor and lens, GSD scales linearly with distance to
//! the ground. Given the GSD of an orthomosaic and a reference GSD
//! measured at a known altitude, the orthomosaic's flight height is
//! the reference altitude scaled by the ratio of the two.

use crate::{recalc::Recalculation, AltimetryError};
use serde::{Deserialize, Serialize};
use std::{io::Read, path::Path};

const CM_PER_M: f64 = 100.0;

/// Reference altitude of the built-in calibration table.
const BUILTIN_REFERENCE_ALTITUDE_M: f64 = 50.0;

/// GSD of a known camera at a known altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GsdCalibration {
    pub reference_altitude_m: f64,
    pub reference_gsd_cm_per_px: f64,
}

impl GsdCalibration {
    pub fn new(reference_altitude_m: f64, reference_gsd_cm_per_px: f64) -> Self {
        Self {
            reference_altitude_m,
            reference_gsd_cm_per_px,
        }
    }

    /// Checks that both reference values are finite and positive.
    pub fn validate(&self) -> Result<(), AltimetryError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if positive(self.reference_altitude_m) && positive(self.reference_gsd_cm_per_px) {
            Ok(())
        } else {
            Err(AltimetryError::InsufficientCalibration {
                altitude_m: self.reference_altitude_m,
                gsd_cm_per_px: self.reference_gsd_cm_per_px,
            })
        }
    }
}

/// Ground resolution of an orthomosaic raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrthomosaicResolution {
    resolution_m_per_px: f64,
}

impl OrthomosaicResolution {
    /// # Errors
    ///
    /// Fails unless `resolution_m_per_px` is finite and positive.
    pub fn new(resolution_m_per_px: f64) -> Result<Self, AltimetryError> {
        if resolution_m_per_px.is_finite() && resolution_m_per_px > 0.0 {
            Ok(Self {
                resolution_m_per_px,
            })
        } else {
            Err(AltimetryError::Resolution(resolution_m_per_px))
        }
    }

    /// Returns the mean of the absolute x and y axis resolutions.
    pub fn from_axes(x_m_per_px: f64, y_m_per_px: f64) -> Result<Self, AltimetryError> {
        Self::new((x_m_per_px.abs() + y_m_per_px.abs()) / 2.0)
    }

    pub fn m_per_px(&self) -> f64 {
        self.resolution_m_per_px
    }

    pub fn cm_per_px(&self) -> f64 {
        self.resolution_m_per_px * CM_PER_M
    }
}

/// Returns the flight height at which `resolution` was captured,
/// according to `calibration`.
///
/// # Errors
///
/// Fails with [`AltimetryError::InsufficientCalibration`] if either
/// calibration value is not positive.
pub fn recalculate(
    resolution: OrthomosaicResolution,
    calibration: &GsdCalibration,
) -> Result<f64, AltimetryError> {
    calibration.validate()?;
    let map_gsd_cm = resolution.cm_per_px();
    let flight_height_m =
        (map_gsd_cm / calibration.reference_gsd_cm_per_px) * calibration.reference_altitude_m;
    if flight_height_m.is_finite() {
        Ok(flight_height_m)
    } else {
        Err(AltimetryError::InsufficientCalibration {
            altitude_m: calibration.reference_altitude_m,
            gsd_cm_per_px: calibration.reference_gsd_cm_per_px,
        })
    }
}

/// Accepts a hand-entered flight height verbatim.
pub fn manual_override(height_m: f64) -> Result<f64, AltimetryError> {
    if height_m.is_finite() {
        Ok(height_m)
    } else {
        Err(AltimetryError::ManualHeight(height_m))
    }
}

/// A named drone calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPreset {
    pub model: String,
    #[serde(flatten)]
    pub calibration: GsdCalibration,
}

/// Which calibration to recalculate with.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationChoice {
    /// A drone model from the [`CalibrationTable`].
    Preset(String),

    /// User supplied reference values.
    Manual(GsdCalibration),
}

/// Immutable set of drone calibrations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CalibrationTable {
    presets: Vec<CalibrationPreset>,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CalibrationTable {
    /// Reference GSDs for supported drones, all at 50 m.
    pub fn builtin() -> Self {
        let preset = |model: &str, gsd_cm_per_px| CalibrationPreset {
            model: model.to_owned(),
            calibration: GsdCalibration::new(BUILTIN_REFERENCE_ALTITUDE_M, gsd_cm_per_px),
        };
        Self {
            presets: vec![
                preset("DJI Phantom 4 Pro", 1.36),
                preset("DJI Mavic Mini", 2.19),
                preset("DJI Mavic 2 Pro", 1.17),
                preset("DJI Mavic Air 2", 1.82),
            ],
        }
    }

    /// # Errors
    ///
    /// Fails if any preset carries an invalid calibration.
    pub fn new(presets: Vec<CalibrationPreset>) -> Result<Self, AltimetryError> {
        for preset in &presets {
            preset.calibration.validate()?;
        }
        Ok(Self { presets })
    }

    /// Reads a table from a JSON array of presets.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, AltimetryError> {
        let presets: Vec<CalibrationPreset> = serde_json::from_reader(rdr)?;
        Self::new(presets)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AltimetryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Returns the calibration for `model`, ignoring ASCII case.
    pub fn get(&self, model: &str) -> Option<&GsdCalibration> {
        self.presets
            .iter()
            .find(|preset| preset.model.eq_ignore_ascii_case(model))
            .map(|preset| &preset.calibration)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationPreset> + '_ {
        self.presets.iter()
    }
}

/// Recalculates flight heights against a [`CalibrationTable`].
#[derive(Debug, Clone, Default)]
pub struct GsdRecalculator {
    table: CalibrationTable,
}

impl GsdRecalculator {
    pub fn new(table: CalibrationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Resolves `choice` into concrete, validated reference values.
    pub fn calibration(&self, choice: &CalibrationChoice) -> Result<GsdCalibration, AltimetryError> {
        let calibration = match choice {
            CalibrationChoice::Preset(model) => *self
                .table
                .get(model)
                .ok_or_else(|| AltimetryError::UnknownDroneModel(model.clone()))?,
            CalibrationChoice::Manual(calibration) => *calibration,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn recalculate(
        &self,
        resolution: OrthomosaicResolution,
        choice: &CalibrationChoice,
    ) -> Result<f64, AltimetryError> {
        recalculate(resolution, &self.calibration(choice)?)
    }

    /// Starts a new interactive recalculation.
    pub fn session(&self) -> Recalculation<'_> {
        Recalculation::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        manual_override, recalculate, AltimetryError, CalibrationChoice, CalibrationTable,
        GsdCalibration, GsdRecalculator, OrthomosaicResolution,
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_matching_gsd_is_reference_altitude() {
        let resolution = OrthomosaicResolution::new(0.015).unwrap();
        let calibration = GsdCalibration::new(50.0, 1.5);
        assert_relative_eq!(
            recalculate(resolution, &calibration).unwrap(),
            50.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_linear_in_resolution() {
        let calibration = GsdCalibration::new(50.0, 1.36);
        for m_per_px in [0.005, 0.0123, 0.02, 0.1] {
            let single = recalculate(OrthomosaicResolution::new(m_per_px).unwrap(), &calibration)
                .unwrap();
            let double =
                recalculate(OrthomosaicResolution::new(2.0 * m_per_px).unwrap(), &calibration)
                    .unwrap();
            assert_relative_eq!(double, 2.0 * single, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rejects_bad_calibration() {
        let resolution = OrthomosaicResolution::new(0.02).unwrap();
        for calibration in [
            GsdCalibration::new(50.0, 0.0),
            GsdCalibration::new(50.0, -1.0),
            GsdCalibration::new(50.0, f64::NAN),
            GsdCalibration::new(0.0, 1.5),
            GsdCalibration::new(f64::INFINITY, 1.5),
        ] {
            assert!(matches!(
                recalculate(resolution, &calibration),
                Err(AltimetryError::InsufficientCalibration { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_resolution() {
        for m_per_px in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                OrthomosaicResolution::new(m_per_px),
                Err(AltimetryError::Resolution(_))
            ));
        }
        assert!(OrthomosaicResolution::from_axes(0.0, 0.0).is_err());
    }

    #[test]
    fn test_resolution_from_axes() {
        let resolution = OrthomosaicResolution::from_axes(0.02, -0.03).unwrap();
        assert_relative_eq!(resolution.m_per_px(), 0.025);
        assert_relative_eq!(resolution.cm_per_px(), 2.5);
    }

    #[test]
    fn test_manual_override_echoes() {
        assert_eq!(manual_override(75.0).unwrap(), 75.0);
        assert_eq!(manual_override(-3.5).unwrap(), -3.5);
        assert!(manual_override(f64::NAN).is_err());
    }

    #[test]
    fn test_builtin_table() {
        let table = CalibrationTable::builtin();
        let gsds: Vec<f64> = table
            .iter()
            .map(|preset| preset.calibration.reference_gsd_cm_per_px)
            .collect();
        assert_eq!(gsds, vec![1.36, 2.19, 1.17, 1.82]);
        assert!(table
            .iter()
            .all(|preset| preset.calibration.reference_altitude_m == 50.0));
        assert_eq!(
            table.get("dji mavic 2 pro"),
            Some(&GsdCalibration::new(50.0, 1.17))
        );
        assert_eq!(table.get("Skydio 2"), None);
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"[
            {"model": "Test Cam", "reference_altitude_m": 100.0, "reference_gsd_cm_per_px": 2.0}
        ]"#;
        let table = CalibrationTable::from_reader(json.as_bytes()).unwrap();
        let recalculator = GsdRecalculator::new(table);
        let height = recalculator
            .recalculate(
                OrthomosaicResolution::new(0.01).unwrap(),
                &CalibrationChoice::Preset("Test Cam".to_owned()),
            )
            .unwrap();
        assert_relative_eq!(height, 50.0, epsilon = 1e-9);

        let json = r#"[{"model": "Broken", "reference_altitude_m": 50.0, "reference_gsd_cm_per_px": 0.0}]"#;
        assert!(matches!(
            CalibrationTable::from_reader(json.as_bytes()),
            Err(AltimetryError::InsufficientCalibration { .. })
        ));
    }

    #[test]
    fn test_choices() {
        let recalculator = GsdRecalculator::default();
        let resolution = OrthomosaicResolution::new(0.0136).unwrap();
        let height = recalculator
            .recalculate(resolution, &CalibrationChoice::Preset("DJI Phantom 4 Pro".to_owned()))
            .unwrap();
        assert_relative_eq!(height, 50.0, epsilon = 1e-9);

        let manual = CalibrationChoice::Manual(GsdCalibration::new(80.0, 2.72));
        assert_relative_eq!(
            recalculator.recalculate(resolution, &manual).unwrap(),
            40.0,
            epsilon = 1e-9
        );

        assert!(matches!(
            recalculator.recalculate(resolution, &CalibrationChoice::Preset("nope".to_owned())),
            Err(AltimetryError::UnknownDroneModel(_))
        ));
        assert!(matches!(
            recalculator.recalculate(resolution, &CalibrationChoice::Manual(GsdCalibration::new(50.0, 0.0))),
            Err(AltimetryError::InsufficientCalibration { .. })
        ));
    }
}
