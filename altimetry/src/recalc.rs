use crate::{
    gsd::{self, CalibrationChoice, GsdCalibration, GsdRecalculator, OrthomosaicResolution},
    AltimetryError, FlightAnalysis, Provenance,
};
use log::debug;

/// Progress of a [`Recalculation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No orthomosaic resolution yet.
    AwaitingInput,

    /// Resolution known, calibration unknown.
    ResolutionKnown,

    /// Both resolution and calibration known.
    Computable,

    /// The computed height was accepted (terminal).
    Accepted,

    /// A hand-entered height was accepted (terminal).
    Overridden,
}

/// One attempt at replacing an implausible flight height.
///
/// Inputs may arrive in any order; a calibration chosen before the
/// resolution is held until the resolution arrives. Once accepted or
/// overridden the recalculation is finished, and any further change
/// requires a new one from [`GsdRecalculator::session`].
#[derive(Debug, Clone)]
pub struct Recalculation<'a> {
    recalculator: &'a GsdRecalculator,
    resolution: Option<OrthomosaicResolution>,
    calibration: Option<GsdCalibration>,
    outcome: Option<(Provenance, f64)>,
}

impl<'a> Recalculation<'a> {
    pub(crate) fn new(recalculator: &'a GsdRecalculator) -> Self {
        Self {
            recalculator,
            resolution: None,
            calibration: None,
            outcome: None,
        }
    }

    pub fn stage(&self) -> Stage {
        match (self.outcome, self.resolution, self.calibration) {
            (Some((Provenance::ManualOverride, _)), _, _) => Stage::Overridden,
            (Some(_), _, _) => Stage::Accepted,
            (None, None, _) => Stage::AwaitingInput,
            (None, Some(_), None) => Stage::ResolutionKnown,
            (None, Some(_), Some(_)) => Stage::Computable,
        }
    }

    /// Accepted flight height, if finished.
    pub fn outcome(&self) -> Option<f64> {
        self.outcome.map(|(_, height)| height)
    }

    pub fn set_resolution(
        &mut self,
        resolution: OrthomosaicResolution,
    ) -> Result<&mut Self, AltimetryError> {
        self.ensure_open()?;
        self.resolution = Some(resolution);
        Ok(self)
    }

    /// Resolves and records `choice`.
    ///
    /// # Errors
    ///
    /// Fails for unknown presets and invalid manual values; the
    /// previous calibration, if any, is kept.
    pub fn choose_calibration(
        &mut self,
        choice: &CalibrationChoice,
    ) -> Result<&mut Self, AltimetryError> {
        self.ensure_open()?;
        self.calibration = Some(self.recalculator.calibration(choice)?);
        Ok(self)
    }

    /// Computes the flight height without finishing.
    pub fn preview(&self) -> Result<f64, AltimetryError> {
        let resolution = self
            .resolution
            .ok_or(AltimetryError::Incomplete("an orthomosaic resolution"))?;
        let calibration = self
            .calibration
            .ok_or(AltimetryError::Incomplete("a calibration"))?;
        gsd::recalculate(resolution, &calibration)
    }

    /// Finishes with the computed height, returning `basis` with its
    /// flight height replaced.
    pub fn accept(&mut self, basis: &FlightAnalysis) -> Result<FlightAnalysis, AltimetryError> {
        self.ensure_open()?;
        let height = self.preview()?;
        debug!("accepting recalculated flight height {height} m");
        self.finish(basis, Provenance::Recalculated, height)
    }

    /// Finishes with a hand-entered height, whatever the stage.
    pub fn manual_override(
        &mut self,
        basis: &FlightAnalysis,
        height_m: f64,
    ) -> Result<FlightAnalysis, AltimetryError> {
        self.ensure_open()?;
        let height = gsd::manual_override(height_m)?;
        debug!("overriding flight height with {height} m");
        self.finish(basis, Provenance::ManualOverride, height)
    }
}

/// Private API.
impl<'a> Recalculation<'a> {
    fn ensure_open(&self) -> Result<(), AltimetryError> {
        match self.outcome {
            Some(_) => Err(AltimetryError::Finished),
            None => Ok(()),
        }
    }

    fn finish(
        &mut self,
        basis: &FlightAnalysis,
        provenance: Provenance,
        height: f64,
    ) -> Result<FlightAnalysis, AltimetryError> {
        self.outcome = Some((provenance, height));
        Ok(basis.with_flight_height(height, provenance))
    }
}
