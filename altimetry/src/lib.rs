//! Flight height estimation.
//!
//! Flight height above terrain is first derived by reconciling the
//! GPS altitude (above sea level) recorded for an image against one
//! or more terrain elevation samples. When that yields a physically
//! implausible value, a GSD ratio between an orthomosaic and a
//! calibrated reference can stand in for it, see [`Recalculation`].

mod error;
mod gsd;
mod recalc;
mod reconcile;
mod report;
pub mod thresholds;

pub use crate::{
    error::AltimetryError,
    gsd::{
        manual_override, recalculate, CalibrationChoice, CalibrationPreset, CalibrationTable,
        GsdCalibration, GsdRecalculator, OrthomosaicResolution,
    },
    recalc::{Recalculation, Stage},
    reconcile::{reconcile, ElevationSample, FlightAnalysis, Provenance},
    report::Report,
    thresholds::{Assessment, Thresholds},
};
