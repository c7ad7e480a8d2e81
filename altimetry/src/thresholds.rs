//! Plausibility thresholds for flight heights.
//!
//! Both escalation to recalculation and user facing warnings are
//! driven from these values.

use crate::FlightAnalysis;
use serde::Serialize;

/// Heights below this are physically implausible (camera below
/// terrain) and call for recalculation.
pub const MIN_PLAUSIBLE_HEIGHT_M: f64 = 0.0;

/// Heights above this exceed the regulatory limit. The value is
/// reported as-is with a warning.
pub const REGULATORY_CEILING_M: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_plausible_m: f64,
    pub regulatory_ceiling_m: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_plausible_m: MIN_PLAUSIBLE_HEIGHT_M,
            regulatory_ceiling_m: REGULATORY_CEILING_M,
        }
    }
}

/// How a flight height measures up against [`Thresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    /// No flight height could be computed.
    Unavailable,

    /// Below the minimum plausible height.
    BelowTerrain,

    /// Above the regulatory ceiling.
    AboveCeiling,

    Nominal,
}

impl Assessment {
    /// Returns true if the flight height must be recalculated before
    /// it can be trusted.
    pub fn needs_recalculation(self) -> bool {
        self == Self::BelowTerrain
    }

    /// Returns true if the flight height may be replaced, either by
    /// recalculation or by hand. Plausible heights are kept.
    pub fn accepts_revision(self) -> bool {
        matches!(self, Self::BelowTerrain | Self::Unavailable)
    }

    /// User facing warning, if any.
    pub fn warning(self, thresholds: &Thresholds) -> Option<String> {
        match self {
            Self::Unavailable => Some("terrain elevation unavailable, flight height not computable".to_owned()),
            Self::BelowTerrain => Some(format!(
                "flight height is below {:.2} m (camera below terrain), recalculation required",
                thresholds.min_plausible_m
            )),
            Self::AboveCeiling => Some(format!(
                "flight height exceeds the {:.2} m regulatory limit",
                thresholds.regulatory_ceiling_m
            )),
            Self::Nominal => None,
        }
    }
}

impl Thresholds {
    pub fn assess_height(&self, flight_height_m: Option<f64>) -> Assessment {
        match flight_height_m {
            None => Assessment::Unavailable,
            Some(h) if h < self.min_plausible_m => Assessment::BelowTerrain,
            Some(h) if h > self.regulatory_ceiling_m => Assessment::AboveCeiling,
            Some(_) => Assessment::Nominal,
        }
    }

    pub fn assess(&self, analysis: &FlightAnalysis) -> Assessment {
        self.assess_height(analysis.flight_height_m())
    }
}
