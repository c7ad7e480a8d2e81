use crate::{Assessment, FlightAnalysis, Thresholds};
use serde::Serialize;
use std::fmt;

/// A [`FlightAnalysis`] ready for display.
///
/// Everything but the analysis is derived from it when the report is
/// built, so fields are read-only.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(flatten)]
    analysis: FlightAnalysis,
    recalculated: bool,
    manual_adjustment: bool,
    assessment: Assessment,
    warning: Option<String>,
}

impl Report {
    pub fn new(analysis: FlightAnalysis, thresholds: &Thresholds) -> Self {
        let assessment = thresholds.assess(&analysis);
        Self {
            recalculated: analysis.recalculated(),
            manual_adjustment: analysis.manual_adjustment(),
            warning: assessment.warning(thresholds),
            assessment,
            analysis,
        }
    }

    pub fn analysis(&self) -> &FlightAnalysis {
        &self.analysis
    }

    pub fn assessment(&self) -> Assessment {
        self.assessment
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn recalculated(&self) -> bool {
        self.recalculated
    }

    pub fn manual_adjustment(&self) -> bool {
        self.manual_adjustment
    }
}

struct Meters(Option<f64>);

impl fmt::Display for Meters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value:.2} m"),
            None => f.write_str("unavailable"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = &self.analysis;
        writeln!(
            f,
            "GPS altitude:      {}",
            Meters(Some(analysis.gps_altitude_m()))
        )?;
        writeln!(
            f,
            "Terrain elevation: {} ({} of {} sources)",
            Meters(analysis.terrain_elevation_avg_m()),
            analysis.sources_used(),
            analysis.per_source_elevations().len()
        )?;
        for (source_id, elevation_m) in analysis.per_source_elevations() {
            writeln!(f, "  {source_id}: {}", Meters(*elevation_m))?;
        }
        write!(f, "Flight height:     {}", Meters(analysis.flight_height_m()))?;
        if self.recalculated {
            f.write_str(" (recalculated)")?;
        } else if self.manual_adjustment {
            f.write_str(" (manual adjustment)")?;
        }
        if let Some(warning) = &self.warning {
            write!(f, "\nwarning: {warning}")?;
        }
        Ok(())
    }
}
