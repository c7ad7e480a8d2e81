mod estimate;
mod options;

use altimetry::{
    CalibrationTable, GsdCalibration, GsdRecalculator, OrthomosaicResolution, Thresholds,
};
use anyhow::{anyhow, Error as AnyError};
use clap::Parser;
use log::warn;
use options::{Cli, Command as CliCmd, Estimate, Gsd, NamedDir};
use serde::Serialize;
use std::{io::Write, time::Duration};
use terrain::{Retry, TileMode, TileProvider, Tiles};

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    env_logger::init();

    let table = match &cli.calibrations {
        Some(path) => CalibrationTable::from_path(path)?,
        None => CalibrationTable::builtin(),
    };
    let recalculator = GsdRecalculator::new(table);
    let thresholds = Thresholds::default();

    match &cli.cmd {
        CliCmd::Estimate(args) => estimate(&cli, args, &recalculator, &thresholds),
        CliCmd::Gsd(args) => gsd(&cli, args, &recalculator, &thresholds),
        CliCmd::Presets => presets(&cli, recalculator.table()),
    }
}

/// Opens every tile source.
///
/// Sources which can't be opened are returned by name so they can
/// still be reported as unavailable.
fn open_providers(cli: &Cli) -> (Vec<Retry<TileProvider>>, Vec<String>) {
    let tile_mode = if cli.in_mem {
        TileMode::InMem
    } else {
        TileMode::MemMap
    };
    let mut providers = Vec::with_capacity(cli.tile_sources.len());
    let mut unopened = Vec::new();
    for NamedDir { name, dir } in &cli.tile_sources {
        match Tiles::new(dir.clone(), tile_mode) {
            Ok(tiles) => {
                let provider = Retry::new(TileProvider::new(name.clone(), tiles), cli.attempts)
                    .with_backoff(
                        Duration::from_millis(cli.backoff_ms),
                        Duration::from_millis(cli.backoff_max_ms),
                    );
                providers.push(provider);
            }
            Err(e) => {
                warn!("{name}: {e}");
                unopened.push(name.clone());
            }
        }
    }
    (providers, unopened)
}

fn estimate(
    cli: &Cli,
    args: &Estimate,
    recalculator: &GsdRecalculator,
    thresholds: &Thresholds,
) -> Result<(), AnyError> {
    let (providers, unopened) = open_providers(cli);
    let estimation = estimate::run(&providers, &unopened, args, recalculator, thresholds)?;

    if cli.json {
        let json = serde_json::to_string(&estimation)?;
        println!("{json}");
    } else {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", estimation.initial)?;
        if let Some(revised) = &estimation.revised {
            writeln!(stdout)?;
            writeln!(stdout, "{revised}")?;
        }
        if estimation.override_ignored {
            eprintln!("note: flight height needs no revision, --override was not used");
        }
        if estimation.unrevised() {
            eprintln!(
                "hint: pass --ortho or --resolution with --drone or --ref-alt/--ref-gsd \
                 to recalculate, or --override to enter a flight height"
            );
        }
    }

    match estimation.revision_error {
        Some(e) => Err(anyhow!("recalculation failed: {e}")),
        None => Ok(()),
    }
}

fn gsd(
    cli: &Cli,
    args: &Gsd,
    recalculator: &GsdRecalculator,
    thresholds: &Thresholds,
) -> Result<(), AnyError> {
    let (resolution, calibration, flight_height_m) = gsd_height(args, recalculator)?;
    let assessment = thresholds.assess_height(Some(flight_height_m));
    let warning = assessment.warning(thresholds);

    if cli.json {
        #[derive(Serialize)]
        struct JsonGsd {
            resolution_m_per_px: f64,
            reference_altitude_m: f64,
            reference_gsd_cm_per_px: f64,
            flight_height_m: f64,
            warning: Option<String>,
        }
        let json = serde_json::to_string(&JsonGsd {
            resolution_m_per_px: resolution.m_per_px(),
            reference_altitude_m: calibration.reference_altitude_m,
            reference_gsd_cm_per_px: calibration.reference_gsd_cm_per_px,
            flight_height_m,
            warning,
        })?;
        println!("{json}");
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Resolution:        {:.2} cm/px",
        resolution.cm_per_px()
    )?;
    writeln!(
        stdout,
        "Calibration:       {:.2} cm/px at {:.2} m",
        calibration.reference_gsd_cm_per_px, calibration.reference_altitude_m
    )?;
    writeln!(stdout, "Flight height:     {flight_height_m:.2} m")?;
    if let Some(warning) = warning {
        writeln!(stdout, "warning: {warning}")?;
    }
    Ok(())
}

/// Resolves the inputs of `gsd` and the flight height they give.
fn gsd_height(
    args: &Gsd,
    recalculator: &GsdRecalculator,
) -> Result<(OrthomosaicResolution, GsdCalibration, f64), AnyError> {
    let resolution = args
        .resolution
        .resolve()?
        .ok_or_else(|| anyhow!("gsd needs --ortho or --resolution"))?;
    let choice = args
        .calibration
        .choice()
        .ok_or_else(|| anyhow!("gsd needs --drone or --ref-alt and --ref-gsd"))?;
    let calibration = recalculator.calibration(&choice)?;
    let flight_height_m = altimetry::recalculate(resolution, &calibration)?;
    Ok((resolution, calibration, flight_height_m))
}

fn presets(cli: &Cli, table: &CalibrationTable) -> Result<(), AnyError> {
    if cli.json {
        let json = serde_json::to_string(table)?;
        println!("{json}");
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    for preset in table.iter() {
        writeln!(
            stdout,
            "{}: {:.2} cm/px at {:.2} m",
            preset.model,
            preset.calibration.reference_gsd_cm_per_px,
            preset.calibration.reference_altitude_m
        )?;
    }
    Ok(())
}
