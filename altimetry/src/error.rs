use thiserror::Error;

#[derive(Error, Debug)]
pub enum AltimetryError {
    #[error("GPS altitude must be a finite number, got {0}")]
    GpsAltitude(f64),

    #[error("elevation source '{0}' reported more than once")]
    DuplicateSource(String),

    #[error("insufficient calibration data: reference altitude {altitude_m} m, reference GSD {gsd_cm_per_px} cm/px")]
    InsufficientCalibration { altitude_m: f64, gsd_cm_per_px: f64 },

    #[error("orthomosaic resolution must be a positive number of m/px, got {0}")]
    Resolution(f64),

    #[error("manual flight height must be a finite number, got {0}")]
    ManualHeight(f64),

    #[error("no calibration for drone model '{0}'")]
    UnknownDroneModel(String),

    #[error("recalculation needs {0} before it can be accepted")]
    Incomplete(&'static str),

    #[error("recalculation already finished")]
    Finished,

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
