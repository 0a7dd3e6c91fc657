// Seams for the two external collaborators: the forecaster and the
// commentary service. Neither is implemented here beyond a file-backed
// forecaster that replays a table produced by an external tool.

use crate::config::ApiKey;
use crate::error::{PipelineError, Result};
use crate::types::{ForecastPoint, ForecastTable, NormalizedSeries, ReportPayload};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const FORECAST_STAGE: &str = "forecast";
pub const COMMENTARY_STAGE: &str = "commentary";

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    /// `(date, value)` pairs in series order.
    pub history: Vec<(NaiveDate, f64)>,
    /// Number of future periods beyond the last observed date.
    pub horizon: usize,
}

impl ForecastRequest {
    pub fn new(series: &NormalizedSeries, horizon: usize) -> Self {
        Self {
            history: series.history(),
            horizon,
        }
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.history.iter().map(|(d, _)| *d).max()
    }
}

pub trait Forecaster {
    fn forecast(&self, request: &ForecastRequest) -> Result<ForecastTable>;
}

/// Replays a forecast table exported as CSV with columns
/// `ds,yhat,yhat_lower,yhat_upper`.
#[derive(Debug, Clone)]
pub struct FileForecaster {
    path: PathBuf,
}

impl FileForecaster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_points(&self) -> Result<Vec<ForecastPoint>> {
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| file_error(&self.path, e))?;
        let points = rdr
            .deserialize::<ForecastPoint>()
            .map(|row| row.map_err(|e| file_error(&self.path, e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(points)
    }
}

fn file_error(path: &Path, err: impl Display) -> PipelineError {
    PipelineError::external(FORECAST_STAGE, format!("{}: {}", path.display(), err))
}

impl Forecaster for FileForecaster {
    fn forecast(&self, request: &ForecastRequest) -> Result<ForecastTable> {
        let points = self.read_points()?;
        let future = match request.last_date() {
            Some(last) => points.iter().filter(|p| p.ds > last).count(),
            None => points.len(),
        };
        if future == 0 {
            return Err(PipelineError::external(
                FORECAST_STAGE,
                format!("{} has no periods beyond the observed data", self.path.display()),
            ));
        }
        if future < request.horizon {
            warn!(
                "Forecast covers {} future periods, {} requested",
                future, request.horizon
            );
        }
        info!("Loaded {} forecast rows ({} future)", points.len(), future);
        Ok(ForecastTable { points })
    }
}

/// Everything the commentary service needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryRequest {
    pub api_key: ApiKey,
    pub model: String,
    pub payload: ReportPayload,
}

impl CommentaryRequest {
    /// Chat-style request body: a system and a user message. The credential
    /// is not part of the body.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.payload.system()},
                {"role": "user", "content": self.payload.user()},
            ],
        })
    }
}

pub trait CommentaryService {
    /// Return the narrative text to display verbatim.
    fn complete(&self, request: &CommentaryRequest) -> Result<String>;
}
