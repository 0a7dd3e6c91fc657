// Orchestration of one analysis run: normalize, filter, aggregate, assemble
// the prompt, then (optionally) call the external collaborators.

use crate::config::{AnalysisProfile, ApiKey};
use crate::error::{PipelineError, Result};
use crate::filter::apply_filter;
use crate::loader::{normalize, LoadReport};
use crate::prompt::{build_forecast_payload, build_seasonal_payload};
use crate::reports::{summarize, SeasonalReport};
use crate::services::{
    CommentaryRequest, CommentaryService, ForecastRequest, Forecaster, COMMENTARY_STAGE,
    FORECAST_STAGE,
};
use crate::types::{FilterSelection, ForecastTable, NormalizedSeries, RawTable, ReportPayload};
use tracing::{info, warn};

/// Result of one filtered seasonal analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalAnalysis {
    pub view: NormalizedSeries,
    pub report: SeasonalReport,
    pub payload: ReportPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastAnalysis {
    pub forecast: ForecastTable,
    pub payload: ReportPayload,
}

/// Runs analyses for one profile. The credential is injected here rather
/// than read from the environment.
#[derive(Debug, Clone)]
pub struct SeasonalAnalyzer {
    profile: AnalysisProfile,
    api_key: ApiKey,
}

impl SeasonalAnalyzer {
    pub fn new(profile: AnalysisProfile, api_key: ApiKey) -> Result<Self> {
        profile.validate()?;
        Ok(Self { profile, api_key })
    }

    pub fn profile(&self) -> &AnalysisProfile {
        &self.profile
    }

    /// Normalize an uploaded table. A schema error halts the run.
    pub fn load(&self, table: &RawTable) -> Result<(NormalizedSeries, LoadReport)> {
        normalize(table, &self.profile.mapping)
    }

    /// Filter, aggregate and assemble the seasonal prompt. Never fails: an
    /// empty view yields empty summaries.
    pub fn analyze(&self, series: &NormalizedSeries, selection: &FilterSelection) -> SeasonalAnalysis {
        let view = apply_filter(series, selection);
        let fields: Vec<&str> = self.profile.mapping.fields().collect();
        let report = summarize(&view, &fields);
        let payload = build_seasonal_payload(&self.profile, &report);
        info!(
            "Seasonal analysis over {} records ({} months observed)",
            view.len(),
            report.monthly.len()
        );
        SeasonalAnalysis {
            view,
            report,
            payload,
        }
    }

    /// Ask `forecaster` for the profile's horizon beyond the last observed
    /// date and assemble the forecast prompt.
    pub fn forecast(&self, series: &NormalizedSeries, forecaster: &dyn Forecaster) -> Result<ForecastAnalysis> {
        if series.is_empty() {
            return Err(PipelineError::external(FORECAST_STAGE, "no records to forecast"));
        }
        let request = ForecastRequest::new(series, self.profile.horizon);
        let forecast = forecaster
            .forecast(&request)
            .map_err(|e| stage_error(FORECAST_STAGE, e))?;
        let payload = build_forecast_payload(&self.profile, &forecast)?;
        Ok(ForecastAnalysis { forecast, payload })
    }

    pub fn commentary_request(&self, payload: &ReportPayload) -> CommentaryRequest {
        CommentaryRequest {
            api_key: self.api_key.clone(),
            model: self.profile.model.clone(),
            payload: payload.clone(),
        }
    }

    /// Call the commentary service. Failures are reported for this stage only.
    pub fn commentary(&self, payload: &ReportPayload, service: &dyn CommentaryService) -> Result<String> {
        let request = self.commentary_request(payload);
        let text = service
            .complete(&request)
            .map_err(|e| stage_error(COMMENTARY_STAGE, e))?;
        if text.trim().is_empty() {
            warn!("Commentary service returned an empty response");
            return Err(PipelineError::external(COMMENTARY_STAGE, "empty response"));
        }
        Ok(text)
    }
}

fn stage_error(stage: &str, err: PipelineError) -> PipelineError {
    warn!("{} stage failed: {}", stage, err);
    match err {
        PipelineError::ExternalService { .. } => err,
        other => PipelineError::external(stage, other.to_string()),
    }
}
