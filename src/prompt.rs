// Assembly of the system/user message pair for the commentary service.

use crate::config::AnalysisProfile;
use crate::error::Result;
use crate::reports::{month_rows, stat_rows, weekday_rows, SeasonalReport};
use crate::types::{ForecastTable, ReportPayload};
use tabled::{settings::Style, Table};

/// Descriptive statistics followed by the monthly and weekday means, as
/// markdown tables.
pub fn seasonal_data_block(report: &SeasonalReport, profile: &AnalysisProfile) -> String {
    let stats = stat_rows(&report.stats, &profile.mapping.value, &profile.mapping.timestamp);
    let mut out = Table::new(stats).with(Style::markdown()).to_string();

    out.push_str("\n\nMonthly mean:\n");
    let months = month_rows(&report.monthly);
    if months.is_empty() {
        out.push_str("(no rows)");
    } else {
        out.push_str(&Table::new(months).with(Style::markdown()).to_string());
    }

    out.push_str("\n\nWeekday mean:\n");
    out.push_str(
        &Table::new(weekday_rows(&report.weekday))
            .with(Style::markdown())
            .to_string(),
    );
    out
}

pub fn build_seasonal_payload(profile: &AnalysisProfile, report: &SeasonalReport) -> ReportPayload {
    let data = seasonal_data_block(report, profile);
    ReportPayload::new(
        profile.seasonal_prompt.system.clone(),
        profile.seasonal_prompt.render(&data),
    )
}

/// Forecast rows as a JSON array of `{ds, yhat, yhat_lower, yhat_upper}`.
pub fn forecast_data_block(table: &ForecastTable) -> Result<String> {
    Ok(serde_json::to_string(&table.points)?)
}

pub fn build_forecast_payload(profile: &AnalysisProfile, table: &ForecastTable) -> Result<ReportPayload> {
    let data = forecast_data_block(table)?;
    Ok(ReportPayload::new(
        profile.forecast_prompt.system.clone(),
        profile.forecast_prompt.render(&data),
    ))
}
